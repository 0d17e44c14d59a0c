use bytes::Bytes;
use speedy::{Endianness, Readable};

use crate::{
  discovery::data_types::participant_proxy_data::ParticipantProxyData,
  error::{Error, Result},
  messages::{protocol_version::ProtocolVersion, vendor_id::VendorId},
  serialization::representation_identifier::RepresentationIdentifier,
  structure::{
    builtin_endpoint::BuiltinEndpointSet,
    duration::Duration,
    guid::GUID,
    locator::Locator,
    parameter_id::ParameterId,
    sequence_number::SequenceNumber,
  },
};

/// Accumulates parameters of one `DCPSParticipant` announcement while
/// walking its parameter list, then generates a [`ParticipantProxyData`].
///
/// Unknown parameter ids are skipped by their declared length, which is how
/// a parameter list stays extensible across vendors and versions.
#[derive(Debug, Default)]
pub struct BuiltinDataDeserializer {
  pub guid: Option<GUID>,
  pub protocol_version: Option<ProtocolVersion>,
  pub vendor_id: Option<VendorId>,
  pub expects_inline_qos: Option<bool>,
  pub available_builtin_endpoints: Option<BuiltinEndpointSet>,
  pub metatraffic_unicast_locators: Vec<Locator>,
  pub metatraffic_multicast_locators: Vec<Locator>,
  pub default_unicast_locators: Vec<Locator>,
  pub default_multicast_locators: Vec<Locator>,
  pub participant_name: Option<String>,
  pub user_data: Option<Bytes>,
  pub lease_duration: Option<Duration>,
  pub version: Option<SequenceNumber>,
  pub persistence_guid: Option<GUID>,
  pub identity_token: Option<Bytes>,
  pub permissions_token: Option<Bytes>,
  pub security_attributes: Option<u32>,
  pub plugin_security_attributes: Option<u32>,
}

impl BuiltinDataDeserializer {
  pub fn new() -> Self {
    BuiltinDataDeserializer::default()
  }

  /// Walks a parameter list (no encapsulation header) until the sentinel.
  pub fn parse_parameter_list(mut self, buffer: &[u8], endianness: Endianness) -> Result<Self> {
    let mut pos: usize = 0;
    loop {
      if buffer.len() < pos + 4 {
        return Error::serialization("parameter list ends without sentinel");
      }
      let pid =
        ParameterId::read_from_buffer_with_ctx(endianness, &buffer[pos..pos + 2])?;
      let length =
        u16::read_from_buffer_with_ctx(endianness, &buffer[pos + 2..pos + 4])? as usize;
      pos += 4;

      if pid == ParameterId::PID_SENTINEL {
        return Ok(self);
      }
      if buffer.len() < pos + length {
        return Error::serialization("parameter body exceeds payload");
      }
      self.parse_parameter(pid, &buffer[pos..pos + length], endianness)?;
      pos += length;
    }
  }

  fn parse_parameter(
    &mut self,
    pid: ParameterId,
    body: &[u8],
    endianness: Endianness,
  ) -> Result<()> {
    match pid {
      ParameterId::PID_PAD => {}
      ParameterId::PID_PROTOCOL_VERSION => {
        self.protocol_version =
          Some(ProtocolVersion::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_VENDOR_ID => {
        self.vendor_id = Some(VendorId::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_PARTICIPANT_GUID => {
        self.guid = Some(GUID::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_EXPECTS_INLINE_QOS => {
        self.expects_inline_qos = Some(bool::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_METATRAFFIC_UNICAST_LOCATOR => {
        self
          .metatraffic_unicast_locators
          .push(Locator::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_METATRAFFIC_MULTICAST_LOCATOR => {
        self
          .metatraffic_multicast_locators
          .push(Locator::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_DEFAULT_UNICAST_LOCATOR => {
        self
          .default_unicast_locators
          .push(Locator::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_DEFAULT_MULTICAST_LOCATOR => {
        self
          .default_multicast_locators
          .push(Locator::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_PARTICIPANT_LEASE_DURATION => {
        self.lease_duration = Some(Duration::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_BUILTIN_ENDPOINT_SET => {
        self.available_builtin_endpoints =
          Some(BuiltinEndpointSet::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_ANNOUNCEMENT_VERSION => {
        self.version = Some(SequenceNumber::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_ENTITY_NAME => {
        self.participant_name = Some(read_string(body, endianness)?);
      }
      ParameterId::PID_USER_DATA => {
        self.user_data = Some(read_octet_seq(body, endianness)?);
      }
      ParameterId::PID_PERSISTENCE_GUID => {
        self.persistence_guid = Some(GUID::read_from_buffer_with_ctx(endianness, body)?);
      }
      ParameterId::PID_IDENTITY_TOKEN => {
        self.identity_token = Some(read_octet_seq(body, endianness)?);
      }
      ParameterId::PID_PERMISSIONS_TOKEN => {
        self.permissions_token = Some(read_octet_seq(body, endianness)?);
      }
      ParameterId::PID_PARTICIPANT_SECURITY_INFO => {
        if body.len() < 8 {
          return Error::serialization("truncated participant security info");
        }
        self.security_attributes =
          Some(u32::read_from_buffer_with_ctx(endianness, &body[0..4])?);
        self.plugin_security_attributes =
          Some(u32::read_from_buffer_with_ctx(endianness, &body[4..8])?);
      }
      // Anything else (key hash, status info, other vendors' extensions)
      // is skipped by length.
      _ => {}
    }
    Ok(())
  }

  pub fn generate_participant_data(self) -> Result<ParticipantProxyData> {
    let guid = match self.guid {
      Some(guid) => guid,
      None => return Error::serialization("announcement carries no participant GUID"),
    };

    let lease_duration = self
      .lease_duration
      .unwrap_or(crate::discovery::data_types::participant_proxy_data::DEFAULT_LEASE_DURATION);
    if !lease_duration.is_positive() {
      return Error::bad_parameter("announced lease duration is not positive");
    }

    let mut data = ParticipantProxyData::default();
    data.set_guid(guid);
    if let Some(protocol_version) = self.protocol_version {
      data.protocol_version = protocol_version;
    }
    if let Some(vendor_id) = self.vendor_id {
      data.vendor_id = vendor_id;
    }
    if let Some(expects_inline_qos) = self.expects_inline_qos {
      data.expects_inline_qos = expects_inline_qos;
    }
    if let Some(endpoints) = self.available_builtin_endpoints {
      data.available_builtin_endpoints = endpoints;
    }
    for locator in self.metatraffic_unicast_locators {
      data.metatraffic_locators.add_unicast_locator(locator);
    }
    for locator in self.metatraffic_multicast_locators {
      data.metatraffic_locators.add_multicast_locator(locator);
    }
    for locator in self.default_unicast_locators {
      data.default_locators.add_unicast_locator(locator);
    }
    for locator in self.default_multicast_locators {
      data.default_locators.add_multicast_locator(locator);
    }
    if let Some(name) = self.participant_name {
      data.participant_name = name;
    }
    if let Some(user_data) = self.user_data {
      data.user_data = user_data;
    }
    data.lease_duration = lease_duration;
    if let Some(version) = self.version {
      data.version = version;
    }
    data.persistence_guid = self.persistence_guid;
    data.identity_token = self.identity_token;
    data.permissions_token = self.permissions_token;
    data.security_attributes = self.security_attributes.unwrap_or(0);
    data.plugin_security_attributes = self.plugin_security_attributes.unwrap_or(0);

    Ok(data)
  }
}

/// Decodes a full serialized payload: encapsulation header, then list.
pub fn participant_data_from_payload(payload: &[u8]) -> Result<ParticipantProxyData> {
  if payload.len() < 4 {
    return Error::serialization("payload shorter than encapsulation header");
  }
  let representation_identifier = RepresentationIdentifier::from_bytes(&payload[..2])?;
  let endianness = match representation_identifier.endianness() {
    Some(endianness) => endianness,
    None => {
      return Error::serialization("payload is not PL_CDR encapsulated");
    }
  };
  // bytes 2..4 are representation options, ignored on receive
  BuiltinDataDeserializer::new()
    .parse_parameter_list(&payload[4..], endianness)?
    .generate_participant_data()
}

fn read_string(body: &[u8], endianness: Endianness) -> Result<String> {
  if body.len() < 4 {
    return Error::serialization("truncated CDR string");
  }
  let length = u32::read_from_buffer_with_ctx(endianness, &body[0..4])? as usize;
  if length == 0 || body.len() < 4 + length {
    return Error::serialization("CDR string length exceeds parameter");
  }
  // length includes the terminating NUL
  Ok(String::from_utf8_lossy(&body[4..4 + length - 1]).into_owned())
}

fn read_octet_seq(body: &[u8], endianness: Endianness) -> Result<Bytes> {
  if body.len() < 4 {
    return Error::serialization("truncated octet sequence");
  }
  let length = u32::read_from_buffer_with_ctx(endianness, &body[0..4])? as usize;
  if body.len() < 4 + length {
    return Error::serialization("octet sequence length exceeds parameter");
  }
  Ok(Bytes::copy_from_slice(&body[4..4 + length]))
}
