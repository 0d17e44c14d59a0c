use bytes::Bytes;
use speedy::{Endianness, Writable};

use crate::{
  discovery::data_types::participant_proxy_data::ParticipantProxyData,
  error::{Error, Result},
  serialization::representation_identifier::RepresentationIdentifier,
  structure::{locator::Locator, parameter_id::ParameterId},
};

/// Encodes a [`ParticipantProxyData`] as a CDR parameter list.
///
/// Every parameter is aligned to 4 bytes: the body is padded up, so the
/// following parameter header lands on a 4-byte boundary. The list is
/// terminated with `PID_SENTINEL`.
pub struct BuiltinDataSerializer<'a> {
  data: &'a ParticipantProxyData,
}

impl<'a> BuiltinDataSerializer<'a> {
  pub fn from_participant_data(data: &'a ParticipantProxyData) -> Self {
    BuiltinDataSerializer { data }
  }

  /// The parameter list alone, without encapsulation header.
  pub fn write_to_vec(&self, endianness: Endianness) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::with_capacity(256);
    let data = self.data;

    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_PROTOCOL_VERSION,
      &data.protocol_version,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_VENDOR_ID,
      &data.vendor_id,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_PARTICIPANT_GUID,
      &data.guid,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_EXPECTS_INLINE_QOS,
      &data.expects_inline_qos,
    )?;
    write_locators(
      &mut buffer,
      endianness,
      ParameterId::PID_METATRAFFIC_UNICAST_LOCATOR,
      &data.metatraffic_locators.unicast,
    )?;
    write_locators(
      &mut buffer,
      endianness,
      ParameterId::PID_METATRAFFIC_MULTICAST_LOCATOR,
      &data.metatraffic_locators.multicast,
    )?;
    write_locators(
      &mut buffer,
      endianness,
      ParameterId::PID_DEFAULT_UNICAST_LOCATOR,
      &data.default_locators.unicast,
    )?;
    write_locators(
      &mut buffer,
      endianness,
      ParameterId::PID_DEFAULT_MULTICAST_LOCATOR,
      &data.default_locators.multicast,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_PARTICIPANT_LEASE_DURATION,
      &data.lease_duration,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_BUILTIN_ENDPOINT_SET,
      &data.available_builtin_endpoints,
    )?;
    write_parameter(
      &mut buffer,
      endianness,
      ParameterId::PID_ANNOUNCEMENT_VERSION,
      &data.version,
    )?;
    if !data.participant_name.is_empty() {
      write_string_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_ENTITY_NAME,
        &data.participant_name,
      )?;
    }
    if !data.user_data.is_empty() {
      write_octet_seq_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_USER_DATA,
        &data.user_data,
      )?;
    }
    if let Some(persistence_guid) = &data.persistence_guid {
      write_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_PERSISTENCE_GUID,
        persistence_guid,
      )?;
    }
    // tokens are opaque, but their true length must survive the 4-byte
    // parameter padding, so they travel as length-prefixed octet sequences
    if let Some(token) = &data.identity_token {
      write_octet_seq_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_IDENTITY_TOKEN,
        token,
      )?;
    }
    if let Some(token) = &data.permissions_token {
      write_octet_seq_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_PERMISSIONS_TOKEN,
        token,
      )?;
    }
    if data.security_attributes != 0 || data.plugin_security_attributes != 0 {
      let mut body = data.security_attributes.write_to_vec_with_ctx(endianness)?;
      body.extend(
        data
          .plugin_security_attributes
          .write_to_vec_with_ctx(endianness)?,
      );
      write_raw_parameter(
        &mut buffer,
        endianness,
        ParameterId::PID_PARTICIPANT_SECURITY_INFO,
        &body,
      )?;
    }

    // sentinel terminates the list; length field is present but ignored
    buffer.extend(ParameterId::PID_SENTINEL.write_to_vec_with_ctx(endianness)?);
    buffer.extend(0u16.write_to_vec_with_ctx(endianness)?);
    Ok(buffer)
  }

  /// The full serialized payload: encapsulation header, options, list.
  pub fn serialize_payload(&self, endianness: Endianness) -> Result<Bytes> {
    let mut payload = Vec::with_capacity(256 + 4);
    payload.extend(
      RepresentationIdentifier::pl_cdr_for(endianness)
        .to_bytes()
        .iter(),
    );
    payload.extend([0u8, 0]); // representation options, sent as zero
    payload.extend(self.write_to_vec(endianness)?);
    Ok(Bytes::from(payload))
  }
}

fn write_raw_parameter(
  buffer: &mut Vec<u8>,
  endianness: Endianness,
  pid: ParameterId,
  body: &[u8],
) -> Result<()> {
  let padding = (4 - body.len() % 4) % 4;
  let padded_len = body.len() + padding;
  if padded_len > u16::MAX as usize {
    return Error::serialization("parameter body too long for a parameter list");
  }
  buffer.extend(pid.write_to_vec_with_ctx(endianness)?);
  buffer.extend((padded_len as u16).write_to_vec_with_ctx(endianness)?);
  buffer.extend_from_slice(body);
  buffer.extend(std::iter::repeat(0u8).take(padding));
  Ok(())
}

fn write_parameter<V: Writable<Endianness>>(
  buffer: &mut Vec<u8>,
  endianness: Endianness,
  pid: ParameterId,
  value: &V,
) -> Result<()> {
  let body = value.write_to_vec_with_ctx(endianness)?;
  write_raw_parameter(buffer, endianness, pid, &body)
}

fn write_locators(
  buffer: &mut Vec<u8>,
  endianness: Endianness,
  pid: ParameterId,
  locators: &[Locator],
) -> Result<()> {
  for locator in locators {
    write_parameter(buffer, endianness, pid, locator)?;
  }
  Ok(())
}

/// CDR string: u32 length including the terminating NUL, characters, NUL.
fn write_string_parameter(
  buffer: &mut Vec<u8>,
  endianness: Endianness,
  pid: ParameterId,
  value: &str,
) -> Result<()> {
  let mut body = ((value.len() + 1) as u32).write_to_vec_with_ctx(endianness)?;
  body.extend_from_slice(value.as_bytes());
  body.push(0);
  write_raw_parameter(buffer, endianness, pid, &body)
}

/// CDR octet sequence: u32 length, bytes.
fn write_octet_seq_parameter(
  buffer: &mut Vec<u8>,
  endianness: Endianness,
  pid: ParameterId,
  value: &[u8],
) -> Result<()> {
  let mut body = (value.len() as u32).write_to_vec_with_ctx(endianness)?;
  body.extend_from_slice(value);
  write_raw_parameter(buffer, endianness, pid, &body)
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::structure::guid::{EntityId, GuidPrefix, GUID};

  #[test]
  fn parameter_headers_stay_aligned() {
    let mut data = ParticipantProxyData::default();
    data.set_guid(GUID::new(GuidPrefix::new([7; 12]), EntityId::PARTICIPANT));
    data.participant_name = "abc".to_string(); // 3 + NUL forces padding

    let buffer = BuiltinDataSerializer::from_participant_data(&data)
      .write_to_vec(Endianness::LittleEndian)
      .unwrap();
    assert_eq!(buffer.len() % 4, 0);
  }

  #[test]
  fn payload_carries_encapsulation_identifier() {
    let mut data = ParticipantProxyData::default();
    data.set_guid(GUID::new(GuidPrefix::new([7; 12]), EntityId::PARTICIPANT));

    let le = BuiltinDataSerializer::from_participant_data(&data)
      .serialize_payload(Endianness::LittleEndian)
      .unwrap();
    assert_eq!(&le[..4], &[0x00, 0x03, 0x00, 0x00]);

    let be = BuiltinDataSerializer::from_participant_data(&data)
      .serialize_payload(Endianness::BigEndian)
      .unwrap();
    assert_eq!(&be[..4], &[0x00, 0x02, 0x00, 0x00]);
  }
}
