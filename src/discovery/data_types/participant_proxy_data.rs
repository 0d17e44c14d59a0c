use std::time::Duration as StdDuration;

use bytes::Bytes;

use crate::{
  messages::{protocol_version::ProtocolVersion, vendor_id::VendorId},
  structure::{
    builtin_endpoint::BuiltinEndpointSet,
    duration::Duration,
    guid::GUID,
    instance_handle::InstanceHandle,
    locator::RemoteLocatorList,
    sequence_number::SequenceNumber,
  },
};

/// Used when an announcement does not carry a lease duration parameter.
pub const DEFAULT_LEASE_DURATION: Duration = Duration {
  seconds: 100,
  fraction: 0,
};

/// Authoritative, shareable record of one participant's advertised state.
///
/// One instance exists per known participant GUID prefix, shared by every
/// local PDP that has discovered it (see `ProxyPool`). Mutable access goes
/// through the pool cell's own mutex; the GUID is immutable from first
/// assignment until the object is cleared and recycled.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantProxyData {
  pub guid: GUID,
  /// 16-byte instance key derived from the GUID.
  pub key: InstanceHandle,
  pub protocol_version: ProtocolVersion,
  pub vendor_id: VendorId,
  pub expects_inline_qos: bool,
  pub available_builtin_endpoints: BuiltinEndpointSet,
  pub metatraffic_locators: RemoteLocatorList,
  pub default_locators: RemoteLocatorList,
  pub participant_name: String,
  /// Opaque application payload, propagated as-is.
  pub user_data: Bytes,
  pub lease_duration: Duration,
  /// Monotonic announcement version. Bumped whenever the local participant's
  /// advertised attributes change.
  pub version: SequenceNumber,
  /// Durability prefix of a persistent participant, if it announced one.
  pub persistence_guid: Option<GUID>,
  // Security material passes through opaquely.
  pub identity_token: Option<Bytes>,
  pub permissions_token: Option<Bytes>,
  pub security_attributes: u32,
  pub plugin_security_attributes: u32,
}

impl ParticipantProxyData {
  pub fn with_locator_capacities(
    max_unicast_locators: usize,
    max_multicast_locators: usize,
  ) -> Self {
    ParticipantProxyData {
      guid: GUID::UNKNOWN,
      key: InstanceHandle::UNKNOWN,
      protocol_version: ProtocolVersion::PROTOCOLVERSION,
      vendor_id: VendorId::VENDOR_UNKNOWN,
      expects_inline_qos: false,
      available_builtin_endpoints: BuiltinEndpointSet::default(),
      metatraffic_locators: RemoteLocatorList::with_capacities(
        max_unicast_locators,
        max_multicast_locators,
      ),
      default_locators: RemoteLocatorList::with_capacities(
        max_unicast_locators,
        max_multicast_locators,
      ),
      participant_name: String::new(),
      user_data: Bytes::new(),
      lease_duration: DEFAULT_LEASE_DURATION,
      version: SequenceNumber::default(),
      persistence_guid: None,
      identity_token: None,
      permissions_token: None,
      security_attributes: 0,
      plugin_security_attributes: 0,
    }
  }

  /// Sets the GUID and the derived instance key together.
  pub fn set_guid(&mut self, guid: GUID) {
    self.guid = guid;
    self.key = InstanceHandle::from(guid);
  }

  /// Wipes advertised state, keeping the configured locator capacities so
  /// the object can be recycled through the pool.
  pub fn clear(&mut self) {
    self.guid = GUID::UNKNOWN;
    self.key = InstanceHandle::UNKNOWN;
    self.protocol_version = ProtocolVersion::PROTOCOLVERSION;
    self.vendor_id = VendorId::VENDOR_UNKNOWN;
    self.expects_inline_qos = false;
    self.available_builtin_endpoints = BuiltinEndpointSet::default();
    self.metatraffic_locators.clear();
    self.default_locators.clear();
    self.participant_name.clear();
    self.user_data = Bytes::new();
    self.lease_duration = DEFAULT_LEASE_DURATION;
    self.version = SequenceNumber::default();
    self.persistence_guid = None;
    self.identity_token = None;
    self.permissions_token = None;
    self.security_attributes = 0;
    self.plugin_security_attributes = 0;
  }

  /// An announcement from a known participant must keep speaking the same
  /// protocol major version with the same vendor id.
  pub fn is_compatible_with(&self, incoming: &ParticipantProxyData) -> bool {
    self.protocol_version.major == incoming.protocol_version.major
      && self.vendor_id == incoming.vendor_id
  }

  /// Merges a fresh announcement into this record. Returns true when an
  /// attribute observable by the application changed.
  ///
  /// The comparison runs against the state actually stored (after
  /// locator-capacity clipping), so an announcement that keeps exceeding
  /// a capacity does not read as a fresh change every time.
  pub fn update_from(&mut self, incoming: &ParticipantProxyData) -> bool {
    let before = self.clone();

    self.protocol_version = incoming.protocol_version;
    self.vendor_id = incoming.vendor_id;
    self.expects_inline_qos = incoming.expects_inline_qos;
    self.available_builtin_endpoints = incoming.available_builtin_endpoints;
    self.metatraffic_locators.assign(&incoming.metatraffic_locators);
    self.default_locators.assign(&incoming.default_locators);
    self.participant_name = incoming.participant_name.clone();
    self.user_data = incoming.user_data.clone();
    self.lease_duration = incoming.lease_duration;
    self.version = incoming.version;
    self.persistence_guid = incoming.persistence_guid;
    self.identity_token = incoming.identity_token.clone();
    self.permissions_token = incoming.permissions_token.clone();
    self.security_attributes = incoming.security_attributes;
    self.plugin_security_attributes = incoming.plugin_security_attributes;

    before.expects_inline_qos != self.expects_inline_qos
      || before.available_builtin_endpoints != self.available_builtin_endpoints
      || before.metatraffic_locators != self.metatraffic_locators
      || before.default_locators != self.default_locators
      || before.participant_name != self.participant_name
      || before.user_data != self.user_data
      || before.lease_duration != self.lease_duration
  }

  pub fn lease_duration_std(&self) -> StdDuration {
    self.lease_duration.to_std()
  }
}

impl Default for ParticipantProxyData {
  fn default() -> Self {
    ParticipantProxyData::with_locator_capacities(usize::MAX, usize::MAX)
  }
}
