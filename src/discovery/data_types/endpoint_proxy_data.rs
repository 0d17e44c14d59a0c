use serde::{Deserialize, Serialize};

use crate::structure::{guid::GUID, locator::RemoteLocatorList};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityKind {
  BestEffort,
  Reliable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityKind {
  Volatile,
  TransientLocal,
}

/// The QoS subset the PDP tracks per endpoint. The full policy set lives
/// with the EDP; discovery only needs what matching and listener snapshots
/// require.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointQos {
  pub reliability: ReliabilityKind,
  pub durability: DurabilityKind,
}

impl Default for EndpointQos {
  fn default() -> Self {
    EndpointQos {
      reliability: ReliabilityKind::BestEffort,
      durability: DurabilityKind::Volatile,
    }
  }
}

/// Advertised state of one remote reader. Shared across all local PDPs that
/// know the endpoint; mutable access goes through the pool cell's mutex.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderProxyData {
  pub guid: GUID,
  pub remote_locators: RemoteLocatorList,
  pub expects_inline_qos: bool,
  pub topic_name: String,
  pub type_name: String,
  pub qos: EndpointQos,
}

impl ReaderProxyData {
  pub fn with_locator_capacities(
    max_unicast_locators: usize,
    max_multicast_locators: usize,
  ) -> Self {
    ReaderProxyData {
      guid: GUID::UNKNOWN,
      remote_locators: RemoteLocatorList::with_capacities(
        max_unicast_locators,
        max_multicast_locators,
      ),
      expects_inline_qos: false,
      topic_name: String::new(),
      type_name: String::new(),
      qos: EndpointQos::default(),
    }
  }

  pub fn clear(&mut self) {
    self.guid = GUID::UNKNOWN;
    self.remote_locators.clear();
    self.expects_inline_qos = false;
    self.topic_name.clear();
    self.type_name.clear();
    self.qos = EndpointQos::default();
  }
}

/// Advertised state of one remote writer.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterProxyData {
  pub guid: GUID,
  pub remote_locators: RemoteLocatorList,
  pub topic_name: String,
  pub type_name: String,
  pub qos: EndpointQos,
  pub data_max_size_serialized: u32,
}

impl WriterProxyData {
  pub fn with_locator_capacities(
    max_unicast_locators: usize,
    max_multicast_locators: usize,
  ) -> Self {
    WriterProxyData {
      guid: GUID::UNKNOWN,
      remote_locators: RemoteLocatorList::with_capacities(
        max_unicast_locators,
        max_multicast_locators,
      ),
      topic_name: String::new(),
      type_name: String::new(),
      qos: EndpointQos::default(),
      data_max_size_serialized: 0,
    }
  }

  pub fn clear(&mut self) {
    self.guid = GUID::UNKNOWN;
    self.remote_locators.clear();
    self.topic_name.clear();
    self.type_name.clear();
    self.qos = EndpointQos::default();
    self.data_max_size_serialized = 0;
  }
}
