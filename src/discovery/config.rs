use serde::{Deserialize, Serialize};

use crate::structure::{duration::Duration, guid::GuidPrefix, locator::Locator};

/// Bounds for one kind of pooled object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimit {
  /// Entries pre-allocated at startup.
  pub initial: usize,
  /// Hard cap. Allocation beyond this fails and is reported.
  pub maximum: usize,
}

impl ResourceLimit {
  pub fn new(initial: usize, maximum: usize) -> Self {
    ResourceLimit { initial, maximum }
  }
}

impl Default for ResourceLimit {
  fn default() -> Self {
    ResourceLimit {
      initial: 1,
      maximum: usize::MAX,
    }
  }
}

/// How much proxy storage a participant reserves and may grow to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationAttributes {
  pub participants: ResourceLimit,
  pub readers: ResourceLimit,
  pub writers: ResourceLimit,
  pub locators: LocatorLimits,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorLimits {
  pub max_unicast_locators: usize,
  pub max_multicast_locators: usize,
}

impl Default for LocatorLimits {
  fn default() -> Self {
    LocatorLimits {
      max_unicast_locators: 4,
      max_multicast_locators: 1,
    }
  }
}

/// Cadence knobs of participant discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
  /// How long remotes keep believing in us without hearing from us.
  pub lease_duration: Duration,
  /// Steady-state period of our own announcements.
  pub announcement_period: Duration,
  pub initial_announcements: InitialAnnouncementConfig,
  /// Skip advertising multicast metatraffic locators when unicast ones
  /// exist.
  pub avoid_builtin_multicast: bool,
  /// Advertise the participant message (writer liveliness) builtin pair.
  pub use_writer_liveliness_protocol: bool,
}

impl Default for DiscoveryConfig {
  fn default() -> Self {
    DiscoveryConfig {
      lease_duration: Duration {
        seconds: 100,
        fraction: 0,
      },
      announcement_period: Duration {
        seconds: 3,
        fraction: 0,
      },
      initial_announcements: InitialAnnouncementConfig::default(),
      avoid_builtin_multicast: false,
      use_writer_liveliness_protocol: false,
    }
  }
}

/// An eager burst of extra announcements right after startup, so peers do
/// not have to wait a full steady-state period to learn about us.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialAnnouncementConfig {
  pub count: u32,
  pub period: Duration,
}

impl Default for InitialAnnouncementConfig {
  fn default() -> Self {
    InitialAnnouncementConfig {
      count: 5,
      period: Duration::from_millis(100),
    }
  }
}

/// Everything the PDP needs to know about the local participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RtpsParticipantAttributes {
  pub name: String,
  pub user_data: Vec<u8>,
  /// Prefix announced for durability purposes, if this participant is
  /// backed by persistent storage.
  pub persistence_prefix: Option<GuidPrefix>,
  pub metatraffic_unicast_locators: Vec<Locator>,
  pub metatraffic_multicast_locators: Vec<Locator>,
  pub default_unicast_locators: Vec<Locator>,
  pub default_multicast_locators: Vec<Locator>,
  pub allocation: AllocationAttributes,
  pub discovery: DiscoveryConfig,
}
