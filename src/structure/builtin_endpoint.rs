use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};

/// Bitmask advertising which builtin endpoints a participant contains.
/// RTPS spec v2.3 Section 9.3.2, Table 9.4.
#[derive(
  Debug, Default, PartialEq, Eq, Copy, Clone, Readable, Writable, Serialize, Deserialize,
)]
pub struct BuiltinEndpointSet {
  value: u32,
}

impl BuiltinEndpointSet {
  pub const PARTICIPANT_ANNOUNCER: u32 = 0x0000_0001;
  pub const PARTICIPANT_DETECTOR: u32 = 0x0000_0002;
  pub const PUBLICATIONS_ANNOUNCER: u32 = 0x0000_0004;
  pub const PUBLICATIONS_DETECTOR: u32 = 0x0000_0008;
  pub const SUBSCRIPTIONS_ANNOUNCER: u32 = 0x0000_0010;
  pub const SUBSCRIPTIONS_DETECTOR: u32 = 0x0000_0020;

  pub const PARTICIPANT_MESSAGE_DATA_WRITER: u32 = 0x0000_0400;
  pub const PARTICIPANT_MESSAGE_DATA_READER: u32 = 0x0000_0800;

  pub const TOPICS_ANNOUNCER: u32 = 0x0800_0000;
  pub const TOPICS_DETECTOR: u32 = 0x1000_0000;

  pub fn from_u32(val: u32) -> Self {
    Self { value: val }
  }

  pub fn as_u32(&self) -> u32 {
    self.value
  }

  pub fn contains(&self, other: u32) -> bool {
    (self.value & other) == other
  }

  pub fn insert(&mut self, other: u32) {
    self.value |= other;
  }
}

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Readable, Writable)]
pub struct BuiltinEndpointQos {
  value: u32,
}

impl BuiltinEndpointQos {
  pub const BEST_EFFORT_PARTICIPANT_MESSAGE_DATA_READER: u32 = 0x0000_0001;

  pub fn is_best_effort(&self) -> bool {
    self.value == Self::BEST_EFFORT_PARTICIPANT_MESSAGE_DATA_READER
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_and_contains() {
    let mut set = BuiltinEndpointSet::default();
    set.insert(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER);
    set.insert(BuiltinEndpointSet::PARTICIPANT_DETECTOR);
    assert!(set.contains(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER));
    assert!(!set.contains(BuiltinEndpointSet::PARTICIPANT_MESSAGE_DATA_WRITER));
    assert_eq!(set.as_u32(), 0x03);
  }

  serialization_test!( type = BuiltinEndpointSet,
  {
      builtin_endpoint_set_participant,
      BuiltinEndpointSet::from_u32(
        BuiltinEndpointSet::PARTICIPANT_ANNOUNCER | BuiltinEndpointSet::PARTICIPANT_DETECTOR),
      le = [0x03, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x03]
  });
}
