use bytes::Bytes;

use crate::structure::{
  guid::GUID, instance_handle::InstanceHandle, sequence_number::SequenceNumber,
};

/// Lifecycle statement a change makes about its instance.
#[derive(Debug, PartialOrd, PartialEq, Ord, Eq, Copy, Clone)]
pub enum ChangeKind {
  Alive,
  NotAliveDisposedUnregistered,
}

/// One sample in the history of a writer or reader. For the discovery
/// builtin endpoints, one announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheChange {
  pub kind: ChangeKind,
  pub writer_guid: GUID,
  pub sequence_number: SequenceNumber,
  pub instance_handle: InstanceHandle,
  pub data_value: Option<Bytes>,
}

impl CacheChange {
  pub fn new(
    kind: ChangeKind,
    writer_guid: GUID,
    sequence_number: SequenceNumber,
    instance_handle: InstanceHandle,
    data_value: Option<Bytes>,
  ) -> CacheChange {
    CacheChange {
      kind,
      writer_guid,
      sequence_number,
      instance_handle,
      data_value,
    }
  }
}

impl Default for CacheChange {
  fn default() -> Self {
    CacheChange::new(
      ChangeKind::Alive,
      GUID::default(),
      SequenceNumber::default(),
      InstanceHandle::default(),
      None,
    )
  }
}
