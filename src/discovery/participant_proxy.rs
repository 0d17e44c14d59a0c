use std::time::Instant;

use crate::{
  discovery::proxy_pool::{ParticipantDataHandle, ReaderDataHandle, WriterDataHandle},
  structure::{guid::GUID, instance_handle::InstanceHandle},
};

/// Per-PDP shell for one known participant.
///
/// The shell owns the strong references that keep the shared proxy data
/// objects alive for this PDP: one to the participant record and one per
/// known endpoint. It also owns the lease timer; the `timer::Guard` cancels
/// the scheduled check when dropped, so clearing the shell (or the whole
/// store) implicitly disarms it.
///
/// Shells are recycled through the store's free list, not through the
/// process-wide pool.
pub struct ParticipantProxy {
  guid: GUID,
  key: InstanceHandle,
  proxy_data: Option<ParticipantDataHandle>,
  pub(crate) readers: Vec<ReaderDataHandle>,
  pub(crate) writers: Vec<WriterDataHandle>,
  pub(crate) builtin_readers: Vec<ReaderDataHandle>,
  pub(crate) builtin_writers: Vec<WriterDataHandle>,
  lease_event: Option<timer::Guard>,
  pub(crate) should_check_lease_duration: bool,
  last_received_message_tm: Instant,
}

impl ParticipantProxy {
  pub(crate) fn new() -> Self {
    ParticipantProxy {
      guid: GUID::UNKNOWN,
      key: InstanceHandle::UNKNOWN,
      proxy_data: None,
      readers: Vec::new(),
      writers: Vec::new(),
      builtin_readers: Vec::new(),
      builtin_writers: Vec::new(),
      lease_event: None,
      should_check_lease_duration: false,
      last_received_message_tm: Instant::now(),
    }
  }

  pub fn guid(&self) -> GUID {
    self.guid
  }

  pub fn key(&self) -> InstanceHandle {
    self.key
  }

  pub(crate) fn proxy_data(&self) -> Option<&ParticipantDataHandle> {
    self.proxy_data.as_ref()
  }

  pub(crate) fn attach(
    &mut self,
    guid: GUID,
    proxy_data: ParticipantDataHandle,
    should_check_lease_duration: bool,
  ) {
    self.guid = guid;
    self.key = InstanceHandle::from(guid);
    self.proxy_data = Some(proxy_data);
    self.should_check_lease_duration = should_check_lease_duration;
    self.last_received_message_tm = Instant::now();
  }

  /// Replaces (or disarms, with None) the pending lease check.
  pub(crate) fn set_lease_event(&mut self, guard: Option<timer::Guard>) {
    self.lease_event = guard;
  }

  /// A message from this participant arrived: restart the lease clock.
  pub(crate) fn assert_liveliness(&mut self) {
    self.last_received_message_tm = Instant::now();
  }

  pub fn last_received_message_tm(&self) -> Instant {
    self.last_received_message_tm
  }

  /// Drops all strong proxy data references and cancels the lease timer,
  /// making the shell ready for the free list. Release hooks of the last
  /// holder run here, returning shared objects to the process-wide pool.
  pub(crate) fn clear(&mut self) {
    self.lease_event = None;
    self.guid = GUID::UNKNOWN;
    self.key = InstanceHandle::UNKNOWN;
    self.proxy_data = None;
    self.readers.clear();
    self.writers.clear();
    self.builtin_readers.clear();
    self.builtin_writers.clear();
    self.should_check_lease_duration = false;
  }
}
