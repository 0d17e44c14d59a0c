use std::{
  sync::atomic::{AtomicI64, Ordering},
  time::{Duration as StdDuration, Instant},
};

use parking_lot::Mutex;

use crate::{
  discovery::{
    builtin::{
      BuiltinReaderHistory, BuiltinWriter, DiscoveryListener, EndpointDiscovery, WriterLiveliness,
    },
    data_types::participant_proxy_data::ParticipantProxyData,
    discovery_info::{
      ParticipantDiscoveryInfo, ParticipantDiscoveryStatus, ReaderDiscoveryInfo,
      ReaderDiscoveryStatus, WriterDiscoveryInfo, WriterDiscoveryStatus,
    },
  },
  structure::{
    cache_change::{CacheChange, ChangeKind},
    guid::GUID,
    instance_handle::InstanceHandle,
    sequence_number::SequenceNumber,
  },
};

/// Compressed record of one listener callback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
  Participant(ParticipantDiscoveryStatus, GUID),
  Reader(ReaderDiscoveryStatus, GUID),
  Writer(WriterDiscoveryStatus, GUID),
}

/// Records every delivered discovery event, in delivery order.
pub struct RecordingListener {
  events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
  pub fn new() -> Self {
    RecordingListener {
      events: Mutex::new(Vec::new()),
    }
  }

  pub fn events(&self) -> Vec<ListenerEvent> {
    self.events.lock().clone()
  }

  /// Polls until the predicate holds for the delivered events, or the
  /// timeout passes. Dispatch is asynchronous, so tests wait instead of
  /// asserting immediately.
  pub fn wait_for(
    &self,
    timeout: StdDuration,
    predicate: impl Fn(&[ListenerEvent]) -> bool,
  ) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
      if predicate(&self.events.lock()) {
        return true;
      }
      if Instant::now() > deadline {
        return false;
      }
      std::thread::sleep(StdDuration::from_millis(5));
    }
  }
}

impl DiscoveryListener for RecordingListener {
  fn on_participant_discovery(&self, info: ParticipantDiscoveryInfo) {
    self
      .events
      .lock()
      .push(ListenerEvent::Participant(info.status, info.data.guid));
  }

  fn on_reader_discovery(&self, info: ReaderDiscoveryInfo) {
    self
      .events
      .lock()
      .push(ListenerEvent::Reader(info.status, info.data.guid));
  }

  fn on_writer_discovery(&self, info: WriterDiscoveryInfo) {
    self
      .events
      .lock()
      .push(ListenerEvent::Writer(info.status, info.data.guid));
  }
}

/// In-memory builtin writer: a one-deep "history" plus a permanent log of
/// every submitted change with its submission instant.
pub struct MemoryWriter {
  history: Mutex<Vec<CacheChange>>,
  log: Mutex<Vec<(Instant, CacheChange)>>,
  next_sequence: AtomicI64,
}

impl MemoryWriter {
  pub fn new() -> Self {
    MemoryWriter {
      history: Mutex::new(Vec::new()),
      log: Mutex::new(Vec::new()),
      next_sequence: AtomicI64::new(1),
    }
  }

  pub fn changes(&self) -> Vec<(Instant, CacheChange)> {
    self.log.lock().clone()
  }

  pub fn wait_for_changes(&self, count: usize, timeout: StdDuration) -> bool {
    let deadline = Instant::now() + timeout;
    while self.log.lock().len() < count {
      if Instant::now() > deadline {
        return false;
      }
      std::thread::sleep(StdDuration::from_millis(5));
    }
    true
  }
}

impl BuiltinWriter for MemoryWriter {
  fn new_change(
    &self,
    _size_hint: &dyn Fn() -> u32,
    kind: ChangeKind,
    key: InstanceHandle,
  ) -> Option<CacheChange> {
    let sequence_number =
      SequenceNumber::from(self.next_sequence.fetch_add(1, Ordering::SeqCst));
    Some(CacheChange::new(
      kind,
      GUID::UNKNOWN,
      sequence_number,
      key,
      None,
    ))
  }

  fn add_change(&self, change: CacheChange) -> bool {
    self.history.lock().push(change.clone());
    self.log.lock().push((Instant::now(), change));
    true
  }

  fn remove_min_change(&self) -> bool {
    let mut history = self.history.lock();
    if history.is_empty() {
      false
    } else {
      history.remove(0);
      true
    }
  }

  fn history_size(&self) -> usize {
    self.history.lock().len()
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdpCall {
  AssignRemote(GUID),
  RemoveRemote(GUID),
  UnpairReader(GUID, GUID),
  UnpairWriter(GUID, GUID),
}

/// Records the EDP driving calls.
pub struct RecordingEdp {
  calls: Mutex<Vec<EdpCall>>,
}

impl RecordingEdp {
  pub fn new() -> Self {
    RecordingEdp {
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> Vec<EdpCall> {
    self.calls.lock().clone()
  }

  pub fn assigned_remotes(&self) -> Vec<GUID> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EdpCall::AssignRemote(guid) => Some(guid),
        _ => None,
      })
      .collect()
  }

  pub fn unpaired_readers(&self) -> Vec<GUID> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EdpCall::UnpairReader(_, reader) => Some(reader),
        _ => None,
      })
      .collect()
  }

  pub fn unpaired_writers(&self) -> Vec<GUID> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EdpCall::UnpairWriter(_, writer) => Some(writer),
        _ => None,
      })
      .collect()
  }

  pub fn removed_remotes(&self) -> Vec<GUID> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        EdpCall::RemoveRemote(guid) => Some(guid),
        _ => None,
      })
      .collect()
  }
}

impl EndpointDiscovery for RecordingEdp {
  fn assign_remote_endpoints(&self, participant: &ParticipantProxyData) {
    self
      .calls
      .lock()
      .push(EdpCall::AssignRemote(participant.guid));
  }

  fn remove_remote_endpoints(&self, participant: &ParticipantProxyData) {
    self
      .calls
      .lock()
      .push(EdpCall::RemoveRemote(participant.guid));
  }

  fn unpair_reader_proxy(&self, participant_guid: GUID, reader_guid: GUID) {
    self
      .calls
      .lock()
      .push(EdpCall::UnpairReader(participant_guid, reader_guid));
  }

  fn unpair_writer_proxy(&self, participant_guid: GUID, writer_guid: GUID) {
    self
      .calls
      .lock()
      .push(EdpCall::UnpairWriter(participant_guid, writer_guid));
  }
}

pub struct RecordingWlp {
  removed: Mutex<Vec<GUID>>,
}

impl RecordingWlp {
  pub fn new() -> Self {
    RecordingWlp {
      removed: Mutex::new(Vec::new()),
    }
  }

  pub fn removed_remotes(&self) -> Vec<GUID> {
    self.removed.lock().clone()
  }
}

impl WriterLiveliness for RecordingWlp {
  fn remove_remote_endpoints(&self, participant: &ParticipantProxyData) {
    self.removed.lock().push(participant.guid);
  }
}

pub struct RecordingReaderHistory {
  removed: Mutex<Vec<InstanceHandle>>,
}

impl RecordingReaderHistory {
  pub fn new() -> Self {
    RecordingReaderHistory {
      removed: Mutex::new(Vec::new()),
    }
  }

  pub fn removed_instances(&self) -> Vec<InstanceHandle> {
    self.removed.lock().clone()
  }
}

impl BuiltinReaderHistory for RecordingReaderHistory {
  fn remove_instance(&self, key: InstanceHandle) {
    self.removed.lock().push(key);
  }
}
