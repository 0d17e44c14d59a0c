//! Contracts toward the collaborators the PDP core does not implement:
//! the reliable builtin writer/reader pair, the Endpoint Discovery
//! Protocol, the Writer Liveliness Protocol and the application listener.

use crate::{
  discovery::{
    data_types::participant_proxy_data::ParticipantProxyData,
    discovery_info::{ParticipantDiscoveryInfo, ReaderDiscoveryInfo, WriterDiscoveryInfo},
  },
  structure::{
    cache_change::{CacheChange, ChangeKind},
    guid::GUID,
    instance_handle::InstanceHandle,
  },
};

/// The builtin `DCPSParticipant` writer the announcer publishes through.
///
/// Reliability, HEARTBEAT/ACKNACK and history bookkeeping are the writer's
/// problem; the PDP only creates changes and pushes them into the history.
pub trait BuiltinWriter: Send + Sync {
  /// Allocates a change of the writer, sized by `size_hint`, keyed by the
  /// participant instance handle. None when the writer is out of resources.
  fn new_change(
    &self,
    size_hint: &dyn Fn() -> u32,
    kind: ChangeKind,
    key: InstanceHandle,
  ) -> Option<CacheChange>;

  /// Submits a prepared change to the writer history.
  fn add_change(&self, change: CacheChange) -> bool;

  /// Drops the oldest change in the history. Returns false when empty.
  fn remove_min_change(&self) -> bool;

  fn history_size(&self) -> usize;
}

/// Access to the builtin `DCPSParticipant` reader's history, used to purge
/// stale announcements of a removed participant.
pub trait BuiltinReaderHistory: Send + Sync {
  /// Removes every cached change whose instance matches `key`.
  fn remove_instance(&self, key: InstanceHandle);
}

/// The Endpoint Discovery Protocol, driven by the PDP on participant and
/// endpoint lifecycle transitions.
pub trait EndpointDiscovery: Send + Sync {
  /// A remote participant became known; the EDP should match its builtin
  /// endpoints against ours.
  fn assign_remote_endpoints(&self, participant: &ParticipantProxyData);

  /// All endpoint bookkeeping keyed by this participant must go.
  fn remove_remote_endpoints(&self, participant: &ParticipantProxyData);

  fn unpair_reader_proxy(&self, participant_guid: GUID, reader_guid: GUID);

  fn unpair_writer_proxy(&self, participant_guid: GUID, writer_guid: GUID);
}

/// Optional Writer Liveliness Protocol hook.
pub trait WriterLiveliness: Send + Sync {
  fn remove_remote_endpoints(&self, participant: &ParticipantProxyData);
}

/// Application-facing discovery callbacks. Invoked only from the listener
/// dispatch thread, one at a time, with snapshot values: a callback may
/// block or panic without corrupting discovery state, and must not expect
/// to observe live proxy objects.
pub trait DiscoveryListener: Send + Sync {
  fn on_participant_discovery(&self, info: ParticipantDiscoveryInfo);
  fn on_reader_discovery(&self, info: ReaderDiscoveryInfo);
  fn on_writer_discovery(&self, info: WriterDiscoveryInfo);
}
