//! Snapshot values delivered to the application listener.
//!
//! These are move-only: each event is built once, carries owned copies of
//! the relevant proxy data, and is consumed by the listener. No references
//! back into the discovery state escape this way.

use crate::{
  discovery::data_types::{
    endpoint_proxy_data::{ReaderProxyData, WriterProxyData},
    participant_proxy_data::ParticipantProxyData,
  },
  structure::guid::GUID,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParticipantDiscoveryStatus {
  /// First sighting of the participant.
  DiscoveredParticipant,
  /// A later announcement changed an observable attribute.
  ChangedQosParticipant,
  /// The participant disposed itself.
  RemovedParticipant,
  /// The participant's lease expired.
  DroppedParticipant,
  /// The announcement was refused (protocol violation); state unchanged.
  IgnoredParticipant,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReaderDiscoveryStatus {
  DiscoveredReader,
  ChangedQosReader,
  RemovedReader,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriterDiscoveryStatus {
  DiscoveredWriter,
  ChangedQosWriter,
  RemovedWriter,
}

#[derive(Debug)]
pub struct ParticipantDiscoveryInfo {
  pub status: ParticipantDiscoveryStatus,
  pub data: ParticipantProxyData,
}

#[derive(Debug)]
pub struct ReaderDiscoveryInfo {
  pub status: ReaderDiscoveryStatus,
  pub data: ReaderProxyData,
  /// The participant owning the reader.
  pub participant_guid: GUID,
}

#[derive(Debug)]
pub struct WriterDiscoveryInfo {
  pub status: WriterDiscoveryStatus,
  pub data: WriterProxyData,
  pub participant_guid: GUID,
}
