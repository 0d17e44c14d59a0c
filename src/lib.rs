//! RTPS Participant Discovery Protocol (PDP) core.
//!
//! This crate implements the subsystem through which an RTPS participant
//! announces its own presence, learns about remote participants and the
//! endpoints they expose, tracks per-remote liveliness through lease
//! durations, and evicts remotes that expire or depart.
//!
//! The crate is deliberately narrow: the reliable builtin writer and reader,
//! the Endpoint Discovery Protocol, the Writer Liveliness Protocol and the
//! application listener are *external collaborators*, consumed through the
//! traits in [`discovery::builtin`]. What lives here is the shared proxy
//! data model ([`discovery::proxy_pool`]), the per-participant store
//! ([`discovery::pdp`]), the announcement and lease timers, the
//! builtin-reader consumer ([`discovery::receiver`]) and the listener
//! dispatch queue.
//!
//! Threading model: plain parallel threads over shared state. Proxy data
//! objects carry their own locks, the store and the process-wide pool are
//! guarded by reentrant mutexes, and timers run on a per-participant timer
//! thread. See the lock ordering notes on [`discovery::pdp::Pdp`].

#[macro_use]
mod error;
#[macro_use]
pub mod serialization;

pub mod messages;
pub mod structure;

pub mod discovery;

#[cfg(test)]
pub(crate) mod test;

pub use error::{Error, Result};
pub use structure::{
  cache_change::{CacheChange, ChangeKind},
  duration::Duration,
  guid::{EntityId, GuidPrefix, GUID},
  instance_handle::InstanceHandle,
  locator::{Locator, RemoteLocatorList},
  sequence_number::SequenceNumber,
};

pub use discovery::{
  config::{AllocationAttributes, DiscoveryConfig, RtpsParticipantAttributes},
  data_types::{
    endpoint_proxy_data::{ReaderProxyData, WriterProxyData},
    participant_proxy_data::ParticipantProxyData,
  },
  discovery_info::{
    ParticipantDiscoveryInfo, ParticipantDiscoveryStatus, ReaderDiscoveryInfo,
    ReaderDiscoveryStatus, WriterDiscoveryInfo, WriterDiscoveryStatus,
  },
  pdp::Pdp,
  proxy_pool::ProxyPool,
  receiver::DiscoveryReceiver,
};
