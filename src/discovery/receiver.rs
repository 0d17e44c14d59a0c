//! Consumes cache changes delivered by the builtin `DCPSParticipant`
//! reader and routes them into the store.

use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{
  discovery::{discovery_info::ParticipantDiscoveryStatus, pdp::Pdp},
  serialization::builtin_data_deserializer::participant_data_from_payload,
  structure::{
    cache_change::{CacheChange, ChangeKind},
    guid::GUID,
  },
};

/// The sole consumer of the builtin participant reader.
pub struct DiscoveryReceiver {
  pdp: Arc<Pdp>,
}

impl DiscoveryReceiver {
  pub fn new(pdp: Arc<Pdp>) -> DiscoveryReceiver {
    DiscoveryReceiver { pdp }
  }

  /// Reader callback: one inbound announcement or dispose.
  pub fn on_cache_change(&self, change: &CacheChange) {
    trace!(
      "discovery change {:?} from {:?}",
      change.kind,
      change.writer_guid
    );

    // whoever sent this is alive, whatever the change says
    self
      .pdp
      .assert_remote_participant_liveliness(change.writer_guid.prefix);

    match change.kind {
      ChangeKind::Alive => {
        let payload = match &change.data_value {
          Some(payload) => payload,
          None => {
            warn!("ALIVE discovery change without payload, dropping");
            return;
          }
        };
        match participant_data_from_payload(payload) {
          Ok(data) => self.pdp.add_or_update_participant(data),
          Err(e) => {
            warn!("Malformed participant announcement dropped: {e:?}");
          }
        }
      }
      ChangeKind::NotAliveDisposedUnregistered => {
        let participant_guid = GUID::from(change.instance_handle);
        self
          .pdp
          .remove_remote_participant(participant_guid, ParticipantDiscoveryStatus::RemovedParticipant);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration as StdDuration;

  use bytes::Bytes;

  use super::*;
  use crate::{
    discovery::discovery_info::{ParticipantDiscoveryStatus, ReaderDiscoveryStatus},
    messages::vendor_id::VendorId,
    test::{
      stubs::ListenerEvent,
      test_data::{
        alive_change_for, dispose_change_for, pdp_fixture, remote_participant_data,
        FixtureConfig,
      },
    },
  };

  #[test]
  fn alive_for_unknown_guid_discovers_participant() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let receiver = DiscoveryReceiver::new(pdp.clone());

    let remote = remote_participant_data(0x42, 30_000);
    receiver.on_cache_change(&alive_change_for(&remote));

    assert!(pdp.has_remote_participant(remote.guid));
    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::DiscoveredParticipant, guid) if *guid == remote.guid)
      })
    }));
    // the EDP was told to match builtin endpoints
    assert!(fixture.edp.assigned_remotes().contains(&remote.guid));
  }

  #[test]
  fn changed_user_data_emits_exactly_one_qos_event() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let receiver = DiscoveryReceiver::new(pdp.clone());

    let mut remote = remote_participant_data(0x42, 30_000);
    receiver.on_cache_change(&alive_change_for(&remote));
    // identical re-announcement: no QoS event
    receiver.on_cache_change(&alive_change_for(&remote));
    remote.user_data = Bytes::from_static(b"fresh");
    receiver.on_cache_change(&alive_change_for(&remote));

    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::ChangedQosParticipant, guid) if *guid == remote.guid)
      })
    }));
    let events = fixture.listener.events();
    let discovered = events
      .iter()
      .filter(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::DiscoveredParticipant, _))
      })
      .count();
    let changed = events
      .iter()
      .filter(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::ChangedQosParticipant, _))
      })
      .count();
    assert_eq!(discovered, 1);
    assert_eq!(changed, 1);
  }

  #[test]
  fn incompatible_participant_is_ignored_without_mutation() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let receiver = DiscoveryReceiver::new(pdp.clone());

    let remote = remote_participant_data(0x42, 30_000);
    receiver.on_cache_change(&alive_change_for(&remote));

    let mut hostile = remote.clone();
    hostile.vendor_id = VendorId { vendor_id: [9, 9] };
    hostile.participant_name = "impostor".to_string();
    receiver.on_cache_change(&alive_change_for(&hostile));

    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::IgnoredParticipant, _))
      })
    }));
    // state was not touched
    let data = pdp.local_proxy_data(remote.guid.prefix).unwrap();
    assert_eq!(data.lock().participant_name, remote.participant_name);
  }

  #[test]
  fn dispose_removes_participant_after_its_endpoints() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let receiver = DiscoveryReceiver::new(pdp.clone());

    let remote = remote_participant_data(0x42, 30_000);
    receiver.on_cache_change(&alive_change_for(&remote));

    let reader_guid = GUID::new(
      remote.guid.prefix,
      crate::structure::guid::EntityId {
        entity_key: [0, 0, 1],
        entity_kind: 0x07,
      },
    );
    let added = pdp.add_reader_proxy_data(reader_guid, |reader, _updating, _participant| {
      reader.topic_name = "Square".to_string();
      reader.type_name = "ShapeType".to_string();
      true
    });
    assert!(added.is_some());
    drop(added);

    receiver.on_cache_change(&dispose_change_for(remote.guid));
    assert!(!pdp.has_remote_participant(remote.guid));

    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::RemovedParticipant, guid) if *guid == remote.guid)
      })
    }));
    let events = fixture.listener.events();
    let reader_removed = events.iter().position(|e| {
      matches!(e, ListenerEvent::Reader(ReaderDiscoveryStatus::RemovedReader, guid) if *guid == reader_guid)
    });
    let participant_removed = events.iter().position(|e| {
      matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::RemovedParticipant, guid) if *guid == remote.guid)
    });
    // endpoint teardown is reported before the participant goes away
    assert!(reader_removed.unwrap() < participant_removed.unwrap());
    // the stale announcement was purged from the reader history
    assert!(fixture
      .reader_history
      .removed_instances()
      .contains(&crate::structure::instance_handle::InstanceHandle::from(remote.guid)));
  }

  #[test]
  fn malformed_payload_is_dropped() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let receiver = DiscoveryReceiver::new(pdp.clone());

    let remote = remote_participant_data(0x42, 30_000);
    let mut change = alive_change_for(&remote);
    let payload = change.data_value.take().unwrap();
    change.data_value = Some(payload.slice(..payload.len() - 5));
    receiver.on_cache_change(&change);

    assert!(!pdp.has_remote_participant(remote.guid));
    std::thread::sleep(StdDuration::from_millis(50));
    assert!(fixture.listener.events().is_empty());
  }
}
