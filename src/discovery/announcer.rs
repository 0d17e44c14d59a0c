//! Periodic self-announcement of the local participant.
//!
//! Two phases: a configured burst of initial announcements at a short
//! period right after startup, then steady-state ticks at the announcement
//! period. Each tick publishes the local participant data through the
//! builtin writer, keyed by the participant instance handle, with the
//! history trimmed to the latest announcement.

use std::sync::{atomic::Ordering, Arc};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use speedy::Endianness;

use crate::{
  discovery::pdp::{Pdp, DISCOVERY_PARTICIPANT_DATA_MAX_SIZE},
  serialization::builtin_data_serializer::BuiltinDataSerializer,
  structure::{cache_change::ChangeKind, duration::Duration},
};

impl Pdp {
  /// Publishes the first announcement immediately and schedules the rest.
  pub fn start_announcements(self: &Arc<Self>) {
    {
      let locked = self.inner.lock();
      let mut inner = locked.borrow_mut();
      if inner.initial_announcements_left > 0 && !inner.initial_announcement_period.is_positive() {
        warn!("Initial announcement period is not strictly positive. Changing to 1ms.");
        inner.initial_announcement_period = Duration::from_millis(1);
      }
    }
    self.announce_participant_state(true, false);
    self.set_next_announcement_interval();
  }

  /// Cancels only the periodic timer. The store stays fully queryable and
  /// inbound discovery keeps running.
  pub fn stop_announcements(&self) {
    *self.announcement_event.lock() = None;
  }

  /// Restarts the announcement cadence, publishing once right away.
  pub fn reset_announcements(self: &Arc<Self>) {
    self.stop_announcements();
    self.announce_participant_state(true, false);
    self.set_next_announcement_interval();
  }

  /// Announces departure. Called on shutdown.
  pub fn stop(self: &Arc<Self>) {
    self.stop_announcements();
    self.announce_participant_state(false, true);
  }

  /// One announcement. `new_change` forces an ALIVE publication even when
  /// nothing changed locally; `dispose` publishes the departure change
  /// instead.
  pub fn announce_participant_state(&self, new_change: bool, dispose: bool) {
    trace!("Announcing participant state (new change: {new_change})");

    if !dispose {
      if !(self.has_changed_local.swap(false, Ordering::SeqCst) || new_change) {
        // unchanged and not forced: peers already hold this announcement
        return;
      }
      self.publish_local_participant(ChangeKind::Alive);
    } else {
      self.publish_local_participant(ChangeKind::NotAliveDisposedUnregistered);
    }
  }

  fn publish_local_participant(&self, kind: ChangeKind) {
    // snapshot under the store and data locks, serialize outside them
    let (key, proxy_data_copy) = match self.local_participant_snapshot() {
      Some(snapshot) => snapshot,
      None => {
        error!("local participant data is missing, cannot announce");
        return;
      }
    };

    // keep only the freshest announcement in the writer history
    if self.writer().history_size() > 0 {
      self.writer().remove_min_change();
    }

    let mut change = match self
      .writer()
      .new_change(&|| DISCOVERY_PARTICIPANT_DATA_MAX_SIZE, kind, key)
    {
      Some(change) => change,
      None => {
        warn!("builtin writer refused a new discovery change");
        return;
      }
    };

    let endianness = if cfg!(target_endian = "big") {
      Endianness::BigEndian
    } else {
      Endianness::LittleEndian
    };
    match BuiltinDataSerializer::from_participant_data(&proxy_data_copy).serialize_payload(endianness)
    {
      Ok(payload) => {
        change.data_value = Some(payload);
        self.writer().add_change(change);
      }
      Err(e) => {
        // drop the prepared change, the next tick retries
        error!("Cannot serialize participant proxy data: {e:?}");
      }
    }
  }

  /// Picks the delay to the next tick (burst period while the initial
  /// countdown lasts, announcement period afterwards) and schedules it.
  pub(crate) fn set_next_announcement_interval(self: &Arc<Self>) {
    let delay = {
      let locked = self.inner.lock();
      let mut inner = locked.borrow_mut();
      if inner.initial_announcements_left > 0 {
        inner.initial_announcements_left -= 1;
      }
      if inner.initial_announcements_left > 0 {
        inner.initial_announcement_period
      } else {
        self.attributes().discovery.announcement_period
      }
    };

    let weak = Arc::downgrade(self);
    let guard = self.timer_service.lock().schedule_with_delay(
      chrono::Duration::milliseconds(delay.to_std().as_millis().min(i64::MAX as u128) as i64),
      move || {
        if let Some(pdp) = weak.upgrade() {
          // the periodic refresh is what keeps remote leases alive, so it
          // publishes regardless of the changed-locally flag
          pdp.announce_participant_state(true, false);
          pdp.set_next_announcement_interval();
        }
      },
    );
    *self.announcement_event.lock() = Some(guard);
  }
}
