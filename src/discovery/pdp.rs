use std::{
  cell::RefCell,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::{Duration as StdDuration, Instant},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use parking_lot::{Mutex, ReentrantMutex};
use speedy::Endianness;

use crate::{
  discovery::{
    builtin::{BuiltinReaderHistory, BuiltinWriter, DiscoveryListener, EndpointDiscovery, WriterLiveliness},
    config::RtpsParticipantAttributes,
    data_types::{
      endpoint_proxy_data::{ReaderProxyData, WriterProxyData},
      participant_proxy_data::ParticipantProxyData,
    },
    discovery_info::{
      ParticipantDiscoveryInfo, ParticipantDiscoveryStatus, ReaderDiscoveryInfo,
      ReaderDiscoveryStatus, WriterDiscoveryInfo, WriterDiscoveryStatus,
    },
    listener_dispatcher::{DiscoveryEvent, ListenerDispatcher},
    participant_proxy::ParticipantProxy,
    proxy_pool::{
      ParticipantDataHandle, ProxyDataGuard, ProxyPool, ReaderDataHandle, WriterDataHandle,
    },
  },
  error::{Error, Result},
  messages::vendor_id::VendorId,
  serialization::builtin_data_serializer::BuiltinDataSerializer,
  structure::{
    builtin_endpoint::BuiltinEndpointSet,
    duration::Duration,
    guid::{GuidPrefix, GUID},
    instance_handle::InstanceHandle,
  },
};

/// Size hint handed to the builtin writer for one announcement.
pub const DISCOVERY_PARTICIPANT_DATA_MAX_SIZE: u32 = 5000;

/// External collaborators handed to [`Pdp::new`].
pub struct PdpResources {
  /// Process-wide proxy pool, shared between all PDPs of the process.
  pub pool: Arc<ProxyPool>,
  pub writer: Arc<dyn BuiltinWriter>,
  pub reader_history: Arc<dyn BuiltinReaderHistory>,
  pub edp: Arc<dyn EndpointDiscovery>,
  pub wlp: Option<Arc<dyn WriterLiveliness>>,
  pub listener: Arc<dyn DiscoveryListener>,
}

pub(crate) struct PdpInner {
  /// Known participants. The local participant is always element 0.
  participant_proxies: Vec<ParticipantProxy>,
  /// Cleared shells ready for reuse.
  proxies_free: Vec<ParticipantProxy>,
  allocated_proxies: usize,
  /// Remaining extra announcements of the startup burst.
  pub(crate) initial_announcements_left: u32,
  pub(crate) initial_announcement_period: Duration,
}

impl PdpInner {
  fn find_shell(&self, guid: GUID) -> Option<&ParticipantProxy> {
    self.participant_proxies.iter().find(|p| p.guid() == guid)
  }

  fn find_shell_mut(&mut self, guid: GUID) -> Option<&mut ParticipantProxy> {
    self
      .participant_proxies
      .iter_mut()
      .find(|p| p.guid() == guid)
  }

  fn find_by_prefix_mut(&mut self, prefix: GuidPrefix) -> Option<&mut ParticipantProxy> {
    self
      .participant_proxies
      .iter_mut()
      .find(|p| p.guid().prefix == prefix)
  }
}

/// The participant's discovery store and protocol driver.
///
/// Lock order, strictly: store mutex → participant proxy data mutex →
/// endpoint proxy data mutex. The pool mutex is a leaf that may be taken
/// under any of these; the only lock ever taken while holding it is a
/// released cell's own data mutex, which has no other holder at that
/// point. The listener callback mutex lives on the dispatch thread and is
/// never taken with another lock held.
///
/// The store mutex is reentrant so that a timer callback already inside the
/// store cannot deadlock against itself; mutable state sits behind a
/// `RefCell` whose borrows are scoped tightly to keep reentrant borrows
/// from overlapping.
pub struct Pdp {
  pub(crate) inner: ReentrantMutex<RefCell<PdpInner>>,
  pool: Arc<ProxyPool>,
  attributes: RtpsParticipantAttributes,
  local_guid: GUID,
  writer: Arc<dyn BuiltinWriter>,
  reader_history: Arc<dyn BuiltinReaderHistory>,
  edp: Arc<dyn EndpointDiscovery>,
  wlp: Option<Arc<dyn WriterLiveliness>>,
  dispatcher: ListenerDispatcher,
  /// Set when the local advertised attributes changed; the next periodic
  /// tick then publishes even though nothing forced it.
  pub(crate) has_changed_local: AtomicBool,
  /// Shared timer thread for announcement and lease events.
  pub(crate) timer_service: Mutex<timer::Timer>,
  pub(crate) announcement_event: Mutex<Option<timer::Guard>>,
}

impl Pdp {
  /// Builds the store and registers the local participant as element 0.
  /// Announcements do not start until [`Pdp::start_announcements`].
  pub fn new(
    local_guid: GUID,
    attributes: RtpsParticipantAttributes,
    resources: PdpResources,
  ) -> Result<Arc<Pdp>> {
    if !attributes.discovery.lease_duration.is_positive() {
      return Error::bad_parameter("participant lease duration must be positive");
    }

    let dispatcher = ListenerDispatcher::new(resources.listener)?;

    let initial_shells = attributes
      .allocation
      .participants
      .initial
      .min(attributes.allocation.participants.maximum);
    let inner = PdpInner {
      participant_proxies: Vec::new(),
      proxies_free: (0..initial_shells).map(|_| ParticipantProxy::new()).collect(),
      allocated_proxies: initial_shells,
      initial_announcements_left: attributes.discovery.initial_announcements.count,
      initial_announcement_period: attributes.discovery.initial_announcements.period,
    };

    let pdp = Arc::new(Pdp {
      inner: ReentrantMutex::new(RefCell::new(inner)),
      pool: resources.pool,
      attributes,
      local_guid,
      writer: resources.writer,
      reader_history: resources.reader_history,
      edp: resources.edp,
      wlp: resources.wlp,
      dispatcher,
      has_changed_local: AtomicBool::new(true),
      timer_service: Mutex::new(timer::Timer::new()),
      announcement_event: Mutex::new(None),
    });

    match pdp.add_participant_proxy(local_guid, false) {
      Some((_handle, mut ppd)) => {
        pdp.initialize_local_participant_data(&mut ppd);
      }
      None => {
        return Error::out_of_resources("cannot allocate the local participant proxy");
      }
    }

    Ok(pdp)
  }

  pub fn local_guid(&self) -> GUID {
    self.local_guid
  }

  pub fn pool(&self) -> &Arc<ProxyPool> {
    &self.pool
  }

  pub(crate) fn attributes(&self) -> &RtpsParticipantAttributes {
    &self.attributes
  }

  fn initialize_local_participant_data(&self, data: &mut ParticipantProxyData) {
    let attributes = &self.attributes;

    data.vendor_id = VendorId::THIS_IMPLEMENTATION;
    data.lease_duration = attributes.discovery.lease_duration;
    data.expects_inline_qos = false;

    let mut endpoints = BuiltinEndpointSet::default();
    endpoints.insert(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER);
    endpoints.insert(BuiltinEndpointSet::PARTICIPANT_DETECTOR);
    if attributes.discovery.use_writer_liveliness_protocol {
      endpoints.insert(BuiltinEndpointSet::PARTICIPANT_MESSAGE_DATA_WRITER);
      endpoints.insert(BuiltinEndpointSet::PARTICIPANT_MESSAGE_DATA_READER);
    }
    data.available_builtin_endpoints = endpoints;

    for locator in &attributes.default_unicast_locators {
      data.default_locators.add_unicast_locator(*locator);
    }
    for locator in &attributes.default_multicast_locators {
      data.default_locators.add_multicast_locator(*locator);
    }

    data.metatraffic_locators.clear();
    for locator in &attributes.metatraffic_unicast_locators {
      data.metatraffic_locators.add_unicast_locator(*locator);
    }
    if !attributes.discovery.avoid_builtin_multicast
      || data.metatraffic_locators.unicast.is_empty()
    {
      for locator in &attributes.metatraffic_multicast_locators {
        data.metatraffic_locators.add_multicast_locator(*locator);
      }
    }

    data.participant_name = attributes.name.clone();
    data.user_data = bytes::Bytes::copy_from_slice(&attributes.user_data);
    data.persistence_guid = attributes
      .persistence_prefix
      .filter(|prefix| *prefix != GuidPrefix::UNKNOWN)
      .map(GUID::from_prefix);
  }

  /// Looks up or creates the shell for `guid`, arming the lease timer for
  /// remotes when asked to. On success the participant data lock is still
  /// held through the returned guard, so the caller can finish
  /// initialization before any other thread can observe the fields.
  pub fn add_participant_proxy(
    self: &Arc<Self>,
    guid: GUID,
    with_lease_duration: bool,
  ) -> Option<(ParticipantDataHandle, ProxyDataGuard<ParticipantProxyData>)> {
    let locked = self.inner.lock();

    let (handle, _fresh) = self.pool.acquire_participant(guid)?;
    let guard = handle.lock_arc();

    let mut inner = locked.borrow_mut();
    let mut shell = match inner.proxies_free.pop() {
      Some(shell) => shell,
      None => {
        let max_proxies = self.attributes.allocation.participants.maximum;
        if inner.allocated_proxies >= max_proxies {
          warn!(
            "Maximum number of participant proxies ({max_proxies}) reached for participant {:?}",
            self.local_guid
          );
          return None;
        }
        inner.allocated_proxies += 1;
        ParticipantProxy::new()
      }
    };

    let check_lease = with_lease_duration && guid != self.local_guid;
    shell.attach(guid, handle.clone(), check_lease);
    if check_lease {
      let lease = guard.lease_duration.to_std();
      shell.set_lease_event(Some(self.schedule_lease_check(guid, lease)));
    }
    inner.participant_proxies.push(shell);

    Some((handle, guard))
  }

  /// Strong participant data handle from this store's active list.
  pub fn local_proxy_data(&self, prefix: GuidPrefix) -> Option<ParticipantDataHandle> {
    let locked = self.inner.lock();
    let inner = locked.borrow();
    inner
      .participant_proxies
      .iter()
      .find(|p| p.guid().prefix == prefix)
      .and_then(|p| p.proxy_data().cloned())
  }

  pub fn lookup_participant_name(&self, guid: GUID) -> Option<String> {
    self
      .local_proxy_data(guid.prefix)
      .map(|handle| handle.lock().participant_name.clone())
  }

  pub fn lookup_participant_key(&self, guid: GUID) -> Option<InstanceHandle> {
    let locked = self.inner.lock();
    let inner = locked.borrow();
    inner.find_shell(guid).map(|shell| shell.key())
  }

  pub fn has_remote_participant(&self, guid: GUID) -> bool {
    let locked = self.inner.lock();
    let has = locked.borrow().find_shell(guid).is_some();
    has
  }

  pub fn participant_count(&self) -> usize {
    let locked = self.inner.lock();
    let count = locked.borrow().participant_proxies.len();
    count
  }

  // ---------------------------------------------------------------------
  // Endpoint proxy data
  // ---------------------------------------------------------------------

  pub fn lookup_reader_proxy_data(&self, reader_guid: GUID) -> Option<ReaderDataHandle> {
    let locked = self.inner.lock();
    let inner = locked.borrow();
    for shell in &inner.participant_proxies {
      if shell.guid().prefix == reader_guid.prefix {
        for handle in &shell.readers {
          if handle.lock().guid == reader_guid {
            return Some(handle.clone());
          }
        }
      }
    }
    None
  }

  pub fn lookup_writer_proxy_data(&self, writer_guid: GUID) -> Option<WriterDataHandle> {
    let locked = self.inner.lock();
    let inner = locked.borrow();
    for shell in &inner.participant_proxies {
      if shell.guid().prefix == writer_guid.prefix {
        for handle in &shell.writers {
          if handle.lock().guid == writer_guid {
            return Some(handle.clone());
          }
        }
      }
    }
    None
  }

  pub fn has_reader_proxy_data(&self, reader_guid: GUID) -> bool {
    self.lookup_reader_proxy_data(reader_guid).is_some()
  }

  pub fn has_writer_proxy_data(&self, writer_guid: GUID) -> bool {
    self.lookup_writer_proxy_data(writer_guid).is_some()
  }

  /// Creates or updates the reader proxy advertised by an already known
  /// participant. The initializer runs under the participant and endpoint
  /// data locks and must not take the store mutex. On success the endpoint
  /// lock is still held through the returned guard.
  ///
  /// Unknown participant prefix means the advertisement is refused: reader
  /// data cannot outlive (or precede) its participant here.
  pub fn add_reader_proxy_data(
    &self,
    reader_guid: GUID,
    initializer: impl FnOnce(&mut ReaderProxyData, bool, &ParticipantProxyData) -> bool,
  ) -> Option<(ReaderDataHandle, ProxyDataGuard<ReaderProxyData>)> {
    debug!("Adding reader proxy data {reader_guid:?}");
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    let shell = inner.find_by_prefix_mut(reader_guid.prefix)?;
    let participant_guid = shell.guid();
    let ppd_handle = shell.proxy_data()?.clone();

    // updates come through the same path, so look for the entity first
    let existing = shell
      .readers
      .iter()
      .find(|handle| handle.lock().guid.entity_id == reader_guid.entity_id)
      .cloned();
    if let Some(existing) = existing {
      let ppd_guard = ppd_handle.lock();
      let mut reader_guard = existing.lock_arc();
      if !initializer(&mut reader_guard, true, &ppd_guard) {
        return None;
      }
      drop(ppd_guard);
      self.notify_reader(
        ReaderDiscoveryStatus::ChangedQosReader,
        reader_guard.clone(),
        participant_guid,
      );
      return Some((existing, reader_guard));
    }

    let limits = self.attributes.allocation.locators;
    let (handle, _fresh) = self.pool.acquire_reader(
      reader_guid,
      limits.max_unicast_locators,
      limits.max_multicast_locators,
    )?;
    shell.readers.push(handle.clone());

    let ppd_guard = ppd_handle.lock();
    let mut reader_guard = handle.lock_arc();
    if !initializer(&mut reader_guard, false, &ppd_guard) {
      drop(ppd_guard);
      drop(reader_guard);
      // no partial state: detach the refused proxy again
      shell.readers.retain(|h| !h.ptr_eq(&handle));
      return None;
    }
    drop(ppd_guard);
    self.notify_reader(
      ReaderDiscoveryStatus::DiscoveredReader,
      reader_guard.clone(),
      participant_guid,
    );
    Some((handle, reader_guard))
  }

  pub fn add_writer_proxy_data(
    &self,
    writer_guid: GUID,
    initializer: impl FnOnce(&mut WriterProxyData, bool, &ParticipantProxyData) -> bool,
  ) -> Option<(WriterDataHandle, ProxyDataGuard<WriterProxyData>)> {
    debug!("Adding writer proxy data {writer_guid:?}");
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    let shell = inner.find_by_prefix_mut(writer_guid.prefix)?;
    let participant_guid = shell.guid();
    let ppd_handle = shell.proxy_data()?.clone();

    let existing = shell
      .writers
      .iter()
      .find(|handle| handle.lock().guid.entity_id == writer_guid.entity_id)
      .cloned();
    if let Some(existing) = existing {
      let ppd_guard = ppd_handle.lock();
      let mut writer_guard = existing.lock_arc();
      if !initializer(&mut writer_guard, true, &ppd_guard) {
        return None;
      }
      drop(ppd_guard);
      self.notify_writer(
        WriterDiscoveryStatus::ChangedQosWriter,
        writer_guard.clone(),
        participant_guid,
      );
      return Some((existing, writer_guard));
    }

    let limits = self.attributes.allocation.locators;
    let (handle, _fresh) = self.pool.acquire_writer(
      writer_guid,
      limits.max_unicast_locators,
      limits.max_multicast_locators,
    )?;
    shell.writers.push(handle.clone());

    let ppd_guard = ppd_handle.lock();
    let mut writer_guard = handle.lock_arc();
    if !initializer(&mut writer_guard, false, &ppd_guard) {
      drop(ppd_guard);
      drop(writer_guard);
      shell.writers.retain(|h| !h.ptr_eq(&handle));
      return None;
    }
    drop(ppd_guard);
    self.notify_writer(
      WriterDiscoveryStatus::DiscoveredWriter,
      writer_guard.clone(),
      participant_guid,
    );
    Some((handle, writer_guard))
  }

  pub fn remove_reader_proxy_data(&self, reader_guid: GUID) -> bool {
    info!("Removing reader proxy data {reader_guid:?}");
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    for shell in inner.participant_proxies.iter_mut() {
      if shell.guid().prefix == reader_guid.prefix {
        if let Some(index) = shell
          .readers
          .iter()
          .position(|handle| handle.lock().guid == reader_guid)
        {
          self.edp.unpair_reader_proxy(shell.guid(), reader_guid);
          let handle = shell.readers.remove(index);
          let snapshot = handle.lock().clone();
          self.notify_reader(ReaderDiscoveryStatus::RemovedReader, snapshot, shell.guid());
          // dropping the handle releases this store's strong reference
          return true;
        }
      }
    }
    false
  }

  pub fn remove_writer_proxy_data(&self, writer_guid: GUID) -> bool {
    info!("Removing writer proxy data {writer_guid:?}");
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    for shell in inner.participant_proxies.iter_mut() {
      if shell.guid().prefix == writer_guid.prefix {
        if let Some(index) = shell
          .writers
          .iter()
          .position(|handle| handle.lock().guid == writer_guid)
        {
          self.edp.unpair_writer_proxy(shell.guid(), writer_guid);
          let handle = shell.writers.remove(index);
          let snapshot = handle.lock().clone();
          self.notify_writer(WriterDiscoveryStatus::RemovedWriter, snapshot, shell.guid());
          return true;
        }
      }
    }
    false
  }

  /// Attaches a shared builtin reader proxy to an already known
  /// participant. Builtin endpoints are not user-visible: no listener
  /// events, no EDP pairing.
  pub fn add_builtin_reader_proxy_data(&self, data: &ReaderProxyData) -> Option<ReaderDataHandle> {
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    let shell = match inner.find_by_prefix_mut(data.guid.prefix) {
      Some(shell) => shell,
      None => {
        error!(
          "builtin reader proxy {:?} for an unknown participant",
          data.guid
        );
        debug_assert!(false);
        return None;
      }
    };

    if let Some(existing) = shell
      .builtin_readers
      .iter()
      .find(|handle| handle.lock().guid.entity_id == data.guid.entity_id)
    {
      return Some(existing.clone());
    }

    let (handle, fresh) = self.pool.acquire_reader(
      data.guid,
      data.remote_locators.max_unicast_locators(),
      data.remote_locators.max_multicast_locators(),
    )?;
    if fresh {
      // first holder in the process, fill it in
      let mut guard = handle.lock();
      guard.remote_locators.assign(&data.remote_locators);
      guard.expects_inline_qos = data.expects_inline_qos;
      guard.topic_name = data.topic_name.clone();
      guard.type_name = data.type_name.clone();
      guard.qos = data.qos;
    }
    shell.builtin_readers.push(handle.clone());
    Some(handle)
  }

  pub fn add_builtin_writer_proxy_data(&self, data: &WriterProxyData) -> Option<WriterDataHandle> {
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();

    let shell = match inner.find_by_prefix_mut(data.guid.prefix) {
      Some(shell) => shell,
      None => {
        error!(
          "builtin writer proxy {:?} for an unknown participant",
          data.guid
        );
        debug_assert!(false);
        return None;
      }
    };

    if let Some(existing) = shell
      .builtin_writers
      .iter()
      .find(|handle| handle.lock().guid.entity_id == data.guid.entity_id)
    {
      return Some(existing.clone());
    }

    let (handle, fresh) = self.pool.acquire_writer(
      data.guid,
      data.remote_locators.max_unicast_locators(),
      data.remote_locators.max_multicast_locators(),
    )?;
    if fresh {
      let mut guard = handle.lock();
      guard.remote_locators.assign(&data.remote_locators);
      guard.topic_name = data.topic_name.clone();
      guard.type_name = data.type_name.clone();
      guard.qos = data.qos;
      guard.data_max_size_serialized = data.data_max_size_serialized;
    }
    shell.builtin_writers.push(handle.clone());
    Some(handle)
  }

  // ---------------------------------------------------------------------
  // Participant lifecycle
  // ---------------------------------------------------------------------

  /// Routes one inbound ALIVE announcement: create, merge, or ignore.
  pub fn add_or_update_participant(self: &Arc<Self>, incoming: ParticipantProxyData) {
    let guid = incoming.guid;
    if guid == self.local_guid {
      // our own announcement reflected back
      return;
    }

    let known = {
      let locked = self.inner.lock();
      let inner = locked.borrow();
      inner
        .participant_proxies
        .iter()
        .find(|p| p.guid().prefix == guid.prefix)
        .and_then(|p| p.proxy_data().cloned())
    };

    match known {
      Some(ppd_handle) => {
        let verdict = {
          let mut guard = ppd_handle.lock();
          if guard.is_compatible_with(&incoming) {
            let changed = guard.update_from(&incoming);
            Ok((changed, guard.clone()))
          } else {
            Err(())
          }
        };
        match verdict {
          Ok((changed, snapshot)) => {
            self.assert_remote_participant_liveliness(guid.prefix);
            if changed {
              self.notify_participant(ParticipantDiscoveryStatus::ChangedQosParticipant, snapshot);
            }
          }
          Err(()) => {
            warn!("Ignoring announcement from incompatible participant {guid:?}");
            self.notify_participant(ParticipantDiscoveryStatus::IgnoredParticipant, incoming);
          }
        }
      }
      None => match self.add_participant_proxy(guid, true) {
        Some((_handle, mut guard)) => {
          guard.update_from(&incoming);
          let snapshot = guard.clone();
          drop(guard);
          // now that the real lease duration is in place, arm the timer
          self.assert_remote_participant_liveliness(guid.prefix);
          self.edp.assign_remote_endpoints(&snapshot);
          self.notify_participant(ParticipantDiscoveryStatus::DiscoveredParticipant, snapshot);
        }
        None => {
          warn!("Discovery of participant {guid:?} refused");
        }
      },
    }
  }

  /// Detaches and tears down one remote participant. Returns false when
  /// the GUID is local or not present (so a lease expiry racing a
  /// voluntary removal makes the second caller a no-op).
  pub fn remove_remote_participant(
    self: &Arc<Self>,
    participant_guid: GUID,
    reason: ParticipantDiscoveryStatus,
  ) -> bool {
    if participant_guid == self.local_guid {
      return false;
    }
    info!("Removing remote participant {participant_guid:?}, reason {reason:?}");

    let mut shell = {
      let locked = self.inner.lock();
      let mut inner = locked.borrow_mut();
      match inner
        .participant_proxies
        .iter()
        .position(|p| p.guid() == participant_guid)
      {
        Some(index) => inner.participant_proxies.remove(index),
        None => return false,
      }
    };
    // Detached before any endpoint work: no other thread can reach this
    // shell through the store any more, so the rest runs unlocked.
    shell.set_lease_event(None);

    for handle in &shell.readers {
      let snapshot = handle.lock().clone();
      if snapshot.guid != GUID::UNKNOWN {
        self.edp.unpair_reader_proxy(participant_guid, snapshot.guid);
        self.notify_reader(
          ReaderDiscoveryStatus::RemovedReader,
          snapshot,
          participant_guid,
        );
      }
    }
    for handle in &shell.writers {
      let snapshot = handle.lock().clone();
      if snapshot.guid != GUID::UNKNOWN {
        self.edp.unpair_writer_proxy(participant_guid, snapshot.guid);
        self.notify_writer(
          WriterDiscoveryStatus::RemovedWriter,
          snapshot,
          participant_guid,
        );
      }
    }

    let participant_snapshot = shell.proxy_data().map(|ppd_handle| {
      let guard = ppd_handle.lock();
      if let Some(wlp) = &self.wlp {
        wlp.remove_remote_endpoints(&guard);
      }
      self.edp.remove_remote_endpoints(&guard);
      guard.clone()
    });

    // stale announcements of this instance must not resurrect it
    self.reader_history.remove_instance(shell.key());

    if let Some(snapshot) = participant_snapshot {
      self.notify_participant(reason, snapshot);
    }

    // drops the strong endpoint and participant data references; the pool
    // release hooks recycle whatever this PDP was the last holder of
    shell.clear();

    let locked = self.inner.lock();
    locked.borrow_mut().proxies_free.push(shell);
    true
  }

  // ---------------------------------------------------------------------
  // Liveliness
  // ---------------------------------------------------------------------

  /// A message from `prefix` arrived: restart its lease clock and timer.
  pub fn assert_remote_participant_liveliness(self: &Arc<Self>, prefix: GuidPrefix) {
    if prefix == self.local_guid.prefix {
      return;
    }
    let locked = self.inner.lock();
    let mut inner = locked.borrow_mut();
    if let Some(shell) = inner.find_by_prefix_mut(prefix) {
      trace!("Asserting liveliness of remote participant {prefix:?}");
      shell.assert_liveliness();
      if shell.should_check_lease_duration {
        let lease = shell
          .proxy_data()
          .map(|handle| handle.lock().lease_duration.to_std());
        if let Some(lease) = lease {
          let guard = self.schedule_lease_check(shell.guid(), lease);
          shell.set_lease_event(Some(guard));
        }
      }
    }
  }

  /// Lease timer body. Looks the participant up by GUID: when removal
  /// already won the race this observes an absent GUID and returns.
  pub(crate) fn check_remote_participant_liveliness(self: &Arc<Self>, participant_guid: GUID) {
    let expired = {
      let locked = self.inner.lock();
      let mut inner = locked.borrow_mut();
      let shell = match inner.find_shell_mut(participant_guid) {
        Some(shell) => shell,
        None => return,
      };
      if !shell.should_check_lease_duration {
        return;
      }
      let lease = match shell
        .proxy_data()
        .map(|handle| handle.lock().lease_duration.to_std())
      {
        Some(lease) => lease,
        None => return,
      };
      let deadline = shell.last_received_message_tm() + lease;
      let now = Instant::now();
      if now > deadline {
        true
      } else {
        let guard = self.schedule_lease_check(participant_guid, deadline - now);
        shell.set_lease_event(Some(guard));
        false
      }
    };

    if expired {
      self.remove_remote_participant(
        participant_guid,
        ParticipantDiscoveryStatus::DroppedParticipant,
      );
    }
  }

  pub(crate) fn schedule_lease_check(
    self: &Arc<Self>,
    participant_guid: GUID,
    delay: StdDuration,
  ) -> timer::Guard {
    let weak = Arc::downgrade(self);
    self.timer_service.lock().schedule_with_delay(
      chrono::Duration::milliseconds(delay.as_millis().min(i64::MAX as u128) as i64),
      move || {
        if let Some(pdp) = weak.upgrade() {
          pdp.check_remote_participant_liveliness(participant_guid);
        }
      },
    )
  }

  // ---------------------------------------------------------------------
  // Local participant state
  // ---------------------------------------------------------------------

  /// The local advertised attributes changed: bump the announcement
  /// version and let the next tick publish it.
  pub fn local_participant_changed(&self) {
    if let Some(handle) = self.local_proxy_data(self.local_guid.prefix) {
      let mut guard = handle.lock();
      guard.version = guard.version.next();
    }
    self.has_changed_local.store(true, Ordering::SeqCst);
  }

  /// Local participant data as a CDR parameter list, no encapsulation
  /// header.
  pub fn participant_proxy_data_serialized(&self, endianness: Endianness) -> Result<Vec<u8>> {
    let handle = match self.local_proxy_data(self.local_guid.prefix) {
      Some(handle) => handle,
      None => return Error::serialization("local participant data is missing"),
    };
    let guard = handle.lock();
    BuiltinDataSerializer::from_participant_data(&guard).write_to_vec(endianness)
  }

  pub(crate) fn local_participant_snapshot(&self) -> Option<(InstanceHandle, ParticipantProxyData)> {
    let locked = self.inner.lock();
    let inner = locked.borrow();
    let shell = inner.participant_proxies.first()?;
    debug_assert!(shell.guid() == self.local_guid);
    let handle = shell.proxy_data()?;
    let guard = handle.lock();
    Some((guard.key, guard.clone()))
  }

  // ---------------------------------------------------------------------
  // Listener plumbing
  // ---------------------------------------------------------------------

  pub(crate) fn notify_participant(
    &self,
    status: ParticipantDiscoveryStatus,
    data: ParticipantProxyData,
  ) {
    self
      .dispatcher
      .dispatch(DiscoveryEvent::Participant(ParticipantDiscoveryInfo {
        status,
        data,
      }));
  }

  pub(crate) fn notify_reader(
    &self,
    status: ReaderDiscoveryStatus,
    data: ReaderProxyData,
    participant_guid: GUID,
  ) {
    self
      .dispatcher
      .dispatch(DiscoveryEvent::Reader(ReaderDiscoveryInfo {
        status,
        data,
        participant_guid,
      }));
  }

  pub(crate) fn notify_writer(
    &self,
    status: WriterDiscoveryStatus,
    data: WriterProxyData,
    participant_guid: GUID,
  ) {
    self
      .dispatcher
      .dispatch(DiscoveryEvent::Writer(WriterDiscoveryInfo {
        status,
        data,
        participant_guid,
      }));
  }

  pub(crate) fn writer(&self) -> &Arc<dyn BuiltinWriter> {
    &self.writer
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{thread, time::Duration as StdDuration};

  use crate::{
    discovery::{
      config::DiscoveryConfig,
      data_types::endpoint_proxy_data::{EndpointQos, ReaderProxyData},
    },
    structure::{guid::EntityId, locator::Locator},
    test::{
      stubs::ListenerEvent,
      test_data::{pdp_fixture, remote_participant_data, FixtureConfig},
    },
  };

  fn user_reader_guid(prefix: GuidPrefix, key: u8) -> GUID {
    GUID::new(
      prefix,
      EntityId {
        entity_key: [0, 0, key],
        entity_kind: 0x07,
      },
    )
  }

  fn user_writer_guid(prefix: GuidPrefix, key: u8) -> GUID {
    GUID::new(
      prefix,
      EntityId {
        entity_key: [0, 0, key],
        entity_kind: 0x02,
      },
    )
  }

  fn discover(pdp: &Arc<Pdp>, first_byte: u8, lease_millis: u64) -> GUID {
    let remote = remote_participant_data(first_byte, lease_millis);
    pdp.add_or_update_participant(remote.clone());
    assert!(pdp.has_remote_participant(remote.guid));
    remote.guid
  }

  #[test]
  fn local_participant_is_element_zero() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    assert_eq!(pdp.participant_count(), 1);
    let handle = pdp.local_proxy_data(pdp.local_guid().prefix).unwrap();
    let data = handle.lock();
    assert_eq!(data.guid, pdp.local_guid());
    assert!(data
      .available_builtin_endpoints
      .contains(BuiltinEndpointSet::PARTICIPANT_ANNOUNCER));
    // fixture enables the writer liveliness protocol
    assert!(data
      .available_builtin_endpoints
      .contains(BuiltinEndpointSet::PARTICIPANT_MESSAGE_DATA_WRITER));
    assert_eq!(data.key, InstanceHandle::from(pdp.local_guid()));
  }

  #[test]
  fn zero_lease_duration_is_rejected_at_construction() {
    use crate::test::stubs::*;
    let allocation = crate::discovery::config::AllocationAttributes::default();
    let pool = ProxyPool::new(&allocation);
    let attributes = RtpsParticipantAttributes {
      discovery: DiscoveryConfig {
        lease_duration: Duration::ZERO,
        ..DiscoveryConfig::default()
      },
      allocation,
      ..RtpsParticipantAttributes::default()
    };
    let result = Pdp::new(
      crate::test::test_data::local_guid(),
      attributes,
      PdpResources {
        pool,
        writer: Arc::new(MemoryWriter::new()),
        reader_history: Arc::new(RecordingReaderHistory::new()),
        edp: Arc::new(RecordingEdp::new()),
        wlp: None,
        listener: Arc::new(RecordingListener::new()),
      },
    );
    assert!(matches!(result, Err(Error::BadParameter { .. })));
  }

  #[test]
  fn lookup_name_and_key() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x21, 30_000);
    assert_eq!(pdp.lookup_participant_name(guid).unwrap(), "remote_33");
    assert_eq!(
      pdp.lookup_participant_key(guid).unwrap(),
      InstanceHandle::from(guid)
    );
    assert!(pdp.lookup_participant_name(GUID::UNKNOWN).is_none());
  }

  #[test]
  fn endpoint_proxy_lifecycle() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let participant_guid = discover(&pdp, 0x30, 30_000);
    let reader_guid = user_reader_guid(participant_guid.prefix, 1);
    let writer_guid = user_writer_guid(participant_guid.prefix, 2);

    // discovery
    let added = pdp.add_reader_proxy_data(reader_guid, |reader, updating, participant| {
      assert!(!updating);
      assert_eq!(participant.guid, participant_guid);
      reader.topic_name = "Square".to_string();
      reader.type_name = "ShapeType".to_string();
      true
    });
    let (handle, guard) = added.unwrap();
    assert_eq!(guard.topic_name, "Square");
    drop(guard);

    assert!(pdp.has_reader_proxy_data(reader_guid));
    assert!(pdp
      .lookup_reader_proxy_data(reader_guid)
      .unwrap()
      .ptr_eq(&handle));
    drop(handle);

    let added = pdp.add_writer_proxy_data(writer_guid, |writer, _updating, _participant| {
      writer.topic_name = "Square".to_string();
      writer.data_max_size_serialized = 1024;
      true
    });
    assert!(added.is_some());
    drop(added);

    // update emits a QoS change
    let updated = pdp.add_writer_proxy_data(writer_guid, |writer, updating, _participant| {
      assert!(updating);
      writer.data_max_size_serialized = 2048;
      true
    });
    assert!(updated.is_some());
    drop(updated);

    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.contains(&ListenerEvent::Writer(
        WriterDiscoveryStatus::ChangedQosWriter,
        writer_guid,
      ))
    }));

    // removal unpairs, notifies, then drops the reference
    assert!(pdp.remove_reader_proxy_data(reader_guid));
    assert!(!pdp.has_reader_proxy_data(reader_guid));
    assert!(!pdp.remove_reader_proxy_data(reader_guid));
    assert_eq!(fixture.edp.unpaired_readers(), vec![reader_guid]);

    assert!(pdp.remove_writer_proxy_data(writer_guid));
    assert_eq!(fixture.edp.unpaired_writers(), vec![writer_guid]);
    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.contains(&ListenerEvent::Reader(
        ReaderDiscoveryStatus::RemovedReader,
        reader_guid,
      )) && events.contains(&ListenerEvent::Writer(
        WriterDiscoveryStatus::RemovedWriter,
        writer_guid,
      ))
    }));
  }

  #[test]
  fn endpoint_for_unknown_participant_is_refused() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    let reader_guid = user_reader_guid(GuidPrefix::new([0x77; 12]), 1);
    let added = pdp.add_reader_proxy_data(reader_guid, |_reader, _updating, _participant| true);
    assert!(added.is_none());
    assert!(!pdp.has_reader_proxy_data(reader_guid));
  }

  #[test]
  fn refused_initializer_leaves_no_partial_state() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let participant_guid = discover(&pdp, 0x31, 30_000);
    let reader_guid = user_reader_guid(participant_guid.prefix, 1);

    let added = pdp.add_reader_proxy_data(reader_guid, |_reader, _updating, _participant| false);
    assert!(added.is_none());
    assert!(!pdp.has_reader_proxy_data(reader_guid));
    // the refused proxy went straight back to the pool
    assert!(fixture.pool.alive_reader(&reader_guid).is_none());
  }

  #[test]
  fn participant_cap_is_exact() {
    // capacity three: the local participant plus two remotes
    let (pdp, fixture) = pdp_fixture(FixtureConfig {
      max_participants: 3,
      ..FixtureConfig::default()
    });
    discover(&pdp, 0x51, 30_000);
    discover(&pdp, 0x52, 30_000);
    assert_eq!(pdp.participant_count(), 3);

    let over_cap = remote_participant_data(0x53, 30_000);
    pdp.add_or_update_participant(over_cap.clone());
    assert!(!pdp.has_remote_participant(over_cap.guid));
    assert_eq!(pdp.participant_count(), 3);
    // refusal left nothing behind in the pool either
    assert!(!fixture.pool.participant_reference_alive(&over_cap.guid.prefix));

    thread::sleep(StdDuration::from_millis(50));
    let events = fixture.listener.events();
    assert!(!events
      .iter()
      .any(|e| matches!(e, ListenerEvent::Participant(_, guid) if *guid == over_cap.guid)));
  }

  #[test]
  fn remove_remote_participant_is_idempotent() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x61, 30_000);

    assert!(pdp.remove_remote_participant(guid, ParticipantDiscoveryStatus::RemovedParticipant));
    assert!(!pdp.remove_remote_participant(guid, ParticipantDiscoveryStatus::RemovedParticipant));

    assert!(fixture.listener.wait_for(StdDuration::from_secs(1), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::RemovedParticipant, g) if *g == guid)
      })
    }));
    thread::sleep(StdDuration::from_millis(50));
    let removed = fixture
      .listener
      .events()
      .iter()
      .filter(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::RemovedParticipant, g) if *g == guid)
      })
      .count();
    assert_eq!(removed, 1);
  }

  #[test]
  fn removing_local_participant_is_refused() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    assert!(!pdp.remove_remote_participant(
      pdp.local_guid(),
      ParticipantDiscoveryStatus::RemovedParticipant
    ));
    assert_eq!(pdp.participant_count(), 1);
  }

  #[test]
  fn removal_notifies_wlp_and_edp_and_purges_reader_history() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x62, 30_000);
    assert!(pdp.remove_remote_participant(guid, ParticipantDiscoveryStatus::RemovedParticipant));

    assert_eq!(fixture.wlp.removed_remotes(), vec![guid]);
    assert_eq!(fixture.edp.removed_remotes(), vec![guid]);
    assert_eq!(
      fixture.reader_history.removed_instances(),
      vec![InstanceHandle::from(guid)]
    );
  }

  #[test]
  fn pool_recycles_after_repeated_discover_and_remove() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let initial_free = fixture.pool.participant_free_list_len();
    let prefix = remote_participant_data(0x63, 30_000).guid.prefix;

    for _ in 0..2 {
      let guid = discover(&pdp, 0x63, 30_000);
      assert!(fixture.pool.participant_reference_alive(&prefix));
      assert!(
        pdp.remove_remote_participant(guid, ParticipantDiscoveryStatus::RemovedParticipant)
      );
    }

    assert_eq!(fixture.pool.participant_free_list_len(), initial_free + 1);
    assert!(!fixture.pool.participant_reference_alive(&prefix));
  }

  #[test]
  fn lease_expiry_drops_participant() {
    crate::test::init_logging();
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x64, 300);

    // well inside the lease: still there
    thread::sleep(StdDuration::from_millis(150));
    assert!(pdp.has_remote_participant(guid));

    assert!(fixture.listener.wait_for(StdDuration::from_secs(2), |events| {
      events.iter().any(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::DroppedParticipant, g) if *g == guid)
      })
    }));
    assert!(!pdp.has_remote_participant(guid));

    // terminal: no further events for this participant
    let count_before = fixture.listener.events().len();
    thread::sleep(StdDuration::from_millis(200));
    assert_eq!(fixture.listener.events().len(), count_before);
  }

  #[test]
  fn liveliness_assertion_extends_the_lease() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x65, 600);

    thread::sleep(StdDuration::from_millis(300));
    assert!(pdp.has_remote_participant(guid));
    pdp.assert_remote_participant_liveliness(guid.prefix);

    // past the original deadline but inside the extended one
    thread::sleep(StdDuration::from_millis(400));
    assert!(pdp.has_remote_participant(guid));

    // with no further assertions the lease finally runs out
    thread::sleep(StdDuration::from_millis(600));
    assert!(!pdp.has_remote_participant(guid));
  }

  #[test]
  fn voluntary_removal_wins_over_lease_timer() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let guid = discover(&pdp, 0x66, 200);
    assert!(pdp.remove_remote_participant(guid, ParticipantDiscoveryStatus::RemovedParticipant));

    // the timer may still fire; it must observe the absent GUID and return
    thread::sleep(StdDuration::from_millis(400));
    assert!(!pdp.has_remote_participant(guid));
    let dropped = fixture
      .listener
      .events()
      .iter()
      .filter(|e| {
        matches!(e, ListenerEvent::Participant(ParticipantDiscoveryStatus::DroppedParticipant, g) if *g == guid)
      })
      .count();
    assert_eq!(dropped, 0);
  }

  #[test]
  fn builtin_proxies_attach_without_events() {
    let (pdp, fixture) = pdp_fixture(FixtureConfig::default());
    let participant_guid = discover(&pdp, 0x67, 30_000);

    let mut data = ReaderProxyData::with_locator_capacities(4, 1);
    data.guid = GUID::new(
      participant_guid.prefix,
      EntityId::SEDP_BUILTIN_PUBLICATIONS_READER,
    );
    data.topic_name = "DCPSPublication".to_string();
    data.qos = EndpointQos::default();

    let first = pdp.add_builtin_reader_proxy_data(&data).unwrap();
    let second = pdp.add_builtin_reader_proxy_data(&data).unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(first.lock().topic_name, "DCPSPublication");

    thread::sleep(StdDuration::from_millis(50));
    assert!(!fixture
      .listener
      .events()
      .iter()
      .any(|e| matches!(e, ListenerEvent::Reader(..))));
  }

  #[test]
  fn serialized_local_data_has_no_encapsulation_header() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    let buffer = pdp
      .participant_proxy_data_serialized(Endianness::LittleEndian)
      .unwrap();
    // starts directly with a parameter header, not [0x00, 0x03]
    assert_ne!(&buffer[..2], &[0x00, 0x03]);
    assert_eq!(buffer.len() % 4, 0);
  }

  #[test]
  fn locator_capacity_is_enforced_on_endpoint_data() {
    let (pdp, _fixture) = pdp_fixture(FixtureConfig::default());
    let participant_guid = discover(&pdp, 0x68, 30_000);
    let reader_guid = user_reader_guid(participant_guid.prefix, 3);

    let added = pdp.add_reader_proxy_data(reader_guid, |reader, _updating, _participant| {
      // fixture locator limits: 4 unicast
      for port in 0..6u16 {
        reader
          .remote_locators
          .add_unicast_locator(Locator::from(std::net::SocketAddr::new(
            "127.0.0.1".parse().unwrap(),
            7000 + port,
          )));
      }
      true
    });
    let (_handle, guard) = added.unwrap();
    assert_eq!(guard.remote_locators.unicast.len(), 4);
  }
}
