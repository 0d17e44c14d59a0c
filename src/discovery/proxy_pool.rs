//! Process-wide pools of proxy data objects with weak-reference dedup.
//!
//! Proxy data is shared: when several local participants (each with its own
//! PDP) discover the same remote, they must end up holding the *same*
//! [`ParticipantProxyData`] object. The pool enforces that with a map of
//! weak references keyed by GUID: acquirers either upgrade an existing
//! entry or take a cleared object from the free list. When the last strong
//! holder goes away, the release hook in [`ProxyHandle::drop`] clears the
//! object and puts it back.
//!
//! The pool mutex is reentrant and is a *leaf* in the crate's lock order:
//! it may be taken while holding store or proxy-data locks. Cells popped
//! from the free list have one strong holder and no weak references, so
//! they are initialized through `Arc::get_mut`; a cell being released
//! still has its weak-map entry, so the release hook clears it under the
//! cell's own (uncontended) mutex before erasing that entry.

use std::{
  cell::RefCell,
  collections::HashMap,
  fmt::Debug,
  hash::Hash,
  sync::{Arc, Weak},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex, ReentrantMutex};

use crate::discovery::{
  config::{AllocationAttributes, LocatorLimits, ResourceLimit},
  data_types::{
    endpoint_proxy_data::{ReaderProxyData, WriterProxyData},
    participant_proxy_data::ParticipantProxyData,
  },
};
use crate::structure::guid::{GuidPrefix, GUID};

pub type ParticipantDataHandle = ProxyHandle<ParticipantProxyData>;
pub type ReaderDataHandle = ProxyHandle<ReaderProxyData>;
pub type WriterDataHandle = ProxyHandle<WriterProxyData>;

/// A proxy data object that can live in the [`ProxyPool`].
pub trait PoolMember: Send + 'static {
  type Key: Copy + Eq + Hash + Debug;

  fn key(&self) -> Self::Key;
  fn clear(&mut self);
  fn slot(state: &mut PoolState) -> &mut KindPool<Self>
  where
    Self: Sized;
  fn kind_name() -> &'static str;
}

impl PoolMember for ParticipantProxyData {
  type Key = GuidPrefix;

  fn key(&self) -> GuidPrefix {
    self.guid.prefix
  }
  fn clear(&mut self) {
    ParticipantProxyData::clear(self);
  }
  fn slot(state: &mut PoolState) -> &mut KindPool<Self> {
    &mut state.participants
  }
  fn kind_name() -> &'static str {
    "participant"
  }
}

impl PoolMember for ReaderProxyData {
  type Key = GUID;

  fn key(&self) -> GUID {
    self.guid
  }
  fn clear(&mut self) {
    ReaderProxyData::clear(self);
  }
  fn slot(state: &mut PoolState) -> &mut KindPool<Self> {
    &mut state.readers
  }
  fn kind_name() -> &'static str {
    "reader"
  }
}

impl PoolMember for WriterProxyData {
  type Key = GUID;

  fn key(&self) -> GUID {
    self.guid
  }
  fn clear(&mut self) {
    WriterProxyData::clear(self);
  }
  fn slot(state: &mut PoolState) -> &mut KindPool<Self> {
    &mut state.writers
  }
  fn kind_name() -> &'static str {
    "writer"
  }
}

/// Free list, weak-reference map and allocation accounting for one kind of
/// proxy data.
pub struct KindPool<T: PoolMember> {
  free: Vec<Arc<Mutex<T>>>,
  references: HashMap<T::Key, Weak<Mutex<T>>>,
  allocated: usize,
  max_allocated: usize,
}

impl<T: PoolMember> KindPool<T> {
  fn new(limit: ResourceLimit, factory: impl Fn() -> T) -> Self {
    let initial = limit.initial.min(limit.maximum);
    let free: Vec<_> = (0..initial)
      .map(|_| Arc::new(Mutex::new(factory())))
      .collect();
    KindPool {
      allocated: free.len(),
      free,
      references: HashMap::new(),
      max_allocated: limit.maximum,
    }
  }

  fn acquire(
    &mut self,
    key: T::Key,
    factory: impl FnOnce() -> T,
    init: impl FnOnce(&mut T),
  ) -> Option<(Arc<Mutex<T>>, bool)> {
    if let Some(cell) = self.references.get(&key).and_then(Weak::upgrade) {
      return Some((cell, false));
    }
    // release hooks erase the entry before the strong count can reach
    // zero, so a dead weak reference is an accounting bug
    if self.references.remove(&key).is_some() {
      error!("stale weak reference for {} proxy {key:?}", T::kind_name());
      debug_assert!(false);
    }

    let mut cell = match self.free.pop() {
      Some(cell) => cell,
      None => {
        if self.allocated >= self.max_allocated {
          warn!(
            "Maximum number of {} proxies ({}) reached",
            T::kind_name(),
            self.max_allocated
          );
          return None;
        }
        self.allocated += 1;
        Arc::new(Mutex::new(factory()))
      }
    };

    match Arc::get_mut(&mut cell) {
      Some(mutex) => init(mutex.get_mut()),
      None => {
        // a free-list cell with another holder would alias live data
        error!("{} proxy free list handed out a shared cell", T::kind_name());
        debug_assert!(false);
        return None;
      }
    }
    self.references.insert(key, Arc::downgrade(&cell));
    Some((cell, true))
  }

  fn alive(&self, key: &T::Key) -> Option<Arc<Mutex<T>>> {
    self.references.get(key).and_then(Weak::upgrade)
  }

  /// The release hook body: called with the last strong reference.
  fn release(&mut self, cell: Arc<Mutex<T>>) {
    // Clear under the cell's own lock: the weak-map entry still points at
    // this allocation, so `Arc::get_mut` is not available here. With the
    // strong count at one no handle exists that could contend the lock.
    let key = {
      let mut entry = cell.lock();
      let key = entry.key();
      entry.clear();
      key
    };
    if self.references.remove(&key).is_none() {
      error!(
        "released {} proxy {key:?} had no pool reference",
        T::kind_name()
      );
      debug_assert!(false);
    }
    self.free.push(cell);
  }
}

pub struct PoolState {
  participants: KindPool<ParticipantProxyData>,
  readers: KindPool<ReaderProxyData>,
  writers: KindPool<WriterProxyData>,
}

/// The shared pool. One per process (or per test); threaded explicitly
/// through construction instead of living in a static.
pub struct ProxyPool {
  state: ReentrantMutex<RefCell<PoolState>>,
  locator_limits: LocatorLimits,
}

impl ProxyPool {
  pub fn new(allocation: &AllocationAttributes) -> Arc<ProxyPool> {
    let limits = allocation.locators;
    let state = PoolState {
      participants: KindPool::new(allocation.participants, || {
        ParticipantProxyData::with_locator_capacities(
          limits.max_unicast_locators,
          limits.max_multicast_locators,
        )
      }),
      readers: KindPool::new(allocation.readers, || {
        ReaderProxyData::with_locator_capacities(
          limits.max_unicast_locators,
          limits.max_multicast_locators,
        )
      }),
      writers: KindPool::new(allocation.writers, || {
        WriterProxyData::with_locator_capacities(
          limits.max_unicast_locators,
          limits.max_multicast_locators,
        )
      }),
    };
    Arc::new(ProxyPool {
      state: ReentrantMutex::new(RefCell::new(state)),
      locator_limits: limits,
    })
  }

  /// Looks up or creates the shared participant record for `guid`.
  /// The second return is true when the object was newly taken into use;
  /// its GUID is then already assigned. None when the cap is reached.
  pub fn acquire_participant(
    self: &Arc<Self>,
    guid: GUID,
  ) -> Option<(ParticipantDataHandle, bool)> {
    let limits = self.locator_limits;
    let locked = self.state.lock();
    let acquired = locked.borrow_mut().participants.acquire(
      guid.prefix,
      || {
        ParticipantProxyData::with_locator_capacities(
          limits.max_unicast_locators,
          limits.max_multicast_locators,
        )
      },
      |data| data.set_guid(guid),
    );
    acquired.map(|(cell, fresh)| (ProxyHandle::new(cell, self.clone()), fresh))
  }

  pub fn acquire_reader(
    self: &Arc<Self>,
    guid: GUID,
    max_unicast_locators: usize,
    max_multicast_locators: usize,
  ) -> Option<(ReaderDataHandle, bool)> {
    let locked = self.state.lock();
    let acquired = locked.borrow_mut().readers.acquire(
      guid,
      || ReaderProxyData::with_locator_capacities(max_unicast_locators, max_multicast_locators),
      |data| data.guid = guid,
    );
    acquired.map(|(cell, fresh)| (ProxyHandle::new(cell, self.clone()), fresh))
  }

  pub fn acquire_writer(
    self: &Arc<Self>,
    guid: GUID,
    max_unicast_locators: usize,
    max_multicast_locators: usize,
  ) -> Option<(WriterDataHandle, bool)> {
    let locked = self.state.lock();
    let acquired = locked.borrow_mut().writers.acquire(
      guid,
      || WriterProxyData::with_locator_capacities(max_unicast_locators, max_multicast_locators),
      |data| data.guid = guid,
    );
    acquired.map(|(cell, fresh)| (ProxyHandle::new(cell, self.clone()), fresh))
  }

  /// A strong handle to the participant record, if someone keeps it alive.
  pub fn alive_participant(self: &Arc<Self>, prefix: &GuidPrefix) -> Option<ParticipantDataHandle> {
    let locked = self.state.lock();
    let cell = locked.borrow().participants.alive(prefix);
    cell.map(|cell| ProxyHandle::new(cell, self.clone()))
  }

  pub fn alive_reader(self: &Arc<Self>, guid: &GUID) -> Option<ReaderDataHandle> {
    let locked = self.state.lock();
    let cell = locked.borrow().readers.alive(guid);
    cell.map(|cell| ProxyHandle::new(cell, self.clone()))
  }

  pub fn alive_writer(self: &Arc<Self>, guid: &GUID) -> Option<WriterDataHandle> {
    let locked = self.state.lock();
    let cell = locked.borrow().writers.alive(guid);
    cell.map(|cell| ProxyHandle::new(cell, self.clone()))
  }

  // Introspection, mostly for monitoring and tests.

  pub fn participant_free_list_len(&self) -> usize {
    self.state.lock().borrow().participants.free.len()
  }

  pub fn reader_free_list_len(&self) -> usize {
    self.state.lock().borrow().readers.free.len()
  }

  pub fn writer_free_list_len(&self) -> usize {
    self.state.lock().borrow().writers.free.len()
  }

  pub fn participant_reference_alive(&self, prefix: &GuidPrefix) -> bool {
    self
      .state
      .lock()
      .borrow()
      .participants
      .references
      .get(prefix)
      .map(|weak| weak.strong_count() > 0)
      .unwrap_or(false)
  }
}

/// Strong, reference-counted handle to one pooled proxy data object.
///
/// Cloning shares the same object. Dropping the last handle runs the
/// release hook: under the pool mutex the object is cleared, its weak-map
/// entry erased, and the cell pushed onto the free list.
pub struct ProxyHandle<T: PoolMember> {
  cell: Option<Arc<Mutex<T>>>,
  pool: Arc<ProxyPool>,
}

impl<T: PoolMember> ProxyHandle<T> {
  fn new(cell: Arc<Mutex<T>>, pool: Arc<ProxyPool>) -> Self {
    ProxyHandle {
      cell: Some(cell),
      pool,
    }
  }

  // The Option is only there so Drop can take the Arc out.
  fn cell(&self) -> &Arc<Mutex<T>> {
    self.cell.as_ref().expect("proxy handle used after drop")
  }

  pub fn lock(&self) -> parking_lot::MutexGuard<'_, T> {
    self.cell().lock()
  }

  /// An owning guard, for the lock-held-return contract of the store: the
  /// guard can outlive the borrow of this handle, and it keeps the pooled
  /// object alive until released.
  pub fn lock_arc(&self) -> ProxyDataGuard<T> {
    ProxyDataGuard {
      guard: Mutex::lock_arc(self.cell()),
      _handle: self.clone(),
    }
  }

  pub fn ptr_eq(&self, other: &ProxyHandle<T>) -> bool {
    Arc::ptr_eq(self.cell(), other.cell())
  }
}

impl<T: PoolMember> Clone for ProxyHandle<T> {
  fn clone(&self) -> Self {
    ProxyHandle {
      cell: self.cell.clone(),
      pool: self.pool.clone(),
    }
  }
}

impl<T: PoolMember> Drop for ProxyHandle<T> {
  fn drop(&mut self) {
    if let Some(cell) = self.cell.take() {
      let locked = self.pool.state.lock();
      // The weak map holds no strong count and free-list cells have no
      // handles, so count 1 here means this was the last holder. Upgrades
      // of the weak entry happen under the pool mutex we are holding.
      if Arc::strong_count(&cell) == 1 {
        T::slot(&mut locked.borrow_mut()).release(cell);
      }
    }
  }
}

impl<T: PoolMember + Debug> Debug for ProxyHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "ProxyHandle({:?})", *self.lock())
  }
}

/// Owning lock guard over pooled proxy data. Keeps a handle alive so the
/// release hook cannot run while the data is locked.
pub struct ProxyDataGuard<T: PoolMember> {
  // field order: the mutex guard must drop before the handle
  guard: ArcMutexGuard<RawMutex, T>,
  _handle: ProxyHandle<T>,
}

impl<T: PoolMember> std::ops::Deref for ProxyDataGuard<T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.guard
  }
}

impl<T: PoolMember> std::ops::DerefMut for ProxyDataGuard<T> {
  fn deref_mut(&mut self) -> &mut T {
    &mut self.guard
  }
}
