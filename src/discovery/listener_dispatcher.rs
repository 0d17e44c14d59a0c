use std::{
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{mpsc, Arc},
  thread,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

use crate::{
  discovery::{
    builtin::DiscoveryListener,
    discovery_info::{ParticipantDiscoveryInfo, ReaderDiscoveryInfo, WriterDiscoveryInfo},
  },
  error::{Error, Result},
};

#[derive(Debug)]
pub enum DiscoveryEvent {
  Participant(ParticipantDiscoveryInfo),
  Reader(ReaderDiscoveryInfo),
  Writer(WriterDiscoveryInfo),
}

/// Buffers discovery events and delivers them to the application listener
/// from a dedicated thread.
///
/// This is what keeps user callbacks from re-entering the store: events are
/// enqueued while store or proxy locks are held, but the callbacks
/// themselves run with no discovery lock held at all. A callback mutex
/// serializes deliveries, and a panicking listener is caught and logged
/// without disturbing dispatch.
///
/// Queue order is delivery order, which provides the per-remote event
/// ordering guarantees: enqueue `Removed` for the endpoints before the
/// `Removed` of their participant and the listener observes them that way.
pub struct ListenerDispatcher {
  sender: Mutex<Option<mpsc::Sender<DiscoveryEvent>>>,
  worker: Option<thread::JoinHandle<()>>,
}

impl ListenerDispatcher {
  pub fn new(listener: Arc<dyn DiscoveryListener>) -> Result<ListenerDispatcher> {
    let (sender, receiver) = mpsc::channel::<DiscoveryEvent>();
    let worker = thread::Builder::new()
      .name("pdp-listener-dispatch".to_string())
      .spawn(move || {
        let callback_mutex = Mutex::new(());
        while let Ok(event) = receiver.recv() {
          let _exclusive = callback_mutex.lock();
          let delivery = catch_unwind(AssertUnwindSafe(|| match event {
            DiscoveryEvent::Participant(info) => listener.on_participant_discovery(info),
            DiscoveryEvent::Reader(info) => listener.on_reader_discovery(info),
            DiscoveryEvent::Writer(info) => listener.on_writer_discovery(info),
          }));
          if delivery.is_err() {
            error!("discovery listener panicked; continuing dispatch");
          }
        }
      })
      .map_err(|e| Error::Internal {
        reason: format!("cannot spawn listener dispatch thread: {e}"),
      })?;

    Ok(ListenerDispatcher {
      sender: Mutex::new(Some(sender)),
      worker: Some(worker),
    })
  }

  pub fn dispatch(&self, event: DiscoveryEvent) {
    if let Some(sender) = self.sender.lock().as_ref() {
      if sender.send(event).is_err() {
        warn!("listener dispatch thread is gone, discovery event lost");
      }
    }
  }
}

impl Drop for ListenerDispatcher {
  fn drop(&mut self) {
    // closing the channel lets the worker drain remaining events and exit
    *self.sender.lock() = None;
    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        error!("listener dispatch thread did not shut down cleanly");
      }
    }
  }
}
