//! # Cache Entry Events
//!
//! Listener registration and event delivery for cache mutations.
//!
//! ## Delivery
//!
//! Every operation hands its events to the [`EventDispatcher`] while it still
//! holds the cache's reentrant sequencing lock, so all consumers see a cache's
//! events in the order the store applied them. Listeners may call back into
//! the cache from the delivering thread.
//!
//! - **Synchronous listeners** run on the mutating thread before the cache
//!   operation returns.
//! - **Asynchronous listeners** run on a per-cache dispatcher thread fed by a
//!   crossbeam channel, in the order events were enqueued.
//! - **Broadcast subscribers** receive every event through a
//!   `tokio::sync::broadcast` channel. Lagging receivers lose the oldest
//!   events, as with any broadcast channel.
//!
//! Removed, expired and evicted events carry the departing value in
//! `old_value`; created and updated events carry the new value in `value`.

use crate::constants::events as event_names;
use crate::logging::log_error;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Kind of change that happened to a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventType {
    Created,
    Updated,
    Removed,
    Expired,
    Evicted,
}

impl CacheEventType {
    pub const ALL: [CacheEventType; 5] = [
        CacheEventType::Created,
        CacheEventType::Updated,
        CacheEventType::Removed,
        CacheEventType::Expired,
        CacheEventType::Evicted,
    ];

    /// Event name used in structured logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEventType::Created => event_names::ENTRY_CREATED,
            CacheEventType::Updated => event_names::ENTRY_UPDATED,
            CacheEventType::Removed => event_names::ENTRY_REMOVED,
            CacheEventType::Expired => event_names::ENTRY_EXPIRED,
            CacheEventType::Evicted => event_names::ENTRY_EVICTED,
        }
    }
}

impl fmt::Display for CacheEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to a single cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntryEvent<K, V> {
    pub cache_name: Arc<str>,
    pub event_type: CacheEventType,
    pub key: K,
    pub value: Option<V>,
    pub old_value: Option<V>,
}

impl<K, V> CacheEntryEvent<K, V> {
    pub(crate) fn created(cache_name: &Arc<str>, key: K, value: V) -> Self {
        Self {
            cache_name: Arc::clone(cache_name),
            event_type: CacheEventType::Created,
            key,
            value: Some(value),
            old_value: None,
        }
    }

    pub(crate) fn updated(cache_name: &Arc<str>, key: K, value: V, old_value: V) -> Self {
        Self {
            cache_name: Arc::clone(cache_name),
            event_type: CacheEventType::Updated,
            key,
            value: Some(value),
            old_value: Some(old_value),
        }
    }

    /// Removed, expired or evicted: the entry left the cache
    pub(crate) fn departed(
        cache_name: &Arc<str>,
        event_type: CacheEventType,
        key: K,
        old_value: V,
    ) -> Self {
        Self {
            cache_name: Arc::clone(cache_name),
            event_type,
            key,
            value: None,
            old_value: Some(old_value),
        }
    }
}

/// Receives cache entry events
pub trait CacheEntryListener<K, V>: Send + Sync {
    fn on_event(&self, event: &CacheEntryEvent<K, V>);
}

impl<K, V, F> CacheEntryListener<K, V> for F
where
    F: Fn(&CacheEntryEvent<K, V>) + Send + Sync,
{
    fn on_event(&self, event: &CacheEntryEvent<K, V>) {
        self(event)
    }
}

/// Identifies a registered listener so it can be deregistered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listener together with the events it wants and how it wants them
pub struct ListenerConfiguration<K, V> {
    listener: Arc<dyn CacheEntryListener<K, V>>,
    event_types: HashSet<CacheEventType>,
    synchronous: bool,
}

impl<K, V> Clone for ListenerConfiguration<K, V> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            event_types: self.event_types.clone(),
            synchronous: self.synchronous,
        }
    }
}

impl<K, V> fmt::Debug for ListenerConfiguration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfiguration")
            .field("listener", &"<Arc<dyn CacheEntryListener>>")
            .field("event_types", &self.event_types)
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

impl<K, V> ListenerConfiguration<K, V> {
    /// Listen to every event type, delivered asynchronously
    pub fn new(listener: impl CacheEntryListener<K, V> + 'static) -> Self {
        Self::from_arc(Arc::new(listener))
    }

    pub fn from_arc(listener: Arc<dyn CacheEntryListener<K, V>>) -> Self {
        Self {
            listener,
            event_types: CacheEventType::ALL.into_iter().collect(),
            synchronous: false,
        }
    }

    /// Restrict delivery to the given event types
    pub fn for_events(mut self, event_types: impl IntoIterator<Item = CacheEventType>) -> Self {
        self.event_types = event_types.into_iter().collect();
        self
    }

    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.synchronous = false;
        self
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn wants(&self, event_type: CacheEventType) -> bool {
        self.event_types.contains(&event_type)
    }
}

enum DispatchMessage<K, V> {
    Deliver {
        listener: Arc<dyn CacheEntryListener<K, V>>,
        event: Arc<CacheEntryEvent<K, V>>,
    },
    Shutdown,
}

struct AsyncWorker<K, V> {
    sender: Sender<DispatchMessage<K, V>>,
    handle: JoinHandle<()>,
}

/// Fans cache events out to listeners and broadcast subscribers
pub(crate) struct EventDispatcher<K, V> {
    cache_name: Arc<str>,
    listeners: RwLock<Vec<(ListenerId, ListenerConfiguration<K, V>)>>,
    worker: Mutex<Option<AsyncWorker<K, V>>>,
    broadcast: broadcast::Sender<CacheEntryEvent<K, V>>,
}

impl<K, V> EventDispatcher<K, V>
where
    K: Clone + Send + Sync + fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cache_name: Arc<str>, channel_capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            cache_name,
            listeners: RwLock::new(Vec::new()),
            worker: Mutex::new(None),
            broadcast,
        }
    }

    pub(crate) fn register(&self, configuration: ListenerConfiguration<K, V>) -> ListenerId {
        let id = ListenerId::new();
        if !configuration.is_synchronous() {
            self.ensure_worker();
        }
        debug!(
            cache = %self.cache_name,
            listener_id = %id,
            synchronous = configuration.is_synchronous(),
            "Registered cache entry listener"
        );
        self.listeners.write().push((id, configuration));
        id
    }

    pub(crate) fn deregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(cache = %self.cache_name, listener_id = %id, "Deregistered cache entry listener");
        }
        removed
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<CacheEntryEvent<K, V>> {
        self.broadcast.subscribe()
    }

    pub(crate) fn dispatch(&self, events: Vec<CacheEntryEvent<K, V>>) {
        if events.is_empty() {
            return;
        }

        // Snapshot so listeners can register/deregister from inside a callback
        let listeners: Vec<ListenerConfiguration<K, V>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, configuration)| configuration.clone())
            .collect();

        for event in events {
            trace!(
                cache = %self.cache_name,
                event = %event.event_type,
                key = ?event.key,
                "Dispatching cache entry event"
            );

            let event = Arc::new(event);
            for configuration in listeners.iter().filter(|c| c.wants(event.event_type)) {
                if configuration.is_synchronous() {
                    deliver(&self.cache_name, configuration.listener.as_ref(), &event);
                } else {
                    self.send_async(Arc::clone(&configuration.listener), Arc::clone(&event));
                }
            }

            // No subscribers is fine; events are published regardless
            let _ = self.broadcast.send(event.as_ref().clone());
        }
    }

    fn send_async(
        &self,
        listener: Arc<dyn CacheEntryListener<K, V>>,
        event: Arc<CacheEntryEvent<K, V>>,
    ) {
        let worker = self.worker.lock();
        match worker.as_ref() {
            Some(worker) => {
                if worker
                    .sender
                    .send(DispatchMessage::Deliver { listener, event })
                    .is_err()
                {
                    warn!(cache = %self.cache_name, "Asynchronous listener worker has stopped; event dropped");
                }
            }
            None => {
                warn!(cache = %self.cache_name, "No asynchronous listener worker; event dropped");
            }
        }
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (sender, receiver) = channel::unbounded();
        let cache_name = Arc::clone(&self.cache_name);
        let spawned = thread::Builder::new()
            .name(format!("cache-events-{cache_name}"))
            .spawn(move || run_worker(cache_name, receiver));

        match spawned {
            Ok(handle) => *worker = Some(AsyncWorker { sender, handle }),
            Err(e) => warn!(
                cache = %self.cache_name,
                error = %e,
                "Failed to start asynchronous listener worker"
            ),
        }
    }

    /// Stop the asynchronous worker after it drains queued events
    pub(crate) fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.sender.send(DispatchMessage::Shutdown);
            // A listener closing its own cache runs on the worker thread
            if worker.handle.thread().id() != thread::current().id() {
                let _ = worker.handle.join();
            }
        }
        self.listeners.write().clear();
    }
}

fn run_worker<K, V>(cache_name: Arc<str>, receiver: Receiver<DispatchMessage<K, V>>) {
    debug!(cache = %cache_name, "Asynchronous listener worker started");
    while let Ok(message) = receiver.recv() {
        match message {
            DispatchMessage::Deliver { listener, event } => {
                deliver(&cache_name, listener.as_ref(), &event);
            }
            DispatchMessage::Shutdown => break,
        }
    }
    debug!(cache = %cache_name, "Asynchronous listener worker stopped");
}

fn deliver<K, V>(
    cache_name: &str,
    listener: &dyn CacheEntryListener<K, V>,
    event: &CacheEntryEvent<K, V>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
    if outcome.is_err() {
        log_error(
            "cache.listener",
            event.event_type.as_str(),
            "listener panicked; continuing with remaining listeners",
            Some(cache_name),
        );
    }
}
