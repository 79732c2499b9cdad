//! Thread-safe registry of connected SSE clients, each with a bounded
//! delivery channel (component C4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::event_store::{EventStore, SseEvent};

/// Capacity of each client's bounded delivery channel.
const CLIENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the registry's shared event replay store.
const EVENT_STORE_CAPACITY: usize = 1000;

struct RegisteredClient {
    sender: mpsc::Sender<SseEvent>,
    created_at: DateTime<Utc>,
    last_event_id: Option<String>,
}

/// A read-only snapshot of a registered client's metadata.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_event_id: Option<String>,
}

/// The receiver half handed back to the caller of [`ClientRegistry::add`].
/// Dropping it (or letting the registry remove the client) is what makes the
/// `recv()` loop observe the channel closing.
pub struct Client {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_event_id: Option<String>,
    pub receiver: mpsc::Receiver<SseEvent>,
}

/// Owns the event store and the set of connected clients. `broadcast` only
/// ever takes the read lock: non-blocking per-client sends mean a slow
/// consumer can never stall delivery to the others.
pub struct ClientRegistry {
    store: EventStore,
    clients: RwLock<HashMap<String, RegisteredClient>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_STORE_CAPACITY)
    }

    pub fn with_capacity(event_store_capacity: usize) -> Self {
        Self {
            store: EventStore::new(event_store_capacity),
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn event_store(&self) -> &EventStore {
        &self.store
    }

    /// Register a new client and return its handle, including the receiver
    /// half of its delivery channel.
    pub fn add(&self, last_event_id: Option<String>) -> Client {
        let id = format!("client-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let created_at = Utc::now();

        self.clients.write().expect("client registry lock poisoned").insert(
            id.clone(),
            RegisteredClient {
                sender,
                created_at,
                last_event_id: last_event_id.clone(),
            },
        );

        Client {
            id,
            created_at,
            last_event_id,
            receiver,
        }
    }

    /// Idempotent: removing an id that is not present (already removed) is a
    /// no-op. Dropping the stored `Sender` is what closes the channel
    /// exactly once.
    pub fn remove(&self, id: &str) {
        self.clients.write().expect("client registry lock poisoned").remove(id);
    }

    pub fn get(&self, id: &str) -> Option<ClientInfo> {
        self.clients
            .read()
            .expect("client registry lock poisoned")
            .get(id)
            .map(|client| ClientInfo {
                id: id.to_string(),
                created_at: client.created_at,
                last_event_id: client.last_event_id.clone(),
            })
    }

    pub fn count(&self) -> usize {
        self.clients.read().expect("client registry lock poisoned").len()
    }

    /// Persist the event, then fan it out to every connected client with a
    /// non-blocking send. A full per-client buffer drops the event for that
    /// client only; the store and the other clients are unaffected.
    pub fn broadcast(&self, event: SseEvent) {
        self.store.add(event.clone());

        let clients = self.clients.read().expect("client registry lock poisoned");
        for (client_id, client) in clients.iter() {
            match client.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client_id = %client_id, event_id = %event.id, "dropping SSE event: client delivery buffer full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Client is disconnecting; its own exit path will call `remove`.
                }
            }
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
