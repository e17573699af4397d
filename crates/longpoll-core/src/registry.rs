use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::ids::ClientId;
use crate::mailbox::Mailbox;

/// A subscribed client: its mailbox plus the last time it polled.
struct ClientEntry {
    mailbox: Arc<Mailbox>,
    last_seen: Instant,
}

impl ClientEntry {
    fn new() -> Self {
        Self {
            mailbox: Arc::new(Mailbox::new()),
            last_seen: Instant::now(),
        }
    }
}

/// Registry of subscribed clients, keyed by caller-supplied id.
///
/// One lock guards the whole map. Creation, refresh and eviction take it
/// exclusively so there is never more than one entry per id; plain lookups
/// share it. Callers wait on the returned mailbox after the lock is released.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
    evicted_total: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the client's mailbox, creating the entry if needed, and mark
    /// the client as seen now. The flag is `true` when the entry was created.
    pub fn get_or_create(&self, id: &ClientId) -> (Arc<Mailbox>, bool) {
        let mut clients = self.clients.write();
        if let Some(entry) = clients.get_mut(id) {
            entry.last_seen = Instant::now();
            return (Arc::clone(&entry.mailbox), false);
        }

        let entry = ClientEntry::new();
        let mailbox = Arc::clone(&entry.mailbox);
        clients.insert(id.clone(), entry);
        tracing::info!(client_id = %id, active = clients.len(), "Client subscribed");
        (mailbox, true)
    }

    /// Look a client up without refreshing its activity.
    pub fn lookup(&self, id: &ClientId) -> Option<Arc<Mailbox>> {
        self.clients
            .read()
            .get(id)
            .map(|entry| Arc::clone(&entry.mailbox))
    }

    /// Remove every client idle for longer than `threshold` and close its
    /// mailbox. Returns the number removed.
    pub fn evict_idle(&self, threshold: Duration) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.write();
        let idle: Vec<ClientId> = clients
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > threshold)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &idle {
            if let Some(entry) = clients.remove(id) {
                entry.mailbox.close();
                tracing::info!(
                    client_id = %id,
                    remaining = clients.len(),
                    "Cleaned up inactive client"
                );
            }
        }

        self.evicted_total
            .fetch_add(idle.len() as u64, Ordering::Relaxed);
        idle.len()
    }

    /// When the client last polled, if it is registered.
    pub fn last_seen(&self, id: &ClientId) -> Option<Instant> {
        self.clients.read().get(id).map(|entry| entry.last_seen)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.read().contains_key(id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total entries removed by sweeps since startup.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total.load(Ordering::Relaxed)
    }
}
