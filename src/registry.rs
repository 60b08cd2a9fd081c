//! Connection registry
//!
//! The set of live connections. Membership changes are serialized behind a
//! mutex; fan-out iterates a snapshot taken under the lock and delivers after
//! releasing it, so a connection removed mid-fan-out only costs one failed
//! (and ignored) send.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use tracing::debug;

use crate::{
    error::{DeliveryError, RelayError},
    model::connection::{Connection, ConnectionId, Outbound},
};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly attached peer and assign its id.
    pub fn add(&self, outbound: Outbound) -> Result<ConnectionId, RelayError> {
        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(ConnectionId)
            .map_err(|_| RelayError::IdsExhausted)?;

        self.lock().insert(id, Connection::new(id, outbound));
        Ok(id)
    }

    /// Remove a connection. Removing an absent id is a no-op and returns `None`.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.lock().remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Call `f` once for every connection except `exclude`.
    ///
    /// A failing `f` is logged and delivery continues with the rest. Returns the
    /// number of successful calls.
    pub fn for_each_other<F>(&self, exclude: ConnectionId, f: F) -> usize
    where
        F: FnMut(&Connection) -> Result<(), DeliveryError>,
    {
        Self::deliver(self.snapshot(Some(exclude)), f)
    }

    /// Like [`for_each_other`](Self::for_each_other), with no exclusion.
    pub fn for_each_all<F>(&self, f: F) -> usize
    where
        F: FnMut(&Connection) -> Result<(), DeliveryError>,
    {
        Self::deliver(self.snapshot(None), f)
    }

    fn snapshot(&self, exclude: Option<ConnectionId>) -> Vec<Connection> {
        let mut connections: Vec<Connection> = self
            .lock()
            .values()
            .filter(|c| Some(c.id) != exclude)
            .cloned()
            .collect();
        // Registry order is connect order.
        connections.sort_by_key(|c| c.id);
        connections
    }

    fn deliver<F>(connections: Vec<Connection>, mut f: F) -> usize
    where
        F: FnMut(&Connection) -> Result<(), DeliveryError>,
    {
        let mut delivered = 0;
        for connection in &connections {
            match f(connection) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Delivery to client ({}) failed: {}", connection.id, e),
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
