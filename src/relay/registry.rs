use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{Span, debug};

use super::connection::Connection;

/// Maps a user identity to its current live connection. Lookups share the lock,
/// mutations take it exclusively and never hold it across I/O.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    span: Span,
}

impl ConnectionRegistry {
    pub fn new(span: Span) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            span,
        }
    }

    /// Last writer wins. The superseded connection, if any, is handed back and left
    /// open; closing it is the caller's call.
    pub fn register(&self, identity: impl Into<String>, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let identity = identity.into();
        debug!(parent: &self.span, %identity, connection = %connection.id(), "registering connection");
        self.connections.write().insert(identity, connection)
    }

    /// Idempotent.
    pub fn remove(&self, identity: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(identity);
        if removed.is_some() {
            debug!(parent: &self.span, %identity, "removed connection");
        }
        removed
    }

    /// Removes the entry only while it still points at `connection`, so a closing
    /// socket cannot evict the connection that replaced it.
    pub fn remove_if_current(&self, identity: &str, connection: &Arc<Connection>) -> bool {
        let mut connections = self.connections.write();
        let current = connections
            .get(identity)
            .is_some_and(|registered| Arc::ptr_eq(registered, connection));
        if current {
            connections.remove(identity);
            debug!(parent: &self.span, %identity, connection = %connection.id(), "released connection");
        }
        current
    }

    pub fn lookup(&self, identity: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn identities(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Span::none())
    }
}
