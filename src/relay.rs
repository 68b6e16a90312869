pub mod connection;
pub mod envelope;
pub mod registry;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::extract::ws::{Message as Frame, WebSocket};
use time::OffsetDateTime;
use tracing::{Span, debug, info, warn};

use crate::{
    error::RelayError,
    limit,
    message::{Message, NewMessage},
    store::{MessageStore, Order},
    validate::{validate_content, validate_identity, validate_participants},
};

pub use connection::{Connection, ConnectionState, EnvelopeHandler};
pub use envelope::{Envelope, EnvelopeError, Outbound};
pub use registry::ConnectionRegistry;

pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Persists messages and forwards them to online recipients.
///
/// Persistence is the source of truth: once a message is stored the send has
/// succeeded. The live push that follows runs detached and can only be logged.
pub struct Relay {
    store: Arc<dyn MessageStore>,
    registry: ConnectionRegistry,
    push_timeout: Duration,
    span: Span,
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, span: Span) -> Self {
        let registry = ConnectionRegistry::new(span.clone());
        Self {
            store,
            registry,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            span,
        }
    }

    pub fn with_push_timeout(mut self, push_timeout: Duration) -> Self {
        self.push_timeout = push_timeout;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn send_message(&self, message: NewMessage) -> Result<Message, RelayError> {
        validate_identity(&message.from_id)?;
        validate_identity(&message.to_id)?;
        validate_content(&message.content)?;
        validate_participants(&message.from_id, &message.to_id)?;

        let at = OffsetDateTime::now_utc();
        let id = self.store.insert_message(&message, at).await.map_err(|err| {
            warn!(parent: &self.span, %err, from = %message.from_id, to = %message.to_id, "failed to persist message");
            RelayError::PersistenceFailed(err)
        })?;

        let message = message.into_record(id, at);
        debug!(parent: &self.span, id = %message.id, from = %message.from_id, to = %message.to_id, "message persisted");

        self.push(&message);
        Ok(message)
    }

    /// Hands the message to the recipient's connection without waiting for the write.
    fn push(&self, message: &Message) {
        let Some(connection) = self.registry.lookup(&message.to_id) else {
            debug!(parent: &self.span, id = %message.id, "recipient offline, skipping push");
            return;
        };

        let text = match (Outbound::Message { content: message }).encode() {
            Ok(text) => text,
            Err(err) => {
                warn!(parent: &self.span, id = %message.id, %err, "could not encode message for push");
                return;
            }
        };

        let id = message.id.clone();
        let push_timeout = self.push_timeout;
        let span = self.span.clone();
        let target = Arc::clone(&connection);
        connection.enqueue(async move {
            match tokio::time::timeout(push_timeout, target.send(Frame::Text(text.into()))).await {
                Ok(Ok(())) => {
                    debug!(parent: &span, %id, connection = %target.id(), "message pushed");
                }
                Ok(Err(err)) => {
                    warn!(parent: &span, %id, %err, "live push failed");
                }
                Err(_) => {
                    warn!(parent: &span, %id, timeout = ?push_timeout, "live push timed out");
                }
            }
        });
    }

    /// Newest first, at most `limit` after clamping.
    pub async fn get_conversation(&self, user_a: &str, user_b: &str, limit: i64) -> Result<Vec<Message>, RelayError> {
        validate_identity(user_a)?;
        validate_identity(user_b)?;
        validate_participants(user_a, user_b)?;

        self.store
            .find_between(user_a, user_b, limit::clamp(limit), Order::NewestFirst)
            .await
            .map_err(|err| self.persistence_failed("find_between", err))
    }

    /// Marks everything `from_id` sent to `to_id` as read and returns how many
    /// messages changed. A repeated call affects nothing.
    pub async fn mark_as_read(&self, from_id: &str, to_id: &str) -> Result<u64, RelayError> {
        validate_identity(from_id)?;
        validate_identity(to_id)?;

        let updated = self
            .store
            .mark_read(from_id, to_id, OffsetDateTime::now_utc())
            .await
            .map_err(|err| self.persistence_failed("mark_read", err))?;
        debug!(parent: &self.span, %from_id, %to_id, updated, "marked messages as read");
        Ok(updated)
    }

    pub async fn get_unread_count(&self, user_id: &str) -> Result<u64, RelayError> {
        validate_identity(user_id)?;

        self.store
            .count_unread(user_id)
            .await
            .map_err(|err| self.persistence_failed("count_unread", err))
    }

    pub async fn ping_store(&self) -> Result<(), RelayError> {
        self.store.ping().await.map_err(RelayError::PersistenceFailed)
    }

    fn persistence_failed(&self, operation: &'static str, err: crate::store::StoreError) -> RelayError {
        warn!(parent: &self.span, operation, %err, "store operation failed");
        RelayError::PersistenceFailed(err)
    }

    pub fn open_connection(&self, identity: impl Into<String>, socket: WebSocket) -> Arc<Connection> {
        Connection::new(identity, socket, &self.span)
    }

    /// Registers `connection` under its identity. A connection it replaces is closed.
    pub async fn register_connection(&self, connection: Arc<Connection>) {
        let identity = connection.identity().to_owned();
        let previous = self.registry.register(identity.clone(), Arc::clone(&connection));

        if let Some(previous) = previous.filter(|previous| !Arc::ptr_eq(previous, &connection)) {
            info!(parent: &self.span, %identity, superseded = %previous.id(), "closing superseded connection");
            previous.close().await;
        }
    }

    pub fn remove_connection(&self, identity: &str) -> bool {
        self.registry.remove(identity).is_some()
    }

    /// Drives one connection for its whole life: register, read until it closes,
    /// then drop the registration if it is still ours.
    pub async fn serve(&self, connection: Arc<Connection>) {
        self.register_connection(Arc::clone(&connection)).await;
        info!(parent: &self.span, identity = %connection.identity(), connection = %connection.id(), "connection opened");

        let session = Session { relay: self, identity: connection.identity() };
        connection.listen(&session).await;
        connection.closed().await;

        self.registry.remove_if_current(connection.identity(), &connection);
        info!(parent: &self.span, identity = %connection.identity(), connection = %connection.id(), "connection finished");
    }
}

/// Inbound envelopes of one authenticated caller.
struct Session<'a> {
    relay: &'a Relay,
    identity: &'a str,
}

#[async_trait]
impl EnvelopeHandler for Session<'_> {
    async fn handle(&self, envelope: Envelope) -> Result<(), RelayError> {
        match envelope {
            Envelope::Message(mut message) => {
                // never trust the sender field from the wire
                message.from_id = self.identity.to_owned();
                self.relay.send_message(message).await.map(|_| ())
            }
            Envelope::Typing => Ok(()),
        }
    }
}
