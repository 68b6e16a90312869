pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::message::{Message, NewMessage};

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    NewestFirst,
    OldestFirst,
}

/// Durable message persistence. Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a new unread message stamped with `at` and returns its id.
    async fn insert_message(&self, message: &NewMessage, at: OffsetDateTime) -> Result<String, StoreError>;

    /// Messages exchanged between the pair in either direction, ordered by `created_at`.
    async fn find_between(&self, user_a: &str, user_b: &str, limit: u32, order: Order) -> Result<Vec<Message>, StoreError>;

    /// Flags every unread `from_id -> to_id` message as read; returns how many changed.
    async fn mark_read(&self, from_id: &str, to_id: &str, at: OffsetDateTime) -> Result<u64, StoreError>;

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
