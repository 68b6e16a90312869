use std::time::Duration;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::message::{Message, NewMessage};

use super::{MessageStore, Order, StoreError};

const MIGRATIONS: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id         TEXT PRIMARY KEY,
        from_id    TEXT NOT NULL,
        to_id      TEXT NOT NULL,
        content    TEXT NOT NULL,
        read       INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );"#,
    "CREATE INDEX IF NOT EXISTS messages_pair ON messages (from_id, to_id, created_at);",
    "CREATE INDEX IF NOT EXISTS messages_unread ON messages (to_id, read);",
];

const SELECT_BETWEEN_DESC: &str = "SELECT id,from_id,to_id,content,read,created_at,updated_at FROM messages \
    WHERE (from_id=? AND to_id=?) OR (from_id=? AND to_id=?) \
    ORDER BY created_at DESC, rowid DESC LIMIT ?";

const SELECT_BETWEEN_ASC: &str = "SELECT id,from_id,to_id,content,read,created_at,updated_at FROM messages \
    WHERE (from_id=? AND to_id=?) OR (from_id=? AND to_id=?) \
    ORDER BY created_at ASC, rowid ASC LIMIT ?";

type MessageRow = (String, String, String, String, bool, i64, i64);

#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let mut options = SqlitePoolOptions::new().max_connections(max_connections);
        if database_url.contains(":memory:") {
            // every pooled connection to :memory: is a separate database
            options = options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let db_pool = options.connect(database_url).await?;
        Ok(Self::new(db_pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.db_pool).await?;
        }
        Ok(())
    }
}

fn to_nanos(at: OffsetDateTime) -> Result<i64, StoreError> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| StoreError::Corrupt(format!("timestamp {at} out of range")))
}

fn from_nanos(nanos: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
        .map_err(|err| StoreError::Corrupt(format!("timestamp {nanos}: {err}")))
}

fn row_to_message((id, from_id, to_id, content, read, created_at, updated_at): MessageRow) -> Result<Message, StoreError> {
    Ok(Message {
        id,
        from_id,
        to_id,
        content,
        read,
        created_at: from_nanos(created_at)?,
        updated_at: from_nanos(updated_at)?,
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, message: &NewMessage, at: OffsetDateTime) -> Result<String, StoreError> {
        let id = Uuid::now_v7().to_string();
        let at = to_nanos(at)?;

        sqlx::query("INSERT INTO messages (id,from_id,to_id,content,read,created_at,updated_at) VALUES (?,?,?,?,0,?,?)")
            .bind(&id)
            .bind(&message.from_id)
            .bind(&message.to_id)
            .bind(&message.content)
            .bind(at)
            .bind(at)
            .execute(&self.db_pool)
            .await?;

        Ok(id)
    }

    async fn find_between(&self, user_a: &str, user_b: &str, limit: u32, order: Order) -> Result<Vec<Message>, StoreError> {
        let sql = match order {
            Order::NewestFirst => SELECT_BETWEEN_DESC,
            Order::OldestFirst => SELECT_BETWEEN_ASC,
        };

        let rows: Vec<MessageRow> = sqlx::query_as(sql)
            .bind(user_a)
            .bind(user_b)
            .bind(user_b)
            .bind(user_a)
            .bind(i64::from(limit))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn mark_read(&self, from_id: &str, to_id: &str, at: OffsetDateTime) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE messages SET read=1, updated_at=MAX(updated_at, ?) WHERE from_id=? AND to_id=? AND read=0")
            .bind(to_nanos(at)?)
            .bind(from_id)
            .bind(to_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE to_id=? AND read=0")
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}
