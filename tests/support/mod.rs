#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::extract::ws::Message as Frame;
use chatrelay::{
    Message, NewMessage, Relay,
    relay::Connection,
    store::{MessageStore, Order, SqliteStore, StoreError},
};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::Span;
use uuid::Uuid;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn user() -> String {
    Uuid::new_v4().to_string()
}

/// The remote end of an in-process connection.
pub struct Peer {
    pub outgoing: UnboundedSender<Frame>,
    pub incoming: UnboundedReceiver<Frame>,
}

impl Peer {
    pub fn send_json(&self, value: Value) {
        self.outgoing.send(Frame::Text(value.to_string().into())).unwrap();
    }

    pub fn send_raw(&self, text: &str) {
        self.outgoing.send(Frame::Text(text.to_owned().into())).unwrap();
    }

    pub async fn next_json(&mut self) -> Value {
        let frame = tokio::time::timeout(WAIT, self.incoming.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection dropped its writer");
        match frame {
            Frame::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    /// Nothing queued right now.
    pub fn assert_quiet(&mut self) {
        match self.incoming.try_recv() {
            Ok(frame) => panic!("unexpected frame {frame:?}"),
            Err(_) => {}
        }
    }
}

pub fn connection(identity: &str) -> (Arc<Connection>, Peer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel::<Frame>();
    let (server_tx, client_rx) = mpsc::unbounded_channel::<Frame>();

    let sink = futures_util::sink::unfold(server_tx, |tx, frame: Frame| async move {
        tx.send(frame).map_err(|err| err.to_string())?;
        Ok::<_, String>(tx)
    });
    let stream = futures_util::stream::unfold(server_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok::<_, std::io::Error>(frame), rx))
    });

    let connection = Connection::from_parts(identity, sink, stream, &Span::none());
    let peer = Peer {
        outgoing: client_tx,
        incoming: client_rx,
    };
    (connection, peer)
}

/// A connection whose writes never complete and whose peer never speaks.
pub fn stalled_connection(identity: &str) -> Arc<Connection> {
    let sink = futures_util::sink::unfold((), |(), _frame: Frame| futures_util::future::pending::<Result<(), String>>());
    let stream = futures_util::stream::pending::<Result<Frame, std::io::Error>>();
    Connection::from_parts(identity, sink, stream, &Span::none())
}

pub async fn sqlite() -> SqliteStore {
    let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    store.migrate().await.unwrap();
    store
}

/// Wraps the SQLite store, counting inserts and optionally failing every call.
pub struct TestStore {
    inner: SqliteStore,
    pub inserts: AtomicUsize,
    pub failing: AtomicBool,
    pub stalled: AtomicBool,
}

impl TestStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: sqlite().await,
            inserts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        })
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes `ping` hang forever.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for TestStore {
    async fn insert_message(&self, message: &NewMessage, at: OffsetDateTime) -> Result<String, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.insert_message(message, at).await
    }

    async fn find_between(&self, user_a: &str, user_b: &str, limit: u32, order: Order) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        self.inner.find_between(user_a, user_b, limit, order).await
    }

    async fn mark_read(&self, from_id: &str, to_id: &str, at: OffsetDateTime) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.mark_read(from_id, to_id, at).await
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.count_unread(user_id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.check()?;
        self.inner.ping().await
    }
}

pub async fn relay() -> (Arc<Relay>, Arc<TestStore>) {
    let store = TestStore::new().await;
    let relay = Relay::new(store.clone(), Span::none()).with_push_timeout(Duration::from_millis(500));
    (Arc::new(relay), store)
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}
