use std::{any::Any, future::Future, panic::AssertUnwindSafe, pin::Pin, sync::Arc};

use async_trait::async_trait;
use axum::{
    BoxError,
    extract::ws::{Message as Frame, WebSocket},
};
use futures_util::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::{
    sync::{Mutex as WriteLock, watch},
    task::JoinHandle,
};
use tracing::{Instrument, Span, debug, error, info_span, warn};
use uuid::Uuid;

use crate::error::RelayError;

use super::envelope::{Envelope, Outbound};

type FrameSink = Pin<Box<dyn Sink<Frame, Error = axum::Error> + Send>>;
type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, axum::Error>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Receives every envelope the read loop decodes. An error is reported back to the
/// peer as an `error` envelope and the loop keeps going.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Result<(), RelayError>;
}

/// One live socket. Writes are serialized through `writer`; only `listen` reads.
pub struct Connection {
    id: Uuid,
    identity: String,
    writer: WriteLock<Option<FrameSink>>,
    reader: Mutex<Option<FrameStream>>,
    state: watch::Sender<ConnectionState>,
    outbox: Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

impl Connection {
    pub fn new(identity: impl Into<String>, socket: WebSocket, parent: &Span) -> Arc<Self> {
        let (sink, stream) = socket.split();
        Self::from_parts(identity, sink, stream, parent)
    }

    /// Builds a connection over any frame sink/stream pair, e.g. the two halves of a
    /// split socket.
    pub fn from_parts<Si, St, E>(identity: impl Into<String>, sink: Si, stream: St, parent: &Span) -> Arc<Self>
    where
        Si: Sink<Frame> + Send + 'static,
        Si::Error: Into<BoxError>,
        St: Stream<Item = Result<Frame, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let id = Uuid::now_v7();
        let identity = identity.into();
        let span = info_span!(parent: parent, "connection", %id, %identity);

        let sink = sink.sink_map_err(|err| axum::Error::new(err));
        let stream = stream.map(|frame| frame.map_err(axum::Error::new));

        Arc::new(Self {
            id,
            identity,
            writer: WriteLock::new(Some(Box::pin(sink))),
            reader: Mutex::new(Some(Box::pin(stream))),
            state: watch::Sender::new(ConnectionState::Open),
            outbox: Mutex::new(None),
            span,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Writes one frame. A failure here does not change the state; the read loop
    /// decides when the connection is dead.
    pub async fn send(&self, frame: Frame) -> Result<(), RelayError> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(RelayError::TransportUnavailable("connection closed".to_owned()));
        };

        sink.send(frame)
            .await
            .map_err(|err| RelayError::TransportUnavailable(err.to_string()))
    }

    pub async fn push(&self, outbound: &Outbound<'_>) -> Result<(), RelayError> {
        let text = outbound
            .encode()
            .map_err(|err| RelayError::TransportUnavailable(format!("unencodable frame: {err}")))?;
        self.send(Frame::Text(text.into())).await
    }

    /// Runs `job` on a detached task once every job queued before it has finished.
    /// Returns immediately; jobs for one connection keep their queueing order.
    pub fn enqueue<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut outbox = self.outbox.lock();
        let previous = outbox.take();
        *outbox = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                // a panicked job must not stall the ones behind it
                let _ = previous.await;
            }
            job.await;
        }));
    }

    /// Asks the connection to shut down. The terminal signal fires once the
    /// transport has been released.
    pub async fn close(&self) {
        if !self.begin_closing() {
            return;
        }
        debug!(parent: &self.span, "close requested");

        // a running read loop notices the state change and finishes on its own
        let idle = self.reader.lock().take();
        if let Some(stream) = idle {
            drop(stream);
            self.finish().await;
        }
    }

    /// Resolves once the connection reached `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    /// Runs the read loop until the peer closes, the transport fails or `close` is
    /// called. Faults inside the loop end in an orderly close instead of unwinding
    /// into the caller.
    pub async fn listen<H>(&self, handler: &H)
    where
        H: EnvelopeHandler + ?Sized,
    {
        let stream = self.reader.lock().take();
        let Some(stream) = stream else {
            warn!(parent: &self.span, "read loop already running or connection closed");
            return;
        };

        let outcome = AssertUnwindSafe(self.read_loop(stream, handler))
            .catch_unwind()
            .instrument(self.span.clone())
            .await;
        if let Err(fault) = outcome {
            error!(parent: &self.span, fault = panic_message(&*fault), "read loop fault, closing connection");
        }

        self.begin_closing();
        self.finish().await;
    }

    async fn read_loop<H>(&self, mut stream: FrameStream, handler: &H)
    where
        H: EnvelopeHandler + ?Sized,
    {
        let mut state = self.state.subscribe();

        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = state.wait_for(|state| *state != ConnectionState::Open).map(|_| ()) => {
                    debug!("stopping read loop on close request");
                    break;
                }
            };

            match frame {
                Some(Ok(Frame::Text(text))) => self.dispatch(text.as_str().as_bytes(), handler).await,
                Some(Ok(Frame::Binary(bytes))) => self.dispatch(&bytes, handler).await,
                Some(Ok(Frame::Close(close))) => {
                    debug!(?close, "peer closed connection");
                    break;
                }
                // ping/pong are answered by the transport
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%err, "read failed");
                    break;
                }
                None => {
                    debug!("transport ended");
                    break;
                }
            }
        }
    }

    async fn dispatch<H>(&self, frame: &[u8], handler: &H)
    where
        H: EnvelopeHandler + ?Sized,
    {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "undecodable envelope");
                self.report(err.to_string()).await;
                return;
            }
        };

        if let Err(err) = handler.handle(envelope).await {
            if err.is_client_error() {
                debug!(%err, "envelope rejected");
            } else {
                warn!(%err, "envelope handler failed");
            }
            self.report(err.to_string()).await;
        }
    }

    async fn report(&self, error: String) {
        if self.state() != ConnectionState::Open {
            return;
        }
        if let Err(err) = self.push(&Outbound::Error { error }).await {
            debug!(%err, "could not report error to peer");
        }
    }

    fn begin_closing(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        })
    }

    async fn finish(&self) {
        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(err) = sink.close().await {
                debug!(parent: &self.span, %err, "transport close failed");
            }
        }

        let fired = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        if fired {
            debug!(parent: &self.span, "connection closed");
        }
    }
}

fn panic_message(fault: &(dyn Any + Send)) -> &str {
    fault
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| fault.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown fault")
}
