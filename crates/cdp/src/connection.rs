//! Request/response correlation over one physical transport.
//!
//! One writer task drains an internal queue so outbound frames are never
//! interleaved. One read task decodes inbound frames: responses resolve
//! their pending call inline (O(1), non-blocking); events are handed to
//! the bus, whose per-subscriber buffers keep slow consumers off the read
//! path. A malformed or unmatched frame is logged, counted, and skipped -
//! it never terminates the connection.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ConnectionConfig;
use crate::error::{CdpError, Result};
use crate::events::{DomainFilter, EventBus, EventStream, SessionScope};
use crate::protocol::{self, CallFrame, Message, RequestId, ResponseFrame, SessionId};
use crate::session::SessionShared;
use crate::transport::{Transport, TransportSink, TransportStream, WebSocketTransport};

/// Anything that can issue a protocol call: the connection itself
/// (browser-level) or a session (auto-tagged). Typed domain accessors are
/// written against this seam.
#[async_trait]
pub trait Caller: Send + Sync {
    /// Issue one call and return its raw result payload.
    async fn call_method(&self, method: &str, params: Option<Value>) -> Result<Value>;
}

struct PendingCall {
    tx: oneshot::Sender<Result<Value>>,
    session_id: Option<SessionId>,
    method: String,
    issued_at: Instant,
}

/// Read-path diagnostics. These anomalies are non-fatal and invisible to
/// callers; the counters are the countable signal they leave behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Inbound frames that failed to decode and were skipped.
    pub parse_errors: u64,
    /// Responses whose id matched no outstanding call.
    pub correlation_errors: u64,
}

#[derive(Default)]
struct StatsInner {
    parse_errors: AtomicU64,
    correlation_errors: AtomicU64,
}

/// One physical connection to a debuggee.
///
/// Owns the frame codec, the pending-call table, and the event bus.
/// Sessions are views over this connection and never outlive it. Share it
/// across tasks with `Arc`; any number of callers may `call` and
/// `subscribe` concurrently.
pub struct Connection {
    next_id: AtomicI64,
    pending: DashMap<RequestId, PendingCall>,
    bus: EventBus,
    pub(crate) sessions: DashMap<SessionId, Arc<SessionShared>>,
    outbound: mpsc::Sender<String>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    stats: StatsInner,
    config: ConnectionConfig,
}

impl Connection {
    /// Connect to a WebSocket debugger endpoint and spawn the engine
    /// tasks.
    pub async fn connect(endpoint: &str, config: ConnectionConfig) -> Result<Arc<Self>> {
        let transport = WebSocketTransport::connect(endpoint).await?;
        Ok(Self::new(Box::new(transport), config))
    }

    /// Take ownership of an already-connected transport and spawn the
    /// engine tasks.
    pub fn new(transport: Box<dyn Transport>, config: ConnectionConfig) -> Arc<Self> {
        let (sink, stream) = transport.split();
        let (outbound, outbound_rx) = mpsc::channel(64);
        let (shutdown, _) = watch::channel(false);

        let connection = Arc::new(Self {
            next_id: AtomicI64::new(0),
            pending: DashMap::new(),
            bus: EventBus::new(config.event_buffer),
            sessions: DashMap::new(),
            outbound,
            shutdown,
            closed: AtomicBool::new(false),
            stats: StatsInner::default(),
            config,
        });

        tokio::spawn(write_loop(
            sink,
            outbound_rx,
            connection.shutdown.subscribe(),
        ));
        tokio::spawn(read_loop(
            Arc::clone(&connection),
            stream,
            connection.shutdown.subscribe(),
        ));

        connection
    }

    /// Issue a call and decode its result into `R`.
    ///
    /// Resolves exactly once: with the decoded result of the matching
    /// response, with the debuggee's error as [`CdpError::Remote`], or
    /// with [`CdpError::ConnectionClosed`] if the connection goes away
    /// first. Dropping the returned future abandons the call and frees
    /// its bookkeeping.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R> {
        let value = self.call_value(method, params, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) async fn call_value(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(CdpError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();

        // Bookkeeping exists before any bytes leave, so a response cannot
        // arrive ahead of it.
        self.pending.insert(
            id,
            PendingCall {
                tx,
                session_id: session_id.clone(),
                method: method.to_string(),
                issued_at: Instant::now(),
            },
        );
        let guard = PendingGuard { connection: self, id };

        // Re-check after insert: a concurrent close drains the table only
        // after setting the flag, so one of the two paths sees this entry.
        if self.is_closed() {
            return Err(CdpError::ConnectionClosed);
        }
        if let Some(sid) = &session_id {
            let live = self
                .sessions
                .get(sid)
                .map(|s| !s.is_detached())
                .unwrap_or(false);
            if !live {
                return Err(CdpError::SessionClosed);
            }
        }

        let frame = CallFrame {
            id,
            method: method.to_string(),
            params,
            session_id,
        };
        let encoded = protocol::encode_call(&frame)?;
        self.outbound
            .send(encoded)
            .await
            .map_err(|_| CdpError::ConnectionClosed)?;

        let received = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => return Err(CdpError::Timeout),
            },
            None => rx.await,
        };
        drop(guard);

        match received {
            Ok(outcome) => outcome,
            // sender dropped without resolving: the connection tore down
            Err(_) => Err(CdpError::ConnectionClosed),
        }
    }

    /// Subscribe to events.
    pub fn subscribe(&self, filter: DomainFilter, scope: SessionScope) -> Result<EventStream> {
        if self.is_closed() || self.bus.is_closed() {
            return Err(CdpError::ConnectionClosed);
        }
        Ok(self.bus.subscribe(filter, scope))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Outstanding calls across all sessions.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            parse_errors: self.stats.parse_errors.load(Ordering::Relaxed),
            correlation_errors: self.stats.correlation_errors.load(Ordering::Relaxed),
        }
    }

    /// Close the connection. Runs exactly once no matter how many times
    /// or from where it is invoked: stops both engine tasks, rejects
    /// every outstanding call with [`CdpError::ConnectionClosed`], ends
    /// every event stream, detaches every session, and makes further
    /// `call`/`subscribe` fail fast without touching the transport.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(outstanding = self.pending.len(), "closing connection");

        let _ = self.shutdown.send(true);

        for entry in self.sessions.iter() {
            entry.value().mark_detached();
        }
        self.sessions.clear();

        self.reject_pending(|_| true, || CdpError::ConnectionClosed);
        self.bus.close();
    }

    /// Rejects every pending call the predicate selects. `error` is built
    /// fresh per call since the variants are not `Clone`.
    fn reject_pending(
        &self,
        select: impl Fn(&PendingCall) -> bool,
        error: impl Fn() -> CdpError,
    ) {
        let selected: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| select(entry.value()))
            .map(|entry| *entry.key())
            .collect();
        for id in selected {
            if let Some((_, call)) = self.pending.remove(&id) {
                tracing::debug!(id, method = %call.method, "rejecting pending call");
                let _ = call.tx.send(Err(error()));
            }
        }
    }

    /// Session detach: fail that session's in-flight calls and drop its
    /// scoped subscriptions.
    pub(crate) fn evict_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.reject_pending(
            |call| call.session_id.as_deref() == Some(session_id),
            || CdpError::SessionClosed,
        );
        self.bus.cancel_session(session_id);
    }

    fn handle_frame(&self, raw: &str) {
        match protocol::decode(raw) {
            Ok(Message::Response(response)) => self.resolve(response),
            Ok(Message::Event(event)) => {
                tracing::trace!(method = %event.method, session_id = ?event.session_id, "event");
                self.bus.publish(event);
            }
            Err(e) => {
                self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "dropping malformed frame");
            }
        }
    }

    fn resolve(&self, response: ResponseFrame) {
        match self.pending.remove(&response.id) {
            Some((_, call)) => {
                tracing::trace!(
                    id = response.id,
                    method = %call.method,
                    elapsed = ?call.issued_at.elapsed(),
                    "call resolved"
                );
                let outcome = match response.error {
                    Some(error) => Err(CdpError::Remote {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                // the caller may have abandoned the call; its loss
                let _ = call.tx.send(outcome);
            }
            None => {
                self.stats.correlation_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(id = response.id, "response with no matching call");
            }
        }
    }
}

#[async_trait]
impl Caller for Connection {
    async fn call_method(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_value(method, params, None).await
    }
}

/// Removes the pending entry if the call is abandoned (future dropped,
/// timeout) before a response consumed it. Ids are never reused, so a
/// remove after normal resolution is a no-op.
struct PendingGuard<'a> {
    connection: &'a Connection,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.connection.pending.remove(&self.id);
    }
}

async fn write_loop(
    mut sink: Box<dyn TransportSink>,
    mut outbound: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        tracing::warn!(error = %e, "transport write failed");
                        break;
                    }
                }
                None => break,
            }
        }
    }
    sink.close().await;
    tracing::debug!("writer stopped");
}

async fn read_loop(
    connection: Arc<Connection>,
    mut stream: Box<dyn TransportStream>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = stream.next() => match frame {
                Some(Ok(raw)) => connection.handle_frame(&raw),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "transport read failed");
                    break;
                }
                None => {
                    tracing::debug!("transport closed by peer");
                    break;
                }
            }
        }
    }
    // transport-initiated teardown and local close() converge here
    connection.close();
    tracing::debug!("read loop stopped");
}
