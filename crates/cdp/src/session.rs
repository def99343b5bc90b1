//! Session routing - N logical sessions multiplexed over one physical
//! connection.
//!
//! A session is a view over the connection, bound to one remote target:
//! its calls are auto-tagged with the session id the debuggee assigned on
//! attach, and its subscriptions default to that session's scope. A
//! session never outlives its connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::connection::{Caller, Connection};
use crate::error::{CdpError, Result};
use crate::events::{DomainFilter, EventStream, SessionScope};
use crate::protocol::{SessionId, TargetId};

/// Lifecycle of an attached session. The attaching phase is the
/// in-flight [`Session::attach`] call itself - no session value exists
/// until the debuggee has assigned an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Attached,
    /// Terminal. Every operation on the session now fails fast with
    /// [`CdpError::SessionClosed`] without touching the transport.
    Detached,
}

pub(crate) struct SessionShared {
    session_id: SessionId,
    target_id: TargetId,
    attached_at: Instant,
    detached: AtomicBool,
}

impl SessionShared {
    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

#[derive(Deserialize)]
struct AttachReply {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
}

/// A logical channel to one target. Cheap to clone; clones share the
/// same lifecycle.
#[derive(Clone)]
pub struct Session {
    connection: Arc<Connection>,
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.shared.session_id)
            .field("target_id", &self.shared.target_id)
            .field("attached_at", &self.shared.attached_at)
            .field("detached", &self.shared.is_detached())
            .finish()
    }
}

impl Session {
    /// Attach to a target on `connection`. The debuggee assigns the
    /// session id in the handshake response; the returned session is
    /// live immediately.
    pub async fn attach(
        connection: Arc<Connection>,
        target_id: impl Into<TargetId>,
    ) -> Result<Session> {
        let target_id = target_id.into();
        let reply: AttachReply = connection
            .call(
                "Target.attachToTarget",
                Some(json!({ "targetId": target_id, "flatten": true })),
            )
            .await?;

        let shared = Arc::new(SessionShared {
            session_id: reply.session_id.clone(),
            target_id: target_id.clone(),
            attached_at: Instant::now(),
            detached: AtomicBool::new(false),
        });
        connection
            .sessions
            .insert(reply.session_id.clone(), Arc::clone(&shared));
        tracing::debug!(session_id = %reply.session_id, target_id = %target_id, "session attached");

        Ok(Session { connection, shared })
    }

    pub fn id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.shared.target_id
    }

    pub fn attached_at(&self) -> Instant {
        self.shared.attached_at
    }

    pub fn state(&self) -> SessionState {
        if self.shared.is_detached() {
            SessionState::Detached
        } else {
            SessionState::Attached
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Issue a call tagged with this session's id and decode its result.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R> {
        if self.shared.is_detached() {
            return Err(CdpError::SessionClosed);
        }
        let value = self
            .connection
            .call_value(method, params, Some(self.shared.session_id.clone()))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribe scoped to this session: only events tagged with its id.
    pub fn subscribe(&self, filter: DomainFilter) -> Result<EventStream> {
        if self.shared.is_detached() {
            return Err(CdpError::SessionClosed);
        }
        self.connection
            .subscribe(filter, SessionScope::Session(self.shared.session_id.clone()))
    }

    /// Subscribe globally from this session's connection: every matching
    /// event network-wide, including untagged ones.
    pub fn subscribe_global(&self, filter: DomainFilter) -> Result<EventStream> {
        if self.shared.is_detached() {
            return Err(CdpError::SessionClosed);
        }
        self.connection.subscribe(filter, SessionScope::Global)
    }

    /// Detach the session. Idempotent. Marks it terminal first, then
    /// rejects its in-flight calls with [`CdpError::SessionClosed`],
    /// cancels its scoped subscriptions, and finally notifies the
    /// debuggee (best effort - the connection may already be gone).
    pub async fn detach(&self) {
        if self.shared.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.evict_session(&self.shared.session_id);

        let notify = self
            .connection
            .call::<Value>(
                "Target.detachFromTarget",
                Some(json!({ "sessionId": self.shared.session_id })),
            )
            .await;
        match notify {
            Ok(_) => {
                tracing::debug!(session_id = %self.shared.session_id, "session detached")
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %self.shared.session_id,
                    error = %e,
                    "detach notification failed"
                )
            }
        }
    }
}

#[async_trait]
impl Caller for Session {
    async fn call_method(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call(method, params).await
    }
}
