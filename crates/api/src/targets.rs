//! Live registry of debuggable targets.
//!
//! Subscribes to the Target domain's lifecycle events and keeps a map of
//! what is currently debuggable on the other side, plus the
//! create-and-attach / detach-and-close flows built on top of it.

use std::sync::Arc;

use dashmap::DashMap;

use cdp::{Connection, DomainFilter, EventStream, Result, Session, SessionScope, TargetId};

use crate::target::{
    self, CloseTargetParams, CreateTargetParams, SetDiscoverTargetsParams, TargetCreatedEvent,
    TargetDestroyedEvent, TargetInfo, TargetInfoChangedEvent,
};

pub struct TargetRegistry {
    connection: Arc<Connection>,
    targets: Arc<DashMap<TargetId, TargetInfo>>,
    watcher: tokio::task::JoinHandle<()>,
}

impl TargetRegistry {
    /// Enables target discovery on the connection and starts following
    /// lifecycle events.
    pub async fn new(connection: Arc<Connection>) -> Result<Self> {
        // subscribe first so no lifecycle event slips past before
        // discovery is on
        let events =
            connection.subscribe(DomainFilter::domain("Target"), SessionScope::Global)?;
        let targets: Arc<DashMap<TargetId, TargetInfo>> = Arc::new(DashMap::new());
        let watcher = tokio::spawn(follow(events, Arc::clone(&targets)));

        target::set_discover_targets(
            connection.as_ref(),
            SetDiscoverTargetsParams { discover: true },
        )
        .await?;

        Ok(Self {
            connection,
            targets,
            watcher,
        })
    }

    /// Currently known targets.
    pub fn list(&self) -> Vec<TargetInfo> {
        self.targets.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn get(&self, target_id: &str) -> Option<TargetInfo> {
        self.targets.get(target_id).map(|entry| entry.value().clone())
    }

    /// Create a target for `url` and attach a session to it.
    pub async fn create(&self, url: impl Into<String>) -> Result<Session> {
        let created = target::create_target(
            self.connection.as_ref(),
            CreateTargetParams::new(url),
        )
        .await?;
        Session::attach(Arc::clone(&self.connection), created.target_id).await
    }

    /// Detach the session and close its target on the debuggee side.
    pub async fn close(&self, session: &Session) -> Result<bool> {
        let target_id = session.target_id().to_string();
        session.detach().await;
        let closed = target::close_target(
            self.connection.as_ref(),
            CloseTargetParams { target_id },
        )
        .await?;
        Ok(closed.success)
    }
}

impl Drop for TargetRegistry {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn follow(mut events: EventStream, targets: Arc<DashMap<TargetId, TargetInfo>>) {
    while let Some(event) = events.next().await {
        match event.method.as_str() {
            "Target.targetCreated" => match event.params_as::<TargetCreatedEvent>() {
                Ok(created) => {
                    tracing::debug!(target_id = %created.target_info.target_id, "target created");
                    targets.insert(created.target_info.target_id.clone(), created.target_info);
                }
                Err(e) => tracing::warn!(error = %e, "bad targetCreated payload"),
            },
            "Target.targetInfoChanged" => match event.params_as::<TargetInfoChangedEvent>() {
                Ok(changed) => {
                    targets.insert(changed.target_info.target_id.clone(), changed.target_info);
                }
                Err(e) => tracing::warn!(error = %e, "bad targetInfoChanged payload"),
            },
            "Target.targetDestroyed" | "Target.targetCrashed" => {
                match event.params_as::<TargetDestroyedEvent>() {
                    Ok(gone) => {
                        if targets.remove(&gone.target_id).is_some() {
                            tracing::debug!(target_id = %gone.target_id, method = %event.method, "target gone");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "bad target lifecycle payload"),
                }
            }
            _ => {}
        }
    }
}
