//! Event fan-out.
//!
//! The read loop publishes every decoded event frame, in arrival order.
//! Each subscription owns an independent bounded buffer, so a slow
//! consumer can never stall frame decoding or other subscribers.
//!
//! Backpressure policy: drop-oldest-and-count. When a subscriber's buffer
//! overflows, the oldest buffered events are discarded; the subscriber's
//! stream records how many were lost in its `dropped()` counter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::{domain_of, EventFrame, SessionId};

/// Which session's events a subscription observes.
///
/// Global subscriptions receive every matching event regardless of its
/// session tag. Session-scoped subscriptions receive only events tagged
/// with that exact session id - untagged events never reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScope {
    Global,
    Session(SessionId),
}

impl SessionScope {
    fn admits(&self, tag: Option<&str>) -> bool {
        match self {
            SessionScope::Global => true,
            SessionScope::Session(id) => tag == Some(id.as_str()),
        }
    }
}

/// Which event methods a subscription observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainFilter {
    /// Every event.
    All,
    /// Events whose method's namespace prefix matches ("Page" matches
    /// "Page.loadEventFired").
    Domain(String),
    /// One exact method name.
    Method(String),
}

impl DomainFilter {
    pub fn domain(name: impl Into<String>) -> Self {
        DomainFilter::Domain(name.into())
    }

    pub fn method(name: impl Into<String>) -> Self {
        DomainFilter::Method(name.into())
    }

    fn matches(&self, method: &str) -> bool {
        match self {
            DomainFilter::All => true,
            DomainFilter::Domain(domain) => domain_of(method) == domain,
            DomainFilter::Method(name) => method == name,
        }
    }
}

struct Subscriber {
    filter: DomainFilter,
    scope: SessionScope,
    tx: broadcast::Sender<EventFrame>,
}

struct BusInner {
    subscribers: DashMap<Uuid, Subscriber>,
    capacity: usize,
    closed: AtomicBool,
}

/// Fan-out registry. Owned by the connection; `publish` is only ever
/// invoked from its read loop.
#[derive(Clone)]
pub(crate) struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: DashMap::new(),
                capacity,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe(&self, filter: DomainFilter, scope: SessionScope) -> EventStream {
        let (tx, rx) = broadcast::channel(self.inner.capacity);
        let id = Uuid::now_v7();
        self.inner
            .subscribers
            .insert(id, Subscriber { filter, scope, tx });
        EventStream {
            id,
            rx,
            dropped: 0,
            bus: self.clone(),
        }
    }

    /// Deliver one event to every matching live subscription. Never
    /// awaits: enqueueing into a full buffer evicts that subscriber's
    /// oldest buffered event.
    pub(crate) fn publish(&self, event: EventFrame) {
        let mut dead = Vec::new();
        for entry in self.inner.subscribers.iter() {
            let sub = entry.value();
            if !sub.filter.matches(&event.method) {
                continue;
            }
            if !sub.scope.admits(event.session_id.as_deref()) {
                continue;
            }
            if sub.tx.send(event.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        // receivers leaked without cancelling; prune outside the iterator
        for id in dead {
            self.inner.subscribers.remove(&id);
        }
    }

    /// Idempotent. Already-buffered events still drain on the stream.
    pub(crate) fn cancel(&self, id: &Uuid) {
        self.inner.subscribers.remove(id);
    }

    /// Cancels every subscription scoped to `session_id`.
    pub(crate) fn cancel_session(&self, session_id: &str) {
        let scoped: Vec<Uuid> = self
            .inner
            .subscribers
            .iter()
            .filter(|entry| {
                matches!(&entry.value().scope, SessionScope::Session(id) if id == session_id)
            })
            .map(|entry| *entry.key())
            .collect();
        for id in scoped {
            self.inner.subscribers.remove(&id);
        }
    }

    /// Ends every stream. Called once, from the connection's close path.
    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.subscribers.clear();
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// A live subscription. Dropping it cancels the subscription.
pub struct EventStream {
    id: Uuid,
    rx: broadcast::Receiver<EventFrame>,
    dropped: u64,
    bus: EventBus,
}

impl EventStream {
    /// Next matching event in arrival order, or `None` once the
    /// subscription is cancelled or the connection closes.
    pub async fn next(&mut self) -> Option<EventFrame> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                    tracing::warn!(lost = n, "subscriber lagging, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// How many events this subscription has lost to buffer overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Stops further delivery. Idempotent; events already buffered can
    /// still be drained with `next()`.
    pub fn cancel(&self) {
        self.bus.cancel(&self.id);
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.bus.cancel(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(method: &str, session_id: Option<&str>) -> EventFrame {
        EventFrame {
            method: method.to_string(),
            params: json!({}),
            session_id: session_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn domain_filter_separates_subscribers() {
        let bus = EventBus::new(16);
        let mut page = bus.subscribe(DomainFilter::domain("Page"), SessionScope::Global);
        let mut network = bus.subscribe(DomainFilter::domain("Network"), SessionScope::Global);

        bus.publish(event("Page.frameStoppedLoading", None));
        bus.close();

        assert_eq!(
            page.next().await.unwrap().method,
            "Page.frameStoppedLoading"
        );
        assert!(network.next().await.is_none());
    }

    #[tokio::test]
    async fn session_scoping() {
        let bus = EventBus::new(16);
        let mut s1 = bus.subscribe(DomainFilter::All, SessionScope::Session("S1".to_string()));
        let mut s2 = bus.subscribe(DomainFilter::All, SessionScope::Session("S2".to_string()));
        let mut global = bus.subscribe(DomainFilter::All, SessionScope::Global);

        bus.publish(event("Page.loadEventFired", Some("S1")));
        bus.publish(event("Page.loadEventFired", None));
        bus.close();

        // S1 sees only its own tagged event
        assert_eq!(s1.next().await.unwrap().session_id.as_deref(), Some("S1"));
        assert!(s1.next().await.is_none());

        // S2 sees nothing - untagged events never reach scoped subscribers
        assert!(s2.next().await.is_none());

        // global sees both
        assert_eq!(
            global.next().await.unwrap().session_id.as_deref(),
            Some("S1")
        );
        assert!(global.next().await.unwrap().session_id.is_none());
    }

    #[tokio::test]
    async fn exact_method_filter() {
        let bus = EventBus::new(16);
        let mut stream = bus.subscribe(
            DomainFilter::method("Target.targetCreated"),
            SessionScope::Global,
        );

        bus.publish(event("Target.targetDestroyed", None));
        bus.publish(event("Target.targetCreated", None));
        bus.close();

        assert_eq!(stream.next().await.unwrap().method, "Target.targetCreated");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn delivery_preserves_arrival_order() {
        let bus = EventBus::new(128);
        let mut stream = bus.subscribe(DomainFilter::All, SessionScope::Global);

        for i in 0..100 {
            bus.publish(event(&format!("Page.e{i}"), None));
        }
        bus.close();

        for i in 0..100 {
            assert_eq!(stream.next().await.unwrap().method, format!("Page.e{i}"));
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bus = EventBus::new(2);
        let mut stream = bus.subscribe(DomainFilter::All, SessionScope::Global);

        for i in 0..6 {
            bus.publish(event(&format!("Page.e{i}"), None));
        }
        bus.close();

        // the two newest survive; the four oldest are dropped and counted
        assert_eq!(stream.next().await.unwrap().method, "Page.e4");
        assert_eq!(stream.dropped(), 4);
        assert_eq!(stream.next().await.unwrap().method, "Page.e5");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_delivery() {
        let bus = EventBus::new(16);
        let stream = bus.subscribe(DomainFilter::All, SessionScope::Global);
        assert_eq!(bus.subscriber_count(), 1);

        stream.cancel();
        stream.cancel();
        assert_eq!(bus.subscriber_count(), 0);

        // publishing after cancel reaches nobody and does not panic
        bus.publish(event("Page.loadEventFired", None));
    }

    #[tokio::test]
    async fn buffered_events_drain_after_cancel() {
        let bus = EventBus::new(16);
        let mut stream = bus.subscribe(DomainFilter::All, SessionScope::Global);

        bus.publish(event("Page.one", None));
        bus.publish(event("Page.two", None));
        stream.cancel();
        bus.publish(event("Page.three", None));

        assert_eq!(stream.next().await.unwrap().method, "Page.one");
        assert_eq!(stream.next().await.unwrap().method, "Page.two");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_session_removes_only_that_scope() {
        let bus = EventBus::new(16);
        let _s1 = bus.subscribe(DomainFilter::All, SessionScope::Session("S1".to_string()));
        let _global = bus.subscribe(DomainFilter::All, SessionScope::Global);

        bus.cancel_session("S1");
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn dropped_streams_are_pruned() {
        let bus = EventBus::new(16);
        let stream = bus.subscribe(DomainFilter::All, SessionScope::Global);
        drop(stream);

        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(event("Page.loadEventFired", None));
    }
}
