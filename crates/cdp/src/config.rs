//! Connection tunables.

use std::time::Duration;

/// Configuration for one physical connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bounded delivery buffer per event subscription. When a subscriber
    /// falls this many events behind, the oldest buffered events are
    /// dropped and counted on its stream.
    pub event_buffer: usize,

    /// Optional deadline for every call on this connection. `None` means
    /// a call waits until its response arrives or the connection closes.
    pub call_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            call_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.event_buffer, 256);
        assert!(config.call_timeout.is_none());
    }
}
