//! Client-side engine for the Chrome DevTools Protocol.
//!
//! One duplex connection to a debuggee, multiplexed:
//! - `protocol` - wire envelope types and the frame codec
//! - `transport` - sink/stream transport seam (WebSocket + in-memory)
//! - `connection` - request/response correlation and the read loop
//! - `events` - event fan-out with per-subscriber bounded buffers
//! - `session` - logical sessions routed over the one connection
//!
//! The engine is generic over `(method, params, result type)`; typed
//! per-domain accessors live in the `api` crate and call through the
//! [`Caller`] seam.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::{Caller, Connection, Stats};
pub use error::{CdpError, Result};
pub use events::{DomainFilter, EventStream, SessionScope};
pub use protocol::{
    CallFrame, EventFrame, Message, ProtocolError, RequestId, ResponseFrame, SessionId, TargetId,
};
pub use session::{Session, SessionState};
pub use transport::{MemoryTransport, Transport, TransportError, WebSocketTransport};
