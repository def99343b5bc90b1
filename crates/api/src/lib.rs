//! Typed surface over the `cdp` engine.
//!
//! The protocol surface is data: `catalog` lists every method and event
//! descriptor, and each domain module carries the payload shapes plus
//! accessors synthesized from that table. Everything funnels through
//! [`cdp::Caller`], so the same accessor works browser-level (on a
//! `Connection`) or session-scoped (on a `Session`).

pub mod catalog;
pub mod page;
pub mod runtime;
pub mod target;
pub mod targets;

pub use catalog::{find_command, MethodDescriptor, COMMANDS, EVENTS};
pub use targets::TargetRegistry;
