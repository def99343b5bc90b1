//! The protocol surface as data.
//!
//! Every method and event this workspace exercises is listed here as a
//! descriptor; the `command!` macro synthesizes one thin typed accessor
//! per method against the [`cdp::Caller`] seam. The engine itself stays
//! generic over `(method, params, result type)`.

/// One protocol method or event name, split into its routing components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub domain: &'static str,
    pub name: &'static str,
}

impl MethodDescriptor {
    pub const fn new(domain: &'static str, name: &'static str) -> Self {
        Self { domain, name }
    }

    /// Full `Domain.method` wire name.
    pub fn method(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }
}

/// Commands the typed accessors cover.
pub const COMMANDS: &[MethodDescriptor] = &[
    MethodDescriptor::new("Target", "attachToTarget"),
    MethodDescriptor::new("Target", "detachFromTarget"),
    MethodDescriptor::new("Target", "createTarget"),
    MethodDescriptor::new("Target", "closeTarget"),
    MethodDescriptor::new("Target", "getTargetInfo"),
    MethodDescriptor::new("Target", "setDiscoverTargets"),
    MethodDescriptor::new("Page", "enable"),
    MethodDescriptor::new("Page", "disable"),
    MethodDescriptor::new("Page", "navigate"),
    MethodDescriptor::new("Runtime", "enable"),
    MethodDescriptor::new("Runtime", "disable"),
    MethodDescriptor::new("Runtime", "evaluate"),
];

/// Events with typed payload shapes in this crate.
pub const EVENTS: &[MethodDescriptor] = &[
    MethodDescriptor::new("Target", "targetCreated"),
    MethodDescriptor::new("Target", "targetInfoChanged"),
    MethodDescriptor::new("Target", "targetDestroyed"),
    MethodDescriptor::new("Target", "targetCrashed"),
    MethodDescriptor::new("Page", "loadEventFired"),
    MethodDescriptor::new("Page", "frameStoppedLoading"),
];

/// Looks up a command descriptor by its full wire name.
pub fn find_command(method: &str) -> Option<&'static MethodDescriptor> {
    COMMANDS
        .iter()
        .find(|descriptor| descriptor.method() == method)
}

/// Synthesizes a typed accessor for one catalog entry.
///
/// Four shapes, mirroring the wire: with/without a params payload,
/// with/without a result payload.
macro_rules! command {
    ($(#[$meta:meta])* $name:ident = $method:literal, $params:ty => $result:ty) => {
        $(#[$meta])*
        pub async fn $name<C: cdp::Caller + ?Sized>(
            caller: &C,
            params: $params,
        ) -> cdp::Result<$result> {
            let value = caller
                .call_method($method, Some(serde_json::to_value(&params)?))
                .await?;
            Ok(serde_json::from_value(value)?)
        }
    };
    ($(#[$meta:meta])* $name:ident = $method:literal, $params:ty) => {
        $(#[$meta])*
        pub async fn $name<C: cdp::Caller + ?Sized>(
            caller: &C,
            params: $params,
        ) -> cdp::Result<()> {
            caller
                .call_method($method, Some(serde_json::to_value(&params)?))
                .await?;
            Ok(())
        }
    };
    ($(#[$meta:meta])* $name:ident = $method:literal => $result:ty) => {
        $(#[$meta])*
        pub async fn $name<C: cdp::Caller + ?Sized>(caller: &C) -> cdp::Result<$result> {
            let value = caller.call_method($method, None).await?;
            Ok(serde_json::from_value(value)?)
        }
    };
    ($(#[$meta:meta])* $name:ident = $method:literal) => {
        $(#[$meta])*
        pub async fn $name<C: cdp::Caller + ?Sized>(caller: &C) -> cdp::Result<()> {
            caller.call_method($method, None).await?;
            Ok(())
        }
    };
}

pub(crate) use command;
