//! Event handling - Gateway event broadcasting and serialization helpers

pub mod context;
pub mod dispatcher;
pub mod events;
pub mod exclusive;

pub use context::Context;
pub use dispatcher::{EventDispatcher, Listener, ListenerResult};
pub use events::{Event, EventKind};
pub use exclusive::{AsyncExclusive, ExclusiveGuard};
