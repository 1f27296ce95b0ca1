//! Core protection abstractions and token accounting.

pub mod error;
pub mod events;
pub mod probe;
pub mod protector;
pub mod request;

pub use error::ProtectorError;
pub use events::{build_event, EventKind, EventSink, InMemoryEventSink, ProtectorEvent};
pub use probe::{AvailabilityFn, AvailabilityProbe};
pub use protector::{Protector, ProtectorStats, Spawn};
pub use request::{Receipt, DEFAULT_AUTO_RELEASE};
