//! # Prometheus Resource Guard
//!
//! Token-granting resource protection for the Prometheus AI Platform.
//!
//! A [`Protector`] mediates access to a scarce external resource (an API
//! endpoint, a database cluster, a mount point, a rate-limited service).
//! Clients request a number of tokens and immediately receive a [`Receipt`];
//! the protector grants the tokens only when the resource has capacity,
//! enforces a minimum delay between successive grants, and reclaims tokens
//! from clients that die without releasing them.
//!
//! ## Modules
//!
//! - `core` - protector, request record, availability probe, event sinks
//! - `config` - serde-backed configuration with validation
//! - `builders` - construct protectors from configuration
//! - `runtime` - spawner adapters for driving background tasks
//! - `util` - clock and telemetry helpers
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use prometheus_resource_guard::Protector;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let protector = Protector::new(
//!     "storage-cluster",
//!     Duration::from_millis(100),
//!     8,
//!     Duration::from_secs(30),
//! )
//! .expect("valid protector");
//!
//! let receipt = protector.submit(2).expect("within the maximum");
//! if protector.wait_until_granted(&receipt).await {
//!     // ... use the resource, touching periodically ...
//!     protector.touch(&receipt);
//!     protector.release(&receipt);
//! }
//! # }
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod builders;
pub mod config;
pub mod core;
pub mod runtime;
pub mod util;

// Re-export main types for convenience
pub use crate::core::error::ProtectorError;
pub use crate::core::events::{EventKind, EventSink, InMemoryEventSink, ProtectorEvent};
pub use crate::core::protector::{Protector, ProtectorStats, Spawn};
pub use crate::core::request::{Receipt, DEFAULT_AUTO_RELEASE};
pub use crate::runtime::TokioSpawner;
