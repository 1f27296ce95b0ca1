//! Configuration models for protectors and their timing windows.

pub mod protector;

pub use protector::{GuardConfig, ProtectorConfig};
