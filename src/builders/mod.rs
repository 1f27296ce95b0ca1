//! Builders to construct protectors from configuration.

pub mod protector_builder;

pub use protector_builder::build_protectors;
