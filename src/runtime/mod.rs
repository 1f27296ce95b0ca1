//! Runtime adapters for driving protector background tasks.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
