//! Keeps an external scheduler's recurring triggers in line with pipeline config.

pub mod error;
pub mod memory;
pub mod sync;

#[cfg(test)]
mod tests;

pub use error::SyncError;
pub use memory::InMemorySchedulerBackend;
pub use sync::SchedulerSync;
