//! Configuration store adapters: where pipeline definitions live.

pub mod error;
pub mod file;
pub mod memory;

pub use error::RegistryError;
pub use file::{parse_pipelines, LoadReport, SkippedEntry, YamlConfigStore};
pub use memory::InMemoryConfigStore;
