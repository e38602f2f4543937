// Adapters layer: concrete implementations of the domain ports.

pub mod leancloud;
pub mod memory;

pub use leancloud::LeanCloudStore;
pub use memory::{InMemoryStore, MemorySessionStore};
