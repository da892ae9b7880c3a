//! Storage abstractions for package resources.

mod store;

pub use store::{DirStore, MemoryStore, ResourceStore};
