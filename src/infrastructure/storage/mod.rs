//! Storage implementations of the persistence port

mod memory;

pub use memory::InMemoryStorage;
