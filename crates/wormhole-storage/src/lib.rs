pub mod error;
pub mod memory;
pub mod mysql;

pub use error::{Result, StorageError};
pub use memory::InMemoryCounterStore;
pub use mysql::MySqlCounterStore;
pub use wormhole_core::{CounterStore, CounterTransaction};
