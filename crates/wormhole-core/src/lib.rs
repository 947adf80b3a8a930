//! Core types and traits for the Wormhole URL shortener.
//!
//! This crate provides the types shared by the ID service and the analytics
//! worker: the base58 short code codec, the click event carried on the queue,
//! and the counter store capability the aggregator commits to.

pub mod base58;
pub mod counter;
pub mod error;
pub mod event;

pub use base58::ShortCodeBase58;
pub use counter::{CounterStore, CounterTransaction};
pub use error::{CodecError, EventError, StorageError};
pub use event::{ClickEvent, MAX_SHORT_CODE_LEN};
