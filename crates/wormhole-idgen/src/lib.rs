//! Snowflake ID service.
//!
//! Serves `GET /new-id` (`{"id": <u64>}`) from a single [`Generator`] and
//! provides [`IdClient`], the matching client used by services that need an
//! identifier before writing a new short URL.
//!
//! [`Generator`]: wormhole_generator::Generator

pub mod app;
pub mod client;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use client::{IdClient, IdClientError};
pub use state::AppState;
