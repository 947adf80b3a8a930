//! Snowflake-style 64-bit identifier allocation.
//!
//! IDs are `41 bits of milliseconds since an epoch | 10 bits node id | 12 bits
//! sequence`, strictly increasing per allocator instance.

mod clock;
pub mod error;
mod snowflake;
mod snowflake_id;

pub use clock::{Clock, SystemClock};
pub use error::Error;
pub use snowflake::{Snowflake, SnowflakeSettings, DEFAULT_EPOCH, MAX_NODE_ID, MAX_SEQUENCE};
pub use snowflake_id::SnowflakeId;
