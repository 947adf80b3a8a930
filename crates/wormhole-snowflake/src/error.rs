use jiff::Timestamp;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by Snowflake initialization and ID generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid node id {node_id}; expected 0..={max_node_id}")]
    InvalidNodeId { node_id: u16, max_node_id: u16 },
    #[error("epoch is ahead of current clock time: epoch={epoch}, now={now}")]
    EpochAhead { epoch: Timestamp, now: Timestamp },
    #[error("clock reads {now_millis}ms, before the epoch")]
    ClockBeforeEpoch { now_millis: i64 },
    #[error("41-bit timestamp exhausted")]
    TimestampOverflow,
    #[error("clock did not reach {target_millis}ms after waiting {waited:?} (now {now_millis}ms)")]
    ClockWaitExceeded {
        target_millis: i64,
        now_millis: i64,
        waited: Duration,
    },
    #[error("generator state lock is poisoned")]
    StatePoisoned,
}
