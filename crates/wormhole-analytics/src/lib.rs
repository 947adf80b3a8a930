//! Click analytics: consumes click events from a queue and folds them into
//! durable per-short-code counters.
//!
//! The [`BatchAggregator`] owns a single consumption loop. Events are
//! collected into a batch which is flushed when it reaches the configured size
//! or when the flush timer fires, whichever comes first. A flush commits one
//! storage transaction and only then acknowledges the batch, so delivery is
//! at least once: a crash between commit and acknowledgement recounts the
//! batch after redelivery.

pub mod aggregator;
pub mod error;
pub mod queue;

pub use aggregator::{
    count_clicks, AggregatorReport, AggregatorSettings, BatchAggregator, FlushOutcome, FlushReason,
};
pub use error::{AggregatorError, QueueError};
pub use queue::amqp::{AmqpClickQueue, AmqpSettings, ClickPublisher};
pub use queue::memory::{MemoryBroker, MemoryConsumer};
pub use queue::{ClickQueue, Delivery};
