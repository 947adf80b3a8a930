use crate::error::QueueError;
use async_trait::async_trait;

pub mod amqp;
pub mod memory;

/// A message taken off the click queue, not yet settled.
#[derive(Debug)]
pub struct Delivery<H> {
    pub body: Vec<u8>,
    /// Set when the broker has handed this message out before.
    pub redelivered: bool,
    pub handle: H,
}

/// The queue operations the aggregator needs.
///
/// Every delivery must eventually be settled with exactly one of [`ack`],
/// [`requeue`] or [`reject`]. Unsettled deliveries count against the
/// consumer's prefetch limit.
///
/// [`ack`]: ClickQueue::ack
/// [`requeue`]: ClickQueue::requeue
/// [`reject`]: ClickQueue::reject
#[async_trait]
pub trait ClickQueue: Send + 'static {
    type Handle: Send + Sync + 'static;

    /// Waits for the next delivery. Returns `None` once the consumer is
    /// closed. Must be cancel safe: dropping the future loses no message.
    async fn next_delivery(&mut self) -> Option<Result<Delivery<Self::Handle>, QueueError>>;

    /// Removes the message from the queue for good.
    async fn ack(&mut self, handle: &Self::Handle) -> Result<(), QueueError>;

    /// Returns the message to the queue for redelivery.
    async fn requeue(&mut self, handle: &Self::Handle) -> Result<(), QueueError>;

    /// Drops the message without redelivery.
    async fn reject(&mut self, handle: &Self::Handle) -> Result<(), QueueError>;
}
