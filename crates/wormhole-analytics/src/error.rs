use thiserror::Error;
use wormhole_core::EventError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue broker unavailable: {0}")]
    Unavailable(String),
    #[error("queue channel error: {0}")]
    Channel(String),
    #[error("failed to publish click event: {0}")]
    Publish(String),
    #[error(transparent)]
    Event(#[from] EventError),
}

pub(crate) fn map_lapin_error(err: lapin::Error) -> QueueError {
    match err {
        lapin::Error::IOError(e) => QueueError::Unavailable(e.to_string()),
        lapin::Error::InvalidConnectionState(state) => {
            QueueError::Unavailable(format!("connection is {state:?}"))
        }
        other => QueueError::Channel(other.to_string()),
    }
}

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("invalid aggregator settings: {0}")]
    InvalidSettings(String),
    /// The consumer stream ended. The pending batch was neither committed nor
    /// acknowledged and will be redelivered by the broker.
    #[error("click queue closed with {abandoned} pending events")]
    QueueClosed { abandoned: usize },
    #[error(transparent)]
    Queue(#[from] QueueError),
}
