use crate::error::QueueError;
use crate::queue::{ClickQueue, Delivery};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use wormhole_core::ClickEvent;

/// In-process stand-in for a durable queue with manual acknowledgement.
///
/// Follows the broker semantics the aggregator depends on: deliveries stop
/// once `prefetch` messages are unacknowledged, requeued messages come back
/// flagged as redelivered and rejected ones are gone. Clones share state.
///
/// [`fail_next_acks`] and [`recover`] together simulate a consumer that
/// committed a batch but died before its acknowledgements reached the broker.
///
/// [`fail_next_acks`]: MemoryBroker::fail_next_acks
/// [`recover`]: MemoryBroker::recover
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Debug)]
struct Message {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct State {
    prefetch: usize,
    next_tag: u64,
    ready: VecDeque<(u64, Message)>,
    unacked: BTreeMap<u64, Message>,
    acked: usize,
    rejected: usize,
    pending_ack_failures: usize,
    closed: bool,
}

impl MemoryBroker {
    pub fn new(prefetch: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    prefetch: prefetch.max(1),
                    next_tag: 1,
                    ready: VecDeque::new(),
                    unacked: BTreeMap::new(),
                    acked: 0,
                    rejected: 0,
                    pending_ack_failures: 0,
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn consumer(&self) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
        }
    }

    pub fn publish_raw(&self, body: impl Into<Vec<u8>>) {
        {
            let mut state = self.inner.state.lock();
            let tag = state.next_tag;
            state.next_tag += 1;
            state.ready.push_back((
                tag,
                Message {
                    body: body.into(),
                    redelivered: false,
                },
            ));
        }
        self.inner.notify.notify_waiters();
    }

    pub fn publish(&self, event: &ClickEvent) -> Result<(), QueueError> {
        self.publish_raw(event.to_vec()?);
        Ok(())
    }

    /// Makes the next `n` acknowledgements fail, leaving those messages
    /// unacknowledged.
    pub fn fail_next_acks(&self, n: usize) {
        self.inner.state.lock().pending_ack_failures = n;
    }

    /// Returns every unacknowledged message to the queue, as the broker does
    /// when a consumer's channel goes away.
    pub fn recover(&self) {
        {
            let mut state = self.inner.state.lock();
            let unacked = std::mem::take(&mut state.unacked);
            for (tag, mut message) in unacked.into_iter().rev() {
                message.redelivered = true;
                state.ready.push_front((tag, message));
            }
        }
        self.inner.notify.notify_waiters();
    }

    /// Ends every consumer's stream. Messages stay in the broker.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    pub fn ready(&self) -> usize {
        self.inner.state.lock().ready.len()
    }

    pub fn unacked(&self) -> usize {
        self.inner.state.lock().unacked.len()
    }

    pub fn acked(&self) -> usize {
        self.inner.state.lock().acked
    }

    pub fn rejected(&self) -> usize {
        self.inner.state.lock().rejected
    }

    fn try_deliver(&self) -> Option<Option<Delivery<u64>>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Some(None);
        }
        if state.unacked.len() >= state.prefetch {
            return None;
        }
        let (tag, message) = state.ready.pop_front()?;
        let delivery = Delivery {
            body: message.body.clone(),
            redelivered: message.redelivered,
            handle: tag,
        };
        state.unacked.insert(tag, message);
        Some(Some(delivery))
    }

    fn settle(&self, tag: u64, settle: impl FnOnce(&mut State, Message)) -> Result<(), QueueError> {
        {
            let mut state = self.inner.state.lock();
            let message = state.unacked.remove(&tag).ok_or_else(|| {
                QueueError::Channel(format!("unknown delivery tag {tag}"))
            })?;
            settle(&mut state, message);
        }
        // a freed prefetch slot may unblock the consumer
        self.inner.notify.notify_waiters();
        Ok(())
    }
}

/// Consumer handle of a [`MemoryBroker`]; delivery handles are delivery tags.
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
}

#[async_trait]
impl ClickQueue for MemoryConsumer {
    type Handle = u64;

    async fn next_delivery(&mut self) -> Option<Result<Delivery<u64>, QueueError>> {
        loop {
            let notified = self.broker.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.broker.try_deliver() {
                return delivery.map(Ok);
            }
            notified.await;
        }
    }

    async fn ack(&mut self, handle: &u64) -> Result<(), QueueError> {
        {
            let mut state = self.broker.inner.state.lock();
            if state.pending_ack_failures > 0 {
                state.pending_ack_failures -= 1;
                return Err(QueueError::Unavailable(format!(
                    "injected ack failure for delivery {handle}"
                )));
            }
        }
        self.broker.settle(*handle, |state, _| state.acked += 1)
    }

    async fn requeue(&mut self, handle: &u64) -> Result<(), QueueError> {
        let tag = *handle;
        self.broker.settle(tag, |state, mut message| {
            message.redelivered = true;
            state.ready.push_back((tag, message));
        })
    }

    async fn reject(&mut self, handle: &u64) -> Result<(), QueueError> {
        self.broker.settle(*handle, |state, _| state.rejected += 1)
    }
}
