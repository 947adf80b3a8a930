use crate::error::AggregatorError;
use crate::queue::{ClickQueue, Delivery};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use wormhole_core::{ClickEvent, CounterStore, CounterTransaction, StorageError};

#[derive(Debug, Clone, TypedBuilder)]
pub struct AggregatorSettings {
    /// Number of events that triggers an immediate flush.
    #[builder(default = 100)]
    pub batch_size: usize,
    /// Period of the flush timer. Restarted after every size-triggered flush.
    #[builder(default = Duration::from_secs(2))]
    pub flush_interval: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Size,
    Timer,
    Shutdown,
}

impl FlushReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Timer => "timer",
            Self::Shutdown => "shutdown",
        }
    }
}

impl Display for FlushReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The counters were committed and the batch was acknowledged.
    /// `unacked` deliveries could not be acknowledged and will come back.
    Committed {
        events: usize,
        codes: usize,
        unacked: usize,
    },
    /// Nothing was persisted; the whole batch went back to the queue.
    Requeued { events: usize, error: StorageError },
}

/// What an aggregator did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorReport {
    pub size_flushes: usize,
    pub timer_flushes: usize,
    pub shutdown_flushes: usize,
    pub committed_events: usize,
    pub requeued_events: usize,
    pub rejected_events: usize,
    pub ack_failures: usize,
    pub largest_batch: usize,
}

impl AggregatorReport {
    pub fn flushes(&self) -> usize {
        self.size_flushes + self.timer_flushes + self.shutdown_flushes
    }

    fn record(&mut self, reason: FlushReason, events: usize, outcome: &FlushOutcome) {
        match reason {
            FlushReason::Size => self.size_flushes += 1,
            FlushReason::Timer => self.timer_flushes += 1,
            FlushReason::Shutdown => self.shutdown_flushes += 1,
        }
        self.largest_batch = self.largest_batch.max(events);
        match outcome {
            FlushOutcome::Committed { events, unacked, .. } => {
                self.committed_events += events;
                self.ack_failures += unacked;
            }
            FlushOutcome::Requeued { events, .. } => self.requeued_events += events,
        }
    }
}

/// Folds a batch into per-code deltas.
pub fn count_clicks<'a>(codes: impl IntoIterator<Item = &'a str>) -> BTreeMap<&'a str, u64> {
    let mut tally = BTreeMap::new();
    for code in codes {
        *tally.entry(code).or_insert(0) += 1;
    }
    tally
}

/// Single consumption loop turning click events into counter increments.
///
/// Only one flush is ever in flight: consumption pauses while a batch is
/// committed and settled.
pub struct BatchAggregator<Q: ClickQueue, S: CounterStore> {
    queue: Q,
    store: S,
    settings: AggregatorSettings,
    batch: Vec<(ClickEvent, Q::Handle)>,
    report: AggregatorReport,
}

impl<Q: ClickQueue, S: CounterStore> BatchAggregator<Q, S> {
    pub fn new(queue: Q, store: S, settings: AggregatorSettings) -> Result<Self, AggregatorError> {
        if settings.batch_size == 0 {
            return Err(AggregatorError::InvalidSettings(
                "batch size must be at least 1".to_string(),
            ));
        }
        if settings.flush_interval.is_zero() {
            return Err(AggregatorError::InvalidSettings(
                "flush interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            queue,
            store,
            batch: Vec::with_capacity(settings.batch_size),
            settings,
            report: AggregatorReport::default(),
        })
    }

    /// Runs until `shutdown` resolves, then flushes what is pending and
    /// returns.
    ///
    /// If the queue closes or fails first, the pending batch is left
    /// unacknowledged for the broker to redeliver and an error is returned.
    pub async fn run(
        mut self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<AggregatorReport, AggregatorError> {
        info!(
            batch_size = self.settings.batch_size,
            flush_interval_ms = self.settings.flush_interval.as_millis() as u64,
            "aggregator started"
        );

        let mut ticker = flush_timer(self.settings.flush_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(pending = self.batch.len(), "aggregator shutting down");
                    if !self.batch.is_empty() {
                        self.flush(FlushReason::Shutdown).await;
                    }
                    break;
                }
                _ = ticker.tick() => {
                    if !self.batch.is_empty() {
                        self.flush(FlushReason::Timer).await;
                    }
                }
                delivery = self.queue.next_delivery() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            if self.accept(delivery).await {
                                self.flush(FlushReason::Size).await;
                                ticker.reset();
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, pending = self.batch.len(), "click queue failed");
                            return Err(e.into());
                        }
                        None => {
                            warn!(pending = self.batch.len(), "click queue closed");
                            return Err(AggregatorError::QueueClosed {
                                abandoned: self.batch.len(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            flushes = self.report.flushes(),
            committed = self.report.committed_events,
            requeued = self.report.requeued_events,
            rejected = self.report.rejected_events,
            "aggregator stopped"
        );
        Ok(self.report)
    }

    /// Adds a delivery to the batch, or rejects it if it cannot be decoded.
    /// Returns whether the batch is now full.
    async fn accept(&mut self, delivery: Delivery<Q::Handle>) -> bool {
        match ClickEvent::from_slice(&delivery.body) {
            Ok(event) => {
                if delivery.redelivered {
                    debug!(code = %event.short_code, "received redelivered click");
                }
                self.batch.push((event, delivery.handle));
            }
            Err(e) => {
                warn!(error = %e, bytes = delivery.body.len(), "rejecting undecodable click event");
                self.report.rejected_events += 1;
                if let Err(e) = self.queue.reject(&delivery.handle).await {
                    warn!(error = %e, "failed to reject click event");
                }
            }
        }
        self.batch.len() >= self.settings.batch_size
    }

    async fn flush(&mut self, reason: FlushReason) -> FlushOutcome {
        let batch = std::mem::take(&mut self.batch);
        self.batch.reserve(self.settings.batch_size);
        let events = batch.len();

        let outcome = {
            let tally = count_clicks(batch.iter().map(|(event, _)| event.short_code.as_str()));
            match commit(&self.store, &tally).await {
                Ok(()) => {
                    let mut unacked = 0;
                    for (_, handle) in &batch {
                        if let Err(e) = self.queue.ack(handle).await {
                            unacked += 1;
                            warn!(error = %e, "failed to acknowledge committed click");
                        }
                    }
                    FlushOutcome::Committed {
                        events,
                        codes: tally.len(),
                        unacked,
                    }
                }
                Err(error) => {
                    warn!(error = %error, events, "click batch not committed, requeueing");
                    for (_, handle) in &batch {
                        if let Err(e) = self.queue.requeue(handle).await {
                            warn!(error = %e, "failed to requeue click");
                        }
                    }
                    FlushOutcome::Requeued { events, error }
                }
            }
        };

        if let FlushOutcome::Committed { codes, unacked, .. } = &outcome {
            info!(reason = %reason, events, codes, unacked, "flushed click batch");
        }
        self.report.record(reason, events, &outcome);
        outcome
    }
}

fn flush_timer(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Applies the tally in one transaction. Either every increment lands or none.
async fn commit<S: CounterStore>(store: &S, tally: &BTreeMap<&str, u64>) -> Result<(), StorageError> {
    let mut tx = store.begin().await?;
    for (code, delta) in tally {
        if let Err(e) = tx.upsert_increment(code, *delta).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "failed to roll back click batch");
            }
            return Err(e);
        }
    }
    tx.commit().await
}
