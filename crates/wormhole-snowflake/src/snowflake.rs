use crate::{
    clock::{Clock, SystemClock},
    error::Error,
    SnowflakeId,
};
use jiff::Timestamp;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;
use typed_builder::TypedBuilder;

const MAX_ELAPSED_MILLIS: i64 = (1_i64 << 41) - 1;
pub const MAX_NODE_ID: u16 = (1 << 10) - 1;
pub const MAX_SEQUENCE: u16 = (1 << 12) - 1;

/// 2024-01-01T00:00:00Z
pub const DEFAULT_EPOCH: Timestamp = Timestamp::constant(1_704_067_200, 0);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configures a Snowflake generator instance.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct SnowflakeSettings {
    /// A unique node index in the range `[0, 1023]`.
    #[builder]
    pub node_id: u16,
    /// Custom epoch used as the zero point for the 41-bit timestamp field.
    #[builder(default = DEFAULT_EPOCH)]
    pub start_epoch: Timestamp,
    /// Upper bound on how long `next_id` polls for the clock to catch up after
    /// a regression or an exhausted sequence. `None` waits indefinitely.
    #[builder(default, setter(strip_option))]
    pub max_clock_wait: Option<Duration>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_millis: Option<i64>,
    sequence: u16,
}

/// Snowflake ID generator.
///
/// Calls are serialized on an internal mutex. While holding it, `next_id` may
/// poll the clock at 1ms intervals: after the clock moves backward it waits to
/// get back to the last used millisecond, and after 4096 IDs in one millisecond
/// it waits for the next one. Without `max_clock_wait` a large backward jump
/// stalls every caller until the clock catches up.
pub struct Snowflake<C: Clock> {
    epoch_millis: i64,
    node_id: u16,
    max_clock_wait: Option<Duration>,
    clock: C,
    state: Mutex<GeneratorState>,
}

impl Snowflake<SystemClock> {
    /// Creates a generator backed by the real system clock.
    pub fn new(settings: SnowflakeSettings) -> Result<Self, Error> {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Snowflake<C> {
    pub fn with_clock(settings: SnowflakeSettings, clock: C) -> Result<Self, Error> {
        if settings.node_id > MAX_NODE_ID {
            return Err(Error::InvalidNodeId {
                node_id: settings.node_id,
                max_node_id: MAX_NODE_ID,
            });
        }

        let now = clock.now();
        if settings.start_epoch > now {
            return Err(Error::EpochAhead {
                epoch: settings.start_epoch,
                now,
            });
        }

        Ok(Self {
            epoch_millis: settings.start_epoch.as_millisecond(),
            node_id: settings.node_id,
            max_clock_wait: settings.max_clock_wait,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Generates the next unique ID.
    ///
    /// State is only updated once an ID has been produced, so a failed call
    /// (e.g. [`Error::ClockWaitExceeded`]) leaves the generator where it was.
    pub fn next_id(&self) -> Result<SnowflakeId, Error> {
        let mut state = self.state.lock().map_err(|_| Error::StatePoisoned)?;

        let now = self.clock.now().as_millisecond();

        let (now, sequence) = match state.last_millis {
            None => (now, 0),
            Some(last) => {
                let now = if now < last {
                    warn!(
                        last_millis = last,
                        now_millis = now,
                        "clock moved backwards, waiting for it to catch up"
                    );
                    self.wait_until(last)?
                } else {
                    now
                };

                if now > last {
                    (now, 0)
                } else if state.sequence < MAX_SEQUENCE {
                    (now, state.sequence + 1)
                } else {
                    // Sequence exhausted for this millisecond.
                    (self.wait_until(last + 1)?, 0)
                }
            }
        };

        let elapsed = now - self.epoch_millis;
        if elapsed < 0 {
            return Err(Error::ClockBeforeEpoch { now_millis: now });
        }
        if elapsed > MAX_ELAPSED_MILLIS {
            return Err(Error::TimestampOverflow);
        }

        state.last_millis = Some(now);
        state.sequence = sequence;

        Ok(SnowflakeId::new()
            .with_timestamp(elapsed as u64)
            .with_node_id(self.node_id)
            .with_sequence(sequence))
    }

    /// Polls the clock until it reads at least `target_millis`, returning the
    /// first reading that does.
    fn wait_until(&self, target_millis: i64) -> Result<i64, Error> {
        let mut waited = Duration::ZERO;
        loop {
            let now = self.clock.now().as_millisecond();
            if now >= target_millis {
                return Ok(now);
            }
            if self.max_clock_wait.is_some_and(|max| waited >= max) {
                return Err(Error::ClockWaitExceeded {
                    target_millis,
                    now_millis: now,
                    waited,
                });
            }
            self.clock.sleep(POLL_INTERVAL);
            waited += POLL_INTERVAL;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::TestClock;
    use std::collections::HashSet;
    use std::sync::Arc;

    const EPOCH_MILLIS: i64 = 1_704_067_200_000;

    fn make_generator(node_id: u16, clock: TestClock) -> Snowflake<TestClock> {
        let settings = SnowflakeSettings::builder().node_id(node_id).build();
        Snowflake::with_clock(settings, clock).unwrap()
    }

    #[test]
    fn first_id_has_sequence_zero() {
        let gen = make_generator(0, TestClock::at_millis(EPOCH_MILLIS + 100));
        let id = gen.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn same_millisecond_increments_sequence() {
        let gen = make_generator(0, TestClock::at_millis(EPOCH_MILLIS + 100));
        let id0 = gen.next_id().unwrap();
        let id1 = gen.next_id().unwrap();
        let id2 = gen.next_id().unwrap();
        assert_eq!(id0.sequence(), 0);
        assert_eq!(id1.sequence(), 1);
        assert_eq!(id2.sequence(), 2);
    }

    #[test]
    fn new_millisecond_resets_sequence() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + 100);
        let gen = make_generator(0, clock.clone());
        gen.next_id().unwrap();
        gen.next_id().unwrap();

        clock.advance_millis(1);
        let id = gen.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
        assert_eq!(id.timestamp(), 101);
    }

    #[test]
    fn sequence_capacity_is_4096_per_millisecond() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + 100);
        let gen = make_generator(0, clock.clone());

        for expected in 0..=MAX_SEQUENCE {
            let id = gen.next_id().unwrap();
            assert_eq!(id.timestamp(), 100);
            assert_eq!(id.sequence(), expected);
        }
        assert_eq!(clock.sleeps(), 0);

        // The 4097th call must wait for millisecond 101; sequence resets to 0.
        let id = gen.next_id().unwrap();
        assert_eq!(id.timestamp(), 101);
        assert_eq!(id.sequence(), 0);
        assert_eq!(clock.sleeps(), 1);
    }

    #[test]
    fn node_id_is_embedded() {
        let gen = make_generator(MAX_NODE_ID, TestClock::at_millis(EPOCH_MILLIS + 100));
        let id = gen.next_id().unwrap();
        assert_eq!(id.node_id(), MAX_NODE_ID);
    }

    #[test]
    fn timestamp_field_reflects_elapsed_millis() {
        let gen = make_generator(0, TestClock::at_millis(EPOCH_MILLIS + 500));
        let id = gen.next_id().unwrap();
        assert_eq!(id.timestamp(), 500);
        assert_eq!(id.as_u64(), 500 << 22);
    }

    #[test]
    fn composes_documented_bit_layout() {
        let gen = make_generator(1, TestClock::at_millis(EPOCH_MILLIS + 7));
        gen.next_id().unwrap();
        let id = gen.next_id().unwrap();
        assert_eq!(id.as_u64(), (7 << 22) | (1 << 12) | 1);
    }

    #[test]
    fn invalid_node_id_is_rejected() {
        let settings = SnowflakeSettings::builder().node_id(1024).build();
        let result = Snowflake::with_clock(settings, TestClock::at_millis(EPOCH_MILLIS));
        assert!(matches!(
            result,
            Err(Error::InvalidNodeId {
                node_id: 1024,
                max_node_id: 1023
            })
        ));
    }

    #[test]
    fn epoch_ahead_of_clock_is_rejected() {
        let settings = SnowflakeSettings::builder().node_id(0).build();
        let result = Snowflake::with_clock(settings, TestClock::at_millis(EPOCH_MILLIS - 1));
        assert!(matches!(result, Err(Error::EpochAhead { .. })));
    }

    #[test]
    fn backward_clock_keeps_ids_increasing() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + 1_000);
        let gen = make_generator(1, clock.clone());

        let before = gen.next_id().unwrap();
        clock.set_millis(EPOCH_MILLIS + 995);
        let after = gen.next_id().unwrap();

        assert!(after > before);
        assert_eq!(after.timestamp(), 1_000);
        assert_eq!(after.sequence(), 1);
        // waited 5 polls to get back to millisecond 1000
        assert_eq!(clock.sleeps(), 5);
    }

    #[test]
    fn ids_stay_monotonic_through_repeated_clock_jumps() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + 10_000);
        let gen = make_generator(3, clock.clone());

        let mut previous = gen.next_id().unwrap();
        for step in 0..200_i64 {
            match step % 4 {
                0 => clock.advance_millis(3),
                1 => clock.advance_millis(-2),
                2 => {}
                _ => clock.advance_millis(-1),
            }
            let id = gen.next_id().unwrap();
            assert!(id > previous, "{id:?} <= {previous:?}");
            previous = id;
        }
    }

    #[test]
    fn bounded_wait_fails_without_consuming_state() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + 10_000);
        let settings = SnowflakeSettings::builder()
            .node_id(0)
            .max_clock_wait(Duration::from_millis(10))
            .build();
        let gen = Snowflake::with_clock(settings, clock.clone()).unwrap();

        let before = gen.next_id().unwrap();
        clock.set_millis(EPOCH_MILLIS + 5_000);

        let err = gen.next_id().unwrap_err();
        assert!(matches!(
            err,
            Error::ClockWaitExceeded {
                target_millis,
                waited,
                ..
            } if target_millis == EPOCH_MILLIS + 10_000 && waited == Duration::from_millis(10)
        ));

        clock.set_millis(EPOCH_MILLIS + 10_000);
        let after = gen.next_id().unwrap();
        assert!(after > before);
        assert_eq!(after.sequence(), 1);
    }

    #[test]
    fn overflow_returns_error() {
        let clock = TestClock::at_millis(EPOCH_MILLIS + MAX_ELAPSED_MILLIS + 1);
        let gen = make_generator(0, clock);
        assert_eq!(gen.next_id(), Err(Error::TimestampOverflow));
    }

    #[test]
    fn clock_before_epoch_after_construction_is_an_error() {
        let clock = TestClock::at_millis(EPOCH_MILLIS);
        let gen = make_generator(0, clock.clone());
        clock.set_millis(EPOCH_MILLIS - 10);
        assert_eq!(
            gen.next_id(),
            Err(Error::ClockBeforeEpoch {
                now_millis: EPOCH_MILLIS - 10
            })
        );
    }

    #[test]
    fn five_thousand_ids_on_system_clock_are_unique_and_increasing() {
        let gen = Snowflake::new(SnowflakeSettings::builder().node_id(1).build()).unwrap();

        let mut seen = HashSet::with_capacity(5_000);
        let mut previous = None;
        for _ in 0..5_000 {
            let id = gen.next_id().unwrap();
            assert!(seen.insert(id.as_u64()));
            if let Some(previous) = previous {
                assert!(id > previous);
            }
            assert_eq!(id.node_id(), 1);
            previous = Some(id);
        }
    }

    #[test]
    fn concurrent_callers_never_share_an_id() {
        let gen = Arc::new(Snowflake::new(SnowflakeSettings::builder().node_id(7).build()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || {
                    (0..2_000)
                        .map(|_| gen.next_id().unwrap().as_u64())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            // each thread observes its own ids in increasing order
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 16_000);
    }
}
