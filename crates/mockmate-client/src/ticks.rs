//! Tick sources driving the playback scheduler.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

/// Periodic signal; each completed `tick` lets the reveal cursor advance once.
#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick.
    async fn tick(&mut self);
}

/// Wall-clock ticks at a fixed interval.
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    /// Ticks every `period`. A late tick delays the following ones rather than
    /// bursting to catch up.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn tick(&mut self) {
        let _ = self.interval.tick().await;
    }
}

/// Ticks that complete as soon as they are awaited, counting each one.
#[derive(Debug, Default)]
pub struct ManualTicks {
    count: usize,
}

impl ManualTicks {
    /// Fresh counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks delivered so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[async_trait]
impl TickSource for ManualTicks {
    async fn tick(&mut self) {
        tokio::task::yield_now().await;
        self.count += 1;
    }
}
