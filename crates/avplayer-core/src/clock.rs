//! Playback clock watchers
//!
//! [`Watcher`] is a start/stop periodic tick source for the owner task's
//! `select!` loop; an inactive watcher never fires. The change filters decide
//! whether a sampled value is worth an event: each emission must differ from
//! the previous one.

use crate::types::to_millis;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Start/stop periodic sampler
#[derive(Debug)]
pub struct Watcher {
    name: &'static str,
    period: Duration,
    interval: Option<Interval>,
}

impl Watcher {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Start or stop; the first tick comes one period after starting
    pub fn set_active(&mut self, active: bool) {
        match (active, self.interval.is_some()) {
            (true, false) => {
                let mut interval = time::interval_at(Instant::now() + self.period, self.period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.interval = Some(interval);
                debug!(watcher = self.name, period_ms = self.period.as_millis() as u64, "Watcher started");
            }
            (false, true) => {
                self.interval = None;
                debug!(watcher = self.name, "Watcher stopped");
            }
            _ => {}
        }
    }

    /// Wait for the next tick; pending forever while stopped
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

/// Position filter: `Some(millis)` when the sample differs from the last emission
pub fn position_update(last: &mut Option<i64>, sample: Duration) -> Option<i64> {
    let millis = to_millis(sample);
    if *last == Some(millis) {
        return None;
    }
    *last = Some(millis);
    Some(millis)
}

/// Buffer filter: `Some((begin, end))` when the buffered end moved and is
/// still ahead of the playhead
pub fn buffer_update(last_end: &mut i64, position: Duration, end: Duration) -> Option<(i64, i64)> {
    let begin = to_millis(position);
    let end = to_millis(end);
    if end == *last_end || end <= begin {
        return None;
    }
    *last_end = end;
    Some((begin, end))
}

/// End of the loaded range that contains `position`
pub fn range_containing(ranges: &[(Duration, Duration)], position: Duration) -> Option<Duration> {
    ranges
        .iter()
        .find(|(start, end)| *start <= position && position <= *end)
        .map(|(_, end)| *end)
}
