use std::time::{Duration, Instant};

/// Gates work that should run at most once per interval, driven from the
/// event loop rather than a timer thread.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Repeater {
    interval: Duration,
    last_fired: Instant,
}

impl Repeater {
    pub(crate) fn every(interval: Duration) -> Self {
        Self { interval, last_fired: Instant::now() }
    }

    /// True when the interval has elapsed since the last firing; resets the
    /// clock when it does.
    pub(crate) fn fired(&mut self) -> bool {
        if self.last_fired.elapsed() >= self.interval {
            self.last_fired = Instant::now();
            true
        } else {
            false
        }
    }
}
