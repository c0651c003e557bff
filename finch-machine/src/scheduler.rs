//! Wall-clock pacing for the CPU and the device units

/// Fixed-rate clock over a millisecond timeline supplied by the caller
///
/// `ticks_due` never sleeps; it reports how many whole intervals have passed
/// and advances its own position by exactly that many. Timelines that stall
/// (a paused UI, a debugger) therefore produce a burst of catch-up ticks on
/// the next call rather than losing time.
#[derive(Clone, Debug)]
pub(crate) struct Clock {
    interval_ms: u64,
    last: Option<u64>,
}

impl Clock {
    pub fn new(interval_ms: u64) -> Self {
        assert!(interval_ms > 0);
        Self {
            interval_ms,
            last: None,
        }
    }

    /// Clock running at `hz` ticks per second
    ///
    /// Rates above 1000 Hz collapse to the millisecond resolution of the
    /// timeline, and a rate of zero means the slowest clock we can express.
    pub fn from_hz(hz: u64) -> Self {
        if hz == 0 {
            return Self::new(u64::MAX);
        }
        Self::new((1000 / hz).max(1))
    }

    /// Number of ticks elapsed since the previous call
    ///
    /// The first call always yields one tick, so a unit acts immediately
    /// when the machine starts.
    pub fn ticks_due(&mut self, now_ms: u64) -> u64 {
        let Some(last) = self.last else {
            self.last = Some(now_ms);
            return 1;
        };
        let ticks = now_ms.saturating_sub(last) / self.interval_ms;
        self.last = Some(last + ticks * self.interval_ms);
        ticks
    }

    /// Forgets the timeline position; the next call fires immediately
    pub fn restart(&mut self) {
        self.last = None;
    }
}
