//! Wall-clock and peak-memory probes for request instrumentation
//!
//! Every timestamp in the instrumentation core is a `f64` in seconds since
//! an arbitrary epoch, monotonic within one request. The trait seam exists
//! so tests and trace replay can drive time explicitly instead of sleeping.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Time and memory source for one request
pub trait EventClock {
    /// Seconds since an arbitrary epoch, monotonic within a request
    fn now(&self) -> f64;

    /// Peak memory usage of the process in bytes, or 0 if unavailable
    fn peak_memory(&self) -> u64;
}

/// Production clock backed by `Instant` plus a `getrusage` memory probe
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl EventClock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn peak_memory(&self) -> u64 {
        peak_rss_bytes()
    }
}

/// Peak resident set size of the current process in bytes
///
/// Reads `ru_maxrss` via `getrusage(RUSAGE_SELF)`. Linux reports the value
/// in kilobytes, macOS in bytes. Returns 0 if the call fails, matching the
/// "no memory probe" contract.
pub fn peak_rss_bytes() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return 0;
    }

    let maxrss = usage.ru_maxrss.max(0) as u64;
    if cfg!(target_os = "macos") {
        maxrss
    } else {
        maxrss * 1024
    }
}

/// Hand-driven clock for tests and trace replay
///
/// Cloning yields a handle onto the same underlying time, so a replay loop
/// can keep advancing the clock it already handed to a profiler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current: Rc<Cell<f64>>,
    peak: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: f64) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    /// Move time to an absolute value. Going backwards is ignored so a
    /// malformed trace cannot break monotonicity.
    pub fn set(&self, now: f64) {
        if now > self.current.get() {
            self.current.set(now);
        }
    }

    pub fn advance(&self, delta: f64) {
        if delta > 0.0 {
            self.current.set(self.current.get() + delta);
        }
    }

    pub fn set_peak_memory(&self, bytes: u64) {
        self.peak.set(bytes);
    }
}

impl EventClock for ManualClock {
    fn now(&self) -> f64 {
        self.current.get()
    }

    fn peak_memory(&self) -> u64 {
        self.peak.get()
    }
}
