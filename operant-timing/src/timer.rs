use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic session clock, in nanoseconds since the timer was created
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;

    fn elapsed(&self, since_ns: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since_ns))
    }

    /// Blocking pause; only used for hardware settling during teardown
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Wall-clock instant matching a timer reading
    pub fn instant_at(&self, ns: u64) -> Instant {
        self.start + Duration::from_nanos(ns)
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand-driven clock for tests and simulations; `sleep` advances it
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Moves the clock forward to `ns`; never moves it backwards
    pub fn set(&self, ns: u64) {
        self.now_ns.fetch_max(ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_is_shared_between_clones() {
        let t = ManualTimer::new();
        let view = t.clone();
        t.advance(Duration::from_millis(1500));
        assert_eq!(view.now(), 1_500_000_000);
        view.sleep(Duration::from_millis(500));
        assert_eq!(t.elapsed(0), Duration::from_secs(2));
        t.set(10);
        assert_eq!(t.now(), 2_000_000_000);
    }

    #[test]
    fn high_precision_timer_is_monotonic() {
        let t = HighPrecisionTimer::new();
        let a = t.now();
        t.sleep(Duration::from_millis(2));
        let b = t.now();
        assert!(b >= a + 2_000_000);
        assert!(t.elapsed(a) >= Duration::from_millis(2));
    }
}
