// Monotonic nanosecond timing

use std::sync::OnceLock;
use std::time::Instant;

/// Global anchor point for converting Instant to nanoseconds
static EPOCH: OnceLock<Instant> = OnceLock::new();

fn get_epoch() -> &'static Instant {
    EPOCH.get_or_init(Instant::now)
}

/// Nanosecond-precision timestamp relative to the process epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Nanos(pub u64);

impl Nanos {
    #[inline]
    pub const fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Elapsed nanoseconds since this timestamp
    #[inline]
    pub fn elapsed(self) -> u64 {
        nanos_since(self)
    }
}

impl std::ops::Sub for Nanos {
    type Output = u64;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Current time in nanoseconds since the process epoch (monotonic)
#[inline]
pub fn now_nanos() -> Nanos {
    let epoch = get_epoch();
    let elapsed = Instant::now().duration_since(*epoch);
    Nanos(elapsed.as_nanos() as u64)
}

/// Elapsed nanoseconds since the given start time
#[inline]
pub fn nanos_since(start: Nanos) -> u64 {
    now_nanos().0.saturating_sub(start.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_roundtrip() {
        let n = Nanos::new(12345);
        assert_eq!(n.as_u64(), 12345);
    }

    #[test]
    fn test_nanos_ordering() {
        assert!(Nanos(100) < Nanos(200));
        assert_eq!(Nanos(100), Nanos(100));
    }

    #[test]
    fn test_nanos_subtraction_saturates() {
        assert_eq!(Nanos(200) - Nanos(100), 100);
        assert_eq!(Nanos(100) - Nanos(200), 0);
    }

    #[test]
    fn test_time_advances() {
        let t1 = now_nanos();
        for _ in 0..1000 {
            std::hint::black_box(0);
        }
        let t2 = now_nanos();
        assert!(t2 > t1, "monotonic clock should advance");
    }

    #[test]
    fn test_nanos_since() {
        let start = now_nanos();
        for _ in 0..1000 {
            std::hint::black_box(0);
        }
        assert!(nanos_since(start) > 0);
        assert!(start.elapsed() > 0);
    }
}
