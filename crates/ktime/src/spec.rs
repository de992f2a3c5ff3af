use core::ops::{Add, AddAssign, Sub};

use crate::config::NSEC_PER_SEC;

/// Represents an elapsed time.
#[repr(C)]
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct TimeSpec {
    /// Number of whole seconds of elapsed time.
    pub tv_sec: usize,

    /// Number of nanoseconds of rest of elapsed time minus tv_sec.
    pub tv_nsec: usize,
}

impl TimeSpec {
    /// Creates a new time specification from seconds and nanoseconds.
    pub const fn new(tv_sec: usize, tv_nsec: usize) -> Self {
        Self { tv_sec, tv_nsec }
    }

    /// Creates a time specification from a tick count at the given tick rate.
    pub fn from_ticks(ticks: u64, hz: usize) -> Self {
        let sec = ticks as usize / hz;
        let rest = ticks as usize % hz;
        Self {
            tv_sec: sec,
            tv_nsec: rest * (NSEC_PER_SEC / hz),
        }
    }

    /// Converts this time specification to a tick count at the given tick rate.
    ///
    /// Rounds up, so that a non-zero wait never becomes a zero-tick wait.
    pub fn to_ticks(&self, hz: usize) -> u64 {
        let nsec_per_tick = NSEC_PER_SEC / hz;
        (self.tv_sec * hz) as u64 + ((self.tv_nsec + nsec_per_tick - 1) / nsec_per_tick) as u64
    }

    /// Returns true for the all-zero time specification.
    pub fn is_zero(&self) -> bool {
        self.tv_sec == 0 && self.tv_nsec == 0
    }

    fn normalized(tv_sec: usize, tv_nsec: usize) -> Self {
        Self {
            tv_sec: tv_sec + tv_nsec / NSEC_PER_SEC,
            tv_nsec: tv_nsec % NSEC_PER_SEC,
        }
    }
}

impl Add for TimeSpec {
    type Output = TimeSpec;

    fn add(self, rhs: Self) -> Self::Output {
        Self::normalized(self.tv_sec + rhs.tv_sec, self.tv_nsec + rhs.tv_nsec)
    }
}

impl AddAssign for TimeSpec {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    /// Saturates at zero.
    fn sub(self, rhs: Self) -> Self::Output {
        if rhs >= self {
            return Self::default();
        }
        if self.tv_nsec >= rhs.tv_nsec {
            Self {
                tv_sec: self.tv_sec - rhs.tv_sec,
                tv_nsec: self.tv_nsec - rhs.tv_nsec,
            }
        } else {
            Self {
                tv_sec: self.tv_sec - rhs.tv_sec - 1,
                tv_nsec: NSEC_PER_SEC + self.tv_nsec - rhs.tv_nsec,
            }
        }
    }
}
