/// Nanoseconds per second.
pub const NSEC_PER_SEC: usize = 1_000_000_000;

/// Microseconds per second.
pub const USEC_PER_SEC: usize = 1_000_000;

/// Milliseconds per second.
pub const MSEC_PER_SEC: usize = 1_000;
