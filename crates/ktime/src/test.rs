extern crate std;

use crate::{TimeSpec, NSEC_PER_SEC};

#[test]
fn add_carries_nanoseconds() {
    let a = TimeSpec::new(1, NSEC_PER_SEC - 1);
    let b = TimeSpec::new(0, 2);
    assert_eq!(a + b, TimeSpec::new(2, 1));
}

#[test]
fn sub_saturates() {
    let a = TimeSpec::new(1, 0);
    let b = TimeSpec::new(2, 0);
    assert_eq!(a - b, TimeSpec::default());
    assert_eq!(b - a, TimeSpec::new(1, 0));
    assert_eq!(TimeSpec::new(2, 1) - TimeSpec::new(1, 2), TimeSpec::new(0, NSEC_PER_SEC - 1));
}

#[test]
fn tick_round_trip() {
    let hz = 100;
    let ts = TimeSpec::new(0, 15_000_000); // 15 ms
    assert_eq!(ts.to_ticks(hz), 2); // rounds up to 2 ticks at 10 ms/tick
    assert_eq!(TimeSpec::from_ticks(250, hz), TimeSpec::new(2, 500_000_000));
}
