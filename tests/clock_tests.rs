use std::thread;
use std::time::Duration;

use belog::clock;

#[test]
fn ticks_are_monotonic_under_load() {
    let mut prev = clock::now();
    for _ in 0..10_000 {
        let current = clock::now();
        assert!(current >= prev, "tick counter went backwards");
        prev = current;
    }
}

#[test]
fn frequency_is_positive_and_stable() {
    let first = clock::freq();
    assert!(first > 0);
    assert_eq!(first, clock::freq());
}

#[test]
fn ticks_track_wall_clock_roughly() {
    let frequency = clock::freq() as f64;
    let start = clock::now();
    thread::sleep(Duration::from_millis(50));
    let elapsed = clock::now().wrapping_sub(start) as f64 / frequency;
    // Scheduling noise allowed; an order-of-magnitude check is enough to
    // catch a miscalibrated frequency.
    assert!(elapsed > 0.01, "measured {} s for a 50 ms sleep", elapsed);
    assert!(elapsed < 2.0, "measured {} s for a 50 ms sleep", elapsed);
}

#[test]
fn concurrent_readers_see_consistent_time() {
    let reader = thread::spawn(|| {
        let mut samples = Vec::with_capacity(1000);
        for _ in 0..1000 {
            samples.push(clock::now());
        }
        samples
    });

    let mut local = Vec::with_capacity(1000);
    for _ in 0..1000 {
        local.push(clock::now());
    }

    let samples = reader.join().expect("join");
    for window in samples.windows(2).chain(local.windows(2)) {
        assert!(window[1] >= window[0]);
    }
}
