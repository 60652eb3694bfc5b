use std::collections::HashSet;
use std::sync::Arc;

use crate::time::LogicalClock;

#[test]
fn test_now_strictly_increases() {
    let clock = LogicalClock::new();
    assert_eq!(clock.current(), 0);

    let t1 = clock.now();
    let t2 = clock.now();
    assert!(t1 > 0);
    assert!(t2 > t1);
    assert_eq!(clock.current(), t2);
}

#[test]
fn test_now_is_unique_across_threads() {
    let clock = Arc::new(LogicalClock::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let clock = clock.clone();
            std::thread::spawn(move || (0..250).map(|_| clock.now()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for h in handles {
        for t in h.join().unwrap() {
            assert!(seen.insert(t), "timestamp {t} issued twice");
        }
    }
    assert_eq!(seen.len(), 1000);
    assert_eq!(clock.current(), 1000);
}
