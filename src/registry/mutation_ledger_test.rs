use super::*;

#[test]
fn test_in_progress_window_supersedes_every_fetch() {
    let window = MutationWindow {
        started_at: 5,
        ended_at: 0,
    };
    assert!(window.in_progress());
    assert!(window.supersedes(3));
    assert!(window.supersedes(5));
    assert!(window.supersedes(9));
}

#[test]
fn test_closed_window_supersedes_only_overlapping_fetches() {
    let window = MutationWindow {
        started_at: 5,
        ended_at: 8,
    };
    // started before the mutation
    assert!(window.supersedes(4));
    // started while the mutation was resolving
    assert!(window.supersedes(6));
    // tie with the end counts as superseded
    assert!(window.supersedes(8));
    // started after the mutation committed
    assert!(!window.supersedes(9));
}

#[test]
fn test_begin_and_end() {
    let ledger = MutationLedger::new();
    assert!(ledger.get("k").is_none());
    assert!(!ledger.supersedes("k", 1));

    ledger.begin("k", 3);
    assert!(ledger.get("k").unwrap().in_progress());
    assert!(ledger.supersedes("k", 100));

    assert!(ledger.end("k", 3, 4));
    assert_eq!(ledger.get("k"), Some(MutationWindow { started_at: 3, ended_at: 4 }));
    assert!(!ledger.supersedes("k", 5));
}

#[test]
fn test_end_ignores_replaced_window() {
    let ledger = MutationLedger::new();
    ledger.begin("k", 3);
    ledger.begin("k", 6);

    assert!(!ledger.end("k", 3, 7));
    assert!(ledger.get("k").unwrap().in_progress());
    assert!(!ledger.end("other", 3, 7));
}
