use std::sync::Arc;

use parking_lot::Mutex;

use super::*;

#[test]
fn test_set_then_get_round_trip() {
    let store = Store::<Vec<u32>>::new();

    for i in 0..5u32 {
        let v: Vec<u32> = (0..i).collect();
        store.set("k", Stored::Value(v.clone()));
        assert_eq!(store.value("k"), Some(v));
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn test_absent_is_distinct_from_undefined() {
    let store = Store::<u32>::new();
    assert!(store.get("k").is_none());
    assert!(!store.has("k"));

    store.set("k", Stored::Undefined);
    assert!(store.has("k"));
    assert!(store.get("k").unwrap().is_undefined());
    assert_eq!(store.value("k"), None);
}

#[test]
fn test_error_slot_is_independent_of_data() {
    let store = Store::<u32>::new();
    let err = FetchError::msg("down");

    store.set("k", Stored::Value(1));
    store.set("err@k", Stored::Error(err.clone()));

    assert_eq!(store.value("k"), Some(1));
    assert!(store.get("err@k").unwrap().error().unwrap().ptr_eq(&err));
}

#[test]
fn test_delete_clear_and_keys() {
    let store = Store::<u32>::new();
    store.set("a", Stored::Value(1));
    store.set("b", Stored::Value(2));

    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    store.delete("a");
    assert!(!store.has("a"));
    assert!(store.has("b"));

    store.clear();
    assert!(store.is_empty());
}

#[test]
fn test_change_listeners_are_notified_on_every_write() {
    let store = Store::<u32>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();

    let subscription = store.subscribe_to_changes(move |change| {
        let entry = match change {
            StoreChange::Set(k) => format!("set:{k}"),
            StoreChange::Delete(k) => format!("delete:{k}"),
            StoreChange::Clear => "clear".to_string(),
        };
        s.lock().push(entry);
    });

    store.set("a", Stored::Value(1));
    store.set("a", Stored::Value(1));
    store.delete("a");
    store.clear();

    assert_eq!(*seen.lock(), vec!["set:a", "set:a", "delete:a", "clear"]);

    subscription.unsubscribe();
    assert_eq!(store.listener_count(), 0);

    store.set("b", Stored::Value(2));
    assert_eq!(seen.lock().len(), 4);
}

#[test]
fn test_listener_may_unsubscribe_others_while_notified() {
    let store = Store::<u32>::new();
    let victim = Arc::new(Mutex::new(None));
    let v = victim.clone();

    let _first = store.subscribe_to_changes(move |_| {
        v.lock().take();
    });
    let second = store.subscribe_to_changes(|_| {});
    *victim.lock() = Some(second);

    store.set("k", Stored::Value(1));
    assert_eq!(store.listener_count(), 1);
}
