use std::io;

use ::config::ConfigError;

use super::*;

#[test]
fn test_fetch_error_clones_share_identity() {
    let e = FetchError::msg("boom");
    let cloned = e.clone();

    assert!(e.ptr_eq(&cloned));
    assert_eq!(cloned.to_string(), "boom");
}

#[test]
fn test_fetch_error_equal_message_is_not_same_error() {
    let a = FetchError::msg("boom");
    let b = FetchError::msg("boom");

    assert!(!a.ptr_eq(&b));
    assert!(!same_error(Some(&a), Some(&b)));
    assert!(same_error(None, None));
    assert!(!same_error(Some(&a), None));
}

#[test]
fn test_fetch_error_downcast() {
    let e = FetchError::new(io::Error::new(io::ErrorKind::NotFound, "missing"));

    let io_err = e.downcast_ref::<io::Error>().expect("should be io::Error");
    assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    assert!(e.downcast_ref::<std::fmt::Error>().is_none());
}

#[test]
fn test_error_conversions() {
    let e: Error = ConfigError::Message("bad".into()).into();
    assert!(matches!(e, Error::Config(_)));
    assert!(e.as_fetch_error().is_none());

    let inner = FetchError::msg("rejected");
    let e = Error::Mutation(inner.clone());
    assert!(e.as_fetch_error().unwrap().ptr_eq(&inner));
    assert_eq!(e.to_string(), "Mutation failed: rejected");
}
