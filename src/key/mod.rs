//! Key canonicalization.
//!
//! Resources are addressed by arbitrary [`Key`] values: plain strings, integers, composite
//! tuples of [`KeyPart`]s, or lazily evaluated producers. [`KeyCodec::serialize`] maps each
//! of them onto a [`SerializedKey`]: the canonical string identifying the resource, the
//! positional arguments to hand to the fetcher, and the store slot reserved for the
//! resource's last error.
//!
//! The empty canonical key is the sentinel for "no resource": every engine operation on it
//! returns immediately.
//!
//! Composite keys and error slots own the `arg@` and `err@` namespaces. A plain string key
//! starting with either (or with the escape character) is prefixed with `\`, so no plain
//! key can alias a composite key or another resource's error slot.

mod hasher;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use hasher::*;
use tracing::trace;

use crate::constants::COMPOSITE_KEY_PREFIX;
use crate::constants::COMPOSITE_KEY_SEPARATOR;
use crate::constants::ERROR_KEY_PREFIX;
use crate::constants::PLAIN_KEY_ESCAPE;


/// Failure raised by a key producer that is not ready yet
pub type KeyProducerError = Box<dyn std::error::Error + Send + Sync>;

pub type Producer = Arc<dyn Fn() -> std::result::Result<Key, KeyProducerError> + Send + Sync>;

/// A key value as supplied by callers
#[derive(Clone, Default)]
pub enum Key {
    /// No resource
    #[default]
    Empty,
    Str(String),
    Int(i64),
    /// Ordered composite key; elements are also the fetcher's positional arguments
    Composite(Vec<KeyPart>),
    /// Zero-argument producer evaluated at serialization time
    Producer(Producer),
}

impl Key {
    /// Wrap a key producer. A producer that fails disables the resource.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> std::result::Result<Key, KeyProducerError> + Send + Sync + 'static,
    {
        Key::Producer(Arc::new(f))
    }

    pub fn composite(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Key::Composite(parts.into_iter().collect())
    }
}

impl fmt::Debug for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Key::Empty => f.write_str("Empty"),
            Key::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Key::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Key::Composite(parts) => f.debug_tuple("Composite").field(parts).finish(),
            Key::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Str(s.clone())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Key::Empty)
    }
}

impl From<Vec<KeyPart>> for Key {
    fn from(parts: Vec<KeyPart>) -> Self {
        Key::Composite(parts)
    }
}

/// One element of a composite key
#[derive(Clone)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Opaque object compared by identity: two parts are the same iff they share the allocation
    Object(Arc<dyn Any + Send + Sync>),
}

impl KeyPart {
    pub fn object<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        KeyPart::Object(value)
    }

    /// Downcast an object part back to its concrete type
    pub fn as_object<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            KeyPart::Object(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for KeyPart {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            KeyPart::Null => f.write_str("Null"),
            KeyPart::Bool(b) => write!(f, "Bool({b})"),
            KeyPart::Int(i) => write!(f, "Int({i})"),
            KeyPart::Str(s) => write!(f, "Str({s:?})"),
            KeyPart::Object(o) => write!(f, "Object({:p})", Arc::as_ptr(o)),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        KeyPart::Int(i)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

/// Result of canonicalizing a [`Key`]
#[derive(Debug, Clone, Default)]
pub struct SerializedKey {
    /// Stable identity of the resource; empty means "no resource"
    pub key: String,
    /// Composite elements to splat into the fetcher, `None` for plain keys
    pub args: Option<Vec<KeyPart>>,
    /// Store slot holding the resource's last error; empty iff `key` is empty
    pub error_key: String,
}

impl SerializedKey {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Arguments for the fetcher: the composite parts, or the plain key as supplied
    pub fn fetch_args(&self) -> FetchArgs {
        match &self.args {
            Some(parts) => FetchArgs::Parts(parts.clone()),
            None => FetchArgs::Key(unescape_plain(&self.key).to_string()),
        }
    }
}

/// What a fetcher is invoked with
#[derive(Debug, Clone)]
pub enum FetchArgs {
    /// The canonical key of a plain key
    Key(String),
    /// The elements of a composite key, in order
    Parts(Vec<KeyPart>),
}

impl FetchArgs {
    /// The single string argument of a plain key
    pub fn as_key(&self) -> Option<&str> {
        match self {
            FetchArgs::Key(k) => Some(k),
            FetchArgs::Parts(_) => None,
        }
    }

    pub fn parts(&self) -> &[KeyPart] {
        match self {
            FetchArgs::Key(_) => &[],
            FetchArgs::Parts(p) => p,
        }
    }
}

/// Canonicalizes keys through an injected [`KeyHasher`] for composites
#[derive(Clone)]
pub struct KeyCodec {
    hasher: Arc<dyn KeyHasher>,
}

impl fmt::Debug for KeyCodec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(Arc::new(IdentityKeyHasher::new()))
    }
}

impl KeyCodec {
    pub fn new(hasher: Arc<dyn KeyHasher>) -> Self {
        Self { hasher }
    }

    pub fn serialize(
        &self,
        key: &Key,
    ) -> SerializedKey {
        let resolved;
        let key = match key {
            Key::Producer(produce) => {
                resolved = match produce() {
                    Ok(k) => k,
                    Err(e) => {
                        trace!("key producer not ready, resource disabled: {}", e);
                        Key::Empty
                    }
                };
                &resolved
            }
            other => other,
        };

        let (canonical, args) = match key {
            Key::Empty => (String::new(), None),
            Key::Str(s) => (escape_plain(s), None),
            Key::Int(i) => (i.to_string(), None),
            Key::Composite(parts) => (self.hasher.hash(parts), Some(parts.clone())),
            // a producer yielding another producer is not unwrapped twice
            Key::Producer(_) => (String::new(), None),
        };

        let error_key = if canonical.is_empty() {
            String::new()
        } else {
            error_key_for(&canonical)
        };

        SerializedKey {
            key: canonical,
            args,
            error_key,
        }
    }
}

/// Error slot name of a canonical key
pub fn error_key_for(canonical: &str) -> String {
    format!("{ERROR_KEY_PREFIX}{canonical}")
}

fn is_reserved_plain(s: &str) -> bool {
    if s.starts_with(PLAIN_KEY_ESCAPE) || s.starts_with(ERROR_KEY_PREFIX) {
        return true;
    }
    s.strip_prefix(COMPOSITE_KEY_PREFIX)
        .is_some_and(|rest| rest.starts_with(COMPOSITE_KEY_SEPARATOR))
}

fn escape_plain(s: &str) -> String {
    if is_reserved_plain(s) {
        format!("{PLAIN_KEY_ESCAPE}{s}")
    } else {
        s.to_string()
    }
}

/// Inverse of `escape_plain`; only valid on canonical keys of plain strings
fn unescape_plain(canonical: &str) -> &str {
    canonical.strip_prefix(PLAIN_KEY_ESCAPE).unwrap_or(canonical)
}
