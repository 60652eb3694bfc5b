use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::Weak;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;

use super::KeyPart;
use crate::constants::COMPOSITE_KEY_PREFIX;
use crate::constants::COMPOSITE_KEY_SEPARATOR;

/// Pure function turning a composite key into its canonical string
#[cfg_attr(test, automock)]
pub trait KeyHasher: Send + Sync {
    /// Must be deterministic for equal inputs and return "" for an empty slice
    fn hash(
        &self,
        parts: &[KeyPart],
    ) -> String;
}

/// Default hasher: primitives hash by value, objects by allocation identity.
///
/// Each distinct live object receives a process-unique id the first time it is hashed.
/// The table holds only weak references, so hashing never extends an object's lifetime;
/// an address reused after the original object died is given a fresh id.
#[derive(Debug, Default)]
pub struct IdentityKeyHasher {
    table: Mutex<IdentityTable>,
}

#[derive(Debug, Default)]
struct IdentityTable {
    ids: HashMap<usize, (Weak<dyn Any + Send + Sync>, u64)>,
    next_id: u64,
}

impl IdentityTable {
    fn id_of(
        &mut self,
        object: &Arc<dyn Any + Send + Sync>,
    ) -> u64 {
        let addr = Arc::as_ptr(object) as *const () as usize;
        if let Some((weak, id)) = self.ids.get(&addr) {
            if weak.strong_count() > 0 {
                return *id;
            }
        }

        self.ids.retain(|_, (weak, _)| weak.strong_count() > 0);
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(addr, (Arc::downgrade(object), id));
        id
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

impl IdentityKeyHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of object identities currently tracked
    pub fn tracked_objects(&self) -> usize {
        self.table.lock().len()
    }
}

impl KeyHasher for IdentityKeyHasher {
    fn hash(
        &self,
        parts: &[KeyPart],
    ) -> String {
        if parts.is_empty() {
            return String::new();
        }

        let mut key = String::from(COMPOSITE_KEY_PREFIX);
        for part in parts {
            key.push(COMPOSITE_KEY_SEPARATOR);
            // writing into a String cannot fail
            let _ = match part {
                KeyPart::Null => write!(key, "null"),
                KeyPart::Bool(b) => write!(key, "{b}"),
                KeyPart::Int(i) => write!(key, "{i}"),
                KeyPart::Str(s) => write!(key, "{s:?}"),
                KeyPart::Object(o) => {
                    let id = self.table.lock().id_of(o);
                    write!(key, "#{id}")
                }
            };
        }
        key
    }
}
