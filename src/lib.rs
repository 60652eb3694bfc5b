//! Client-side cache consistency engine for remote resources.
//!
//! Observers bind a fetcher to a key and see the cached value immediately while a
//! revalidation runs in the background. Concurrent fetches of one key are deduplicated,
//! stale results are discarded by start-timestamp ordering, and optimistic mutations take
//! precedence over fetches they overlap.
//!
//! ```ignore
//! let cache = Cache::<User>::new();
//! let users = cache.observe("user/1", fetcher(|args| load_user(args)), ObserveOptions::new());
//! users.revalidate(RevalidateOptions::deduped()).await;
//! cache.mutate("user/1", Some(renamed.into()), true).await?;
//! ```

mod config;
mod constants;
mod engine;
mod errors;
mod key;
mod registry;
mod store;
pub mod utils;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use key::*;
pub use registry::*;
pub use store::*;
pub use utils::*;

#[cfg(test)]
mod errors_test;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
