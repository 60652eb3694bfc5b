//! Process-wide bookkeeping shared by the revalidation and mutation engines.
//!
//! - [`InFlightRegistry`]: the fetch currently running for each key, for deduplication and
//!   last-started-wins ordering.
//! - [`MutationLedger`]: the window of the latest optimistic mutation for each key.
//! - [`SubscriberRegistry`]: per-key observer callbacks used for broadcast.
//!
//! All three are owned by one [`crate::Cache`] instance; none of them is a module static.

mod in_flight;
mod mutation_ledger;
mod subscribers;

pub use in_flight::*;
pub use mutation_ledger::*;
pub use subscribers::*;

#[cfg(test)]
mod mutation_ledger_test;
