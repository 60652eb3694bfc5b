//! Cache Engine Error Hierarchy
//!
//! Two families of failures exist:
//! - [`FetchError`]: the value-level error of a resource. It is cached under the resource's
//!   error key, broadcast to observers and handed to retry policies, so it must be cheap to
//!   clone and comparable by reference.
//! - [`Error`]: failures surfaced to direct callers of the engine (configuration loading and
//!   re-raised mutation failures).

use std::fmt;
use std::sync::Arc;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The value producer of a mutation failed; re-raised to the mutation's caller
    #[error("Mutation failed: {0}")]
    Mutation(#[source] FetchError),

    /// Unrecoverable internal failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Returns the resource-level error carried by a failed mutation, if any
    pub fn as_fetch_error(&self) -> Option<&FetchError> {
        match self {
            Error::Mutation(e) => Some(e),
            _ => None,
        }
    }
}

/// Resource-level error produced by a fetcher or a mutation value producer.
///
/// Clones share the same underlying error; [`FetchError::ptr_eq`] tells whether two handles
/// point at the same failure, which is how observers decide whether their error slot changed.
#[derive(Clone)]
pub struct FetchError {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl FetchError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build an error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Same failure instance (not merely an equal message)
    pub fn ptr_eq(
        &self,
        other: &FetchError,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attempt to view the underlying error as a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for FetchError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for FetchError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

/// Compare two optional error slots by reference
pub(crate) fn same_error(
    a: Option<&FetchError>,
    b: Option<&FetchError>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}
