// -
// Key namespaces

/// Prefix of the store slot holding a resource's last error
pub(crate) const ERROR_KEY_PREFIX: &str = "err@";

/// Prefix of canonical keys hashed from composite key values
pub(crate) const COMPOSITE_KEY_PREFIX: &str = "arg";

/// Separator between hashed composite key elements
pub(crate) const COMPOSITE_KEY_SEPARATOR: char = '@';

/// Prepended to plain string keys that would otherwise fall into a reserved namespace
pub(crate) const PLAIN_KEY_ESCAPE: char = '\\';

// -
// Retry

/// Largest backoff exponent honored; 2^31 * interval already exceeds any sane schedule
pub(crate) const MAX_BACKOFF_EXPONENT_LIMIT: u32 = 31;

// -
// Channels

/// Capacity of each observer's state change stream
pub(crate) const STATE_CHANGE_BUFFER_SIZE: usize = 64;
