#[cfg(test)]
use mockall::automock;

/// Host environment signals consulted before retrying and before focus/reconnect
/// revalidation. Hosts without such signals use [`AlwaysAvailable`].
#[cfg_attr(test, automock)]
pub trait EnvironmentProbe: Send + Sync {
    fn is_visible(&self) -> bool {
        true
    }

    fn is_online(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAvailable;

impl EnvironmentProbe for AlwaysAvailable {}
