use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Run `task` after `delay` unless `token` is cancelled first
pub(crate) fn spawn_after<F>(
    name: &'static str,
    delay: Duration,
    token: CancellationToken,
    task: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                trace!("delayed task: {name} cancelled");
            }
            _ = sleep(delay) => {
                task.await;
            }
        }
    })
}

/// Run `task` after `delay`, not tied to any owner's lifetime
pub(crate) fn spawn_detached_after<F>(
    delay: Duration,
    task: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        sleep(delay).await;
        task.await;
    })
}
