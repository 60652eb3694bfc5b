//! Case 2: A second mutation starts while the first one is still resolving its value.
//!
//! Scenario:
//!
//! 1. `mutate(K, future resolving to V1 after 50ms)` starts.
//! 2. 10ms later `mutate(K, V2)` runs to completion.
//! 3. The first mutation's value resolves.
//!
//! Expected Result:
//!
//! - The store keeps V2.
//! - The first caller still receives V1.

use std::time::Duration;

use swr_engine::Cache;
use swr_engine::MutationValue;
use swr_engine::ObserveOptions;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_first_mutation_is_abandoned() {
    let cache = Cache::<u64>::new();
    let observer = cache.observe_cached("counter", ObserveOptions::new());

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move {
            let value = MutationValue::future(async {
                sleep(Duration::from_millis(50)).await;
                Ok(1)
            });
            cache.mutate("counter", Some(value), false).await
        })
    };
    sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.mutate("counter", Some(2.into()), false).await.unwrap(), Some(2));

    assert_eq!(first.await.unwrap().unwrap(), Some(1));
    assert_eq!(cache.data("counter"), Some(2));
    assert_eq!(observer.data(), Some(2));
}
