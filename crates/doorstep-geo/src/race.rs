use std::future::Future;

use doorstep_common::Result;
use tracing::debug;

/// Run `attempt` over `items` in priority order and return the first success.
///
/// Each failure is logged and the next item is tried; an item is never
/// retried within one call. Returns `None` only when every item failed.
pub async fn first_success<T, I, F, Fut>(items: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for item in items {
        match attempt(item).await {
            Ok(value) => return Some(value),
            Err(err) => debug!("attempt failed: {err}"),
        }
    }
    None
}
