//! "Start everything, keep the first success" combinator.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Poll all `futures` concurrently and return the first `Ok`.
///
/// Returns every error, in completion order, when none succeeds. Remaining
/// futures are dropped once a success is seen.
pub async fn first_success<I, F, T, E>(futures: I) -> Result<T, Vec<E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<F> = futures.into_iter().collect();
    let mut errors = Vec::new();
    while let Some(result) = pending.next().await {
        match result {
            Ok(value) => return Ok(value),
            Err(err) => errors.push(err),
        }
    }
    Err(errors)
}
