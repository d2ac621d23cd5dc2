use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`.
///
/// Every collaborator call goes through here so an adapter that ignores its own
/// timeout still cannot stall the supervision loop. Returns `None` when the limit
/// elapses; the future is dropped at that point.
pub async fn bounded<F, T>(what: &str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", what, limit);
            None
        }
    }
}

/// `bounded` for probes whose only answer is yes/no; a timeout counts as no
pub async fn bounded_check<F>(what: &str, limit: Duration, fut: F) -> bool
where
    F: Future<Output = bool>,
{
    bounded(what, limit, fut).await.unwrap_or(false)
}
