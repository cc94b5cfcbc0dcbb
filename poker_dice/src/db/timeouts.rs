//! Storage call timeout helpers
//!
//! Wraps repository futures so a stalled backend can't hang a request.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

use super::errors::{RepositoryError, RepositoryResult};

/// Execute a repository call with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Repository call to execute
///
/// # Returns
///
/// * `RepositoryResult<T>` - Result or `RepositoryError::Timeout`
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout(duration)),
    }
}
