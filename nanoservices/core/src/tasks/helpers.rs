//! Runs synchronous warehouse and filesystem work off the async runtime.

use eltflow_utils::error::Error;
use eltflow_utils::EltResult;
use tokio::task;

/// Run a blocking closure on the blocking pool and flatten the join error
/// into the crate error type.
pub async fn run_blocking<F, T>(f: F) -> EltResult<T>
where
    F: FnOnce() -> EltResult<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_err) => Err(Error::TaskError(format!("blocking task aborted: {join_err}"))),
    }
}
