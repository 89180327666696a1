//! Cancellable fan-out/fan-in over a group of tokio tasks.
//!
//! Every job runs in its own task inside a [`JoinSet`]. Under
//! [`FailurePolicy::FirstError`] the first failure cancels the shared token,
//! and the group waits until every sibling has observed it and exited before
//! handing the error back. No task outlives the call.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::error::InventoryError;

/// Run `jobs` concurrently and collect their outputs in completion order.
///
/// Returns exactly one output per job on success.
pub(crate) async fn run_all<T, F>(phase: &'static str, jobs: Vec<F>, policy: FailurePolicy) -> Result<Vec<T>, InventoryError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, InventoryError>> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for job in jobs {
        let token = cancel.clone();
        tasks.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => None,
                outcome = job => Some(outcome),
            }
        });
    }

    let expected = tasks.len();
    debug!(phase, tasks = expected, "fan-out started");

    let mut outputs = Vec::with_capacity(expected);
    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(Some(outcome)) => outcome,
            // Only reachable after cancel(), which returns below.
            Ok(None) => continue,
            Err(source) => Err(InventoryError::TaskAborted { phase, source }),
        };
        match outcome {
            Ok(output) => outputs.push(output),
            Err(err) if policy == FailurePolicy::FirstError => {
                let in_flight = tasks.len();
                warn!(phase, error = %err, in_flight, "cancelling in-flight tasks");
                cancel.cancel();
                while tasks.join_next().await.is_some() {}
                return Err(err);
            }
            Err(err) => {
                warn!(phase, error = %err, "task failed");
                errors.push(err);
            }
        }
    }

    match errors.len() {
        0 => {
            debug!(phase, completed = outputs.len(), "fan-in complete");
            Ok(outputs)
        }
        1 => Err(errors.remove(0)),
        _ => Err(InventoryError::Multiple(errors)),
    }
}
