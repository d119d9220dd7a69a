//! Per-id concurrent fetches for performance collectors
//!
//! One task is spawned per resource id and the caller waits for all of them.
//! A failed id is logged and skipped. An authentication failure is fatal for
//! the whole pass: the array rejected a fresh login, so the remaining ids
//! would fail the same way.

use crate::error::{ClientError, Result};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Result of one per-id task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Number of samples emitted
    Emitted(usize),
    /// The array returned no buckets for this id
    NoData,
}

/// Counters for one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub tasks: usize,
    pub emitted: usize,
    pub no_data: usize,
    pub failed: usize,
}

fn is_fatal(err: &ClientError) -> bool {
    matches!(err, ClientError::Auth { .. } | ClientError::BudgetClosed)
}

/// Run every job concurrently and wait for all of them
pub async fn fan_out<J, F>(collector: &'static str, jobs: J) -> Result<FanOutSummary>
where
    J: IntoIterator<Item = (String, F)>,
    F: Future<Output = Result<TaskOutcome>> + Send + 'static,
{
    let mut set = JoinSet::new();
    let mut summary = FanOutSummary::default();

    for (id, job) in jobs {
        summary.tasks += 1;
        set.spawn(async move { (id, job.await) });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(TaskOutcome::Emitted(count)))) => summary.emitted += count,
            Ok((id, Ok(TaskOutcome::NoData))) => {
                debug!(collector = collector, id = %id, "No report data for resource");
                summary.no_data += 1;
            }
            Ok((id, Err(e))) if is_fatal(&e) => {
                error!(collector = collector, id = %id, error = %e, "Aborting collection pass");
                set.shutdown().await;
                return Err(e);
            }
            Ok((id, Err(e))) => {
                warn!(collector = collector, id = %id, error = %e, "Resource fetch failed");
                summary.failed += 1;
            }
            Err(e) if e.is_panic() => {
                error!(collector = collector, error = %e, "Collection task panicked");
                summary.failed += 1;
            }
            Err(_) => summary.failed += 1,
        }
    }

    Ok(summary)
}
