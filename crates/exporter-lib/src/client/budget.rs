//! Process-wide budget for in-flight upstream requests

use crate::error::{ClientError, Result};
use crate::observability::ExporterMetrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Default number of concurrent upstream requests
pub const DEFAULT_REQUEST_LIMIT: usize = 50;

/// Counting semaphore shared by every array client.
///
/// Every upstream call holds a [`BudgetPermit`] for its whole duration, so the
/// load placed on the arrays stays bounded no matter how many collectors fan
/// out at once. Permits are released when dropped, on every exit path.
#[derive(Clone)]
pub struct RequestBudget {
    inner: Arc<BudgetInner>,
}

struct BudgetInner {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    metrics: ExporterMetrics,
}

impl RequestBudget {
    /// Create a budget with `capacity` permits (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(BudgetInner {
                semaphore: Semaphore::new(capacity),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                metrics: ExporterMetrics::new(),
            }),
        }
    }

    /// Wait for a free permit
    pub async fn acquire(&self) -> Result<BudgetPermit<'_>> {
        let permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .map_err(|_| ClientError::BudgetClosed)?;

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        self.inner.metrics.set_upstream_in_flight(now as i64);

        Ok(BudgetPermit {
            _permit: permit,
            inner: &self.inner,
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously held permits since creation
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_LIMIT)
    }
}

/// A held request permit; dropping it returns the permit to the budget
pub struct BudgetPermit<'a> {
    _permit: SemaphorePermit<'a>,
    inner: &'a BudgetInner,
}

impl Drop for BudgetPermit<'_> {
    fn drop(&mut self) {
        let now = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.inner.metrics.set_upstream_in_flight(now as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let budget = RequestBudget::new(0);
        assert_eq!(budget.capacity(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let budget = RequestBudget::new(2);
        {
            let _a = budget.acquire().await.unwrap();
            let _b = budget.acquire().await.unwrap();
            assert_eq!(budget.in_flight(), 2);
        }
        assert_eq!(budget.in_flight(), 0);
        assert_eq!(budget.peak(), 2);
    }

    #[tokio::test]
    async fn test_permit_released_when_task_fails() {
        let budget = RequestBudget::new(1);

        let result: Result<()> = async {
            let _permit = budget.acquire().await?;
            Err(ClientError::BudgetClosed)
        }
        .await;

        assert!(result.is_err());
        assert_eq!(budget.in_flight(), 0);
        // The single permit must be available again
        let _permit = budget.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_capacity() {
        let budget = RequestBudget::new(3);
        let mut handles = Vec::new();

        for _ in 0..20 {
            let budget = budget.clone();
            handles.push(tokio::spawn(async move {
                let _permit = budget.acquire().await.unwrap();
                assert!(budget.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(budget.peak() <= 3);
        assert!(budget.peak() >= 1);
        assert_eq!(budget.in_flight(), 0);
    }
}
