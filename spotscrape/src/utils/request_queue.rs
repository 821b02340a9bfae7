//! Bounded-concurrency request queue
//!
//! At most `limit` outbound calls run at once. Waiters are admitted in
//! arrival order (tokio's semaphore is fair).

use spotscrape_common::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug, Clone)]
pub struct RequestQueue {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl RequestQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot; it is released when the permit is dropped
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("request queue closed: {}", e)))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let queue = RequestQueue::new(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = queue.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_waiters_admitted_in_fifo_order() {
        let queue = RequestQueue::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        // Hold the only slot while waiters line up
        let gate = queue.permits.clone().acquire_owned().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _permit = queue.acquire().await.unwrap();
                order.lock().await.push(i);
            }));
            // Let the task reach the semaphore before spawning the next
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(gate);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }
}
