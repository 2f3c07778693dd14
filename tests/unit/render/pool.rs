use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::assets::AssetDescriptor;
use crate::foundation::core::{FrameIndex, Viewport};
use crate::worker::{CaptureRequest, DiagnosticCallback, SessionInputs, WorkerError};

struct NullWorker;

#[async_trait]
impl Worker for NullWorker {
    async fn configure(&self, _viewport: Viewport) -> Result<(), WorkerError> {
        Ok(())
    }
    async fn inject(&self, _inputs: &SessionInputs) -> Result<(), WorkerError> {
        Ok(())
    }
    async fn seek(&self, _frame: FrameIndex) -> Result<(), WorkerError> {
        Ok(())
    }
    async fn capture(&self, _request: &CaptureRequest) -> Result<Option<Vec<u8>>, WorkerError> {
        Ok(None)
    }
    async fn collect_assets(&self, _frame: FrameIndex) -> Result<Vec<AssetDescriptor>, WorkerError> {
        Ok(Vec::new())
    }
    fn on_diagnostic(&self, _callback: DiagnosticCallback) {}
    async fn close(&self) -> Result<(), WorkerError> {
        Ok(())
    }
}

fn workers(n: usize) -> Vec<Arc<dyn Worker>> {
    (0..n).map(|_| Arc::new(NullWorker) as Arc<dyn Worker>).collect()
}

#[test]
fn empty_pool_is_rejected() {
    assert!(WorkerPool::new(Vec::new()).is_err());
}

#[tokio::test]
async fn acquire_and_release_keep_partition() {
    let pool = WorkerPool::new(workers(2)).unwrap();
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.handle().slot(), b.handle().slot());
    assert_eq!(pool.busy_count(), 2);
    assert_eq!(pool.idle_count(), 0);

    drop(a);
    assert_eq!(pool.busy_count() + pool.idle_count(), pool.capacity());
    drop(b);
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.stats().max_busy, 2);
}

#[tokio::test]
async fn waiters_are_served_fifo() {
    let pool = WorkerPool::new(workers(1)).unwrap();
    let held = pool.acquire().await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut joins = Vec::new();
    for i in 0..3 {
        let p = pool.clone();
        let order = order.clone();
        joins.push(tokio::spawn(async move {
            let lease = p.acquire().await.unwrap();
            order.lock().unwrap().push(i);
            tokio::time::sleep(Duration::from_millis(2)).await;
            drop(lease);
        }));
        // Make arrival order deterministic.
        while pool.stats().queued < i as u64 + 1 {
            tokio::task::yield_now().await;
        }
    }

    drop(held);
    for j in joins {
        j.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn abandoned_waiter_does_not_leak_a_handle() {
    let pool = WorkerPool::new(workers(1)).unwrap();
    let held = pool.acquire().await.unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(10), pool.acquire()).await;
    assert!(timed_out.is_err());

    drop(held);
    assert_eq!(pool.idle_count(), 1);
    let again = pool.acquire().await.unwrap();
    assert_eq!(again.handle().slot(), 0);
}

#[tokio::test]
async fn replace_all_invalidates_outstanding_handles() {
    let pool = WorkerPool::new(workers(2)).unwrap();
    let stale = pool.acquire().await.unwrap();
    assert_eq!(stale.handle().epoch(), 0);

    let old = pool.replace_all(workers(2)).unwrap();
    assert_eq!(old.len(), 2);
    assert_eq!(pool.epoch(), 1);
    assert_eq!(pool.idle_count(), 2);

    // Releasing a handle from the previous epoch changes nothing.
    drop(stale);
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.busy_count(), 0);

    let fresh = pool.acquire().await.unwrap();
    assert_eq!(fresh.handle().epoch(), 1);
    assert!(pool.replace_all(workers(3)).is_err());
}

#[tokio::test]
async fn replace_all_wakes_waiters() {
    let pool = WorkerPool::new(workers(1)).unwrap();
    let _stale = pool.acquire().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|l| l.handle().epoch()) })
    };
    while pool.stats().queued == 0 {
        tokio::task::yield_now().await;
    }
    pool.replace_all(workers(1)).unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn close_fails_queued_and_new_acquisitions() {
    let pool = WorkerPool::new(workers(1)).unwrap();
    let held = pool.acquire().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.is_err() })
    };
    while pool.stats().queued == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(pool.close().len(), 1);
    assert!(waiter.await.unwrap());
    assert!(pool.acquire().await.is_err());
    drop(held);
}
