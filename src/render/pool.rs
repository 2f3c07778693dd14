use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::foundation::error::{FramecastError, FramecastResult};
use crate::worker::Worker;

/// Opaque reference to one pooled session: a slot in the pool's table plus the crash epoch it was
/// issued in. Handles from an older epoch are never served again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerHandle {
    slot: usize,
    epoch: u64,
}

impl WorkerHandle {
    pub fn slot(self) -> usize {
        self.slot
    }

    pub fn epoch(self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerPoolStats {
    /// Leases handed out.
    pub acquisitions: u64,
    /// Acquisitions that had to queue for a release.
    pub queued: u64,
    /// Highest number of simultaneously busy handles observed.
    pub max_busy: usize,
    /// Wholesale refills after a crash.
    pub replacements: u64,
}

struct Grant {
    handle: WorkerHandle,
    worker: Arc<dyn Worker>,
}

struct PoolState {
    epoch: u64,
    slots: Vec<Arc<dyn Worker>>,
    busy: Vec<bool>,
    idle: VecDeque<usize>,
    waiters: VecDeque<oneshot::Sender<Grant>>,
    closed: bool,
    stats: WorkerPoolStats,
}

impl PoolState {
    fn busy_count(&self) -> usize {
        self.busy.iter().filter(|b| **b).count()
    }

    fn grant(&mut self, slot: usize) -> Grant {
        self.busy[slot] = true;
        self.stats.acquisitions += 1;
        self.stats.max_busy = self.stats.max_busy.max(self.busy_count());
        Grant {
            handle: WorkerHandle {
                slot,
                epoch: self.epoch,
            },
            worker: self.slots[slot].clone(),
        }
    }

    /// Give `slot` to the longest-waiting live acquirer, or park it as idle.
    fn hand_off(&mut self, slot: usize) {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.is_closed() {
                continue;
            }
            let grant = self.grant(slot);
            match waiter.send(grant) {
                Ok(()) => return,
                // Acquirer went away between the check and the send.
                Err(_) => {
                    self.busy[slot] = false;
                    self.stats.acquisitions -= 1;
                }
            }
        }
        self.busy[slot] = false;
        self.idle.push_back(slot);
    }
}

/// Fixed-capacity pool of worker sessions with FIFO blocking acquisition.
///
/// `idle + busy == capacity` holds for the current epoch. The pool knows nothing about crashes; the
/// recovery coordinator swaps its whole table through [`WorkerPool::replace_all`].
pub struct WorkerPool {
    capacity: usize,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn new(workers: Vec<Arc<dyn Worker>>) -> FramecastResult<Arc<Self>> {
        if workers.is_empty() {
            return Err(FramecastError::configuration(
                "worker pool capacity must be >= 1",
            ));
        }
        let capacity = workers.len();
        Ok(Arc::new(Self {
            capacity,
            state: Mutex::new(PoolState {
                epoch: 0,
                slots: workers,
                busy: vec![false; capacity],
                idle: (0..capacity).collect(),
                waiters: VecDeque::new(),
                closed: false,
                stats: WorkerPoolStats::default(),
            }),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.lock().busy_count()
    }

    /// Current crash epoch.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn stats(&self) -> WorkerPoolStats {
        self.lock().stats.clone()
    }

    /// Take an idle session, or queue until one is released. Queued callers are served in arrival
    /// order. Dropping the returned future gives up the place in the queue without leaking a
    /// session.
    pub async fn acquire(self: &Arc<Self>) -> FramecastResult<PoolLease> {
        let rx = {
            let mut state = self.lock();
            if state.closed {
                return Err(FramecastError::fatal("worker pool is closed"));
            }
            if let Some(slot) = state.idle.pop_front() {
                let grant = state.grant(slot);
                return Ok(self.lease(grant));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            state.stats.queued += 1;
            rx
        };

        let mut pending = PendingAcquire { pool: self, rx };
        let grant = (&mut pending.rx)
            .await
            .map_err(|_| FramecastError::fatal("worker pool closed while waiting"))?;
        Ok(self.lease(grant))
    }

    fn lease(self: &Arc<Self>, grant: Grant) -> PoolLease {
        PoolLease {
            pool: Arc::clone(self),
            handle: grant.handle,
            worker: grant.worker,
        }
    }

    fn release(&self, handle: WorkerHandle) {
        let mut state = self.lock();
        if state.closed || handle.epoch != state.epoch {
            return;
        }
        if !state.busy[handle.slot] {
            tracing::warn!(slot = handle.slot, "release of a handle that is not busy");
            return;
        }
        state.hand_off(handle.slot);
    }

    /// Install a fresh table of sessions under a new epoch and wake queued acquirers.
    ///
    /// Returns the previous sessions so the caller can close them.
    pub(crate) fn replace_all(
        &self,
        workers: Vec<Arc<dyn Worker>>,
    ) -> FramecastResult<Vec<Arc<dyn Worker>>> {
        if workers.len() != self.capacity {
            return Err(FramecastError::fatal(format!(
                "replacement pool size {} does not match capacity {}",
                workers.len(),
                self.capacity
            )));
        }
        let mut state = self.lock();
        if state.closed {
            return Err(FramecastError::fatal("worker pool is closed"));
        }
        state.epoch += 1;
        state.stats.replacements += 1;
        let old = std::mem::replace(&mut state.slots, workers);
        state.busy.iter_mut().for_each(|b| *b = false);
        state.idle.clear();
        for slot in 0..self.capacity {
            state.hand_off(slot);
        }
        Ok(old)
    }

    /// Close the pool: fail queued and future acquisitions and return every session for teardown.
    pub(crate) fn close(&self) -> Vec<Arc<dyn Worker>> {
        let mut state = self.lock();
        state.closed = true;
        state.waiters.clear();
        state.idle.clear();
        state.busy.iter_mut().for_each(|b| *b = false);
        std::mem::take(&mut state.slots)
    }
}

struct PendingAcquire<'a> {
    pool: &'a WorkerPool,
    rx: oneshot::Receiver<Grant>,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        // A grant may have landed after the waiter stopped polling; return it.
        self.rx.close();
        if let Ok(grant) = self.rx.try_recv() {
            self.pool.release(grant.handle);
        }
    }
}

/// Exclusive use of one pooled session. Released on drop.
pub struct PoolLease {
    pool: Arc<WorkerPool>,
    handle: WorkerHandle,
    worker: Arc<dyn Worker>,
}

impl PoolLease {
    pub fn handle(&self) -> WorkerHandle {
        self.handle
    }

    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        self.pool.release(self.handle);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pool.rs"]
mod tests;
