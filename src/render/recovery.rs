//! Host crash recovery.
//!
//! The coordinator owns the current host and the crash epoch. Replacement is admitted through a
//! single async lock: the first task to report a crash in epoch `e` replaces the host, and every
//! other task that observed `e` waits on that same lock, sees the epoch has moved on, and returns
//! without starting a second cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cancel::CancelSignal;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::render::pool::WorkerPool;
use crate::render::session_init::{SessionSetup, close_quietly, init_sessions};
use crate::worker::{Host, Worker, WorkerProvider};

struct CurrentHost {
    /// `None` once closed and not yet replaced.
    host: Option<Arc<dyn Host>>,
    epoch: u64,
    shut_down: bool,
}

pub(crate) struct RecoveryCoordinator {
    provider: Arc<dyn WorkerProvider>,
    pool: Arc<WorkerPool>,
    setup: Arc<SessionSetup>,
    cancel: CancelSignal,
    current: tokio::sync::Mutex<CurrentHost>,
    /// Crash flag of the host serving `pool.epoch()`.
    lost: Mutex<(u64, Arc<AtomicBool>)>,
}

impl RecoveryCoordinator {
    /// Launch the first host and fill a pool of `capacity` ready sessions. All or nothing.
    pub(crate) async fn start(
        provider: Arc<dyn WorkerProvider>,
        capacity: usize,
        setup: Arc<SessionSetup>,
        cancel: CancelSignal,
    ) -> FramecastResult<Arc<Self>> {
        let host = cancel
            .race(async { provider.create_host().await.map_err(FramecastError::from) })
            .await?;
        let flag = watch_host(&host, 0);
        let workers = match init_sessions(&host, capacity, &setup, &cancel).await {
            Ok(w) => w,
            Err(err) => {
                close_host_quietly(&host).await;
                return Err(err);
            }
        };
        let pool = WorkerPool::new(workers)?;
        tracing::info!(capacity, "worker pool ready");

        Ok(Arc::new(Self {
            provider,
            pool,
            setup,
            cancel,
            current: tokio::sync::Mutex::new(CurrentHost {
                host: Some(host),
                epoch: 0,
                shut_down: false,
            }),
            lost: Mutex::new((0, flag)),
        }))
    }

    pub(crate) fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    fn lost(&self) -> MutexGuard<'_, (u64, Arc<AtomicBool>)> {
        match self.lost.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether the host that issued handles of `epoch` is known to be gone.
    pub(crate) fn host_lost(&self, epoch: u64) -> bool {
        let lost = self.lost();
        epoch < lost.0 || (epoch == lost.0 && lost.1.load(Ordering::SeqCst))
    }

    /// Make sure the host that served `observed_epoch` has been replaced.
    ///
    /// Resolves once the pool is back at full idle capacity under a newer epoch, either through a
    /// replacement run here or one that another task already completed. The cycle runs on its own
    /// task, so dropping the caller never leaves a half-built host behind.
    pub(crate) async fn recover(self: &Arc<Self>, observed_epoch: u64) -> FramecastResult<()> {
        let this = Arc::clone(self);
        let cycle = tokio::spawn(async move { this.run_recovery(observed_epoch).await });
        match cycle.await {
            Ok(res) => res,
            Err(e) => Err(FramecastError::fatal(format!(
                "worker host replacement task failed: {e}"
            ))),
        }
    }

    #[tracing::instrument(name = "recover", skip(self))]
    async fn run_recovery(&self, observed_epoch: u64) -> FramecastResult<()> {
        let mut current = self
            .cancel
            .race(async { Ok::<_, FramecastError>(self.current.lock().await) })
            .await?;
        if current.shut_down {
            return Err(FramecastError::fatal("worker pool is closed"));
        }
        if current.epoch > observed_epoch {
            tracing::debug!(current_epoch = current.epoch, "host already replaced");
            return Ok(());
        }

        tracing::warn!(epoch = current.epoch, "replacing crashed worker host");
        if let Some(old) = current.host.take() {
            close_host_quietly(&old).await;
        }

        let (host, old_workers) = match self.replace_host().await {
            Ok(v) => v,
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                return Err(FramecastError::fatal(format!(
                    "worker host replacement failed: {err}"
                )));
            }
        };
        current.host = Some(host);
        current.epoch = self.pool.epoch();
        for worker in &old_workers {
            let _ = tokio::time::timeout(self.setup.timeout, close_quietly(worker)).await;
        }

        tracing::info!(epoch = current.epoch, "worker host replaced");
        Ok(())
    }

    async fn replace_host(
        &self,
    ) -> FramecastResult<(Arc<dyn Host>, Vec<Arc<dyn Worker>>)> {
        let host = self
            .cancel
            .race(async {
                self.provider
                    .create_host()
                    .await
                    .map_err(FramecastError::from)
            })
            .await?;
        let next_epoch = self.pool.epoch() + 1;
        let flag = watch_host(&host, next_epoch);

        let workers =
            match init_sessions(&host, self.pool.capacity(), &self.setup, &self.cancel).await {
                Ok(w) => w,
                Err(err) => {
                    close_host_quietly(&host).await;
                    return Err(err);
                }
            };
        let old = match self.pool.replace_all(workers.clone()) {
            Ok(old) => old,
            Err(err) => {
                for worker in &workers {
                    close_quietly(worker).await;
                }
                close_host_quietly(&host).await;
                return Err(err);
            }
        };
        *self.lost() = (next_epoch, flag);
        Ok((host, old))
    }

    /// Close every pooled session and the current host. Waits for an in-flight replacement to
    /// settle first; later acquisitions and recoveries fail.
    pub(crate) async fn shutdown(&self) {
        let mut current = self.current.lock().await;
        current.shut_down = true;
        let workers = self.pool.close();
        for worker in &workers {
            let _ = tokio::time::timeout(self.setup.timeout, close_quietly(worker)).await;
        }
        if let Some(host) = current.host.take() {
            close_host_quietly(&host).await;
        }
        tracing::debug!(sessions = workers.len(), "worker pool torn down");
    }
}

fn watch_host(host: &Arc<dyn Host>, epoch: u64) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let f = flag.clone();
    host.on_crash(Arc::new(move || {
        if !f.swap(true, Ordering::SeqCst) {
            tracing::warn!(epoch, "worker host reported a crash");
        }
    }));
    flag
}

async fn close_host_quietly(host: &Arc<dyn Host>) {
    if let Err(err) = host.close().await {
        tracing::warn!(error = %err, "closing worker host failed");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/recovery.rs"]
mod tests;
