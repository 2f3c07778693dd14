//! Process-wide, single-fire cancellation.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::foundation::error::{FramecastError, FramecastResult};

type CancelCallback = Box<dyn FnOnce() + Send>;

/// Broadcast cancellation signal shared by every suspension point of a run.
///
/// Firing is idempotent and irreversible. Clones observe the same signal.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    token: CancellationToken,
    callbacks: Mutex<Vec<CancelCallback>>,
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Only the first call runs subscribed callbacks.
    pub fn cancel(&self) {
        let callbacks = {
            let mut guard = match self.inner.callbacks.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if self.inner.token.is_cancelled() {
                return;
            }
            self.inner.token.cancel();
            std::mem::take(&mut *guard)
        };
        tracing::info!(subscribers = callbacks.len(), "render cancelled");
        for cb in callbacks {
            cb();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Subscribe `callback` to run exactly once at cancellation.
    ///
    /// Subscribing to an already fired signal runs the callback immediately.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut guard = match self.inner.callbacks.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !self.inner.token.is_cancelled() {
                guard.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// `Err(Cancelled)` once fired.
    pub fn check(&self) -> FramecastResult<()> {
        if self.is_cancelled() {
            return Err(FramecastError::Cancelled);
        }
        Ok(())
    }

    /// Race `fut` against the signal. Cancellation wins ties.
    pub async fn race<T>(
        &self,
        fut: impl Future<Output = FramecastResult<T>>,
    ) -> FramecastResult<T> {
        tokio::select! {
            biased;
            _ = self.inner.token.cancelled() => Err(FramecastError::Cancelled),
            r = fut => r,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/cancel.rs"]
mod tests;
