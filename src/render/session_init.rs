use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::cancel::CancelSignal;
use crate::foundation::core::{FrameIndex, Viewport};
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::worker::{Diagnostic, DiagnosticLevel, Host, SessionInputs, Worker};

/// Everything a fresh session needs before it may join the pool.
#[derive(Clone, Debug)]
pub(crate) struct SessionSetup {
    pub(crate) viewport: Viewport,
    pub(crate) inputs: SessionInputs,
    /// Stable starting state every session is parked at.
    pub(crate) start_frame: FrameIndex,
    pub(crate) forward_diagnostics: bool,
    /// Budget for bringing one session up.
    pub(crate) timeout: Duration,
}

/// Open one session on `host` and bring it to the ready state.
pub(crate) async fn init_session(
    host: Arc<dyn Host>,
    slot: usize,
    setup: Arc<SessionSetup>,
) -> FramecastResult<Arc<dyn Worker>> {
    let worker = host.new_session().await?;
    let ready = tokio::time::timeout(setup.timeout, prepare(&worker, slot, &setup)).await;
    let res = match ready {
        Ok(res) => res,
        Err(_) => Err(FramecastError::fatal(format!(
            "session {slot} did not become ready within {} ms",
            setup.timeout.as_millis()
        ))),
    };
    if let Err(err) = res {
        if let Err(close_err) = worker.close().await {
            tracing::warn!(slot, error = %close_err, "closing failed session");
        }
        return Err(err);
    }
    Ok(worker)
}

async fn prepare(worker: &Arc<dyn Worker>, slot: usize, setup: &SessionSetup) -> FramecastResult<()> {
    if setup.forward_diagnostics {
        worker.on_diagnostic(Arc::new(move |d: Diagnostic| forward_diagnostic(slot, d)));
    }
    worker.configure(setup.viewport).await?;
    worker.inject(&setup.inputs).await?;
    worker.seek(setup.start_frame).await?;
    Ok(())
}

fn forward_diagnostic(slot: usize, d: Diagnostic) {
    match d.level {
        DiagnosticLevel::Debug => tracing::debug!(target: "framecast::worker", slot, "{}", d.message),
        DiagnosticLevel::Info => tracing::info!(target: "framecast::worker", slot, "{}", d.message),
        DiagnosticLevel::Warn => tracing::warn!(target: "framecast::worker", slot, "{}", d.message),
        DiagnosticLevel::Error => tracing::error!(target: "framecast::worker", slot, "{}", d.message),
    }
}

/// Bring up `count` sessions on `host`, all or nothing. On failure every session that did come up
/// is closed.
pub(crate) async fn init_sessions(
    host: &Arc<dyn Host>,
    count: usize,
    setup: &Arc<SessionSetup>,
    cancel: &CancelSignal,
) -> FramecastResult<Vec<Arc<dyn Worker>>> {
    let mut set = JoinSet::new();
    for slot in 0..count {
        set.spawn(init_one(host.clone(), slot, setup.clone()));
    }

    let mut ready: Vec<Option<Arc<dyn Worker>>> = vec![None; count];
    let mut failure = None;
    while failure.is_none() {
        let next = cancel
            .race(async { Ok::<_, FramecastError>(set.join_next().await) })
            .await;
        match next {
            Ok(Some(Ok((slot, Ok(worker))))) => ready[slot] = Some(worker),
            Ok(Some(Ok((_, Err(err))))) => failure = Some(err),
            Ok(Some(Err(join_err))) => {
                failure = Some(FramecastError::fatal(format!(
                    "session init task failed: {join_err}"
                )))
            }
            Ok(None) => break,
            Err(err) => failure = Some(err),
        }
    }

    if let Some(err) = failure {
        set.abort_all();
        while let Some(joined) = set.join_next().await {
            if let Ok((_, Ok(worker))) = joined {
                close_quietly(&worker).await;
            }
        }
        for worker in ready.into_iter().flatten() {
            close_quietly(&worker).await;
        }
        return Err(err);
    }

    ready
        .into_iter()
        .enumerate()
        .map(|(slot, w)| {
            w.ok_or_else(|| FramecastError::fatal(format!("session {slot} missing after init")))
        })
        .collect()
}

async fn init_one(
    host: Arc<dyn Host>,
    slot: usize,
    setup: Arc<SessionSetup>,
) -> (usize, FramecastResult<Arc<dyn Worker>>) {
    (slot, init_session(host, slot, setup).await)
}

pub(crate) async fn close_quietly(worker: &Arc<dyn Worker>) {
    if let Err(err) = worker.close().await {
        tracing::warn!(error = %err, "closing worker session failed");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/session_init.rs"]
mod tests;
