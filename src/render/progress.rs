use std::time::Duration;

use crate::foundation::core::FrameIndex;

/// Receives run progress. All methods default to no-ops and may be called from several tasks at
/// once.
pub trait ProgressObserver: Send + Sync {
    /// Once, after the pool is ready and before the first frame is scheduled.
    fn on_start(&self, _frame_count: usize, _concurrency: usize) {}

    /// After each successfully rendered frame. `rendered` counts frames done so far.
    fn on_frame_rendered(&self, _rendered: usize, _frame: FrameIndex, _elapsed: Duration) {}

    /// Before a frame is retried after a host crash. `attempt` is the attempt about to start.
    fn on_retry(&self, _frame: FrameIndex, _attempt: u32) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
