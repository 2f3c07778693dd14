use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FramecastError, FramecastResult};

/// One captured frame handed back in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Timeline frame number.
    pub frame: FrameIndex,
    /// Slot in the output sequence.
    pub output_index: u64,
    /// Encoded image bytes in the run's capture format.
    pub bytes: Vec<u8>,
}

/// Receiver for in-memory captures.
///
/// Ordering contract: none. Frames arrive in completion order; use `output_index` to place them.
/// A frame retried after a host crash is delivered once, by the attempt that succeeded.
pub trait FrameBufferSink: Send + Sync {
    /// Called once per successfully captured frame. An error fails the run.
    fn on_frame(&self, frame: FrameBuffer) -> FramecastResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    frames: Mutex<BTreeMap<u64, FrameBuffer>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured frames in output-index order.
    pub fn frames(&self) -> Vec<FrameBuffer> {
        match self.frames.lock() {
            Ok(frames) => frames.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map_or(0, |f| f.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameBufferSink for InMemorySink {
    fn on_frame(&self, frame: FrameBuffer) -> FramecastResult<()> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| FramecastError::fatal("in-memory sink lock poisoned"))?;
        if frames.contains_key(&frame.output_index) {
            return Err(FramecastError::fatal(format!(
                "output index {} delivered twice",
                frame.output_index
            )));
        }
        frames.insert(frame.output_index, frame);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/sink.rs"]
mod tests;
