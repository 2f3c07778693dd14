pub type FramecastResult<T> = Result<T, FramecastError>;

/// Run-level error taxonomy.
///
/// Only [`FramecastError::Crash`] is ever retried (through host replacement). Every other variant
/// surfaces at the run boundary.
#[derive(thiserror::Error, Debug)]
pub enum FramecastError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("worker host crashed: {0}")]
    Crash(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("asset resolution error: {0}")]
    AssetResolution(String),

    #[error("fatal render error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramecastError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn crash(msg: impl Into<String>) -> Self {
        Self::Crash(msg.into())
    }

    pub fn asset_resolution(msg: impl Into<String>) -> Self {
        Self::AssetResolution(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Self::Crash(_))
    }

    /// Clone for fan-out to several observers. `Other` loses its source chain and keeps the
    /// rendered message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Configuration(m) => Self::Configuration(m.clone()),
            Self::Crash(m) => Self::Crash(m.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::AssetResolution(m) => Self::AssetResolution(m.clone()),
            Self::Fatal(m) => Self::Fatal(m.clone()),
            Self::Other(e) => Self::Other(anyhow::anyhow!("{e:#}")),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
