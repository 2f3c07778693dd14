//! Side-channel assets discovered while rendering frames.

pub mod fingerprint;
pub mod pipeline;
pub mod resolver;

use std::path::PathBuf;

use crate::foundation::core::FrameIndex;

pub use fingerprint::AssetFingerprint;

/// What kind of media an asset reference points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Audio,
    Video,
    Image,
    Other,
}

impl AssetKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Audio => b'A',
            Self::Video => b'V',
            Self::Image => b'I',
            Self::Other => b'O',
        }
    }
}

/// A media reference reported by a worker for one frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssetDescriptor {
    /// Identifier assigned by the visual program.
    pub id: String,
    pub kind: AssetKind,
    /// Remote or local reference, as written in the program.
    pub src: String,
    /// Timeline frame at which the asset was observed.
    pub frame: FrameIndex,
    pub volume: f64,
    /// Frame of the referenced media that plays at `frame`.
    pub media_frame: u64,
    pub playback_rate: f64,
}

impl AssetDescriptor {
    /// Audio reference at full volume and normal speed.
    pub fn audio(id: impl Into<String>, src: impl Into<String>, frame: FrameIndex) -> Self {
        Self {
            id: id.into(),
            kind: AssetKind::Audio,
            src: src.into(),
            frame,
            volume: 1.0,
            media_frame: frame.0,
            playback_rate: 1.0,
        }
    }
}

/// One asset of an [`AssetRecord`], mapped to its local copy.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ResolvedAsset {
    #[serde(flatten)]
    pub descriptor: AssetDescriptor,
    pub fingerprint: AssetFingerprint,
    pub local_path: PathBuf,
}

/// All assets discovered while capturing one planned frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AssetRecord {
    pub output_index: u64,
    pub frame: FrameIndex,
    pub assets: Vec<ResolvedAsset>,
}

/// Assets of one frame before resolution has finished.
#[derive(Clone, Debug)]
pub(crate) struct DiscoveredAssets {
    pub(crate) output_index: u64,
    pub(crate) frame: FrameIndex,
    pub(crate) assets: Vec<(AssetDescriptor, AssetFingerprint)>,
}
