//! Frame selection and output numbering.
//!
//! A [`RenderPlan`] is the immutable answer to "which frames, and under which file index does each
//! one land". Output indices are always consecutive starting at
//! [`RenderPlan::first_output_index`], so the encoder sees a gap-free sequence even when frames are
//! subsampled.

use crate::foundation::core::{FrameIndex, decimal_width};
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::render::options::{CompositionSpec, ImageFormat};

/// Prefix of every produced frame file name.
pub const FRAME_FILE_PREFIX: &str = "element";

/// Requested slice of the composition timeline.
///
/// Serialized as either a single frame number (`12`) or an inclusive pair (`[0, 59]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FrameRange {
    /// Exactly one frame.
    Single(u64),
    /// Inclusive `[start, end]`.
    Span([u64; 2]),
}

impl FrameRange {
    /// Inclusive `(start, end)` bounds, validated against the composition duration.
    pub(crate) fn bounds(self, duration_in_frames: u64) -> FramecastResult<(u64, u64)> {
        let (start, end) = match self {
            Self::Single(f) => (f, f),
            Self::Span([start, end]) => (start, end),
        };
        if start > end {
            return Err(FramecastError::configuration(format!(
                "frame range start ({start}) must be <= end ({end})"
            )));
        }
        if end >= duration_in_frames {
            return Err(FramecastError::configuration(format!(
                "frame range end ({end}) must be < composition duration ({duration_in_frames})"
            )));
        }
        Ok((start, end))
    }
}

/// How output indices relate to timeline frame numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberingMode {
    /// Output index == timeline frame number.
    ActualFrameNumbers,
    /// Output indices count up from zero in plan order.
    FromZero,
}

/// Ordered, deduplicated frame selection plus its output numbering scheme.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RenderPlan {
    frames: Vec<FrameIndex>,
    mode: NumberingMode,
    pad_width: usize,
}

impl RenderPlan {
    /// Intersect the requested range with the stride and pick a numbering mode.
    ///
    /// With `every_nth_frame == 1` output indices are the frame numbers themselves and the padding
    /// width follows the largest selected frame number. Otherwise indices are renumbered from zero
    /// and the width follows the selected frame count.
    pub fn build(
        comp: &CompositionSpec,
        range: Option<FrameRange>,
        every_nth_frame: u32,
    ) -> FramecastResult<Self> {
        comp.validate()?;
        if every_nth_frame == 0 {
            return Err(FramecastError::configuration(
                "every_nth_frame must be >= 1",
            ));
        }

        let (start, end) = match range {
            Some(r) => r.bounds(comp.duration_in_frames)?,
            None => (0, comp.duration_in_frames - 1),
        };

        // Stepping from `start` keeps the first in-range frame and yields an arithmetic
        // progression.
        let frames: Vec<FrameIndex> = (start..=end)
            .step_by(every_nth_frame as usize)
            .map(FrameIndex)
            .collect();

        let Some(last) = frames.last().copied() else {
            return Err(FramecastError::configuration(
                "frame plan is empty: no frames selected",
            ));
        };

        let (mode, pad_width) = if every_nth_frame == 1 {
            (NumberingMode::ActualFrameNumbers, decimal_width(last.0))
        } else {
            (
                NumberingMode::FromZero,
                decimal_width(frames.len() as u64),
            )
        };

        Ok(Self {
            frames,
            mode,
            pad_width,
        })
    }

    /// Selected frame numbers, strictly increasing.
    pub fn frames(&self) -> &[FrameIndex] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn numbering_mode(&self) -> NumberingMode {
        self.mode
    }

    /// Zero-padding width of the numeric field in frame file names.
    pub fn pad_width(&self) -> usize {
        self.pad_width
    }

    /// Output index of the first planned frame.
    pub fn first_output_index(&self) -> u64 {
        match self.mode {
            NumberingMode::ActualFrameNumbers => self.frames.first().map_or(0, |f| f.0),
            NumberingMode::FromZero => 0,
        }
    }

    /// Output index of the frame at `position` in plan order.
    pub fn output_index(&self, position: usize) -> u64 {
        match self.mode {
            NumberingMode::ActualFrameNumbers => self.frames[position].0,
            NumberingMode::FromZero => position as u64,
        }
    }

    /// Output indices in plan order.
    pub fn output_indices(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.frames.len()).map(|p| self.output_index(p))
    }

    /// File name of one produced frame, e.g. `element-07.png`.
    pub fn file_name(&self, output_index: u64, format: ImageFormat) -> String {
        format!(
            "{FRAME_FILE_PREFIX}-{output_index:0width$}.{ext}",
            width = self.pad_width,
            ext = format.extension()
        )
    }

    /// printf-style template for the encoder, e.g. `element-%02d.png`.
    pub fn naming_template(&self, format: ImageFormat) -> String {
        format!(
            "{FRAME_FILE_PREFIX}-%0{}d.{}",
            self.pad_width,
            format.extension()
        )
    }
}

#[cfg(test)]
#[path = "../tests/unit/plan.rs"]
mod tests;
