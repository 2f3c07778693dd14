use crate::foundation::error::{FramecastError, FramecastResult};

/// Absolute 0-based frame number in composition timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output surface of one worker session.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Width in CSS-style pixels.
    pub width: u32,
    /// Height in CSS-style pixels.
    pub height: u32,
    /// Device scale factor applied on capture.
    pub scale: f64,
}

impl Viewport {
    /// Create a validated viewport.
    pub fn new(width: u32, height: u32, scale: f64) -> FramecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramecastError::configuration(
                "viewport width/height must be > 0",
            ));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FramecastError::configuration(
                "viewport scale must be finite and > 0",
            ));
        }
        Ok(Self {
            width,
            height,
            scale,
        })
    }

    /// Pixel dimensions of a capture after applying `scale`.
    pub fn scaled_size(self) -> (u32, u32) {
        let w = (f64::from(self.width) * self.scale).round().max(1.0) as u32;
        let h = (f64::from(self.height) * self.scale).round().max(1.0) as u32;
        (w, h)
    }
}

/// Number of decimal digits needed to print `n` (`0` needs one).
pub(crate) fn decimal_width(n: u64) -> usize {
    let mut n = n;
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
