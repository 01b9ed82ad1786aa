//! Export Core Type Definitions
//!
//! Defines fundamental types shared across the export pipeline.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Export job identifier.
///
/// Assigned from a monotonically increasing counter at job creation; the id
/// doubles as the stable creation-order tie-break in the priority queue.
pub type JobId = u64;

/// Worker slot identifier within a pool
pub type WorkerId = usize;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in frames (integer)
pub type Frame = u64;

// =============================================================================
// Spatial Types
// =============================================================================

/// Pixel dimensions of a frame or output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count, useful for buffer sizing
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether both dimensions fit inside `other`
    pub fn fits_within(&self, other: &Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// Composition
// =============================================================================

/// Opaque handle to authored animation/timeline data.
///
/// The pipeline never interprets the composition's content; it only needs the
/// timing and dimension metadata required to drive the per-frame export loop.
/// The authored data itself rides along as an opaque JSON payload for the
/// external renderer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    /// Composition identifier (caller-assigned)
    pub id: String,
    /// Authored duration in seconds
    pub duration_sec: TimeSec,
    /// Authored frame rate
    pub frame_rate: f64,
    /// Authored width in pixels
    pub width: u32,
    /// Authored height in pixels
    pub height: u32,
    /// Whether the composition carries an audio track
    pub has_audio: bool,
    /// Opaque authored data, passed through to the renderer
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Composition {
    /// Creates a composition handle with no audio track and empty data
    pub fn new(
        id: impl Into<String>,
        duration_sec: TimeSec,
        frame_rate: f64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            duration_sec,
            frame_rate,
            width,
            height,
            has_audio: false,
            data: serde_json::Value::Null,
        }
    }

    /// Marks the composition as carrying audio
    pub fn with_audio(mut self) -> Self {
        self.has_audio = true;
        self
    }

    /// Attaches opaque authored data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Authored resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_fits_within() {
        let small = Resolution::new(1280, 720);
        let large = Resolution::new(3840, 2160);

        assert!(small.fits_within(&large));
        assert!(!large.fits_within(&small));
        assert!(small.fits_within(&small));
    }

    #[test]
    fn test_composition_builder() {
        let comp = Composition::new("comp_001", 10.0, 30.0, 1920, 1080)
            .with_audio()
            .with_data(serde_json::json!({"layers": []}));

        assert!(comp.has_audio);
        assert_eq!(comp.resolution(), Resolution::new(1920, 1080));
        assert!(comp.data.is_object());
    }
}
