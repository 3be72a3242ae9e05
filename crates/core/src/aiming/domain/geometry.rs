//! Pixel → stage → bearing projection and ROI sizing.
//!
//! The camera is assumed to look at the stage head-on: the horizontal pixel
//! axis spans the stage width, and the vertical axis runs from the front edge
//! of the stage (frame bottom) to the back (frame top). The microphone sits
//! `mic_distance` meters in front of the stage's front center.

use crate::shared::bounding_box::{BoundingBox, RegionOfInterest};
use crate::shared::config::TrackerConfig;

/// Physical layout used to turn a frame position into a bearing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageGeometry {
    pub stage_width: f64,
    pub stage_depth: f64,
    pub mic_distance: f64,
    pub mic_fov: f64,
}

impl StageGeometry {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            stage_width: config.stage_width,
            stage_depth: config.stage_depth,
            mic_distance: config.mic_distance,
            mic_fov: config.mic_fov,
        }
    }

    pub fn half_fov(&self) -> f64 {
        self.mic_fov / 2.0
    }

    /// Maps a frame position to stage coordinates in meters.
    ///
    /// `stage_x` is the lateral offset from stage center (negative = left).
    /// `stage_y` is the distance back from the front edge; vertical positions
    /// outside the frame are pinned to the stage's front or back edge.
    pub fn to_stage(
        &self,
        frame_width: u32,
        frame_height: u32,
        point_x: f64,
        point_y: f64,
    ) -> (f64, f64) {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let stage_x = (point_x - fw / 2.0) / fw * self.stage_width;
        let depth_fraction = ((fh - point_y) / fh).clamp(0.0, 1.0);
        (stage_x, depth_fraction * self.stage_depth)
    }

    /// Bearing in degrees from the microphone to a frame position, clamped
    /// to `[-fov/2, fov/2]`. Negative bearings point left.
    pub fn project_to_bearing(
        &self,
        frame_width: u32,
        frame_height: u32,
        point_x: f64,
        point_y: f64,
    ) -> f64 {
        if frame_width == 0 || frame_height == 0 {
            return 0.0;
        }
        let (stage_x, stage_y) = self.to_stage(frame_width, frame_height, point_x, point_y);
        let bearing = stage_x.atan2(self.mic_distance + stage_y).to_degrees();
        let half = self.half_fov();
        bearing.clamp(-half, half)
    }
}

impl Default for StageGeometry {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// Square search region around `bbox`, scaled by `scale` and clipped to the frame.
///
/// Side length is `round(max(w, h) * scale)`, centered on the box center.
/// At frame edges the region shrinks instead of shifting, so it never leaves
/// `[0, frame_width) x [0, frame_height)`.
pub fn compute_roi(
    frame_width: u32,
    frame_height: u32,
    bbox: &BoundingBox,
    scale: f64,
) -> RegionOfInterest {
    let size = (bbox.width.max(bbox.height) as f64 * scale).round();
    let (cx, cy) = bbox.center();
    let left = (cx - size / 2.0).round() as i64;
    let top = (cy - size / 2.0).round() as i64;
    let size = size as i64;

    let (x, width) = clamp_span(left, size, frame_width as i64);
    let (y, height) = clamp_span(top, size, frame_height as i64);
    RegionOfInterest {
        x,
        y,
        width,
        height,
    }
}

/// Clips `[start, start + len)` to `[0, limit)`, returning `(start, len)`.
fn clamp_span(start: i64, len: i64, limit: i64) -> (i32, i32) {
    let limit = limit.max(0);
    let lo = start.clamp(0, limit);
    let hi = (start + len).clamp(0, limit);
    let extent = (hi - lo).max(0);
    // An empty span past the far edge is parked on the last pixel.
    let origin = lo.min(limit - 1).max(0);
    (origin as i32, extent as i32)
}
