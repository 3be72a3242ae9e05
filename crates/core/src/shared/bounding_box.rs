/// Axis-aligned face box in frame pixel coordinates.
///
/// Produced fresh by the detector every detection cycle; the position in the
/// returned `Vec` is the only identity a box has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Strict interior hit test: points on the border do not count.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        self.x < px && px < self.x + self.width && self.y < py && py < self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Shifts a box detected inside `roi` back into full-frame coordinates.
    pub fn translated_from(&self, roi: &RegionOfInterest) -> BoundingBox {
        BoundingBox {
            x: self.x + roi.x,
            y: self.y + roi.y,
            ..*self
        }
    }
}

/// Sub-rectangle of the frame searched preferentially while a face is tracked.
///
/// Always lies inside `[0, frame_width) x [0, frame_height)`; an empty ROI
/// (zero width or height) is never used for searching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RegionOfInterest {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && (self.x + self.width) as i64 <= frame_width as i64
            && (self.y + self.height) as i64 <= frame_height as i64
    }
}
