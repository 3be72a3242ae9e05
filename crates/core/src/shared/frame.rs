use ndarray::{s, ArrayView3};

use crate::shared::bounding_box::RegionOfInterest;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the tracking layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `roi` into a new packed frame.
    ///
    /// The ROI is intersected with the frame first, so an out-of-range ROI
    /// yields a smaller (possibly empty) frame rather than a panic.
    pub fn crop(&self, roi: &RegionOfInterest) -> Frame {
        let x0 = (roi.x.max(0) as u32).min(self.width) as usize;
        let y0 = (roi.y.max(0) as u32).min(self.height) as usize;
        let x1 = (x0 + roi.width.max(0) as usize).min(self.width as usize);
        let y1 = (y0 + roi.height.max(0) as usize).min(self.height as usize);

        let view = self.as_ndarray();
        let region = view.slice(s![y0..y1, x0..x1, ..]);
        let data: Vec<u8> = region.iter().copied().collect();

        Frame::new(
            data,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
            self.channels,
            self.index,
        )
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        // Pixel (row, col) = [row, col, 0]
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for row in 0..h {
            for col in 0..w {
                data.extend_from_slice(&[row as u8, col as u8, 0]);
            }
        }
        Frame::new(data, w, h, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_crop_copies_roi_pixels() {
        let frame = gradient_frame(10, 8);
        let roi = RegionOfInterest {
            x: 3,
            y: 2,
            width: 4,
            height: 5,
        };
        let cropped = frame.crop(&roi);

        assert_eq!(cropped.width(), 4);
        assert_eq!(cropped.height(), 5);
        assert_eq!(cropped.index(), 7);
        let arr = cropped.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 2); // row 2
        assert_eq!(arr[[0, 0, 1]], 3); // col 3
        assert_eq!(arr[[4, 3, 0]], 6);
        assert_eq!(arr[[4, 3, 1]], 6);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = gradient_frame(10, 8);
        let roi = RegionOfInterest {
            x: 8,
            y: 6,
            width: 10,
            height: 10,
        };
        let cropped = frame.crop(&roi);
        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.data().len(), 2 * 2 * 3);
    }

    #[test]
    fn test_crop_empty_roi_gives_empty_frame() {
        let frame = gradient_frame(10, 8);
        let roi = RegionOfInterest {
            x: 4,
            y: 4,
            width: 0,
            height: 3,
        };
        let cropped = frame.crop(&roi);
        assert_eq!(cropped.width(), 0);
        assert!(cropped.data().is_empty());
    }
}
