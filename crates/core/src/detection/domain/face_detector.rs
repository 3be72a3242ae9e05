use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for face localization.
///
/// `frame` may be a full camera frame or a crop of one; returned boxes are in
/// the coordinates of the frame passed in. An empty `Vec` means no faces; a
/// fault is reported as an error, never as an empty result.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}
