use crate::shared::bounding_box::BoundingBox;

/// Index of the first box (in detection order) strictly containing the point.
///
/// This is the only way an operator selects a face; a click that hits no box
/// selects nothing.
pub fn pick(x: i32, y: i32, detections: &[BoundingBox]) -> Option<usize> {
    detections.iter().position(|b| b.contains(x, y))
}

/// Returns the selection only if it still indexes into `detections`.
pub fn validate(selection: Option<usize>, detections: &[BoundingBox]) -> Option<usize> {
    selection.filter(|&i| i < detections.len())
}

/// Display label for the box at `index`, e.g. `Face 2 (selected)`.
pub fn label(index: usize, selection: Option<usize>) -> String {
    if selection == Some(index) {
        format!("Face {index} (selected)")
    } else {
        format!("Face {index}")
    }
}
