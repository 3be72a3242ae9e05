//! YOLO face detector using ONNX Runtime via `ort`.
//!
//! Letterboxes the frame into the model's square input, runs inference, and
//! reduces the raw candidates with greedy NMS. Boxes come back in the pixel
//! space of the frame that was passed in, so a detector run on an ROI crop
//! reports crop-local coordinates.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox padding value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load an ONNX face model. The square input size is read from the
    /// model's NCHW input shape, falling back to 640 when it is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {input_size}x{input_size}, confidence {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let mut letterboxed = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(std::mem::take(&mut letterboxed.tensor))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected face model output shape: {shape:?}").into());
        }

        // Either [1, features, candidates] or [1, candidates, features].
        let transposed = shape[1] < shape[2];
        let (num_candidates, num_features) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_features < 5 {
            return Err(format!("face model output has {num_features} features per row").into());
        }
        let data = tensor.as_slice().ok_or("face model output is not contiguous")?;
        let feature = |candidate: usize, f: usize| -> f64 {
            let i = if transposed {
                f * num_candidates + candidate
            } else {
                candidate * num_features + f
            };
            data[i] as f64
        };

        let mut candidates = Vec::new();
        for i in 0..num_candidates {
            let confidence = feature(i, 4);
            if confidence < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            candidates.push(Candidate {
                corners: [
                    letterboxed.unmap_x(cx - w / 2.0),
                    letterboxed.unmap_y(cy - h / 2.0),
                    letterboxed.unmap_x(cx + w / 2.0),
                    letterboxed.unmap_y(cy + h / 2.0),
                ],
                confidence,
            });
        }

        let kept = nms(&mut candidates, NMS_IOU_THRESH);
        Ok(kept
            .iter()
            .filter_map(|c| to_frame_box(&c.corners, frame.width(), frame.height()))
            .collect())
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    fn unmap_x(&self, x: f64) -> f64 {
        (x - self.pad_x as f64) / self.scale
    }

    fn unmap_y(&self, y: f64) -> f64 {
        (y - self.pad_y as f64) / self.scale
    }
}

/// Nearest-neighbour resize into a `target_size` square, preserving aspect
/// ratio and padding the remainder. Produces a normalized NCHW tensor.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let side = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = (frame.channels() as usize).min(3);

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        let ty = pad_y as usize + y;
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let tx = pad_x as usize + x;
            for c in 0..3 {
                // Grayscale frames replicate their single channel.
                let sc = c.min(channels - 1);
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

/// Clamps `[x1, y1, x2, y2]` to the frame and converts to an integer box.
/// Boxes that collapse to nothing are dropped.
fn to_frame_box(corners: &[f64; 4], width: u32, height: u32) -> Option<BoundingBox> {
    let (w, h) = (width as f64, height as f64);
    let x1 = corners[0].clamp(0.0, w).round() as i32;
    let y1 = corners[1].clamp(0.0, h).round() as i32;
    let x2 = corners[2].clamp(0.0, w).round() as i32;
    let y2 = corners[3].clamp(0.0, h).round() as i32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
}

#[derive(Clone, Debug)]
struct Candidate {
    corners: [f64; 4],
    confidence: f64,
}

/// Greedy NMS: highest confidence first, dropping anything overlapping a kept box.
fn nms(candidates: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates.iter() {
        if keep
            .iter()
            .all(|k| iou(&k.corners, &candidate.corners) <= iou_thresh)
        {
            keep.push(candidate.clone());
        }
    }
    keep
}

fn iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
