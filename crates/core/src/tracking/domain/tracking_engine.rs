use crate::aiming::domain::geometry::compute_roi;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::{BoundingBox, RegionOfInterest};
use crate::shared::frame::Frame;
use crate::tracking::domain::frame_schedule::FrameTick;
use crate::tracking::domain::selection;

/// Tracking state machine.
///
/// The selection and ROI live inside the variants, so an ROI can only exist
/// while a face is selected and clearing the selection always drops the ROI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    /// No selection. Full-frame detection only refreshes the pickable boxes.
    Idle,
    /// A face is selected but there is no usable ROI; the next scheduled
    /// frame searches the whole frame.
    FullSearch { selection: usize },
    /// A face is selected and searched for inside `roi` first.
    RoiTracking {
        selection: usize,
        roi: RegionOfInterest,
    },
}

impl TrackingState {
    pub fn selection(&self) -> Option<usize> {
        match *self {
            TrackingState::Idle => None,
            TrackingState::FullSearch { selection } => Some(selection),
            TrackingState::RoiTracking { selection, .. } => Some(selection),
        }
    }

    pub fn roi(&self) -> Option<RegionOfInterest> {
        match *self {
            TrackingState::RoiTracking { roi, .. } => Some(roi),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackingState::Idle => "idle",
            TrackingState::FullSearch { .. } => "full-search",
            TrackingState::RoiTracking { .. } => "roi-tracking",
        }
    }
}

/// What the engine knows after one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingResult {
    pub frame_width: u32,
    pub frame_height: u32,
    pub detections: Vec<BoundingBox>,
    pub state: TrackingState,
    /// Detector invocations this frame: 0 on skipped frames, 2 when the ROI
    /// search missed and the full frame was searched as well.
    pub detector_calls: u8,
    pub detector_faults: u8,
    pub fell_back: bool,
    /// The selected face could not be found again this frame.
    pub lost: bool,
}

impl TrackingResult {
    pub fn selection(&self) -> Option<usize> {
        self.state.selection()
    }

    pub fn roi(&self) -> Option<RegionOfInterest> {
        self.state.roi()
    }

    pub fn selected_box(&self) -> Option<BoundingBox> {
        self.selection().and_then(|i| self.detections.get(i).copied())
    }

    pub fn labels(&self) -> Vec<String> {
        (0..self.detections.len())
            .map(|i| selection::label(i, self.selection()))
            .collect()
    }
}

#[derive(Default)]
struct CycleStats {
    detector_calls: u8,
    detector_faults: u8,
    fell_back: bool,
    lost: bool,
}

/// Keeps a selected face in view across frames.
///
/// On scheduled frames the selected face is searched for inside its ROI; if
/// that comes back empty the full frame is searched once, in the same frame,
/// before the selection is given up. Detector faults count as "no faces".
pub struct TrackingEngine {
    detector: Box<dyn FaceDetector>,
    roi_scale: f64,
    state: TrackingState,
    detections: Vec<BoundingBox>,
    frame_width: u32,
    frame_height: u32,
}

impl TrackingEngine {
    pub fn new(detector: Box<dyn FaceDetector>, roi_scale: f64) -> Self {
        Self {
            detector,
            roi_scale,
            state: TrackingState::Idle,
            detections: Vec::new(),
            frame_width: 0,
            frame_height: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn detections(&self) -> &[BoundingBox] {
        &self.detections
    }

    /// Operator click at frame position `(x, y)`.
    ///
    /// Selects the first current detection containing the point; a miss
    /// clears any existing selection.
    pub fn pick(&mut self, x: i32, y: i32) {
        match selection::pick(x, y, &self.detections) {
            Some(index) => {
                log::info!("Selected face {index} at ({x}, {y})");
                let bbox = self.detections[index];
                self.enter_tracking(index, bbox);
            }
            None => {
                if self.state != TrackingState::Idle {
                    log::info!("Pick at ({x}, {y}) hit no face; selection cleared");
                }
                self.state = TrackingState::Idle;
            }
        }
    }

    /// Operator reset: drop the selection regardless of the frame cadence.
    pub fn reset(&mut self) {
        if self.state != TrackingState::Idle {
            log::info!("Selection reset");
        }
        self.state = TrackingState::Idle;
    }

    /// Advances the state machine for one frame.
    ///
    /// Skipped frames run no detection and leave detections, selection and
    /// ROI exactly as the last scheduled frame left them.
    pub fn process(&mut self, frame: &Frame, tick: FrameTick) -> TrackingResult {
        self.frame_width = frame.width();
        self.frame_height = frame.height();

        let mut stats = CycleStats::default();
        if tick.scheduled {
            self.step(frame, &mut stats);
        }
        self.enforce_valid_selection();

        TrackingResult {
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            detections: self.detections.clone(),
            state: self.state,
            detector_calls: stats.detector_calls,
            detector_faults: stats.detector_faults,
            fell_back: stats.fell_back,
            lost: stats.lost,
        }
    }

    fn step(&mut self, frame: &Frame, stats: &mut CycleStats) {
        match self.state {
            TrackingState::Idle => {
                self.detections = self.detect(frame, stats);
            }
            TrackingState::FullSearch { selection } => {
                self.search_full_frame(frame, selection, stats);
            }
            TrackingState::RoiTracking { selection, roi } => {
                match self.search_roi(frame, &roi, stats) {
                    Some(found) => {
                        self.detections = vec![found];
                        self.enter_tracking(0, found);
                    }
                    None => {
                        log::debug!("Face {selection} not in ROI {roi:?}; searching full frame");
                        stats.fell_back = true;
                        self.search_full_frame(frame, selection, stats);
                    }
                }
            }
        }
    }

    fn search_roi(
        &mut self,
        frame: &Frame,
        roi: &RegionOfInterest,
        stats: &mut CycleStats,
    ) -> Option<BoundingBox> {
        let crop = frame.crop(roi);
        self.detect(&crop, stats)
            .first()
            .map(|local| local.translated_from(roi))
    }

    fn search_full_frame(&mut self, frame: &Frame, selection: usize, stats: &mut CycleStats) {
        self.detections = self.detect(frame, stats);
        match self.detections.get(selection).copied() {
            Some(bbox) => self.enter_tracking(selection, bbox),
            None => {
                log::info!(
                    "Lost face {selection}: {} face(s) in frame",
                    self.detections.len()
                );
                stats.lost = true;
                self.state = TrackingState::Idle;
            }
        }
    }

    fn enter_tracking(&mut self, selection: usize, bbox: BoundingBox) {
        let roi = compute_roi(self.frame_width, self.frame_height, &bbox, self.roi_scale);
        self.state = if roi.is_empty() {
            TrackingState::FullSearch { selection }
        } else {
            TrackingState::RoiTracking { selection, roi }
        };
    }

    fn detect(&mut self, frame: &Frame, stats: &mut CycleStats) -> Vec<BoundingBox> {
        stats.detector_calls += 1;
        match self.detector.detect(frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Face detection failed, treating frame as empty: {e}");
                stats.detector_faults += 1;
                Vec::new()
            }
        }
    }

    fn enforce_valid_selection(&mut self) {
        if let Some(index) = self.state.selection() {
            if selection::validate(Some(index), &self.detections).is_none() {
                log::warn!(
                    "Selection {index} out of range for {} detection(s); clearing",
                    self.detections.len()
                );
                self.state = TrackingState::Idle;
            }
        }
    }
}
