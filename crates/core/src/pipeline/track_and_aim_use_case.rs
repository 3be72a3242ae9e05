use std::time::Instant;

use crate::aiming::domain::aiming_controller::AimingController;
use crate::pipeline::operator_input::{OperatorEvent, OperatorInput};
use crate::pipeline::session_logger::{CycleReport, SessionLogger};
use crate::tracking::domain::frame_schedule::FrameSchedule;
use crate::tracking::domain::tracking_engine::TrackingEngine;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Why the loop stopped.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitReason {
    Quit,
    MaxFrames,
    /// The frame source stopped delivering (end of stream or I/O fault).
    CaptureFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub detection_cycles: u64,
    pub actuator_commands: u64,
    pub actuator_failures: u64,
    pub exit: ExitReason,
}

/// The frame-synchronous tracking loop:
/// operator events → acquire frame → track → aim → report.
///
/// Everything runs on the calling thread, one cycle at a time. The frame
/// source and the actuator are released whenever the loop ends, including
/// when connecting fails or the use case is dropped mid-run.
pub struct TrackAndAimUseCase {
    source: Box<dyn FrameSource>,
    engine: TrackingEngine,
    controller: AimingController,
    schedule: FrameSchedule,
    input: Box<dyn OperatorInput>,
    logger: Box<dyn SessionLogger>,
    max_frames: Option<u64>,
    released: bool,
}

impl TrackAndAimUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: TrackingEngine,
        controller: AimingController,
        schedule: FrameSchedule,
        input: Box<dyn OperatorInput>,
        logger: Box<dyn SessionLogger>,
        max_frames: Option<u64>,
    ) -> Self {
        Self {
            source,
            engine,
            controller,
            schedule,
            input,
            logger,
            max_frames,
            released: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &TrackingEngine {
        &self.engine
    }

    /// Connects the source and runs until quit, `max_frames`, or a capture
    /// failure. Only a failed connect is returned as an error.
    pub fn execute(&mut self) -> Result<RunSummary, FrameSourceError> {
        if let Err(e) = self.source.connect() {
            self.shutdown();
            return Err(e);
        }
        self.logger.info(&format!(
            "Tracking started (detecting every {} frame(s))",
            self.schedule.skip_interval()
        ));

        let summary = self.run_loop();

        self.shutdown();
        self.logger.summary();
        Ok(summary)
    }

    fn run_loop(&mut self) -> RunSummary {
        let mut summary = RunSummary {
            frames: 0,
            detection_cycles: 0,
            actuator_commands: 0,
            actuator_failures: 0,
            exit: ExitReason::Quit,
        };

        loop {
            if self.dispatch_operator_events() {
                summary.exit = ExitReason::Quit;
                break;
            }
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                summary.exit = ExitReason::MaxFrames;
                break;
            }

            let t0 = Instant::now();
            let frame = match self.source.get_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Frame source stopped: {e}");
                    summary.exit = ExitReason::CaptureFailed(e.to_string());
                    break;
                }
            };
            let t1 = Instant::now();

            let tick = self.schedule.tick();
            let result = self.engine.process(&frame, tick);
            let t2 = Instant::now();

            let outcome = self.controller.update(&result, tick);
            let t3 = Instant::now();

            self.logger.timing("capture", ms(t0, t1));
            self.logger.timing("track", ms(t1, t2));
            self.logger.timing("aim", ms(t2, t3));

            summary.frames += 1;
            if result.detector_calls > 0 {
                summary.detection_cycles += 1;
            }
            if outcome.commanded {
                summary.actuator_commands += 1;
                if outcome.success == Some(false) {
                    summary.actuator_failures += 1;
                }
            }

            self.logger.cycle(&CycleReport {
                frame_number: tick.number,
                scheduled: tick.scheduled,
                state: result.state.name(),
                detections: result.detections.len(),
                detector_calls: result.detector_calls,
                detector_faults: result.detector_faults,
                fell_back: result.fell_back,
                lost: result.lost,
                bearing: outcome.bearing,
                commanded: outcome.commanded,
                actuator_ok: outcome.success,
            });
        }

        summary
    }

    /// Samples operator input once and applies it in arrival order.
    /// Returns true if a quit was among the events.
    fn dispatch_operator_events(&mut self) -> bool {
        let mut quit = false;
        for event in self.input.poll() {
            match event {
                OperatorEvent::Pick { x, y } => self.engine.pick(x, y),
                OperatorEvent::Reset => self.engine.reset(),
                OperatorEvent::Quit => quit = true,
            }
        }
        quit
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.release();
        self.controller.close();
    }
}

impl Drop for TrackAndAimUseCase {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn ms(from: Instant, to: Instant) -> f64 {
    to.duration_since(from).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aiming::domain::actuator::Actuator;
    use crate::aiming::domain::geometry::StageGeometry;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use crate::tracking::domain::tracking_engine::TrackingState;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        connects: usize,
        releases: usize,
        frames_served: usize,
        detector_calls: usize,
        moves: Vec<f64>,
        closes: usize,
    }

    type Shared = Arc<Mutex<Calls>>;

    struct StubSource {
        calls: Shared,
        frames: usize,
        fail_connect: bool,
    }

    impl FrameSource for StubSource {
        fn connect(&mut self) -> Result<(), FrameSourceError> {
            self.calls.lock().unwrap().connects += 1;
            if self.fail_connect {
                return Err(FrameSourceError::Connection {
                    source_name: "camera 0".into(),
                    reason: "no such device".into(),
                });
            }
            Ok(())
        }

        fn get_frame(&mut self) -> Result<Frame, FrameSourceError> {
            let mut calls = self.calls.lock().unwrap();
            if calls.frames_served >= self.frames {
                return Err(FrameSourceError::Capture("end of stream".into()));
            }
            let index = calls.frames_served;
            calls.frames_served += 1;
            Ok(Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, index))
        }

        fn release(&mut self) {
            self.calls.lock().unwrap().releases += 1;
        }
    }

    /// One face covering the middle quarter of whatever image it is given.
    struct CenteredFaceDetector {
        calls: Shared,
    }

    impl FaceDetector for CenteredFaceDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().detector_calls += 1;
            let (w, h) = (frame.width() as i32, frame.height() as i32);
            Ok(vec![BoundingBox::new(w * 3 / 8, h * 3 / 8, w / 4, h / 4)])
        }
    }

    struct StubActuator {
        calls: Shared,
    }

    impl Actuator for StubActuator {
        fn move_to(&mut self, bearing: f64) -> bool {
            self.calls.lock().unwrap().moves.push(bearing);
            true
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().closes += 1;
        }
    }

    struct ScriptedInput {
        cycles: VecDeque<Vec<OperatorEvent>>,
    }

    impl OperatorInput for ScriptedInput {
        fn poll(&mut self) -> Vec<OperatorEvent> {
            self.cycles.pop_front().unwrap_or_default()
        }
    }

    struct Setup {
        frames: usize,
        fail_connect: bool,
        skip: u64,
        max_frames: Option<u64>,
        input: Vec<Vec<OperatorEvent>>,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                frames: 10,
                fail_connect: false,
                skip: 1,
                max_frames: None,
                input: Vec::new(),
            }
        }
    }

    fn build(setup: Setup) -> (TrackAndAimUseCase, Shared) {
        let calls: Shared = Arc::default();
        let source = StubSource {
            calls: calls.clone(),
            frames: setup.frames,
            fail_connect: setup.fail_connect,
        };
        let engine = TrackingEngine::new(
            Box::new(CenteredFaceDetector {
                calls: calls.clone(),
            }),
            1.5,
        );
        let controller = AimingController::new(
            Box::new(StubActuator {
                calls: calls.clone(),
            }),
            StageGeometry::default(),
        );
        let use_case = TrackAndAimUseCase::new(
            Box::new(source),
            engine,
            controller,
            FrameSchedule::new(setup.skip).unwrap(),
            Box::new(ScriptedInput {
                cycles: setup.input.into(),
            }),
            Box::new(NullSessionLogger),
            setup.max_frames,
        );
        (use_case, calls)
    }

    fn pick_center() -> OperatorEvent {
        OperatorEvent::Pick { x: 50, y: 50 }
    }

    #[test]
    fn test_connect_failure_releases_collaborators() {
        let (mut use_case, calls) = build(Setup {
            fail_connect: true,
            ..Setup::default()
        });

        let result = use_case.execute();

        assert!(matches!(result, Err(FrameSourceError::Connection { .. })));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.frames_served, 0);
        assert_eq!(calls.releases, 1);
        assert_eq!(calls.closes, 1);
    }

    #[test]
    fn test_end_of_stream_ends_run_with_cleanup() {
        let (mut use_case, calls) = build(Setup {
            frames: 4,
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        assert_eq!(summary.frames, 4);
        assert!(matches!(summary.exit, ExitReason::CaptureFailed(_)));
        drop(use_case);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.releases, 1);
        assert_eq!(calls.closes, 1);
    }

    #[test]
    fn test_quit_stops_before_next_frame() {
        let (mut use_case, calls) = build(Setup {
            input: vec![vec![], vec![], vec![OperatorEvent::Quit]],
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        assert_eq!(summary.exit, ExitReason::Quit);
        assert_eq!(summary.frames, 2);
        assert_eq!(calls.lock().unwrap().frames_served, 2);
    }

    #[test]
    fn test_max_frames_bounds_the_run() {
        let (mut use_case, _calls) = build(Setup {
            max_frames: Some(3),
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        assert_eq!(summary.exit, ExitReason::MaxFrames);
        assert_eq!(summary.frames, 3);
    }

    #[test]
    fn test_detection_runs_on_every_nth_frame() {
        let (mut use_case, calls) = build(Setup {
            skip: 3,
            max_frames: Some(7),
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        // Frames 0, 3 and 6.
        assert_eq!(summary.detection_cycles, 3);
        assert_eq!(calls.lock().unwrap().detector_calls, 3);
    }

    #[test]
    fn test_pick_drives_actuator_on_scheduled_frames() {
        // Pick lands after frame 0 has produced detections.
        let (mut use_case, calls) = build(Setup {
            skip: 2,
            max_frames: Some(7),
            input: vec![vec![], vec![pick_center()]],
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        // Selected from frame 1 on; scheduled frames 2, 4, 6 command the motor.
        assert_eq!(summary.actuator_commands, 3);
        assert_eq!(summary.actuator_failures, 0);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.moves.len(), 3);
        assert!(calls.moves.iter().all(|b| b.abs() < 1.0));
    }

    #[test]
    fn test_no_commands_without_selection() {
        let (mut use_case, calls) = build(Setup {
            max_frames: Some(5),
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        assert_eq!(summary.actuator_commands, 0);
        assert!(calls.lock().unwrap().moves.is_empty());
    }

    #[test]
    fn test_reset_and_quit_sampled_together_both_apply() {
        let (mut use_case, _calls) = build(Setup {
            input: vec![
                vec![],
                vec![pick_center()],
                vec![OperatorEvent::Reset, OperatorEvent::Quit],
            ],
            ..Setup::default()
        });

        let summary = use_case.execute().unwrap();

        assert_eq!(summary.exit, ExitReason::Quit);
        assert_eq!(summary.frames, 2);
        assert_eq!(use_case.engine().state(), TrackingState::Idle);
    }

    #[test]
    fn test_pick_then_reset_in_one_cycle_ends_idle() {
        let (mut use_case, calls) = build(Setup {
            max_frames: Some(3),
            input: vec![vec![], vec![pick_center(), OperatorEvent::Reset]],
            ..Setup::default()
        });

        use_case.execute().unwrap();

        assert_eq!(use_case.engine().state(), TrackingState::Idle);
        assert!(calls.lock().unwrap().moves.is_empty());
    }

    #[test]
    fn test_drop_without_execute_releases_once() {
        let (use_case, calls) = build(Setup::default());
        drop(use_case);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 0);
        assert_eq!(calls.releases, 1);
        assert_eq!(calls.closes, 1);
    }
}
