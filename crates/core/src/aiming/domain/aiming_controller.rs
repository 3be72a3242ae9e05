use crate::aiming::domain::actuator::Actuator;
use crate::aiming::domain::geometry::StageGeometry;
use crate::tracking::domain::frame_schedule::FrameTick;
use crate::tracking::domain::tracking_engine::TrackingResult;

/// Result of one aiming cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AimOutcome {
    /// Bearing to the selected face; `None` when nothing is selected.
    pub bearing: Option<f64>,
    /// Whether the actuator was commanded this frame.
    pub commanded: bool,
    /// Actuator acknowledgement; `None` when not commanded.
    pub success: Option<bool>,
}

impl AimOutcome {
    fn idle() -> Self {
        Self {
            bearing: None,
            commanded: false,
            success: None,
        }
    }
}

/// Turns the tracked face position into microphone moves.
///
/// The motor is only commanded on scheduled frames, the same cadence that
/// produces fresh detections. A rejected move is reported and retried on the
/// next scheduled frame with the then-current bearing.
pub struct AimingController {
    actuator: Box<dyn Actuator>,
    geometry: StageGeometry,
    last_commanded: Option<f64>,
}

impl AimingController {
    pub fn new(actuator: Box<dyn Actuator>, geometry: StageGeometry) -> Self {
        Self {
            actuator,
            geometry,
            last_commanded: None,
        }
    }

    /// Last bearing the actuator acknowledged.
    #[cfg(test)]
    pub(crate) fn last_commanded(&self) -> Option<f64> {
        self.last_commanded
    }

    pub fn update(&mut self, result: &TrackingResult, tick: FrameTick) -> AimOutcome {
        let Some(bbox) = result.selected_box() else {
            return AimOutcome::idle();
        };

        let (cx, cy) = bbox.center();
        let bearing =
            self.geometry
                .project_to_bearing(result.frame_width, result.frame_height, cx, cy);

        if !tick.scheduled {
            return AimOutcome {
                bearing: Some(bearing),
                commanded: false,
                success: None,
            };
        }

        let success = self.actuator.move_to(bearing);
        if success {
            log::debug!("Microphone aimed at {bearing:.2}°");
            self.last_commanded = Some(bearing);
        } else {
            match self.last_commanded {
                Some(last) => log::warn!(
                    "Motor did not acknowledge move to {bearing:.2}° (last at {last:.2}°); will retry"
                ),
                None => log::warn!("Motor did not acknowledge move to {bearing:.2}°; will retry"),
            }
        }

        AimOutcome {
            bearing: Some(bearing),
            commanded: true,
            success: Some(success),
        }
    }

    pub fn close(&mut self) {
        self.actuator.close();
    }
}
