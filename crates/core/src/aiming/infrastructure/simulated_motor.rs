use std::thread;
use std::time::{Duration, TryFromFloatSecsError};

use crate::aiming::domain::actuator::Actuator;
use crate::shared::constants::MOTOR_LIMIT_DEGREES;

pub const DEFAULT_SECONDS_PER_DEGREE: f64 = 0.1;

/// Stand-in for the real motor: sleeps for the time a move would take and
/// always succeeds.
pub struct SimulatedMotor {
    seconds_per_degree: f64,
    current_angle: f64,
    closed: bool,
}

impl SimulatedMotor {
    pub fn new(seconds_per_degree: f64) -> Self {
        log::info!("Simulated motor initialized ({seconds_per_degree} s/degree)");
        Self {
            seconds_per_degree: seconds_per_degree.max(0.0),
            current_angle: 0.0,
            closed: false,
        }
    }

    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    /// Fails when the configured speed makes the move unrepresentable
    /// (infinite or overflowing).
    pub fn travel_time(&self, target: f64) -> Result<Duration, TryFromFloatSecsError> {
        Duration::try_from_secs_f64((target - self.current_angle).abs() * self.seconds_per_degree)
    }
}

impl Default for SimulatedMotor {
    fn default() -> Self {
        Self::new(DEFAULT_SECONDS_PER_DEGREE)
    }
}

impl Actuator for SimulatedMotor {
    fn move_to(&mut self, bearing: f64) -> bool {
        let target = bearing.clamp(-MOTOR_LIMIT_DEGREES, MOTOR_LIMIT_DEGREES);
        match self.travel_time(target) {
            Ok(duration) => thread::sleep(duration),
            Err(e) => {
                log::warn!("Simulated move to {target:.2}° has no finite travel time: {e}");
                return false;
            }
        }
        log::info!(
            "Moving microphone from {:.2}° to {:.2}°",
            self.current_angle,
            target
        );
        self.current_angle = target;
        true
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::info!("Simulated motor closed");
        }
    }
}
