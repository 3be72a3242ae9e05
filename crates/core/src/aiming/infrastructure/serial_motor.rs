use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::aiming::domain::actuator::Actuator;
use crate::shared::constants::{
    MOTOR_ACK, MOTOR_LIMIT_DEGREES, MOTOR_REPLY_TIMEOUT, MOTOR_STEPS_PER_90_DEGREES,
};

/// Stepper motor driven over a line-oriented serial protocol.
///
/// Each move is sent as `MOVE <steps>\n` (steps relative to the current
/// position) and completes when the controller answers `OK`. Any other reply,
/// or none within the reply timeout, leaves the believed position unchanged.
///
/// Replies are read on a background thread so a silent controller can never
/// hold up the tracking loop for longer than the timeout.
pub struct SerialMotor<W: Write> {
    link: Option<Link<W>>,
    current_angle: f64,
    reply_timeout: Duration,
    /// A reply went missing; anything still queued belongs to an old command.
    desynced: bool,
}

struct Link<W> {
    writer: W,
    replies: Receiver<String>,
}

impl SerialMotor<File> {
    /// Opens a serial character device, e.g. `/dev/ttyUSB0`.
    ///
    /// The line settings (9600 baud, 8N1) must already be applied to the
    /// device, e.g. with `stty`.
    pub fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = file.try_clone()?;
        log::info!("Opened motor controller at {}", path.display());
        Ok(Self::new(reader, file))
    }
}

impl<W: Write> SerialMotor<W> {
    /// Wires the motor to the two halves of a serial line.
    pub fn new<R: Read + Send + 'static>(reader: R, writer: W) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            link: Some(Link {
                writer,
                replies: rx,
            }),
            current_angle: 0.0,
            reply_timeout: MOTOR_REPLY_TIMEOUT,
            desynced: false,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    fn exchange(&mut self, steps: i64) -> Result<String, std::io::Error> {
        let link = self.link.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "motor port is closed")
        })?;

        if self.desynced {
            for stale in link.replies.try_iter() {
                log::debug!("Discarding late motor reply {stale:?}");
            }
            self.desynced = false;
        }

        link.writer
            .write_all(format!("MOVE {steps}\n").as_bytes())?;
        link.writer.flush()?;

        match link.replies.recv_timeout(self.reply_timeout) {
            Ok(reply) => Ok(reply.trim().to_string()),
            Err(RecvTimeoutError::Timeout) => {
                self.desynced = true;
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no reply within {:?}", self.reply_timeout),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "motor line closed",
            )),
        }
    }
}

/// Steps for a relative move; fractional steps are truncated toward zero.
pub fn steps_between(from: f64, to: f64) -> i64 {
    ((to - from) * MOTOR_STEPS_PER_90_DEGREES / 90.0) as i64
}

impl<W: Write + Send> Actuator for SerialMotor<W> {
    fn move_to(&mut self, bearing: f64) -> bool {
        let target = bearing.clamp(-MOTOR_LIMIT_DEGREES, MOTOR_LIMIT_DEGREES);
        let steps = steps_between(self.current_angle, target);

        match self.exchange(steps) {
            Ok(reply) if reply == MOTOR_ACK => {
                self.current_angle = target;
                true
            }
            Ok(reply) => {
                log::warn!("Motor rejected MOVE {steps}: {reply:?}");
                false
            }
            Err(e) => {
                log::warn!("Motor command MOVE {steps} failed: {e}");
                false
            }
        }
    }

    fn close(&mut self) {
        if self.link.take().is_some() {
            log::info!("Motor connection closed");
        }
    }
}
