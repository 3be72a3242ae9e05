use std::collections::HashMap;
use std::time::Instant;

/// What happened in one loop cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub frame_number: u64,
    pub scheduled: bool,
    pub state: &'static str,
    pub detections: usize,
    pub detector_calls: u8,
    pub detector_faults: u8,
    pub fell_back: bool,
    pub lost: bool,
    pub bearing: Option<f64>,
    pub commanded: bool,
    pub actuator_ok: Option<bool>,
}

/// Observer for the tracking session.
///
/// Keeps the loop free of any particular output mechanism: the CLI logs to
/// stdout, tests discard everything.
pub trait SessionLogger: Send {
    fn cycle(&mut self, report: &CycleReport);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn cycle(&mut self, _report: &CycleReport) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running totals across a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub frames: u64,
    pub detection_cycles: u64,
    pub detector_faults: u64,
    pub fallbacks: u64,
    pub losses: u64,
    pub commands: u64,
    pub command_failures: u64,
}

/// CLI logger: throttled per-frame status, counters, and stage timing.
pub struct StdoutSessionLogger {
    throttle_frames: u64,
    counters: SessionCounters,
    timings: HashMap<String, Vec<f64>>,
    start_time: Instant,
    last_state: &'static str,
}

impl StdoutSessionLogger {
    pub fn new(throttle_frames: u64) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            counters: SessionCounters::default(),
            timings: HashMap::new(),
            start_time: Instant::now(),
            last_state: "",
        }
    }

    #[cfg(test)]
    pub(crate) fn counters(&self) -> SessionCounters {
        self.counters
    }

    #[cfg(test)]
    pub(crate) fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the formatted summary, or `None` before the first frame.
    pub fn summary_string(&self) -> Option<String> {
        let c = &self.counters;
        if c.frames == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![
            format!("Session summary ({} frames, {elapsed_s:.1}s):", c.frames),
            format!(
                "  detection cycles: {}  (faults {}, ROI fallbacks {}, lost {})",
                c.detection_cycles, c.detector_faults, c.fallbacks, c.losses
            ),
            format!(
                "  motor commands:   {}  (failed {})",
                c.commands, c.command_failures
            ),
        ];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        if elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                c.frames as f64 / elapsed_s
            ));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn cycle(&mut self, report: &CycleReport) {
        let c = &mut self.counters;
        c.frames += 1;
        if report.detector_calls > 0 {
            c.detection_cycles += 1;
        }
        c.detector_faults += report.detector_faults as u64;
        c.fallbacks += report.fell_back as u64;
        c.losses += report.lost as u64;
        if report.commanded {
            c.commands += 1;
            if report.actuator_ok == Some(false) {
                c.command_failures += 1;
            }
        }

        if report.state != self.last_state {
            log::debug!("Tracking state: {}", report.state);
            self.last_state = report.state;
        }
        if report.frame_number % self.throttle_frames == 0 {
            match report.bearing {
                Some(bearing) => log::info!(
                    "Frame {}: {} faces, {}, bearing {bearing:.2}°",
                    report.frame_number,
                    report.detections,
                    report.state
                ),
                None => log::info!(
                    "Frame {}: {} faces, {}",
                    report.frame_number,
                    report.detections,
                    report.state
                ),
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
