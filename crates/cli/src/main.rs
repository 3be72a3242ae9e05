use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use crossbeam_channel::Sender;

use mic_aim_core::aiming::domain::actuator::Actuator;
use mic_aim_core::aiming::domain::aiming_controller::AimingController;
use mic_aim_core::aiming::domain::geometry::StageGeometry;
use mic_aim_core::aiming::infrastructure::serial_motor::SerialMotor;
use mic_aim_core::aiming::infrastructure::simulated_motor::SimulatedMotor;
use mic_aim_core::detection::domain::face_detector::FaceDetector;
use mic_aim_core::detection::infrastructure::model_resolver;
use mic_aim_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use mic_aim_core::pipeline::operator_input::{
    parse_command, ChannelOperatorInput, NoOperatorInput, OperatorEvent, OperatorInput,
};
use mic_aim_core::pipeline::session_logger::StdoutSessionLogger;
use mic_aim_core::pipeline::track_and_aim_use_case::{ExitReason, TrackAndAimUseCase};
use mic_aim_core::shared::config::TrackerConfig;
use mic_aim_core::shared::constants::{DEFAULT_MOTOR_PORT, YOLO_MODEL_NAME, YOLO_MODEL_URL};
use mic_aim_core::tracking::domain::frame_schedule::FrameSchedule;
use mic_aim_core::tracking::domain::tracking_engine::TrackingEngine;
use mic_aim_core::video::domain::frame_source::FrameSource;
use mic_aim_core::video::infrastructure::ffmpeg_frame_source::{FfmpegFrameSource, SourceLocation};

/// Keeps a directional microphone aimed at a face picked from a live camera.
///
/// Operator commands are read from stdin, one per line:
/// `pick X Y` (or `p X Y`), `reset` (`r`), `quit` (`q`).
#[derive(Parser)]
#[command(name = "mic-aim")]
struct Cli {
    /// JSON config file (defaults to the per-user MicAim/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device index.
    #[arg(long)]
    camera: Option<u32>,

    /// Read frames from a video file or stream URL instead of a camera.
    #[arg(long, conflicts_with = "camera")]
    source: Option<PathBuf>,

    /// Serial device of the motor controller; a bare flag uses /dev/ttyUSB0.
    /// Omit it (and leave it out of the config) to simulate the motor.
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_MOTOR_PORT)]
    motor_port: Option<String>,

    /// Simulated motor speed, seconds per degree of travel.
    #[arg(long)]
    seconds_per_degree: Option<f64>,

    /// Run detection and command the motor every Nth frame (1 = every frame).
    #[arg(long)]
    skip_frames: Option<u64>,

    /// ROI size relative to the tracked face (> 1.0).
    #[arg(long)]
    roi_scale: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Face model file (skips the cache lookup and download).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Ignore stdin; the run ends on --max-frames or end of stream.
    #[arg(long)]
    no_console: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let detector = build_detector(&cli, &config)?;
    let actuator = build_actuator(&config)?;
    let source: Box<dyn FrameSource> = Box::new(match &cli.source {
        Some(path) => FfmpegFrameSource::new(SourceLocation::Path(path.clone())),
        None => FfmpegFrameSource::camera(config.camera_index),
    });
    let input: Box<dyn OperatorInput> = if cli.no_console {
        Box::new(NoOperatorInput)
    } else {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_console(tx);
        Box::new(ChannelOperatorInput::new(rx))
    };

    let mut use_case = TrackAndAimUseCase::new(
        source,
        TrackingEngine::new(detector, config.roi_scale),
        AimingController::new(actuator, StageGeometry::from_config(&config)),
        FrameSchedule::new(config.skip_frames)?,
        input,
        Box::new(StdoutSessionLogger::default()),
        cli.max_frames,
    );
    let summary = use_case.execute()?;

    match &summary.exit {
        ExitReason::Quit => log::info!("Stopped by operator"),
        ExitReason::MaxFrames => log::info!("Reached {} frames", summary.frames),
        ExitReason::CaptureFailed(reason) => log::warn!("Capture ended: {reason}"),
    }
    log::info!(
        "{} frames, {} detection cycles, {} motor commands ({} failed)",
        summary.frames,
        summary.detection_cycles,
        summary.actuator_commands,
        summary.actuator_failures
    );
    Ok(())
}

/// Config file (explicit or per-user) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::load_or_default()?,
    };

    if let Some(camera) = cli.camera {
        config.camera_index = camera;
    }
    if let Some(port) = &cli.motor_port {
        config.motor_port = Some(port.clone());
    }
    if let Some(spd) = cli.seconds_per_degree {
        config.motor_seconds_per_degree = spd;
    }
    if let Some(skip) = cli.skip_frames {
        config.skip_frames = skip;
    }
    if let Some(scale) = cli.roi_scale {
        config.roi_scale = scale;
    }
    if let Some(confidence) = cli.confidence {
        config.confidence = confidence;
    }

    config.validate()?;
    Ok(config)
}

fn build_detector(
    cli: &Cli,
    config: &TrackerConfig,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(YOLO_MODEL_NAME, YOLO_MODEL_URL, cli.model.as_deref())?;
    Ok(Box::new(OnnxFaceDetector::new(&model_path, config.confidence)?))
}

fn build_actuator(config: &TrackerConfig) -> Result<Box<dyn Actuator>, Box<dyn std::error::Error>> {
    match &config.motor_port {
        Some(port) => {
            let motor = SerialMotor::open(Path::new(port))
                .map_err(|e| format!("Failed to open motor port {port}: {e}"))?;
            log::info!("Motor connected on {port}");
            Ok(Box::new(motor))
        }
        None => {
            log::info!("No motor port configured; simulating the motor");
            Ok(Box::new(SimulatedMotor::new(config.motor_seconds_per_degree)))
        }
    }
}

/// Reads operator commands from stdin on a background thread. Closing stdin
/// drops the sender, which the loop treats as a quit.
fn spawn_console(tx: Sender<OperatorEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{e} (commands: pick X Y, reset, quit)"),
            }
        }
    });
}
