pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Mechanical travel of the microphone mount, in degrees either side of center.
pub const MOTOR_LIMIT_DEGREES: f64 = 45.0;

/// Stepper resolution.
pub const MOTOR_STEPS_PER_90_DEGREES: f64 = 200.0;

pub const DEFAULT_MOTOR_PORT: &str = "/dev/ttyUSB0";

/// Reply the motor controller sends once a move completes.
pub const MOTOR_ACK: &str = "OK";

/// How long a move waits for the controller's reply before it counts as failed.
pub const MOTOR_REPLY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

pub const CONFIG_DIR_NAME: &str = "MicAim";
pub const CONFIG_FILE_NAME: &str = "config.json";
