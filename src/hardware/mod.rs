// Hardware capabilities used by the drive
//
// Provides:
// - MotorActuator / HeadingSensor traits the drive is generic over
// - ev3dev sysfs backend (tacho motors + gyro)
// - Simulation backend that records every call

pub mod ev3;
pub mod sim;

use std::path::PathBuf;

pub use ev3::{Ev3Gyro, TachoMotor};
pub use sim::{CallLog, MotorCall, SimGyro, SimMotor};

/// Error types for motor and sensor access
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {value:?} read from {}", .path.display())]
    Parse { path: PathBuf, value: String },

    #[error("No {class} device found on port {port}")]
    PortNotFound { class: String, port: String },

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// A single motor that accepts power-level commands.
///
/// Power is a signed percentage, nominally in `[-100, 100]`.
pub trait MotorActuator: Send + 'static {
    /// Run indefinitely at `power`.
    fn run(&mut self, power: i16) -> Result<()>;

    /// Run at `power` for `ms` milliseconds, then stop.
    fn run_timed(&mut self, power: i16, ms: i32) -> Result<()>;

    /// Run at `power` until the shaft has turned `degrees` relative to its current position.
    fn run_to_rel_pos(&mut self, power: i16, degrees: i32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Current run state. An empty string means the motor is idle.
    fn run_state(&mut self) -> Result<String>;

    /// Brake (`true`) or coast (`false`) when stopped.
    fn set_brake_on_stop(&mut self, enabled: bool) -> Result<()>;

    /// Enable or disable closed-loop speed regulation.
    fn set_regulation(&mut self, enabled: bool) -> Result<()>;
}

/// Absolute heading source, in whole degrees.
pub trait HeadingSensor: Send + 'static {
    fn read_heading(&mut self) -> Result<i32>;
}
