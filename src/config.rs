// Timing, topics, port defaults and CLI configuration
use std::time::Duration;

use clap::Parser;

// Completion wait poll interval for timed / positional moves
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

// Heading-hold loop period (100 Hz, the EV3 gyro refreshes faster than sysfs can be read)
pub const HEADING_HOLD_PERIOD: Duration = Duration::from_millis(10);

// Power multiplier applied to the wheel that pulls back towards the target heading
pub const HEADING_CORRECTION_GAIN: f32 = 1.1;

// Zenoh topics
pub const TOPIC_CMD_MOVE: &str = "ev3/cmd/move"; // move requests
pub const TOPIC_STATE_DRIVE: &str = "ev3/state/drive"; // result of each request

// ev3dev sysfs class root
pub const SYSFS_ROOT: &str = "/sys/class";

// Default port mapping
pub const DEFAULT_LEFT_PORT: &str = "outB";
pub const DEFAULT_RIGHT_PORT: &str = "outC";
pub const DEFAULT_GYRO_PORT: &str = "in2";

/// Command line configuration for the drive runtime
#[derive(Debug, Clone, Parser)]
#[command(name = "ev3-drive-runtime", about = "Differential drive runtime for EV3 robots")]
pub struct DriveConfig {
    /// Output port of the left motor
    #[arg(long, default_value = DEFAULT_LEFT_PORT)]
    pub left: String,

    /// Output port of the right motor
    #[arg(long, default_value = DEFAULT_RIGHT_PORT)]
    pub right: String,

    /// Input port of the gyro sensor
    #[arg(long, default_value = DEFAULT_GYRO_PORT)]
    pub gyro: String,

    /// Run without a gyro (on_gyro requests will be rejected)
    #[arg(long)]
    pub no_gyro: bool,

    /// Disable closed-loop speed regulation on both motors
    #[arg(long)]
    pub no_regulation: bool,

    /// Use simulated motors and gyro instead of sysfs
    #[arg(long)]
    pub simulate: bool,
}

impl DriveConfig {
    pub fn regulation(&self) -> bool {
        !self.no_regulation
    }

    pub fn gyro_port(&self) -> Option<&str> {
        (!self.no_gyro).then_some(self.gyro.as_str())
    }
}
