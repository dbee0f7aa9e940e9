// Differential drive runtime for two-motor EV3 robots
//
// Turns move requests (steer-and-run, timed run, run to angle / rotations,
// gyro heading hold, stop) into per-wheel motor commands.

pub mod config;
pub mod drive;
pub mod error;
pub mod hardware;
pub mod messages;
pub mod runtime;

pub use drive::Drive;
pub use error::{DriveError, Result};
pub use messages::{MoveArg, MoveCommand, MoveOp, MoveRequest};
