// Errors reported by the drive to its caller

use crate::hardware::HardwareError;
use crate::messages::MoveOp;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Unknown move operation: {0}")]
    UnknownOperation(String),

    #[error("{op}: expected {expected} argument(s), got {actual}")]
    InvalidArgumentCount {
        op: MoveOp,
        expected: usize,
        actual: usize,
    },

    #[error("{op}: argument {index} should be {expected}, got {found}")]
    InvalidArgumentType {
        op: MoveOp,
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("A heading hold is already running, stop it before starting another")]
    HeadingHoldActive,

    #[error("No heading sensor configured")]
    NoHeadingSensor,

    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

pub type Result<T> = std::result::Result<T, DriveError>;
