// Move operations and the messages exchanged with the runtime

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};

/// Movement operation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOp {
    Off,
    On,
    OnGyro,
    OnSeconds,
    OnDegrees,
    OnRotations,
}

impl MoveOp {
    pub const ALL: [MoveOp; 6] = [
        MoveOp::Off,
        MoveOp::On,
        MoveOp::OnGyro,
        MoveOp::OnSeconds,
        MoveOp::OnDegrees,
        MoveOp::OnRotations,
    ];

    /// Number of arguments the operation takes
    pub fn arity(self) -> usize {
        match self {
            MoveOp::Off => 1,
            MoveOp::On | MoveOp::OnGyro => 2,
            MoveOp::OnSeconds | MoveOp::OnDegrees | MoveOp::OnRotations => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoveOp::Off => "off",
            MoveOp::On => "on",
            MoveOp::OnGyro => "on_gyro",
            MoveOp::OnSeconds => "on_seconds",
            MoveOp::OnDegrees => "on_degrees",
            MoveOp::OnRotations => "on_rotations",
        }
    }
}

impl fmt::Display for MoveOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveOp {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        MoveOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DriveError::UnknownOperation(s.to_string()))
    }
}

/// Loosely typed argument as it arrives on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveArg {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for MoveArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveArg::Bool(v) => write!(f, "bool {}", v),
            MoveArg::Int(v) => write!(f, "int {}", v),
            MoveArg::Float(v) => write!(f, "float {}", v),
        }
    }
}

impl From<bool> for MoveArg {
    fn from(v: bool) -> Self {
        MoveArg::Bool(v)
    }
}

impl From<i64> for MoveArg {
    fn from(v: i64) -> Self {
        MoveArg::Int(v)
    }
}

impl From<i32> for MoveArg {
    fn from(v: i32) -> Self {
        MoveArg::Int(v.into())
    }
}

impl From<f64> for MoveArg {
    fn from(v: f64) -> Self {
        MoveArg::Float(v)
    }
}

/// A validated movement command.
///
/// `steering` is a signed turn percentage, `power` a signed wheel power percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MoveCommand {
    Off {
        brake: bool,
    },
    On {
        steering: f32,
        power: i16,
    },
    OnGyro {
        heading: i32,
        power: i16,
    },
    OnSeconds {
        steering: f32,
        power: i16,
        seconds: f64,
        brake: bool,
    },
    OnDegrees {
        steering: f32,
        power: i16,
        degrees: i32,
        brake: bool,
    },
    OnRotations {
        steering: f32,
        power: i16,
        rotations: i32,
        brake: bool,
    },
}

/// Typed access to a positional argument list
struct Args<'a> {
    op: MoveOp,
    args: &'a [MoveArg],
}

impl Args<'_> {
    fn type_error(&self, index: usize, expected: &'static str) -> DriveError {
        DriveError::InvalidArgumentType {
            op: self.op,
            index,
            expected,
            found: self.args[index].to_string(),
        }
    }

    fn bool(&self, index: usize) -> Result<bool> {
        match self.args[index] {
            MoveArg::Bool(v) => Ok(v),
            _ => Err(self.type_error(index, "bool")),
        }
    }

    // Whole numbers are fine where a float is expected
    fn float(&self, index: usize) -> Result<f64> {
        match self.args[index] {
            MoveArg::Float(v) => Ok(v),
            MoveArg::Int(v) => Ok(v as f64),
            MoveArg::Bool(_) => Err(self.type_error(index, "float")),
        }
    }

    fn int<T: TryFrom<i64>>(&self, index: usize, expected: &'static str) -> Result<T> {
        match self.args[index] {
            MoveArg::Int(v) => T::try_from(v).map_err(|_| self.type_error(index, expected)),
            _ => Err(self.type_error(index, expected)),
        }
    }
}

impl MoveCommand {
    /// Validate a positional argument list for `op`.
    ///
    /// Argument order per operation:
    /// * `off`: brake
    /// * `on`: steering, power
    /// * `on_gyro`: heading, power
    /// * `on_seconds`: steering, power, seconds, brake
    /// * `on_degrees`: steering, power, degrees, brake
    /// * `on_rotations`: steering, power, rotations, brake
    pub fn from_args(op: MoveOp, args: &[MoveArg]) -> Result<Self> {
        let expected = op.arity();
        if args.len() != expected {
            return Err(DriveError::InvalidArgumentCount {
                op,
                expected,
                actual: args.len(),
            });
        }

        let a = Args { op, args };
        let cmd = match op {
            MoveOp::Off => MoveCommand::Off { brake: a.bool(0)? },
            MoveOp::On => MoveCommand::On {
                steering: a.float(0)? as f32,
                power: a.int(1, "i16 power")?,
            },
            MoveOp::OnGyro => MoveCommand::OnGyro {
                heading: a.int(0, "i32 heading")?,
                power: a.int(1, "i16 power")?,
            },
            MoveOp::OnSeconds => MoveCommand::OnSeconds {
                steering: a.float(0)? as f32,
                power: a.int(1, "i16 power")?,
                seconds: a.float(2)?,
                brake: a.bool(3)?,
            },
            MoveOp::OnDegrees => MoveCommand::OnDegrees {
                steering: a.float(0)? as f32,
                power: a.int(1, "i16 power")?,
                degrees: a.int(2, "i32 degrees")?,
                brake: a.bool(3)?,
            },
            MoveOp::OnRotations => MoveCommand::OnRotations {
                steering: a.float(0)? as f32,
                power: a.int(1, "i16 power")?,
                rotations: a.int(2, "i32 rotations")?,
                brake: a.bool(3)?,
            },
        };
        Ok(cmd)
    }

    pub fn op(&self) -> MoveOp {
        match self {
            MoveCommand::Off { .. } => MoveOp::Off,
            MoveCommand::On { .. } => MoveOp::On,
            MoveCommand::OnGyro { .. } => MoveOp::OnGyro,
            MoveCommand::OnSeconds { .. } => MoveOp::OnSeconds,
            MoveCommand::OnDegrees { .. } => MoveOp::OnDegrees,
            MoveCommand::OnRotations { .. } => MoveOp::OnRotations,
        }
    }

    /// Positional arguments in wire order
    pub fn args(&self) -> Vec<MoveArg> {
        let steer = |s: f32| MoveArg::Float(f64::from(s));
        let int = |v: i64| MoveArg::Int(v);
        match *self {
            MoveCommand::Off { brake } => vec![brake.into()],
            MoveCommand::On { steering, power } => vec![steer(steering), int(power.into())],
            MoveCommand::OnGyro { heading, power } => {
                vec![int(heading.into()), int(power.into())]
            }
            MoveCommand::OnSeconds {
                steering,
                power,
                seconds,
                brake,
            } => vec![steer(steering), int(power.into()), seconds.into(), brake.into()],
            MoveCommand::OnDegrees {
                steering,
                power,
                degrees,
                brake,
            } => vec![steer(steering), int(power.into()), int(degrees.into()), brake.into()],
            MoveCommand::OnRotations {
                steering,
                power,
                rotations,
                brake,
            } => vec![steer(steering), int(power.into()), int(rotations.into()), brake.into()],
        }
    }
}

// Move request from teleop/scripts -> runtime
// e.g. {"op": "on_degrees", "args": [10.0, 50, 720, false]}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub op: String,
    #[serde(default)]
    pub args: Vec<MoveArg>,
}

impl TryFrom<&MoveRequest> for MoveCommand {
    type Error = DriveError;

    fn try_from(req: &MoveRequest) -> Result<Self> {
        let op: MoveOp = req.op.parse()?;
        MoveCommand::from_args(op, &req.args)
    }
}

impl From<&MoveCommand> for MoveRequest {
    fn from(cmd: &MoveCommand) -> Self {
        Self {
            op: cmd.op().to_string(),
            args: cmd.args(),
        }
    }
}

/// Result of one request, published by the runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveStatus {
    pub op: String,
    pub ok: bool,
    pub error: Option<String>,
    pub heading_hold_active: bool,
}
