// Simulated motors and gyro
//
// Used for dry runs (--simulate) and as the recording double in tests.
// Every motor command is appended to a shared CallLog so callers can
// assert on exactly what the drive sent to the hardware.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{HardwareError, HeadingSensor, MotorActuator, Result};

/// Simulated shaft speed at 100% power, in degrees per second
const FULL_SPEED_DPS: f32 = 1020.0;

const RUNNING: &str = "running";

/// A command received by a simulated motor
#[derive(Debug, Clone, PartialEq)]
pub enum MotorCall {
    Run { power: i16 },
    RunTimed { power: i16, ms: i32 },
    RunToRelPos { power: i16, degrees: i32 },
    Stop,
    SetBrakeOnStop(bool),
    SetRegulation(bool),
}

/// Shared, ordered record of every call made to a set of simulated motors
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, MotorCall)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, motor: &str, call: MotorCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((motor.to_string(), call));
    }

    /// All calls in the order they were issued, tagged with the motor name
    pub fn calls(&self) -> Vec<(String, MotorCall)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls received by one motor
    pub fn for_motor(&self, motor: &str) -> Vec<MotorCall> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == motor)
            .map(|(_, call)| call)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum Busy {
    Idle,
    Forever,
    Until(Instant),
    Polls(u32),
}

/// Simulated tacho motor
#[derive(Debug)]
pub struct SimMotor {
    name: String,
    log: CallLog,
    busy: Busy,
    busy_polls: Option<u32>,
    brake_fault: Arc<AtomicBool>,
}

impl SimMotor {
    pub fn new(name: &str, log: CallLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            busy: Busy::Idle,
            busy_polls: None,
            brake_fault: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report busy for exactly `polls` run-state reads after each timed or positional command,
    /// instead of simulating the move duration
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = Some(polls);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Switch that makes `set_brake_on_stop` fail while it is set. Failed writes are not logged.
    pub fn brake_fault(&self) -> Arc<AtomicBool> {
        self.brake_fault.clone()
    }

    fn start_move(&mut self, duration: Duration) {
        self.busy = match self.busy_polls {
            Some(polls) => Busy::Polls(polls),
            None => Busy::Until(Instant::now() + duration),
        };
    }
}

/// Time a move of `degrees` takes at `power`. Zero power completes immediately.
fn move_duration(power: i16, degrees: i32) -> Duration {
    let dps = f32::from(power).abs() * FULL_SPEED_DPS / 100.0;
    if dps == 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f32(degrees.unsigned_abs() as f32 / dps)
}

impl MotorActuator for SimMotor {
    fn run(&mut self, power: i16) -> Result<()> {
        self.log.push(&self.name, MotorCall::Run { power });
        self.busy = Busy::Forever;
        Ok(())
    }

    fn run_timed(&mut self, power: i16, ms: i32) -> Result<()> {
        self.log.push(&self.name, MotorCall::RunTimed { power, ms });
        self.start_move(Duration::from_millis(ms.max(0) as u64));
        Ok(())
    }

    fn run_to_rel_pos(&mut self, power: i16, degrees: i32) -> Result<()> {
        self.log.push(&self.name, MotorCall::RunToRelPos { power, degrees });
        self.start_move(move_duration(power, degrees));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.push(&self.name, MotorCall::Stop);
        self.busy = Busy::Idle;
        Ok(())
    }

    fn run_state(&mut self) -> Result<String> {
        let running = match self.busy {
            Busy::Idle => false,
            Busy::Forever => true,
            Busy::Until(deadline) => Instant::now() < deadline,
            Busy::Polls(0) => false,
            Busy::Polls(remaining) => {
                self.busy = Busy::Polls(remaining - 1);
                true
            }
        };
        if !running {
            self.busy = Busy::Idle;
        }
        debug!("{} state: {}", self.name, if running { RUNNING } else { "idle" });
        Ok(if running { RUNNING.to_string() } else { String::new() })
    }

    fn set_brake_on_stop(&mut self, enabled: bool) -> Result<()> {
        if self.brake_fault.load(Ordering::SeqCst) {
            return Err(HardwareError::Io {
                path: format!("sim/{}/stop_action", self.name).into(),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        self.log.push(&self.name, MotorCall::SetBrakeOnStop(enabled));
        Ok(())
    }

    fn set_regulation(&mut self, enabled: bool) -> Result<()> {
        self.log.push(&self.name, MotorCall::SetRegulation(enabled));
        Ok(())
    }
}

/// Simulated gyro. Clones share the same heading, so a test can steer it while the drive reads it.
#[derive(Debug, Clone, Default)]
pub struct SimGyro {
    heading: Arc<AtomicI32>,
    failing: Arc<AtomicBool>,
}

impl SimGyro {
    pub fn new(heading: i32) -> Self {
        Self {
            heading: Arc::new(AtomicI32::new(heading)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_heading(&self, heading: i32) {
        self.heading.store(heading, Ordering::SeqCst);
    }

    /// Make every subsequent read fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl HeadingSensor for SimGyro {
    fn read_heading(&mut self) -> Result<i32> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::Io {
                path: "sim/gyro/value0".into(),
                source: std::io::Error::other("simulated read failure"),
            });
        }
        Ok(self.heading.load(Ordering::SeqCst))
    }
}
