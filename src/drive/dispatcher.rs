// Move dispatcher
//
// Drive owns both motors, the optional gyro, the brake mode state and the
// active heading hold. Every foreground motor command is preceded by
// cancelling (and joining) any running heading hold, so the two never write
// to the motors at the same time.

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;
use tokio::task::block_in_place;
use tracing::{debug, info, warn};

use super::brake::{BrakeModeGuard, BrakeState};
use super::heading_hold::HeadingHold;
use super::steering::WheelPowers;
use super::waiter::wait_until_done;
use super::SharedMotor;
use crate::config::{HEADING_HOLD_PERIOD, POLL_INTERVAL};
use crate::error::{DriveError, Result};
use crate::hardware::{HeadingSensor, MotorActuator};
use crate::messages::{MoveArg, MoveCommand, MoveOp};

/// Two-motor differential drive
pub struct Drive<M: MotorActuator, G: HeadingSensor> {
    left: SharedMotor<M>,
    right: SharedMotor<M>,
    gyro: Option<Arc<Mutex<G>>>,
    brake: BrakeModeGuard,
    heading_hold: Option<HeadingHold>,
}

impl<M: MotorActuator, G: HeadingSensor> Drive<M, G> {
    /// Wire up the motors and optional gyro, and set speed regulation on both motors.
    pub fn configure(
        mut left: M,
        mut right: M,
        gyro: Option<G>,
        regulation: bool,
    ) -> Result<Self> {
        info!(
            "Configuring drive (regulation {}, gyro {})",
            if regulation { "on" } else { "off" },
            if gyro.is_some() { "present" } else { "absent" }
        );
        left.set_regulation(regulation)?;
        right.set_regulation(regulation)?;

        Ok(Self {
            left: Arc::new(Mutex::new(left)),
            right: Arc::new(Mutex::new(right)),
            gyro: gyro.map(|g| Arc::new(Mutex::new(g))),
            brake: BrakeModeGuard::new(),
            heading_hold: None,
        })
    }

    /// Validate a positional argument list and run the move.
    ///
    /// Validation errors are returned before anything is sent to the motors.
    pub async fn dispatch(&mut self, op: MoveOp, args: &[MoveArg]) -> Result<()> {
        let cmd = MoveCommand::from_args(op, args)?;
        self.execute(cmd).await
    }

    /// Like [`Drive::dispatch`], with the operation given by name (e.g. `"on_degrees"`)
    pub async fn dispatch_named(&mut self, op: &str, args: &[MoveArg]) -> Result<()> {
        let op: MoveOp = op.parse()?;
        self.dispatch(op, args).await
    }

    /// Run a validated move. Timed and positional moves return once both motors are idle.
    pub async fn execute(&mut self, cmd: MoveCommand) -> Result<()> {
        info!("Executing {:?}", cmd);
        match cmd {
            MoveCommand::Off { brake } => self.off(brake).await,
            MoveCommand::On { steering, power } => self.on(steering, power).await,
            MoveCommand::OnGyro { heading, power } => self.on_gyro(heading, power).await,
            MoveCommand::OnSeconds {
                steering,
                power,
                seconds,
                brake,
            } => self.on_seconds(steering, power, seconds, brake).await,
            MoveCommand::OnDegrees {
                steering,
                power,
                degrees,
                brake,
            } => self.on_degrees(steering, power, degrees, brake).await,
            MoveCommand::OnRotations {
                steering,
                power,
                rotations,
                brake,
            } => {
                self.on_degrees(steering, power, rotations.saturating_mul(360), brake)
                    .await
            }
        }
    }

    /// Whether a heading hold loop is currently running
    pub fn heading_hold_active(&self) -> bool {
        self.heading_hold
            .as_ref()
            .is_some_and(|hold| !hold.is_finished())
    }

    pub fn brake_state(&self) -> BrakeState {
        self.brake.state()
    }

    async fn off(&mut self, brake: bool) -> Result<()> {
        self.cancel_heading_hold().await;

        // The motors are stopped even if the mode write failed
        let braked = self.brake.apply(brake, &self.left, &self.right).await;
        if let Err(ref e) = braked {
            warn!("Stop action not applied, stopping anyway: {}", e);
        }

        info!("Stopping motors");
        let left = self.left.lock().await.stop();
        let right = self.right.lock().await.stop();

        braked?;
        left?;
        right?;
        Ok(())
    }

    async fn on(&mut self, steering: f32, power: i16) -> Result<()> {
        self.cancel_heading_hold().await;

        let wheels = WheelPowers::from_steering(steering, power);
        debug!("Run: left={}, right={}", wheels.left, wheels.right);
        self.left.lock().await.run(wheels.left)?;
        self.right.lock().await.run(wheels.right)?;
        Ok(())
    }

    async fn on_gyro(&mut self, heading: i32, power: i16) -> Result<()> {
        let gyro = self.gyro.clone().ok_or(DriveError::NoHeadingSensor)?;

        if let Some(hold) = self.heading_hold.take() {
            if !hold.is_finished() {
                self.heading_hold = Some(hold);
                return Err(DriveError::HeadingHoldActive);
            }
            // Loop already died on a hardware error, collect it
            hold.cancel().await;
        }

        let hold = HeadingHold::start(
            heading,
            power,
            self.left.clone(),
            self.right.clone(),
            gyro,
            HEADING_HOLD_PERIOD,
        )
        .await?;
        self.heading_hold = Some(hold);
        Ok(())
    }

    async fn on_seconds(
        &mut self,
        steering: f32,
        power: i16,
        seconds: f64,
        brake: bool,
    ) -> Result<()> {
        self.cancel_heading_hold().await;
        self.brake.apply(brake, &self.left, &self.right).await?;

        let ms = (seconds * 1000.0) as i32;
        let wheels = WheelPowers::from_steering(steering, power);
        debug!("Run {}ms: left={}, right={}", ms, wheels.left, wheels.right);
        self.left.lock().await.run_timed(wheels.left, ms)?;
        self.right.lock().await.run_timed(wheels.right, ms)?;

        wait_until_done(&self.left, &self.right, POLL_INTERVAL).await?;
        Ok(())
    }

    async fn on_degrees(
        &mut self,
        steering: f32,
        power: i16,
        degrees: i32,
        brake: bool,
    ) -> Result<()> {
        self.cancel_heading_hold().await;
        self.brake.apply(brake, &self.left, &self.right).await?;

        let wheels = WheelPowers::from_steering(steering, power);
        debug!(
            "Run {} degrees: left={}, right={}",
            degrees, wheels.left, wheels.right
        );
        self.left.lock().await.run_to_rel_pos(wheels.left, degrees)?;
        self.right.lock().await.run_to_rel_pos(wheels.right, degrees)?;

        wait_until_done(&self.left, &self.right, POLL_INTERVAL).await?;
        Ok(())
    }

    /// Cancel and join the heading hold, if any. Afterwards the foreground owns the motors.
    async fn cancel_heading_hold(&mut self) {
        if let Some(hold) = self.heading_hold.take() {
            info!("Cancelling heading hold (target={})", hold.target());
            hold.cancel().await;
        }
    }
}

impl<M: MotorActuator, G: HeadingSensor> Drop for Drive<M, G> {
    fn drop(&mut self) {
        if let Some(hold) = self.heading_hold.take() {
            // On a worker-thread runtime the loop may be mid-correction, so join it
            // before stopping. A current-thread runtime cannot be polling it right
            // now, and aborting keeps it from being polled again.
            match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                    block_in_place(|| handle.block_on(hold.cancel()));
                }
                _ => hold.abort(),
            }
        }

        // Try to stop motors when the drive is dropped (safety measure)
        for motor in [&self.left, &self.right] {
            match motor.try_lock() {
                Ok(mut motor) => {
                    if let Err(e) = motor.stop() {
                        warn!("Failed to stop motor on drop: {}", e);
                    }
                }
                Err(_) => warn!("Motor busy on drop, not stopped"),
            }
        }
    }
}
