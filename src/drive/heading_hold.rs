// Gyro heading hold
//
// A background task that keeps nudging wheel power so the sensed heading
// stays on a target. The correction is a fixed-gain push on one wheel, not a
// tuned controller. Cancellation is cooperative: the flag is checked at the
// top of every iteration and the canceller joins the task, so once cancel()
// returns nothing from the loop can reach the motors again.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, trace, warn};

use super::SharedMotor;
use super::steering::WheelPowers;
use crate::config::HEADING_CORRECTION_GAIN;
use crate::hardware::{HeadingSensor, MotorActuator, Result};

/// Wheel powers that steer back towards `target` from `current`.
///
/// Below target the left wheel is boosted (pull right), above target the right wheel is.
pub fn heading_correction(current: i32, target: i32, power: i16) -> WheelPowers {
    let boosted = (f32::from(power) * HEADING_CORRECTION_GAIN) as i16;
    match current.cmp(&target) {
        Ordering::Less => WheelPowers::new(boosted, power),
        Ordering::Greater => WheelPowers::new(power, boosted),
        Ordering::Equal => WheelPowers::straight(power),
    }
}

/// Handle to a running heading hold
#[derive(Debug)]
pub struct HeadingHold {
    target: i32,
    power: i16,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl HeadingHold {
    /// Ramp both motors to half power, then start correcting towards `target` every `period`.
    pub async fn start<M: MotorActuator, G: HeadingSensor>(
        target: i32,
        power: i16,
        left: SharedMotor<M>,
        right: SharedMotor<M>,
        gyro: Arc<Mutex<G>>,
        period: Duration,
    ) -> Result<Self> {
        let ramp = power / 2;
        left.lock().await.run(ramp)?;
        right.lock().await.run(ramp)?;

        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(hold_heading(
            target, power, left, right, gyro, cancelled, period,
        ));
        info!(
            "Heading hold started: target={}, power={}, period={:?}",
            target, power, period
        );

        Ok(Self {
            target,
            power,
            cancel,
            task,
        })
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn power(&self) -> i16 {
        self.power
    }

    /// True once the loop has exited on its own (hardware error)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit.
    ///
    /// The loop does not stop the motors; they keep the last commanded power.
    pub async fn cancel(self) {
        // Fails only if the loop already exited and dropped its receiver
        let _ = self.cancel.send(true);

        match self.task.await {
            Ok(Ok(())) => info!("Heading hold stopped (target={})", self.target),
            Ok(Err(e)) => warn!("Heading hold had already stopped: {}", e),
            Err(e) => error!("Heading hold task failed: {}", e),
        }
    }

    /// Stop the loop without waiting for it
    pub fn abort(self) {
        self.task.abort();
    }
}

async fn hold_heading<M: MotorActuator, G: HeadingSensor>(
    target: i32,
    power: i16,
    left: SharedMotor<M>,
    right: SharedMotor<M>,
    gyro: Arc<Mutex<G>>,
    mut cancelled: watch::Receiver<bool>,
    period: Duration,
) -> Result<()> {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *cancelled.borrow() {
            return Ok(());
        }

        tokio::select! {
            biased;
            changed = cancelled.changed() => {
                // Sender gone means the handle was dropped without a cancel
                if changed.is_err() {
                    return Ok(());
                }
                continue;
            }
            _ = tick.tick() => {}
        }

        if let Err(e) = correct_once(target, power, &left, &right, &gyro).await {
            error!("Heading hold stopped: {}", e);
            return Err(e);
        }
    }
}

async fn correct_once<M: MotorActuator, G: HeadingSensor>(
    target: i32,
    power: i16,
    left: &SharedMotor<M>,
    right: &SharedMotor<M>,
    gyro: &Arc<Mutex<G>>,
) -> Result<()> {
    let current = gyro.lock().await.read_heading()?;
    let wheels = heading_correction(current, target, power);
    trace!(
        "heading {} -> {}: left={}, right={}",
        current, target, wheels.left, wheels.right
    );

    left.lock().await.run(wheels.left)?;
    right.lock().await.run(wheels.right)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HEADING_HOLD_PERIOD;
    use crate::hardware::{CallLog, MotorCall, SimGyro, SimMotor};

    struct Rig {
        log: CallLog,
        gyro: SimGyro,
        left: SharedMotor<SimMotor>,
        right: SharedMotor<SimMotor>,
    }

    impl Rig {
        fn new(heading: i32) -> Self {
            let log = CallLog::new();
            Self {
                left: Arc::new(Mutex::new(SimMotor::new("left", log.clone()))),
                right: Arc::new(Mutex::new(SimMotor::new("right", log.clone()))),
                gyro: SimGyro::new(heading),
                log,
            }
        }

        async fn start(&self, target: i32, power: i16) -> HeadingHold {
            HeadingHold::start(
                target,
                power,
                self.left.clone(),
                self.right.clone(),
                Arc::new(Mutex::new(self.gyro.clone())),
                HEADING_HOLD_PERIOD,
            )
            .await
            .unwrap()
        }
    }

    #[test]
    fn test_correction_below_target_pulls_right() {
        assert_eq!(heading_correction(-5, 0, 50), WheelPowers::new(55, 50));
    }

    #[test]
    fn test_correction_above_target_pulls_left() {
        assert_eq!(heading_correction(12, 0, 50), WheelPowers::new(50, 55));
    }

    #[test]
    fn test_correction_on_target_is_straight() {
        assert_eq!(heading_correction(90, 90, 50), WheelPowers::straight(50));
    }

    #[test]
    fn test_correction_truncates_boost() {
        // 33 * 1.1 = 36.3, -40 * 1.1 = -44
        assert_eq!(heading_correction(0, 1, 33), WheelPowers::new(36, 33));
        assert_eq!(heading_correction(0, 1, -40), WheelPowers::new(-44, -40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_then_correct_every_iteration() {
        let rig = Rig::new(0);
        let hold = rig.start(10, 50).await;

        tokio::time::sleep(HEADING_HOLD_PERIOD * 5).await;
        hold.cancel().await;

        let left = rig.log.for_motor("left");
        let right = rig.log.for_motor("right");
        assert_eq!(left[0], MotorCall::Run { power: 25 });
        assert_eq!(right[0], MotorCall::Run { power: 25 });
        assert!(left.len() > 3);
        assert!(left[1..].iter().all(|c| *c == MotorCall::Run { power: 55 }));
        assert!(right[1..].iter().all(|c| *c == MotorCall::Run { power: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_heading_changes() {
        let rig = Rig::new(20);
        let hold = rig.start(10, 40).await;

        tokio::time::sleep(HEADING_HOLD_PERIOD * 3).await;
        assert_eq!(
            rig.log.for_motor("right").last(),
            Some(&MotorCall::Run { power: 44 })
        );

        rig.gyro.set_heading(10);
        tokio::time::sleep(HEADING_HOLD_PERIOD * 3).await;
        assert_eq!(
            rig.log.for_motor("left").last(),
            Some(&MotorCall::Run { power: 40 })
        );
        assert_eq!(
            rig.log.for_motor("right").last(),
            Some(&MotorCall::Run { power: 40 })
        );

        hold.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_writes_after_cancel() {
        let rig = Rig::new(0);
        let hold = rig.start(0, 30).await;

        tokio::time::sleep(HEADING_HOLD_PERIOD * 4).await;
        hold.cancel().await;
        let after_cancel = rig.log.len();

        tokio::time::sleep(HEADING_HOLD_PERIOD * 20).await;
        assert_eq!(rig.log.len(), after_cancel);
        assert!(
            !rig.log
                .calls()
                .iter()
                .any(|(_, call)| *call == MotorCall::Stop),
            "the loop must not stop the motors itself"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_ends_task() {
        let rig = Rig::new(0);
        let hold = rig.start(0, 30).await;

        tokio::time::sleep(HEADING_HOLD_PERIOD * 2).await;
        rig.gyro.set_failing(true);
        tokio::time::sleep(HEADING_HOLD_PERIOD * 2).await;
        assert!(hold.is_finished());

        let writes = rig.log.len();
        tokio::time::sleep(HEADING_HOLD_PERIOD * 5).await;
        assert_eq!(rig.log.len(), writes);

        // Cancelling a finished hold is harmless
        hold.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_ends_task() {
        let rig = Rig::new(0);
        let hold = rig.start(0, 30).await;
        tokio::time::sleep(HEADING_HOLD_PERIOD * 2).await;

        let HeadingHold { cancel, task, .. } = hold;
        drop(cancel);
        assert!(task.await.unwrap().is_ok());
    }
}
