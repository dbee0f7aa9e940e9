// Blocking wait for timed and positional moves

use std::time::Duration;

use tokio::time::interval;
use tracing::debug;

use super::SharedMotor;
use crate::hardware::{MotorActuator, Result};

/// Poll both motors every `poll` until neither reports a run state.
///
/// The first poll happens immediately. There is no timeout: a motor that never
/// goes idle keeps the caller here forever, so only call this after commands that
/// stop on their own (run-timed, run-to-rel-pos).
///
/// Returns the number of polls that found a motor still running.
pub async fn wait_until_done<M: MotorActuator>(
    left: &SharedMotor<M>,
    right: &SharedMotor<M>,
    poll: Duration,
) -> Result<u32> {
    let mut tick = interval(poll);
    let mut busy_polls = 0;

    loop {
        tick.tick().await;

        let left_state = left.lock().await.run_state()?;
        let right_state = right.lock().await.run_state()?;
        if left_state.is_empty() && right_state.is_empty() {
            debug!("Move complete after {} busy poll(s)", busy_polls);
            return Ok(busy_polls);
        }

        debug!("Waiting: left={:?}, right={:?}", left_state, right_state);
        busy_polls += 1;
    }
}
