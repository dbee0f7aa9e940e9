// Brake-on-stop mode tracking
//
// Writing stop_action is a sysfs round trip per motor, so the last applied
// mode is remembered and identical requests are skipped.

use tracing::debug;

use super::SharedMotor;
use crate::hardware::{MotorActuator, Result};

/// Last brake mode written to the motors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrakeState {
    /// False until a mode has been written at least once
    pub valid: bool,
    pub value: bool,
}

#[derive(Debug, Default)]
pub struct BrakeModeGuard {
    state: BrakeState,
}

impl BrakeModeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BrakeState {
        self.state
    }

    /// Set brake (`true`) or coast (`false`) on both motors unless they are already in that mode.
    ///
    /// Returns whether the hardware was written. The first call always writes.
    /// If a write fails the stored state is left untouched so the next call retries.
    pub async fn apply<M: MotorActuator>(
        &mut self,
        requested: bool,
        left: &SharedMotor<M>,
        right: &SharedMotor<M>,
    ) -> Result<bool> {
        if self.state.valid && self.state.value == requested {
            return Ok(false);
        }

        debug!(
            "Setting stop action to {}",
            if requested { "brake" } else { "coast" }
        );
        left.lock().await.set_brake_on_stop(requested)?;
        right.lock().await.set_brake_on_stop(requested)?;

        self.state = BrakeState {
            valid: true,
            value: requested,
        };
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;
    use crate::hardware::{CallLog, MotorCall, SimMotor};

    fn motors(log: &CallLog) -> (SharedMotor<SimMotor>, SharedMotor<SimMotor>) {
        (
            Arc::new(Mutex::new(SimMotor::new("left", log.clone()))),
            Arc::new(Mutex::new(SimMotor::new("right", log.clone()))),
        )
    }

    #[tokio::test]
    async fn test_first_request_always_writes() {
        let log = CallLog::new();
        let (left, right) = motors(&log);
        let mut guard = BrakeModeGuard::new();
        assert!(!guard.state().valid);

        // Default value is false, but an unset state must still be written
        assert!(guard.apply(false, &left, &right).await.unwrap());
        assert_eq!(
            log.calls(),
            vec![
                ("left".to_string(), MotorCall::SetBrakeOnStop(false)),
                ("right".to_string(), MotorCall::SetBrakeOnStop(false)),
            ]
        );
        assert_eq!(
            guard.state(),
            BrakeState {
                valid: true,
                value: false
            }
        );
    }

    #[tokio::test]
    async fn test_first_brake_request_writes() {
        let log = CallLog::new();
        let (left, right) = motors(&log);
        let mut guard = BrakeModeGuard::new();

        assert!(guard.apply(true, &left, &right).await.unwrap());
        assert_eq!(log.for_motor("left"), vec![MotorCall::SetBrakeOnStop(true)]);
        assert_eq!(log.for_motor("right"), vec![MotorCall::SetBrakeOnStop(true)]);
    }

    #[tokio::test]
    async fn test_repeated_request_is_skipped() {
        let log = CallLog::new();
        let (left, right) = motors(&log);
        let mut guard = BrakeModeGuard::new();

        guard.apply(true, &left, &right).await.unwrap();
        log.clear();

        assert!(!guard.apply(true, &left, &right).await.unwrap());
        assert!(!guard.apply(true, &left, &right).await.unwrap());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_alternating_requests_always_write() {
        let log = CallLog::new();
        let (left, right) = motors(&log);
        let mut guard = BrakeModeGuard::new();

        for (i, requested) in [true, false, true, false].into_iter().enumerate() {
            assert!(guard.apply(requested, &left, &right).await.unwrap());
            assert_eq!(log.len(), (i + 1) * 2);
        }
    }
}
