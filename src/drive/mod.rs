// Differential drive control for a two-motor robot
//
// Provides:
// - Steering curve (steering % + power -> per-wheel power)
// - Brake mode guard (skips redundant stop_action writes)
// - Completion wait for timed / positional moves
// - Gyro heading hold background task
// - Drive, the move dispatcher tying it all together

mod brake;
mod dispatcher;
pub mod heading_hold;
pub mod steering;
mod waiter;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use brake::{BrakeModeGuard, BrakeState};
pub use dispatcher::Drive;
pub use heading_hold::{HeadingHold, heading_correction};
pub use steering::{WheelPowers, steering_power_curve};
pub use waiter::wait_until_done;

/// A motor shared between the foreground dispatcher and the heading hold task
pub type SharedMotor<M> = Arc<Mutex<M>>;
