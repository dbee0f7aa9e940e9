// Steering power curve for a two-wheel differential base
// Converts a steering percentage and base power into per-wheel power.

/// Scale applied to a wheel that is not on the inside of the turn
const FULL_SCALE: f32 = 100.0;

/// Per-wheel power commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelPowers {
    pub left: i16,
    pub right: i16,
}

impl WheelPowers {
    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Same power on both wheels
    pub fn straight(power: i16) -> Self {
        Self::new(power, power)
    }

    /// Split `power` between the wheels according to `steering`.
    ///
    /// The left wheel uses `curve(steering)` and the right wheel `curve(-steering)`,
    /// so positive steering slows the right wheel and negative steering slows the left.
    /// Results are truncated towards zero.
    pub fn from_steering(steering: f32, power: i16) -> Self {
        let power = f32::from(power);
        Self {
            left: (power * steering_power_curve(steering) / FULL_SCALE) as i16,
            right: (power * steering_power_curve(-steering) / FULL_SCALE) as i16,
        }
    }
}

/// Power scale (percent) for the left wheel at `percent` steering.
///
/// Non-negative steering leaves the wheel at full scale. Negative steering ramps
/// linearly from 100 at 0% down to 0 at -50%. Below -50% the scale goes negative
/// and the wheel reverses, which lets the robot spin in place.
pub fn steering_power_curve(percent: f32) -> f32 {
    if percent < 0.0 {
        2.0 * percent + FULL_SCALE
    } else {
        FULL_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_is_full_power() {
        assert_eq!(steering_power_curve(0.0), 100.0);
        assert_eq!(steering_power_curve(-0.0), 100.0);
        assert_eq!(WheelPowers::from_steering(0.0, 60), WheelPowers::straight(60));
    }

    #[test]
    fn test_curve_is_asymmetric() {
        for p in [10.0f32, 25.0, 50.0, 80.0] {
            assert_eq!(steering_power_curve(p), 100.0);
            assert!(steering_power_curve(p) + steering_power_curve(-p) < 200.0);
        }
        assert_eq!(
            steering_power_curve(10.0) + steering_power_curve(-10.0),
            180.0
        );
        assert_eq!(
            steering_power_curve(25.0) + steering_power_curve(-25.0),
            150.0
        );
    }

    #[test]
    fn test_pivot_at_minus_fifty() {
        assert_eq!(steering_power_curve(-50.0), 0.0);
        assert_eq!(WheelPowers::from_steering(-50.0, 80), WheelPowers::new(0, 80));
        assert_eq!(WheelPowers::from_steering(50.0, 80), WheelPowers::new(80, 0));
    }

    #[test]
    fn test_unclamped_below_minus_fifty() {
        // The inner wheel reverses past -50%, reaching full reverse at -100%
        assert_eq!(steering_power_curve(-75.0), -50.0);
        assert_eq!(steering_power_curve(-100.0), -100.0);
        assert_eq!(WheelPowers::from_steering(-100.0, 50), WheelPowers::new(-50, 50));
        assert_eq!(WheelPowers::from_steering(100.0, 50), WheelPowers::new(50, -50));
    }

    #[test]
    fn test_truncates_towards_zero() {
        // 33 * 80 / 100 = 26.4, -33 * 80 / 100 = -26.4
        assert_eq!(WheelPowers::from_steering(10.0, 33), WheelPowers::new(33, 26));
        assert_eq!(WheelPowers::from_steering(10.0, -33), WheelPowers::new(-33, -26));
    }

    #[test]
    fn test_positive_steering_slows_right_wheel() {
        let wheels = WheelPowers::from_steering(10.0, 50);
        assert_eq!(wheels, WheelPowers::new(50, 40));
    }
}
