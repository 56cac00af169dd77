//! Tail Servo Geometry Derivation
//!
//! ## Physics Background
//!
//! The tail rotor of a tricopter produces two force components as the servo
//! tilts it: the disc thrust along the rotor axis and an in-plane
//! aerodynamic force. The ratio between them is the **thrust factor** `k`.
//! Two derived quantities fall out of it:
//!
//! - The **pitch-zero angle**, the servo angle at which the net pitching
//!   moment from the tail crosses zero:
//!
//!   ```text
//!   θ₀ = 2·atan((√(k² + 1) + 1) / k)
//!   ```
//!
//!   This is where the tail motor flips between having to accelerate and
//!   having to brake when the servo sweeps through it.
//!
//! - The **pitch correction** factor applied to the tail motor output so the
//!   vertical thrust component stays constant as the rotor tilts:
//!
//!   ```text
//!   c(θ) = 1 / (sin θ − cos θ / k)
//!   ```
//!
//! The motor lag times (spin-up ≈ 30 ms, spin-down ≈ 100 ms) are converted
//! into *angles* by multiplying with the servo speed: they bound how far
//! ahead of the measured servo position the motor correction may look.

use libm::{atanf, sqrtf};

use crate::config::{MixerSettings, ThrottleRange};
use crate::errors::{MixerError, MixerResult};
use crate::units::{Decidegrees, SERVO_ANGLE_MID};

/// Derived servo/motor geometry. Rebuilt only on init and calibration commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoGeometry {
    /// Thrust factor as a plain ratio (config tunable divided by 10).
    pub thrust_factor: f32,
    /// Configured servo travel from center, decidegrees.
    pub max_angle: Decidegrees,
    /// Open-loop servo speed, degrees per second.
    pub speed: f32,
    /// Servo angle of zero net pitching moment, decidegrees (float).
    pub pitch_zero_angle: f32,
    /// Motor spin-up lag expressed as servo travel, decidegrees.
    pub accel_delay_angle: f32,
    /// Motor spin-down lag expressed as servo travel, decidegrees.
    pub decel_delay_angle: f32,
}

impl ServoGeometry {
    /// Derive geometry from the configured tunables.
    ///
    /// Rejects degenerate configuration instead of producing a geometry the
    /// force curve cannot invert; callers keep their previous geometry on
    /// error.
    pub fn derive(settings: &MixerSettings, throttle: &ThrottleRange) -> MixerResult<Self> {
        if settings.thrust_factor <= 0.0 {
            return Err(MixerError::InvalidThrustFactor {
                value: settings.thrust_factor,
            });
        }
        let max_angle = Decidegrees(settings.max_angle_deg as i32 * 10);
        if max_angle.0 <= 0 {
            return Err(MixerError::InvalidAngleRange { value: max_angle.0 });
        }
        if settings.servo_speed <= 0.0 {
            return Err(MixerError::InvalidServoSpeed {
                value: settings.servo_speed,
            });
        }
        if settings.motor_acceleration_s <= 0.0 {
            return Err(MixerError::InvalidMotorAcceleration {
                value: settings.motor_acceleration_s,
            });
        }
        // The gain schedules divide by half the span; a span of one throttle
        // unit truncates that to zero.
        if throttle.span() < 2 {
            return Err(MixerError::ZeroThrottleRange);
        }

        let k = settings.thrust_factor / 10.0;
        // 2·atan((sqrt(k²+1)+1)/k) in radians, scaled to decidegrees
        let pitch_zero_angle =
            10.0 * 2.0 * atanf((sqrtf(k * k + 1.0) + 1.0) / k) / crate::units::DEG_TO_RAD;

        Ok(Self {
            thrust_factor: k,
            max_angle,
            speed: settings.servo_speed,
            pitch_zero_angle,
            accel_delay_angle: 10.0 * (settings.motor_accel_delay_ms / 1000.0)
                * settings.servo_speed,
            decel_delay_angle: 10.0 * (settings.motor_decel_delay_ms / 1000.0)
                * settings.servo_speed,
        })
    }

    /// Lower bound of configured travel.
    pub fn min_travel(&self) -> Decidegrees {
        SERVO_ANGLE_MID - self.max_angle
    }

    /// Upper bound of configured travel.
    pub fn max_travel(&self) -> Decidegrees {
        SERVO_ANGLE_MID + self.max_angle
    }
}

/// Pitch correction factor at a tail angle (radians) for thrust factor `k`.
///
/// Multiplying the motor output by this keeps vertical tail thrust constant
/// while the rotor tilts. Approaches 1.0 at 90° and grows as the rotor
/// tilts toward the pitch-zero angle.
pub fn pitch_correction(angle_rad: f32, thrust_factor: f32) -> f32 {
    1.0 / (libm::sinf(angle_rad) - libm::cosf(angle_rad) / thrust_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MixerSettings {
        MixerSettings {
            thrust_factor: 20.0,
            max_angle_deg: 20,
            servo_speed: 300.0,
            ..MixerSettings::default()
        }
    }

    #[test]
    fn rejects_non_positive_thrust_factor() {
        let mut bad = settings();
        bad.thrust_factor = 0.0;
        assert!(matches!(
            ServoGeometry::derive(&bad, &ThrottleRange::default()),
            Err(MixerError::InvalidThrustFactor { .. })
        ));
    }

    #[test]
    fn rejects_empty_throttle_range() {
        let range = ThrottleRange { min: 2000, max: 2000 };
        assert!(matches!(
            ServoGeometry::derive(&settings(), &range),
            Err(MixerError::ZeroThrottleRange)
        ));
    }

    #[test]
    fn rejects_single_step_throttle_range() {
        let range = ThrottleRange { min: 1000, max: 1001 };
        assert!(matches!(
            ServoGeometry::derive(&settings(), &range),
            Err(MixerError::ZeroThrottleRange)
        ));
    }

    #[test]
    fn rejects_non_positive_motor_acceleration() {
        let mut bad = settings();
        bad.motor_acceleration_s = 0.0;
        assert!(matches!(
            ServoGeometry::derive(&bad, &ThrottleRange::default()),
            Err(MixerError::InvalidMotorAcceleration { .. })
        ));
    }

    #[test]
    fn lag_angles_scale_with_speed() {
        let geometry = ServoGeometry::derive(&settings(), &ThrottleRange::default()).unwrap();
        // 30 ms at 300 deg/s = 9 degrees = 90 decidegrees
        assert!((geometry.accel_delay_angle - 90.0).abs() < 1e-3);
        assert!((geometry.decel_delay_angle - 300.0).abs() < 1e-3);
    }

    #[test]
    fn pitch_zero_angle_for_k2() {
        let geometry = ServoGeometry::derive(&settings(), &ThrottleRange::default()).unwrap();
        // 2*atan((sqrt(5)+1)/2) = 2*atan(1.618) = 116.57 degrees
        assert!((geometry.pitch_zero_angle - 1165.65).abs() < 1.0);
    }

    #[test]
    fn pitch_correction_is_unity_at_center() {
        let c = pitch_correction(SERVO_ANGLE_MID.as_radians(), 2.0);
        assert!((c - 1.0).abs() < 1e-5);
    }
}
