//! Fixed-Point Units for Servo and Force Quantities
//!
//! ## Overview
//!
//! The mixer works in integer fixed-point units inherited from the flight
//! controller it plugs into:
//!
//! - Servo angles are **decidegrees** (tenths of a degree). The mechanical
//!   center of the tail servo sits at 900 decidegrees (90°), so a tail that
//!   can travel ±40° spans 500..=1300.
//! - Yaw force is dimensionless, scaled by [`YAW_FORCE_SCALE`] (milli-units).
//!   A commanded yaw of 1000 maps to the full usable force envelope.
//! - Servo commands are raw pulse units (typically 900..=2100 µs).
//!
//! Keeping the scales in dedicated wrappers avoids the classic
//! degrees-vs-decidegrees confusion when porting between the float geometry
//! math and the integer lookup tables.

use core::ops::{Add, Neg, Sub};

/// Timestamp in milliseconds from a monotonic counter, sampled once per tick.
pub type Timestamp = u64;

/// Yaw force in milli-units of the dimensionless force curve output.
pub type YawForce = i32;

/// Scale factor of [`YawForce`]: the curve stores forces multiplied by 1000.
pub const YAW_FORCE_SCALE: i32 = 1000;

/// Degrees-to-radians conversion factor.
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;

/// Servo angle in tenths of a degree.
///
/// Stored as `i32` so intermediate interpolation math never overflows; the
/// physically meaningful range is 0..=1800 (0°..180°) with the servo center
/// at [`SERVO_ANGLE_MID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decidegrees(pub i32);

/// Mechanical center angle of the tail servo (90°).
pub const SERVO_ANGLE_MID: Decidegrees = Decidegrees(900);

impl Decidegrees {
    /// Wrap a raw decidegree value.
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Angle in whole degrees as float.
    pub fn as_degrees(self) -> f32 {
        self.0 as f32 / 10.0
    }

    /// Angle in radians.
    pub fn as_radians(self) -> f32 {
        self.as_degrees() * DEG_TO_RAD
    }

    /// Magnitude of the angle.
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Clamp into `[min, max]`.
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

impl Add for Decidegrees {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Decidegrees {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Decidegrees {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_ninety_degrees() {
        assert_eq!(SERVO_ANGLE_MID.as_degrees(), 90.0);
        assert!((SERVO_ANGLE_MID.as_radians() - core::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn arithmetic_and_clamp() {
        let a = Decidegrees(900) + Decidegrees(150);
        assert_eq!(a, Decidegrees(1050));
        assert_eq!(a - Decidegrees(1100), Decidegrees(-50));
        assert_eq!((-Decidegrees(30)).abs(), Decidegrees(30));
        assert_eq!(
            Decidegrees(2000).clamp(Decidegrees(400), Decidegrees(1400)),
            Decidegrees(1400)
        );
    }
}
