//! Pre-Computed Yaw Force Curve and Servo Value Maps
//!
//! ## Motivation
//!
//! The yaw force produced by the tilting tail rotor is a non-linear function
//! of servo angle: thrust and in-plane force trade off as the rotor tilts,
//! and the pitch correction applied to the motor feeds back into the net
//! torque. Solving the inverse (force → angle) analytically on every tick is
//! wasteful, so the forward function is sampled once into a table and
//! inverted by binary search plus linear interpolation.
//!
//! ## Table Design
//!
//! 100 samples in fixed 10-decidegree steps spanning the full ±50°
//! mechanical envelope around the 90° center, regardless of the configured
//! travel. The wider span is deliberate: angle queries can land outside
//! configured travel (phase-shifted future angles, feedback glitches) and
//! must interpolate instead of extrapolating.
//!
//! `max_yaw_force` is accumulated only over the *configured* travel, as the
//! minimum of the absolute extremes. That makes the usable force envelope
//! symmetric, so the linear command-to-force mapping never saturates on one
//! side before the other.
//!
//! Forces are stored as `i32` milli-units ([`YAW_FORCE_SCALE`]); the table
//! is monotonically non-decreasing over the physically valid range, which
//! the inverse lookup relies on.

use libm::{cosf, sinf};

use crate::config::ServoLimits;
use crate::geometry::{pitch_correction, ServoGeometry};
use crate::units::{Decidegrees, YawForce, SERVO_ANGLE_MID, YAW_FORCE_SCALE};

/// Number of samples in the force curve.
pub const CURVE_SIZE: usize = 100;

/// Half-span of the sampled mechanical envelope, decidegrees (±50°).
pub const CURVE_HALF_SPAN: i32 = 500;

/// Angle step between consecutive samples, decidegrees.
pub const CURVE_STEP: i32 = 10;

/// Sampled servo-angle → yaw-force lookup.
///
/// Regenerated in full whenever geometry changes; never patched in place.
#[derive(Debug, Clone)]
pub struct YawForceCurve {
    samples: [YawForce; CURVE_SIZE],
    max_yaw_force: YawForce,
}

impl YawForceCurve {
    /// Sample the force function for the given geometry.
    pub fn build(geometry: &ServoGeometry) -> Self {
        let min_travel = geometry.min_travel().0;
        let max_travel = geometry.max_travel().0;
        let k = geometry.thrust_factor;

        let mut samples = [0; CURVE_SIZE];
        let mut max_neg: YawForce = 0;
        let mut max_pos: YawForce = 0;

        let mut angle = SERVO_ANGLE_MID.0 - CURVE_HALF_SPAN;
        for sample in samples.iter_mut() {
            let angle_rad = Decidegrees(angle).as_radians();
            let force = YAW_FORCE_SCALE as f32
                * (-k * cosf(angle_rad) - sinf(angle_rad))
                * pitch_correction(angle_rad, k);
            *sample = force as YawForce;
            // Only the configured travel contributes to the usable envelope
            if angle >= min_travel && angle <= max_travel {
                max_neg = max_neg.min(*sample);
                max_pos = max_pos.max(*sample);
            }
            angle += CURVE_STEP;
        }

        Self {
            samples,
            max_yaw_force: max_neg.abs().min(max_pos.abs()),
        }
    }

    /// Symmetric usable force bound over configured travel.
    pub fn max_yaw_force(&self) -> YawForce {
        self.max_yaw_force
    }

    /// Invert the curve: find the servo angle producing `force`.
    ///
    /// Saturates to the envelope edges outside the sampled range; otherwise
    /// binary-searches the bracketing pair and interpolates with truncating
    /// integer division (the numerator is non-negative, so truncation equals
    /// floor and results are bit-reproducible).
    pub fn force_to_angle(&self, force: YawForce) -> Decidegrees {
        if force < self.samples[0] {
            // No force that low
            return Decidegrees(SERVO_ANGLE_MID.0 - CURVE_HALF_SPAN);
        }
        if force >= self.samples[CURVE_SIZE - 1] {
            // No force that high
            return Decidegrees(SERVO_ANGLE_MID.0 + CURVE_HALF_SPAN);
        }
        // Invariant: samples[lower] <= force < samples[higher]
        let mut lower = 0usize;
        let mut higher = CURVE_SIZE - 1;
        while higher > lower + 1 {
            let mid = (lower + higher) / 2;
            if self.samples[mid] > force {
                higher = mid;
            } else {
                lower = mid;
            }
        }
        let base = SERVO_ANGLE_MID.0 - CURVE_HALF_SPAN + lower as i32 * CURVE_STEP;
        let span = self.samples[higher] - self.samples[lower];
        Decidegrees(base + (force - self.samples[lower]) * CURVE_STEP / span)
    }

    /// Force at a table sample index. Test hook for round-trip checks.
    #[cfg(test)]
    pub(crate) fn sample(&self, index: usize) -> YawForce {
        self.samples[index]
    }
}

/// Map a servo angle to a raw servo command value.
///
/// Piecewise-linear over the {min, mid, max} endpoints; which half-segment
/// applies depends on the side of center *and* the mechanical direction
/// sign, so a reversed linkage mirrors cleanly.
pub fn angle_to_servo_value(
    limits: &ServoLimits,
    geometry: &ServoGeometry,
    angle: Decidegrees,
) -> u16 {
    let mid = limits.mid as i32;
    if angle == SERVO_ANGLE_MID {
        return limits.mid;
    }
    let angle_range = geometry.max_angle.0;
    let (angle_diff, min_side) = if angle < SERVO_ANGLE_MID {
        (SERVO_ANGLE_MID.0 - angle.0, limits.direction > 0)
    } else {
        (angle.0 - SERVO_ANGLE_MID.0, limits.direction <= 0)
    };
    let value = if min_side {
        mid - angle_diff * (mid - limits.min as i32) / angle_range
    } else {
        mid + angle_diff * (limits.max as i32 - mid) / angle_range
    };
    value as u16
}

/// Inverse of [`angle_to_servo_value`]: estimate the angle a raw servo
/// command corresponds to. The side is chosen by comparing the value to
/// `mid`; a zero-width segment yields the center angle rather than dividing
/// by zero.
pub fn servo_value_to_angle(
    limits: &ServoLimits,
    geometry: &ServoGeometry,
    value: u16,
) -> Decidegrees {
    let mid = limits.mid as i32;
    let (end_value, end_angle) = if (value as i32) < mid {
        (limits.min as i32, SERVO_ANGLE_MID.0 - geometry.max_angle.0)
    } else {
        (limits.max as i32, SERVO_ANGLE_MID.0 + geometry.max_angle.0)
    };
    if end_value == mid {
        return SERVO_ANGLE_MID;
    }
    Decidegrees(
        (end_angle - SERVO_ANGLE_MID.0) * (value as i32 - mid) / (end_value - mid)
            + SERVO_ANGLE_MID.0,
    )
}
