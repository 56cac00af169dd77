//! Servo Angle Estimation
//!
//! Two mutually exclusive strategies, chosen once at initialization from the
//! configured feedback source:
//!
//! - **Virtual**: no position sensor fitted. The estimate chases the
//!   commanded setpoint open-loop, limited to the servo's rated angular
//!   speed per tick and snapping onto the setpoint once within one step.
//! - **Feedback**: a potentiometer tap on the servo wired to an ADC input.
//!   The filtered sample is mapped through the calibrated {min, mid, max}
//!   reference points with the same piecewise-linear shape as the command
//!   side, so both paths report angles in the same frame.

use crate::config::{FeedbackSource, MixerSettings};
use crate::units::{Decidegrees, SERVO_ANGLE_MID};

/// Which estimation strategy is in effect. Resolved once at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleEstimator {
    /// Open-loop slew-rate simulation.
    Virtual,
    /// Calibrated ADC feedback.
    Feedback,
}

impl AngleEstimator {
    /// Pick the strategy for a configured feedback source.
    pub fn for_source(source: FeedbackSource) -> Self {
        match source {
            FeedbackSource::Virtual => Self::Virtual,
            _ => Self::Feedback,
        }
    }
}

/// One open-loop step: slew `current` toward `setpoint` at the configured
/// speed, snapping exactly onto the setpoint when within one step.
pub fn virtual_step(
    current: Decidegrees,
    setpoint: Decidegrees,
    speed_deg_s: f32,
    dt_s: f32,
) -> Decidegrees {
    // Max change of the angle since last check, decidegrees
    let max_delta = (dt_s * speed_deg_s * 10.0) as i32;
    let diff = setpoint.0 - current.0;
    if diff.abs() < max_delta {
        setpoint
    } else if diff > 0 {
        Decidegrees(current.0 + max_delta)
    } else {
        Decidegrees(current.0 - max_delta)
    }
}

/// Map a filtered ADC feedback sample to a servo angle using the calibrated
/// reference points. A degenerate calibration (`end == mid`) reports the
/// center angle instead of dividing by zero.
pub fn feedback_step(settings: &MixerSettings, max_angle: Decidegrees, adc: f32) -> Decidegrees {
    let feedback = adc as i32;
    let mid = settings.servo_mid_adc as i32;
    let (end_value, end_angle) = if feedback < mid {
        (settings.servo_min_adc as i32, SERVO_ANGLE_MID.0 - max_angle.0)
    } else {
        (settings.servo_max_adc as i32, SERVO_ANGLE_MID.0 + max_angle.0)
    };
    if end_value == mid {
        return SERVO_ANGLE_MID;
    }
    Decidegrees(
        (end_angle - SERVO_ANGLE_MID.0) * (feedback - mid) / (end_value - mid) + SERVO_ANGLE_MID.0,
    )
}
