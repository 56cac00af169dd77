//! Error Types for Mixer Configuration Failures
//!
//! ## Design Philosophy
//!
//! The control-loop hot path never returns errors: every numeric path clamps
//! instead of failing, and calibration problems are terminal states of the
//! tuning session rather than `Err` values. What is left for this enum are
//! the configuration errors that can only surface at initialization or when
//! a calibration commit tries to install degenerate geometry.
//!
//! Errors are small and `Copy` so a rejected commit can report the offending
//! value without allocating; on rejection the previous valid geometry stays
//! in place.

use thiserror_no_std::Error;

/// Result type for mixer initialization and geometry commits.
pub type MixerResult<T> = Result<T, MixerError>;

/// Configuration errors - detected at init/commit time, never mid-tick.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MixerError {
    /// Thrust factor must be positive for the force curve to be invertible.
    #[error("thrust factor {value} is not positive")]
    InvalidThrustFactor {
        /// The rejected raw tunable (ratio multiplied by 10).
        value: f32,
    },

    /// Configured servo travel must be a positive angle range.
    #[error("max servo angle {value} decidegrees is not positive")]
    InvalidAngleRange {
        /// The rejected travel in decidegrees from center.
        value: i32,
    },

    /// Servo speed must be positive for the virtual estimator and lag angles.
    #[error("servo speed {value} deg/s is not positive")]
    InvalidServoSpeed {
        /// The rejected speed in degrees per second.
        value: f32,
    },

    /// Motor acceleration time must be positive for the virtual motor model.
    #[error("motor acceleration time {value} s is not positive")]
    InvalidMotorAcceleration {
        /// The rejected full-range acceleration time in seconds.
        value: f32,
    },

    /// Motor output range must be wide enough to scale acceleration and the
    /// half-range gain schedules against.
    #[error("motor throttle range is too narrow")]
    ZeroThrottleRange,
}

#[cfg(feature = "defmt")]
impl defmt::Format for MixerError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidThrustFactor { value } => {
                defmt::write!(fmt, "thrust factor {} not positive", value)
            }
            Self::InvalidAngleRange { value } => {
                defmt::write!(fmt, "max angle {} ddeg not positive", value)
            }
            Self::InvalidServoSpeed { value } => {
                defmt::write!(fmt, "servo speed {} deg/s not positive", value)
            }
            Self::InvalidMotorAcceleration { value } => {
                defmt::write!(fmt, "motor acceleration {} s not positive", value)
            }
            Self::ZeroThrottleRange => defmt::write!(fmt, "throttle range too narrow"),
        }
    }
}
