//! Tricopter Tail Servo Yaw Mixer
//!
//! ## Overview
//!
//! A tricopter steers in yaw by tilting its tail rotor with a servo. Unlike
//! a quad there is no opposing rotor pair to play torques against: the
//! produced yaw force is a non-linear function of tail angle, the tail
//! motor must be throttled up as the rotor tilts to keep vertical thrust
//! constant, and the servo's finite speed and the motor's spin-up lag both
//! sit inside the control loop. This crate packages all of that into a
//! self-contained, `no_std`-friendly core a flight controller can drive
//! with one call per loop iteration.
//!
//! ## Capabilities
//!
//! - Linearized yaw response through a pre-computed force curve, so the yaw
//!   controller sees constant authority across the servo travel
//! - Servo angle estimation, either open-loop from the rated servo speed or
//!   closed-loop from a feedback potentiometer on a spare ADC input
//! - Tail motor thrust correction with a bounded look-ahead over motor
//!   spin-up/spin-down lag
//! - Feed-forward of the yaw disturbance caused by tail motor deceleration
//! - Stick-driven tail tuning: in-flight thrust factor measurement and
//!   on-bench servo endpoint, feedback and speed calibration
//!
//! ## Usage
//!
//! ```rust
//! use trimix_core::{
//!     Alert, AdcChannels, MixerSettings, Platform, ServoLimits, TailMixer,
//!     ThrottleRange, TickInputs,
//! };
//!
//! struct Board;
//!
//! impl Platform for Board {
//!     fn alert(&mut self, _alert: Alert) { /* drive the beeper */ }
//!     fn save_config(&mut self, _settings: &MixerSettings, _limits: &ServoLimits) {
//!         /* persist to EEPROM */
//!     }
//! }
//!
//! let mut mixer = TailMixer::new(
//!     MixerSettings::default(),
//!     ServoLimits::default(),
//!     ThrottleRange::default(),
//!     &AdcChannels::default(),
//! )?;
//!
//! let mut board = Board;
//! let outputs = mixer.tick(
//!     &TickInputs {
//!         yaw_command: 250,
//!         dt_s: 0.001,
//!         armed: true,
//!         ..TickInputs::default()
//!     },
//!     &mut board,
//! );
//! assert!(outputs.servo_command > 1500);
//! # Ok::<(), trimix_core::MixerError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): standard library, `serde` and `log` support
//! - `embedded`: `defmt` formatting for deeply embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod curve;
pub mod errors;
pub mod estimator;
pub mod filter;
pub mod geometry;
pub mod mixer;
pub mod motor;
mod tune;
pub mod units;

pub use config::{
    AdcChannel, AdcChannels, Alert, FeedbackSource, MixerSettings, Platform, ServoLimits,
    ThrottleRange,
};
pub use errors::{MixerError, MixerResult};
pub use mixer::{TailMixer, TickInputs, TickOutputs, TAIL_MOTOR_INDEX};
pub use tune::TuneStatus;
pub use units::{Decidegrees, Timestamp, YawForce, SERVO_ANGLE_MID, YAW_FORCE_SCALE};
