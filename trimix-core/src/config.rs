//! Mixer Configuration and External Collaborator Seams
//!
//! ## Overview
//!
//! Everything the mixer needs from its host flight controller is gathered
//! here: the persistable tunables ([`MixerSettings`]), the servo endpoint
//! calibration ([`ServoLimits`]), the motor output range, and the
//! [`Platform`] trait through which the core reaches back out for audible
//! alerts and configuration persistence.
//!
//! The core never holds pointers into host configuration. Calibration
//! mutates the mixer's own copies and hands them to
//! [`Platform::save_config`] at commit points; what the host does with them
//! (EEPROM layout, flash wear leveling) is its own business.
//!
//! ## Feedback source resolution
//!
//! The servo position feedback can be wired to whatever spare ADC input the
//! board exposes. Aliases for the usual suspects (RSSI, current sensor,
//! external pad) are resolved against the board's capability table once at
//! initialization; an alias the board does not expose silently falls back to
//! the default channel. A miswired selector must not brick the control loop.

// Macro for optional logging
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Progress and result cues emitted by the calibration state machines.
///
/// The host maps these onto whatever beeper patterns it has; the variants
/// mirror the distinct situations the tuning procedure signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// Short prompt: tuning is waiting on the pilot (repeated once a second).
    Prompt,
    /// Longer cue: the measurement phase has started.
    Begin,
    /// Calibration step or session finished successfully.
    Ready,
    /// Calibration failed; nothing further will be committed this session.
    Failure,
    /// `n` confirmation beeps acknowledging a stick gesture or sample batch.
    Confirm(u8),
}

/// Host-side collaborators the mixer calls out to.
///
/// Implementations are expected to be cheap and non-blocking; both methods
/// are invoked from inside the control tick.
pub trait Platform {
    /// Emit an audible cue.
    fn alert(&mut self, alert: Alert);

    /// Persist the current tunables and servo limits.
    ///
    /// Called only at calibration commit points, never in steady state.
    fn save_config(&mut self, settings: &MixerSettings, limits: &ServoLimits);
}

/// Tail servo endpoint calibration in raw pulse units, plus mechanical
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoLimits {
    /// Pulse value at full negative travel.
    pub min: u16,
    /// Pulse value at mechanical center.
    pub mid: u16,
    /// Pulse value at full positive travel.
    pub max: u16,
    /// Mechanical direction sign: +1 if increasing pulse moves the thrust
    /// vector toward positive yaw, -1 if the linkage is reversed.
    pub direction: i8,
}

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            min: 1020,
            mid: 1500,
            max: 1980,
            direction: 1,
        }
    }
}

/// Configured motor output range in raw throttle units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleRange {
    /// Minimum (idle) output.
    pub min: u16,
    /// Maximum output.
    pub max: u16,
}

impl ThrottleRange {
    /// Width of the range.
    pub fn span(&self) -> i32 {
        self.max as i32 - self.min as i32
    }
}

impl Default for ThrottleRange {
    fn default() -> Self {
        Self { min: 1000, max: 2000 }
    }
}

/// Where the servo position feedback signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedbackSource {
    /// No sensor fitted: simulate the servo open-loop from its rated speed.
    #[default]
    Virtual,
    /// Dedicated feedback ADC input.
    Dedicated,
    /// Repurposed RSSI input, if the board exposes one.
    Rssi,
    /// Repurposed current-sensor input, if the board exposes one.
    Current,
    /// External ADC pad, if the board exposes one.
    External,
}

/// Index of an ADC input on the host board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannel(pub u8);

/// ADC inputs the board actually exposes.
///
/// `None` for an alias means the alias cannot be honored on this hardware.
#[derive(Debug, Clone, Copy)]
pub struct AdcChannels {
    /// The default feedback input, always present.
    pub default: AdcChannel,
    /// RSSI input, if wired out.
    pub rssi: Option<AdcChannel>,
    /// Current-sensor input, if wired out.
    pub current: Option<AdcChannel>,
    /// External pad, if wired out.
    pub external: Option<AdcChannel>,
}

impl AdcChannels {
    /// Resolve a configured feedback source to a concrete channel.
    ///
    /// Unresolvable aliases fall back to the default channel; selecting a
    /// missing input is a wiring mistake, not a fatal error.
    pub fn resolve(&self, source: FeedbackSource) -> AdcChannel {
        let resolved = match source {
            FeedbackSource::Virtual | FeedbackSource::Dedicated => Some(self.default),
            FeedbackSource::Rssi => self.rssi,
            FeedbackSource::Current => self.current,
            FeedbackSource::External => self.external,
        };
        match resolved {
            Some(channel) => channel,
            None => {
                log_warn!(
                    "feedback source {:?} not available, using default channel",
                    source
                );
                self.default
            }
        }
    }
}

impl Default for AdcChannels {
    fn default() -> Self {
        Self {
            default: AdcChannel(0),
            rssi: None,
            current: None,
            external: None,
        }
    }
}

/// Persistable mixer tunables.
///
/// The thrust factor and servo speed are what the tail-tune calibration
/// procedures estimate; the rest is pilot configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixerSettings {
    /// Tail rotor thrust factor, stored as the ratio multiplied by 10.
    pub thrust_factor: f32,
    /// Configured servo travel from center, in whole degrees.
    pub max_angle_deg: u16,
    /// Open-loop servo angular speed in degrees per second.
    pub servo_speed: f32,
    /// Time for the motor to sweep the full throttle range, in seconds.
    pub motor_acceleration_s: f32,
    /// Motor spin-up lag in milliseconds.
    pub motor_accel_delay_ms: f32,
    /// Motor spin-down lag in milliseconds.
    pub motor_decel_delay_ms: f32,
    /// Yaw gain percentage applied below the throttle midpoint (100 = off).
    pub dynamic_yaw_min_throttle: u16,
    /// Yaw gain percentage applied above the throttle midpoint (100 = off).
    pub dynamic_yaw_max_throttle: u16,
    /// Calibrated ADC reading at the servo minimum stop.
    pub servo_min_adc: u16,
    /// Calibrated ADC reading at the servo center.
    pub servo_mid_adc: u16,
    /// Calibrated ADC reading at the servo maximum stop.
    pub servo_max_adc: u16,
    /// Servo position feedback source.
    pub feedback_source: FeedbackSource,
    /// Allow servo motion while disarmed even outside tail-tune.
    pub unarmed_servo: bool,
    /// Gain for the deceleration gyro-error feed-forward, in tenths.
    pub motor_acc_yaw_gain: f32,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            thrust_factor: 138.0,
            max_angle_deg: 40,
            servo_speed: 300.0,
            motor_acceleration_s: 0.18,
            motor_accel_delay_ms: 30.0,
            motor_decel_delay_ms: 100.0,
            dynamic_yaw_min_throttle: 100,
            dynamic_yaw_max_throttle: 100,
            servo_min_adc: 0,
            servo_mid_adc: 0,
            servo_max_adc: 0,
            feedback_source: FeedbackSource::Virtual,
            unarmed_servo: false,
            motor_acc_yaw_gain: 10.0,
        }
    }
}
