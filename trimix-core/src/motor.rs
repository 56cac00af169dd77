//! Virtual Tail Motor Model
//!
//! The motor correction needs to know where the tail motor *actually* is,
//! not where it was just commanded to be: an ESC takes tens of milliseconds
//! to spin the rotor up or down. With no RPM telemetry available the model
//! is built from two pieces:
//!
//! 1. A slew-rate limit derived from the configured full-range acceleration
//!    time, applied to the commanded throttle.
//! 2. A 5 Hz PT1 filter on the slewed value, emulating rotor inertia.
//!
//! The filtered output doubles as the input to the deceleration gyro-error
//! feed-forward: a dropping tail motor momentarily starves the tail of
//! thrust, and the resulting yaw twitch can be predicted and handed to the
//! gyro error path before the gyro even sees it.

use crate::config::{MixerSettings, ThrottleRange};
use crate::filter::Pt1Filter;

/// Cutoff for the rotor-inertia filter, Hz.
const MOTOR_FILTER_CUTOFF_HZ: f32 = 5.0;

/// Slew-rate limited, low-pass filtered tail motor simulation.
#[derive(Debug, Clone)]
pub struct VirtualMotor {
    current: f32,
    filter: Pt1Filter,
    virtual_feedback: f32,
    previous_speed: f32,
    /// Throttle units per second.
    acceleration: f32,
}

impl VirtualMotor {
    /// Build the model from the configured full-range acceleration time.
    pub fn new(settings: &MixerSettings, throttle: &ThrottleRange) -> Self {
        Self {
            current: 1000.0,
            filter: Pt1Filter::new(),
            virtual_feedback: 1000.0,
            previous_speed: 1000.0,
            acceleration: throttle.span() as f32 / settings.motor_acceleration_s,
        }
    }

    /// Advance the model one tick toward the commanded throttle.
    pub fn step(&mut self, setpoint: f32, dt_s: f32) {
        let max_delta = dt_s * self.acceleration;
        let diff = setpoint - self.current;
        if diff.abs() < max_delta {
            self.current = setpoint;
        } else if diff > 0.0 {
            self.current += max_delta;
        } else {
            self.current -= max_delta;
        }
        self.virtual_feedback = self
            .filter
            .apply(self.current, MOTOR_FILTER_CUTOFF_HZ, dt_s);
    }

    /// Modeled motor output in throttle units.
    pub fn feedback(&self) -> f32 {
        self.virtual_feedback
    }

    /// Feed-forward gyro error expected from motor deceleration.
    ///
    /// Returns the predicted yaw-rate disturbance while the modeled motor is
    /// slowing down, `None` while it holds or accelerates. Must be called
    /// exactly once per tick: it also advances the speed-delta tracking.
    pub fn predict_gyro_error(&mut self, gain_tenths: f32) -> Option<f32> {
        let acceleration = self.virtual_feedback - self.previous_speed;
        self.previous_speed = self.virtual_feedback;
        if acceleration < 0.0 {
            Some(acceleration * gain_tenths / 10.0)
        } else {
            None
        }
    }
}
