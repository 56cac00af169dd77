//! Tail Servo Yaw Mixer
//!
//! ## Overview
//!
//! [`TailMixer`] owns everything derived at runtime from the configured
//! tunables: the servo geometry, the yaw force curve, the servo angle
//! estimate, the virtual tail motor model, and the in-flight tuning
//! session. The host flight controller drives it with one [`tick`] per
//! control loop iteration and reads the servo command and the expected
//! gyro disturbance back out of [`TickOutputs`].
//!
//! ## Tick pipeline
//!
//! Each tick runs a fixed pipeline:
//!
//! 1. Clamp the yaw command to ±1000 and scale it by the modeled tail
//!    motor output (more thrust means more yaw authority per degree).
//! 2. Low-pass the servo feedback ADC sample, when a sensor is fitted.
//! 3. Translate the command to a servo pulse: through the force curve when
//!    armed, or as a plain proportional angle when disarmed.
//! 4. Let an active tuning session override the pulse.
//! 5. Advance the servo angle estimate and the virtual motor model.
//!
//! Separately from the tick, [`TailMixer::motor_correction`] answers the
//! motor mixer's question "how much extra throttle does the tail motor need
//! right now", compensating thrust lost to rotor tilt with a bounded look
//! ahead for motor spin-up and spin-down lag.
//!
//! [`tick`]: TailMixer::tick

use crate::config::{
    AdcChannel, AdcChannels, MixerSettings, Platform, ServoLimits, ThrottleRange,
};
use crate::curve::{angle_to_servo_value, servo_value_to_angle, YawForceCurve};
use crate::errors::MixerResult;
use crate::estimator::{feedback_step, virtual_step, AngleEstimator};
use crate::filter::Pt1Filter;
use crate::geometry::{pitch_correction, ServoGeometry};
use crate::motor::VirtualMotor;
use crate::tune::TuneSession;
use crate::units::{Decidegrees, Timestamp, DEG_TO_RAD, SERVO_ANGLE_MID};

/// Index of the tail motor in the host's motor output array.
pub const TAIL_MOTOR_INDEX: usize = 0;

/// Cutoff for the servo feedback ADC filter, Hz.
const ADC_FILTER_CUTOFF_HZ: f32 = 70.0;

/// Everything the mixer samples from the host on one control loop tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInputs {
    /// Yaw controller output, nominally within ±1000.
    pub yaw_command: i16,
    /// Tick duration in seconds.
    pub dt_s: f32,
    /// Monotonic time in milliseconds.
    pub now_ms: Timestamp,
    /// Whether the craft is armed.
    pub armed: bool,
    /// Whether the tail-tune mode switch is on.
    pub tune_switch: bool,
    /// Whether the throttle stick is in its high position.
    pub throttle_high: bool,
    /// Raw roll stick command, centered at zero.
    pub roll_command: i16,
    /// Raw pitch stick command, centered at zero.
    pub pitch_command: i16,
    /// Raw yaw stick command, centered at zero.
    pub yaw_stick: i16,
    /// Whether the roll stick is inside its deadband.
    pub roll_centered: bool,
    /// Whether the pitch stick is inside its deadband.
    pub pitch_centered: bool,
    /// Whether the yaw stick is inside its deadband.
    pub yaw_centered: bool,
    /// Measured yaw rate in degrees per second.
    pub gyro_yaw_dps: f32,
    /// Throttle currently commanded to the tail motor, raw units.
    pub tail_motor_throttle: f32,
    /// Raw servo feedback ADC sample.
    pub adc_sample: u16,
}

impl Default for TickInputs {
    fn default() -> Self {
        Self {
            yaw_command: 0,
            dt_s: 0.0,
            now_ms: 0,
            armed: false,
            tune_switch: false,
            throttle_high: false,
            roll_command: 0,
            pitch_command: 0,
            yaw_stick: 0,
            roll_centered: true,
            pitch_centered: true,
            yaw_centered: true,
            gyro_yaw_dps: 0.0,
            tail_motor_throttle: 1000.0,
            adc_sample: 0,
        }
    }
}

/// What the host applies after one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutputs {
    /// Servo pulse to write to the tail servo output.
    pub servo_command: u16,
    /// Predicted yaw disturbance from tail motor deceleration, if any.
    /// Feed-forward for the gyro error path.
    pub expected_gyro_error: Option<f32>,
}

/// Tricopter tail servo mixer state.
pub struct TailMixer {
    pub(crate) settings: MixerSettings,
    pub(crate) limits: ServoLimits,
    pub(crate) throttle_range: ThrottleRange,
    pub(crate) geometry: ServoGeometry,
    pub(crate) curve: YawForceCurve,
    estimator: AngleEstimator,
    pub(crate) servo_angle: Decidegrees,
    pub(crate) feedback_filter: Pt1Filter,
    pub(crate) motor: VirtualMotor,
    pub(crate) tune: TuneSession,
    pub(crate) last_servo_command: u16,
    adc_channel: AdcChannel,
    pub(crate) tune_active: bool,
    pub(crate) prevent_arming: bool,
}

impl TailMixer {
    /// Build the mixer from configuration.
    ///
    /// Fails on degenerate tunables; the host should refuse to arm and
    /// surface the error rather than fly without yaw authority.
    pub fn new(
        settings: MixerSettings,
        limits: ServoLimits,
        throttle_range: ThrottleRange,
        channels: &AdcChannels,
    ) -> MixerResult<Self> {
        let geometry = ServoGeometry::derive(&settings, &throttle_range)?;
        let curve = YawForceCurve::build(&geometry);
        let motor = VirtualMotor::new(&settings, &throttle_range);
        Ok(Self {
            estimator: AngleEstimator::for_source(settings.feedback_source),
            adc_channel: channels.resolve(settings.feedback_source),
            last_servo_command: limits.mid,
            settings,
            limits,
            throttle_range,
            geometry,
            curve,
            servo_angle: SERVO_ANGLE_MID,
            feedback_filter: Pt1Filter::new(),
            motor,
            tune: TuneSession::default(),
            tune_active: false,
            prevent_arming: false,
        })
    }

    /// Run one control loop iteration.
    pub fn tick<P: Platform>(&mut self, inputs: &TickInputs, platform: &mut P) -> TickOutputs {
        let command = (inputs.yaw_command as i32).clamp(-1000, 1000);
        let command = self.scale_by_throttle(command, self.motor.feedback());

        if self.estimator == AngleEstimator::Feedback {
            self.feedback_filter
                .apply(inputs.adc_sample as f32, ADC_FILTER_CUTOFF_HZ, inputs.dt_s);
        }

        let mut servo_command = if inputs.armed {
            self.linear_servo_value(command)
        } else {
            self.normal_servo_value(command)
        };

        self.tune_step(inputs, platform, &mut servo_command);
        self.last_servo_command = servo_command;

        self.update_servo_angle(inputs.dt_s);
        self.motor.step(inputs.tail_motor_throttle, inputs.dt_s);
        let expected_gyro_error = self
            .motor
            .predict_gyro_error(self.settings.motor_acc_yaw_gain);

        TickOutputs {
            servo_command,
            expected_gyro_error,
        }
    }

    /// Extra throttle the given motor needs to keep vertical thrust constant
    /// while the tail rotor is tilted. Zero for all motors but the tail.
    pub fn motor_correction(&self, motor_index: usize) -> i16 {
        if motor_index != TAIL_MOTOR_INDEX {
            return 0;
        }
        let angle = self.servo_angle.0 as f32;
        let setpoint =
            servo_value_to_angle(&self.limits, &self.geometry, self.last_servo_command).0 as f32;

        // Bounded look-ahead: assume the motor lag hides the servo's travel
        // over the next spin-up (or spin-down, past the pitch-zero angle)
        // interval, but never read further than the servo can move.
        let max_shift = self.max_phase_shift(angle, setpoint);
        let diff = (setpoint - angle).clamp(-max_shift, max_shift);
        let future_angle = (angle + diff).clamp(
            self.geometry.min_travel().0 as f32,
            self.geometry.max_travel().0 as f32,
        );
        let future_rad = future_angle / 10.0 * DEG_TO_RAD;

        // Scale by how much output the motor actually has to modulate with.
        // The lower clamp keeps the correction meaningful near idle.
        let min_output = self.throttle_range.span() as f32 * 2.0 / 3.0;
        let output = (self.motor.feedback() - self.throttle_range.min as f32)
            .clamp(min_output, 1000.0);

        (output * pitch_correction(future_rad, self.geometry.thrust_factor) - output) as i16
    }

    /// Current servo angle estimate.
    pub fn current_servo_angle(&self) -> Decidegrees {
        self.servo_angle
    }

    /// Whether the servo should move while disarmed.
    pub fn is_servo_unarmed_enabled(&self) -> bool {
        self.settings.unarmed_servo || self.tune_active
    }

    /// Whether a tail-tune session is active.
    pub fn is_tune_active(&self) -> bool {
        self.tune_active
    }

    /// Whether arming must be blocked (servo setup in progress).
    pub fn is_arming_prevented(&self) -> bool {
        self.prevent_arming
    }

    /// The ADC channel resolved for servo feedback.
    pub fn adc_channel(&self) -> AdcChannel {
        self.adc_channel
    }

    /// Current tunables (updated in place by calibration).
    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    /// Current servo limits (updated in place by servo setup).
    pub fn limits(&self) -> &ServoLimits {
        &self.limits
    }

    /// Scale the yaw command by the modeled tail motor output.
    ///
    /// Above the throttle midpoint the tail produces more force per degree
    /// of tilt; below it, less. The configured gains express how much to
    /// counter-scale at the range extremes, and 100 means no scaling. The
    /// two half-range schedules meet at the midpoint, so the mapping is
    /// continuous.
    fn scale_by_throttle(&self, command: i32, motor_feedback: f32) -> i32 {
        let half_range = self.throttle_range.span() / 2;
        let midpoint = self.throttle_range.min as i32 + half_range;
        let gain = if (motor_feedback as i32) < midpoint {
            self.settings.dynamic_yaw_min_throttle as i32 - 100
        } else {
            100 - self.settings.dynamic_yaw_max_throttle as i32
        };
        let distance = motor_feedback as i32 - midpoint;
        let scaled = command - distance * gain * command / (half_range * 100);
        scaled.clamp(-1000, 1000)
    }

    /// Armed mapping: command → force → angle → pulse, so yaw response is
    /// linear in produced force rather than in servo angle.
    fn linear_servo_value(&self, command: i32) -> u16 {
        let force = self.curve.max_yaw_force() * command / 1000;
        let angle = self.curve.force_to_angle(force);
        angle_to_servo_value(&self.limits, &self.geometry, angle)
    }

    /// Disarmed mapping: command proportional to angle, for servo checks.
    fn normal_servo_value(&self, command: i32) -> u16 {
        let angle = Decidegrees(SERVO_ANGLE_MID.0 + command * self.geometry.max_angle.0 / 1000);
        angle_to_servo_value(&self.limits, &self.geometry, angle)
    }

    fn update_servo_angle(&mut self, dt_s: f32) {
        match self.estimator {
            AngleEstimator::Virtual => {
                let setpoint =
                    servo_value_to_angle(&self.limits, &self.geometry, self.last_servo_command);
                self.servo_angle =
                    virtual_step(self.servo_angle, setpoint, self.geometry.speed, dt_s);
            }
            AngleEstimator::Feedback => {
                self.servo_angle = feedback_step(
                    &self.settings,
                    self.geometry.max_angle,
                    self.feedback_filter.output(),
                );
            }
        }
    }

    fn max_phase_shift(&self, angle: f32, setpoint: f32) -> f32 {
        let pitch_zero = self.geometry.pitch_zero_angle;
        let braking = (angle > setpoint && angle >= pitch_zero + self.geometry.accel_delay_angle)
            || (angle < setpoint && angle <= pitch_zero - self.geometry.accel_delay_angle);
        if braking {
            // Spin-down is slower than spin-up, but the window closes at the
            // pitch-zero crossing where the needed correction flips.
            (angle - pitch_zero).abs().min(self.geometry.decel_delay_angle)
        } else {
            self.geometry.accel_delay_angle
        }
    }

    /// Re-derive geometry and force curve after a tunable change.
    ///
    /// Both are rebuilt before either is swapped in, so an error leaves the
    /// previous state fully intact.
    pub(crate) fn rebuild_geometry(&mut self) -> MixerResult<()> {
        let geometry = ServoGeometry::derive(&self.settings, &self.throttle_range)?;
        let curve = YawForceCurve::build(&geometry);
        self.geometry = geometry;
        self.curve = curve;
        Ok(())
    }

    /// Commit a calibrated thrust factor (ratio × 10) and persist.
    pub(crate) fn commit_thrust_factor<P: Platform>(
        &mut self,
        value: f32,
        platform: &mut P,
    ) -> MixerResult<()> {
        let previous = self.settings.thrust_factor;
        self.settings.thrust_factor = value;
        if let Err(err) = self.rebuild_geometry() {
            self.settings.thrust_factor = previous;
            return Err(err);
        }
        platform.save_config(&self.settings, &self.limits);
        Ok(())
    }

    /// Commit a calibrated servo speed (degrees per second) and persist.
    pub(crate) fn commit_servo_speed<P: Platform>(
        &mut self,
        value: f32,
        platform: &mut P,
    ) -> MixerResult<()> {
        let previous = self.settings.servo_speed;
        self.settings.servo_speed = value;
        if let Err(err) = self.rebuild_geometry() {
            self.settings.servo_speed = previous;
            return Err(err);
        }
        platform.save_config(&self.settings, &self.limits);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Alert, FeedbackSource};
    use crate::errors::MixerError;

    struct NullPlatform;

    impl Platform for NullPlatform {
        fn alert(&mut self, _alert: Alert) {}
        fn save_config(&mut self, _settings: &MixerSettings, _limits: &ServoLimits) {}
    }

    fn mixer_with(settings: MixerSettings) -> TailMixer {
        TailMixer::new(
            settings,
            ServoLimits::default(),
            ThrottleRange::default(),
            &AdcChannels::default(),
        )
        .unwrap()
    }

    fn mixer() -> TailMixer {
        mixer_with(MixerSettings::default())
    }

    #[test]
    fn rejects_degenerate_config() {
        let settings = MixerSettings {
            max_angle_deg: 0,
            ..MixerSettings::default()
        };
        assert!(TailMixer::new(
            settings,
            ServoLimits::default(),
            ThrottleRange::default(),
            &AdcChannels::default(),
        )
        .is_err());
    }

    #[test]
    fn narrow_throttle_range_rejected_before_first_tick() {
        // A one-unit span would truncate the half-range gain divisor to zero
        let result = TailMixer::new(
            MixerSettings::default(),
            ServoLimits::default(),
            ThrottleRange { min: 1000, max: 1001 },
            &AdcChannels::default(),
        );
        assert!(matches!(result, Err(MixerError::ZeroThrottleRange)));
    }

    #[test]
    fn neutral_gains_leave_command_unscaled() {
        let mixer = mixer();
        for feedback in [1000.0f32, 1500.0, 2000.0] {
            assert_eq!(mixer.scale_by_throttle(700, feedback), 700);
            assert_eq!(mixer.scale_by_throttle(-700, feedback), -700);
        }
    }

    #[test]
    fn throttle_scaling_is_continuous_at_midpoint() {
        let mixer = mixer_with(MixerSettings {
            dynamic_yaw_min_throttle: 150,
            dynamic_yaw_max_throttle: 50,
            ..MixerSettings::default()
        });
        let below = mixer.scale_by_throttle(500, 1499.0);
        let at = mixer.scale_by_throttle(500, 1500.0);
        let above = mixer.scale_by_throttle(500, 1501.0);
        assert!((below - at).abs() <= 3, "below {below} at {at}");
        assert!((above - at).abs() <= 3, "above {above} at {at}");
    }

    #[test]
    fn throttle_scaling_clamps() {
        let mixer = mixer_with(MixerSettings {
            dynamic_yaw_min_throttle: 400,
            ..MixerSettings::default()
        });
        assert_eq!(mixer.scale_by_throttle(1000, 1000.0), 1000);
        assert_eq!(mixer.scale_by_throttle(-1000, 1000.0), -1000);
    }

    #[test]
    fn armed_tick_composes_curve_and_servo_map() {
        let inputs = TickInputs {
            yaw_command: 500,
            dt_s: 0.001,
            armed: true,
            ..TickInputs::default()
        };
        let outputs = mixer().tick(&inputs, &mut NullPlatform);

        let geometry =
            ServoGeometry::derive(&MixerSettings::default(), &ThrottleRange::default()).unwrap();
        let curve = YawForceCurve::build(&geometry);
        let force = curve.max_yaw_force() * 500 / 1000;
        let expected =
            angle_to_servo_value(&ServoLimits::default(), &geometry, curve.force_to_angle(force));
        assert_eq!(outputs.servo_command, expected);

        // Pure function of state and input: an identical mixer produces the
        // identical command, including at an unusual configuration
        let settings = MixerSettings {
            thrust_factor: 20.0,
            max_angle_deg: 20,
            ..MixerSettings::default()
        };
        let first = mixer_with(settings).tick(&inputs, &mut NullPlatform);
        let second = mixer_with(settings).tick(&inputs, &mut NullPlatform);
        assert_eq!(first.servo_command, second.servo_command);
    }

    #[test]
    fn disarmed_tick_is_proportional_angle() {
        let mut mixer = mixer();
        let inputs = TickInputs {
            yaw_command: 1000,
            dt_s: 0.001,
            ..TickInputs::default()
        };
        let outputs = mixer.tick(&inputs, &mut NullPlatform);
        // Full command reaches full configured travel
        let expected = angle_to_servo_value(
            &ServoLimits::default(),
            &mixer.geometry,
            Decidegrees(900 + 400),
        );
        assert_eq!(outputs.servo_command, expected);
    }

    #[test]
    fn command_clamped_before_mapping() {
        let mut mixer = mixer();
        let extreme = mixer.tick(
            &TickInputs {
                yaw_command: i16::MAX,
                dt_s: 0.001,
                armed: true,
                ..TickInputs::default()
            },
            &mut NullPlatform,
        );
        let mut mixer = self::mixer();
        let full = mixer.tick(
            &TickInputs {
                yaw_command: 1000,
                dt_s: 0.001,
                armed: true,
                ..TickInputs::default()
            },
            &mut NullPlatform,
        );
        assert_eq!(extreme.servo_command, full.servo_command);
    }

    #[test]
    fn servo_angle_tracks_command_at_rated_speed() {
        let mut mixer = mixer();
        let inputs = TickInputs {
            yaw_command: 1000,
            dt_s: 0.01,
            ..TickInputs::default()
        };
        mixer.tick(&inputs, &mut NullPlatform);
        // One 10 ms step at 300 deg/s moves at most 30 decidegrees
        assert!((mixer.current_servo_angle().0 - 900).abs() <= 30);
        for _ in 0..200 {
            mixer.tick(&inputs, &mut NullPlatform);
        }
        assert_eq!(mixer.current_servo_angle(), Decidegrees(1300));
    }

    #[test]
    fn feedback_mode_tracks_adc() {
        let mut mixer = mixer_with(MixerSettings {
            feedback_source: FeedbackSource::Dedicated,
            servo_min_adc: 1000,
            servo_mid_adc: 2000,
            servo_max_adc: 3000,
            ..MixerSettings::default()
        });
        let inputs = TickInputs {
            dt_s: 0.01,
            adc_sample: 2500,
            ..TickInputs::default()
        };
        for _ in 0..500 {
            mixer.tick(&inputs, &mut NullPlatform);
        }
        // Filter converges to the sample; truncation may land one count low
        let angle = mixer.current_servo_angle().0;
        assert!((1099..=1100).contains(&angle), "angle {angle}");
    }

    #[test]
    fn motor_correction_only_for_tail() {
        let mixer = mixer();
        assert_eq!(mixer.motor_correction(1), 0);
        assert_eq!(mixer.motor_correction(2), 0);
    }

    #[test]
    fn motor_correction_is_zero_at_center() {
        let mixer = mixer();
        // Servo at center, commanded to center: correction factor is 1.0
        assert_eq!(mixer.motor_correction(TAIL_MOTOR_INDEX), 0);
    }

    #[test]
    fn motor_correction_positive_when_tilted() {
        let mut mixer = mixer();
        let inputs = TickInputs {
            yaw_command: 1000,
            dt_s: 0.01,
            armed: true,
            ..TickInputs::default()
        };
        for _ in 0..100 {
            mixer.tick(&inputs, &mut NullPlatform);
        }
        // Tilted away from center the rotor loses vertical thrust, so the
        // tail motor needs extra output
        assert!(mixer.motor_correction(TAIL_MOTOR_INDEX) > 0);
    }

    #[test]
    fn failed_commit_restores_tunable() {
        let mut mixer = mixer();
        let before = mixer.settings().thrust_factor;
        assert!(mixer
            .commit_thrust_factor(-1.0, &mut NullPlatform)
            .is_err());
        assert_eq!(mixer.settings().thrust_factor, before);
    }

    #[test]
    fn unarmed_servo_follows_setting_and_tune() {
        let mut mixer = mixer();
        assert!(!mixer.is_servo_unarmed_enabled());
        mixer.tune_active = true;
        assert!(mixer.is_servo_unarmed_enabled());
    }
}
