//! Servo Endpoint Setup and Feedback Calibration
//!
//! ## Procedure
//!
//! Runs disarmed with the tune switch on; the procedure owns the servo
//! output for the whole session and arming is locked out.
//!
//! Stick gestures select what to adjust:
//!
//! - roll left: jog the **min** endpoint with the yaw stick
//! - pitch up: jog the **mid** point
//! - roll right: jog the **max** endpoint
//! - pitch down: run the automatic calibration sequence
//!
//! The calibration sequence drives the servo to each endpoint in turn,
//! averages the feedback ADC once the servo has settled, and then measures
//! the actual servo speed by timing full sweeps between the endpoints.
//! ADC references land in the settings as each stop completes; the servo
//! speed commit at the end is what persists everything.

use crate::config::{Alert, Platform};
use crate::mixer::{TailMixer, TickInputs};
use crate::units::Timestamp;

/// Servo travel floor/ceiling while jogging, raw pulse units.
const JOG_VALUE_MIN: f32 = 900.0;
const JOG_VALUE_MAX: f32 = 2100.0;

/// Stick deflection that counts as a gesture.
const GESTURE_THRESHOLD: i16 = 100;

/// Settling time at an endpoint before ADC samples count, ms.
const ADC_SETTLE_MS: u64 = 500;
/// Endpoint dwell time; sampling happens in the last 100 ms of it.
const ADC_DWELL_MS: u64 = 600;

/// Plausible ADC spread between the min stop and center. Less than this and
/// the feedback signal is not actually wired to the servo.
const ADC_MIN_SPREAD: u32 = 100;

/// ADC margin for "the servo has reached the stop".
const ADC_ARRIVAL_MARGIN: i32 = 10;

/// Dwell at a stop between timed sweeps, ms.
const SWEEP_SETTLE_MS: u64 = 200;

/// Timed sweeps needed before the speed estimate is committed.
const SWEEP_TARGET: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitSel {
    Min,
    Mid,
    Max,
}

#[derive(Debug)]
enum CalibState {
    /// Holding the servo at each stop in turn, averaging the feedback ADC.
    MinMidMax {
        stop: LimitSel,
        entered_ms: Timestamp,
        sum: u32,
        count: u32,
    },
    /// Timing full sweeps between the stops to measure servo speed.
    Sweep {
        target: LimitSel,
        settling: bool,
        entered_ms: Timestamp,
        sum_ms: u32,
        count: u32,
    },
}

#[derive(Debug)]
enum SsState {
    Idle,
    Setup { target: LimitSel },
    Calib(CalibState),
}

/// Disarmed servo setup session. Owns the commanded servo value.
#[derive(Debug)]
pub(crate) struct ServoSetupTune {
    state: SsState,
    servo_value: f32,
}

impl ServoSetupTune {
    pub(crate) fn new(mid: u16) -> Self {
        Self {
            state: SsState::Idle,
            servo_value: mid as f32,
        }
    }

    pub(crate) fn step<P: Platform>(
        &mut self,
        mixer: &mut TailMixer,
        inputs: &TickInputs,
        platform: &mut P,
        servo_command: &mut u16,
    ) {
        self.check_gestures(mixer, inputs, platform);

        match &mut self.state {
            SsState::Idle => {}
            SsState::Setup { target } => {
                if !inputs.yaw_centered {
                    self.servo_value += mixer.limits.direction as f32
                        * -1.0
                        * inputs.yaw_stick as f32
                        * inputs.dt_s;
                    self.servo_value = self.servo_value.clamp(JOG_VALUE_MIN, JOG_VALUE_MAX);
                    let value = self.servo_value as u16;
                    match target {
                        LimitSel::Min => mixer.limits.min = value,
                        LimitSel::Mid => mixer.limits.mid = value,
                        LimitSel::Max => mixer.limits.max = value,
                    }
                }
            }
            SsState::Calib(_) => self.calib_step(mixer, inputs, platform),
        }

        // The session owns the servo for as long as it is active
        *servo_command = self.servo_value as u16;
    }

    fn check_gestures<P: Platform>(
        &mut self,
        mixer: &TailMixer,
        inputs: &TickInputs,
        platform: &mut P,
    ) {
        if inputs.pitch_centered && inputs.roll_command < -GESTURE_THRESHOLD {
            self.state = SsState::Setup {
                target: LimitSel::Min,
            };
            self.servo_value = mixer.limits.min as f32;
            platform.alert(Alert::Confirm(1));
        } else if inputs.roll_centered && inputs.pitch_command > GESTURE_THRESHOLD {
            self.state = SsState::Setup {
                target: LimitSel::Mid,
            };
            self.servo_value = mixer.limits.mid as f32;
            platform.alert(Alert::Confirm(2));
        } else if inputs.pitch_centered && inputs.roll_command > GESTURE_THRESHOLD {
            self.state = SsState::Setup {
                target: LimitSel::Max,
            };
            self.servo_value = mixer.limits.max as f32;
            platform.alert(Alert::Confirm(3));
        } else if inputs.roll_centered && inputs.pitch_command < -GESTURE_THRESHOLD {
            self.state = SsState::Calib(CalibState::MinMidMax {
                stop: LimitSel::Min,
                entered_ms: inputs.now_ms,
                sum: 0,
                count: 0,
            });
            self.servo_value = mixer.limits.min as f32;
        }
    }

    fn calib_step<P: Platform>(
        &mut self,
        mixer: &mut TailMixer,
        inputs: &TickInputs,
        platform: &mut P,
    ) {
        let now = inputs.now_ms;
        let SsState::Calib(calib) = &mut self.state else {
            return;
        };
        match calib {
            CalibState::MinMidMax {
                stop,
                entered_ms,
                sum,
                count,
            } => {
                let elapsed = now - *entered_ms;
                if elapsed >= ADC_DWELL_MS {
                    if *count == 0 {
                        // Control loop stalled through the sampling window
                        platform.alert(Alert::Failure);
                        self.abort(mixer);
                        return;
                    }
                    let average = (*sum / *count) as u16;
                    match stop {
                        LimitSel::Min => {
                            mixer.settings.servo_min_adc = average;
                            *stop = LimitSel::Mid;
                            *entered_ms = now;
                            *sum = 0;
                            *count = 0;
                            self.servo_value = mixer.limits.mid as f32;
                        }
                        LimitSel::Mid => {
                            mixer.settings.servo_mid_adc = average;
                            let spread = (mixer.settings.servo_min_adc as i32
                                - mixer.settings.servo_mid_adc as i32)
                                .unsigned_abs();
                            if spread < ADC_MIN_SPREAD {
                                // Feedback signal not wired; the endpoint
                                // adjustments are still worth keeping
                                platform.alert(Alert::Failure);
                                platform.save_config(&mixer.settings, &mixer.limits);
                                self.abort(mixer);
                                return;
                            }
                            *stop = LimitSel::Max;
                            *entered_ms = now;
                            *sum = 0;
                            *count = 0;
                            self.servo_value = mixer.limits.max as f32;
                        }
                        LimitSel::Max => {
                            mixer.settings.servo_max_adc = average;
                            *calib = CalibState::Sweep {
                                target: LimitSel::Min,
                                settling: true,
                                entered_ms: now,
                                sum_ms: 0,
                                count: 0,
                            };
                            self.servo_value = mixer.limits.min as f32;
                        }
                    }
                } else if elapsed >= ADC_SETTLE_MS {
                    *sum += mixer.feedback_filter.output() as u32;
                    *count += 1;
                }
            }
            CalibState::Sweep {
                target,
                settling,
                entered_ms,
                sum_ms,
                count,
            } => {
                let adc = mixer.feedback_filter.output() as i32;
                let arrived = match target {
                    LimitSel::Min => adc < mixer.settings.servo_min_adc as i32 + ADC_ARRIVAL_MARGIN,
                    LimitSel::Max => adc > mixer.settings.servo_max_adc as i32 - ADC_ARRIVAL_MARGIN,
                    LimitSel::Mid => false,
                };
                if !arrived {
                    return;
                }
                if !*settling {
                    *sum_ms += (now - *entered_ms) as u32;
                    *count += 1;
                    if *target == LimitSel::Min && *count >= SWEEP_TARGET {
                        let average_ms = *sum_ms as f32 / *count as f32;
                        let sweep_deg = 2.0 * mixer.geometry.max_angle.0 as f32 / 10.0;
                        let speed = sweep_deg / average_ms * 1000.0;
                        match mixer.commit_servo_speed(speed, platform) {
                            Ok(()) => platform.alert(Alert::Ready),
                            Err(_) => platform.alert(Alert::Failure),
                        }
                        self.state = SsState::Idle;
                        self.servo_value = mixer.limits.mid as f32;
                        return;
                    }
                    *settling = true;
                    *entered_ms = now;
                } else if now - *entered_ms >= SWEEP_SETTLE_MS {
                    // Settled on this stop; launch toward the opposite one
                    let next = match target {
                        LimitSel::Min => LimitSel::Max,
                        _ => LimitSel::Min,
                    };
                    self.servo_value = match next {
                        LimitSel::Min => mixer.limits.min as f32,
                        _ => mixer.limits.max as f32,
                    };
                    *target = next;
                    *settling = false;
                    *entered_ms = now;
                }
            }
        }
    }

    fn abort(&mut self, mixer: &TailMixer) {
        self.state = SsState::Idle;
        self.servo_value = mixer.limits.mid as f32;
    }
}
