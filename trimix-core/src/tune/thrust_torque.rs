//! Thrust Factor Measurement
//!
//! ## Procedure
//!
//! In a steady hover the tail servo settles at exactly the angle where the
//! tilted rotor's side force cancels its reaction torque. That angle is a
//! direct measurement of the thrust factor:
//!
//! ```text
//! k = cos(θ − 90°) / sin(θ − 90°)
//! ```
//!
//! The pilot arms, raises the throttle and flips the tune switch. After a
//! five second countdown (prompted once a second) the craft must hover
//! hands-off: whenever the sticks are centered and the yaw rate is quiet
//! for a quarter second, the servo angle estimate is sampled every 20 ms.
//! Once 500 samples accumulate the pilot may land; the average is checked
//! for plausibility and committed on disarm.
//!
//! ## Adapting to a noisy gyro
//!
//! A craft that cannot hold the yaw rate inside the initial ±3.5 °/s window
//! would never sample. Instead of giving up immediately, the window widens
//! by 0.1 °/s for every second spent stick-centered without sampling; past
//! ±8 °/s the measurement is declared failed.

use libm::{cosf, fabsf, sinf};

use crate::config::{Alert, Platform};
use crate::mixer::{TailMixer, TickInputs};
use crate::units::{Timestamp, DEG_TO_RAD};

const PROMPT_PERIOD_MS: u64 = 1000;
const COUNTDOWN_MS: u64 = 5000;
const STABILITY_WINDOW_MS: u64 = 250;
const SAMPLE_INTERVAL_MS: u64 = 20;
const SAMPLE_TARGET: u32 = 500;
const RELAX_INTERVAL_MS: u64 = 1000;
const ALERT_PERIOD_MS: u64 = 2000;

const GYRO_LIMIT_INITIAL_DPS: f32 = 3.5;
const GYRO_LIMIT_STEP_DPS: f32 = 0.1;
const GYRO_LIMIT_MAX_DPS: f32 = 8.0;

/// Plausible hover-angle window, degrees. Outside it the measurement was
/// junk (wrong direction, servo not moving, craft not actually hovering).
const ANGLE_MIN_DEG: f32 = 90.5;
const ANGLE_MAX_DEG: f32 = 120.0;

#[derive(Debug)]
enum TtState {
    Idle,
    Wait {
        entered_ms: Timestamp,
        prompt_delay_ms: u64,
    },
    Active {
        sticks_ok_ms: Timestamp,
        gyro_ok_ms: Timestamp,
        last_sample_ms: Timestamp,
        sum: u32,
        count: u32,
        gyro_limit: f32,
    },
    WaitForDisarm {
        sum: u32,
        count: u32,
        alert_ms: Timestamp,
    },
    Done {
        alert_ms: Timestamp,
    },
    Fail {
        alert_ms: Timestamp,
    },
}

/// Armed thrust-factor measurement session.
#[derive(Debug)]
pub(crate) struct ThrustTorqueTune {
    state: TtState,
}

impl ThrustTorqueTune {
    pub(crate) fn new() -> Self {
        Self {
            state: TtState::Idle,
        }
    }

    pub(crate) fn step<P: Platform>(
        &mut self,
        mixer: &mut TailMixer,
        inputs: &TickInputs,
        platform: &mut P,
    ) {
        let now = inputs.now_ms;
        match &mut self.state {
            TtState::Idle => {
                if inputs.throttle_high && inputs.armed {
                    platform.alert(Alert::Prompt);
                    self.state = TtState::Wait {
                        entered_ms: now,
                        prompt_delay_ms: PROMPT_PERIOD_MS,
                    };
                }
            }
            TtState::Wait {
                entered_ms,
                prompt_delay_ms,
            } => {
                if !(inputs.throttle_high && inputs.armed) {
                    self.state = TtState::Idle;
                } else if now - *entered_ms >= COUNTDOWN_MS {
                    platform.alert(Alert::Begin);
                    self.state = TtState::Active {
                        sticks_ok_ms: now,
                        gyro_ok_ms: now,
                        last_sample_ms: now,
                        sum: 0,
                        count: 0,
                        gyro_limit: GYRO_LIMIT_INITIAL_DPS,
                    };
                } else if now - *entered_ms >= *prompt_delay_ms {
                    platform.alert(Alert::Prompt);
                    *prompt_delay_ms += PROMPT_PERIOD_MS;
                }
            }
            TtState::Active {
                sticks_ok_ms,
                gyro_ok_ms,
                last_sample_ms,
                sum,
                count,
                gyro_limit,
            } => {
                let sticks_ok = inputs.throttle_high
                    && inputs.roll_centered
                    && inputs.pitch_centered
                    && inputs.yaw_centered;
                if !sticks_ok {
                    *sticks_ok_ms = now;
                }
                if fabsf(inputs.gyro_yaw_dps) > *gyro_limit {
                    *gyro_ok_ms = now;
                }

                if now - *sticks_ok_ms >= STABILITY_WINDOW_MS
                    && now - *gyro_ok_ms >= STABILITY_WINDOW_MS
                {
                    if now - *last_sample_ms >= SAMPLE_INTERVAL_MS {
                        *sum += mixer.servo_angle.0 as u32;
                        *count += 1;
                        *last_sample_ms = now;
                        if *count & 0x1f == 0 {
                            platform.alert(Alert::Confirm(1));
                        }
                        if *count >= SAMPLE_TARGET {
                            platform.alert(Alert::Ready);
                            self.state = TtState::WaitForDisarm {
                                sum: *sum,
                                count: *count,
                                alert_ms: now,
                            };
                        }
                    }
                } else if now - *sticks_ok_ms >= STABILITY_WINDOW_MS
                    && now - *last_sample_ms >= RELAX_INTERVAL_MS
                {
                    *gyro_limit += GYRO_LIMIT_STEP_DPS;
                    *last_sample_ms = now;
                    if *gyro_limit > GYRO_LIMIT_MAX_DPS {
                        platform.alert(Alert::Failure);
                        self.state = TtState::Fail { alert_ms: now };
                    }
                }
            }
            TtState::WaitForDisarm {
                sum,
                count,
                alert_ms,
            } => {
                if !inputs.armed {
                    let average_deg = *sum as f32 / 10.0 / *count as f32;
                    self.state = if average_deg > ANGLE_MIN_DEG && average_deg < ANGLE_MAX_DEG {
                        let angle_rad = (average_deg - 90.0) * DEG_TO_RAD;
                        let thrust_factor = 10.0 * cosf(angle_rad) / sinf(angle_rad);
                        match mixer.commit_thrust_factor(thrust_factor, platform) {
                            Ok(()) => {
                                platform.alert(Alert::Ready);
                                TtState::Done { alert_ms: now }
                            }
                            Err(_) => {
                                platform.alert(Alert::Failure);
                                TtState::Fail { alert_ms: now }
                            }
                        }
                    } else {
                        platform.alert(Alert::Failure);
                        TtState::Fail { alert_ms: now }
                    };
                } else if now - *alert_ms >= ALERT_PERIOD_MS {
                    platform.alert(Alert::Ready);
                    *alert_ms = now;
                }
            }
            TtState::Done { alert_ms } => {
                if now - *alert_ms >= ALERT_PERIOD_MS {
                    platform.alert(Alert::Ready);
                    *alert_ms = now;
                }
            }
            TtState::Fail { alert_ms } => {
                if now - *alert_ms >= ALERT_PERIOD_MS {
                    platform.alert(Alert::Failure);
                    *alert_ms = now;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdcChannels, MixerSettings, ServoLimits, ThrottleRange};

    struct Recorder {
        alerts: Vec<Alert>,
        saves: u32,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                alerts: Vec::new(),
                saves: 0,
            }
        }
    }

    impl Platform for Recorder {
        fn alert(&mut self, alert: Alert) {
            self.alerts.push(alert);
        }
        fn save_config(&mut self, _settings: &MixerSettings, _limits: &ServoLimits) {
            self.saves += 1;
        }
    }

    fn mixer() -> TailMixer {
        TailMixer::new(
            MixerSettings::default(),
            ServoLimits::default(),
            ThrottleRange::default(),
            &AdcChannels::default(),
        )
        .unwrap()
    }

    fn hover_inputs(now_ms: u64) -> TickInputs {
        TickInputs {
            armed: true,
            tune_switch: true,
            throttle_high: true,
            now_ms,
            dt_s: 0.02,
            ..TickInputs::default()
        }
    }

    #[test]
    fn countdown_prompts_then_begins() {
        let mut mixer = mixer();
        let mut tune = ThrustTorqueTune::new();
        let mut platform = Recorder::new();

        tune.step(&mut mixer, &hover_inputs(0), &mut platform);
        assert_eq!(platform.alerts, [Alert::Prompt]);

        for now in (100..=4900).step_by(100) {
            tune.step(&mut mixer, &hover_inputs(now), &mut platform);
        }
        // One prompt per second of countdown
        assert_eq!(
            platform.alerts,
            [Alert::Prompt; 5],
            "prompts during countdown"
        );

        tune.step(&mut mixer, &hover_inputs(5000), &mut platform);
        assert_eq!(platform.alerts.last(), Some(&Alert::Begin));
        assert!(matches!(tune.state, TtState::Active { .. }));
    }

    #[test]
    fn lowering_throttle_aborts_countdown() {
        let mut mixer = mixer();
        let mut tune = ThrustTorqueTune::new();
        let mut platform = Recorder::new();

        tune.step(&mut mixer, &hover_inputs(0), &mut platform);
        let mut low = hover_inputs(1000);
        low.throttle_high = false;
        tune.step(&mut mixer, &low, &mut platform);
        assert!(matches!(tune.state, TtState::Idle));
    }

    #[test]
    fn noisy_gyro_relaxes_limit_then_fails() {
        let mut mixer = mixer();
        let mut tune = ThrustTorqueTune::new();
        let mut platform = Recorder::new();

        tune.step(&mut mixer, &hover_inputs(0), &mut platform);
        tune.step(&mut mixer, &hover_inputs(5000), &mut platform);
        assert!(matches!(tune.state, TtState::Active { .. }));

        // Yaw rate permanently outside any acceptable window
        let mut now = 5000;
        for _ in 0..60 {
            now += 1000;
            let mut inputs = hover_inputs(now);
            inputs.gyro_yaw_dps = 50.0;
            tune.step(&mut mixer, &inputs, &mut platform);
        }
        assert!(matches!(tune.state, TtState::Fail { .. }));
        assert_eq!(platform.alerts.last(), Some(&Alert::Failure));
        assert_eq!(platform.saves, 0);
    }

    #[test]
    fn relax_waits_for_sustained_centered_sticks() {
        let mut mixer = mixer();
        let mut tune = ThrustTorqueTune::new();
        let mut platform = Recorder::new();

        tune.step(&mut mixer, &hover_inputs(0), &mut platform);
        tune.step(&mut mixer, &hover_inputs(5000), &mut platform);

        // Noisy gyro *and* a pilot constantly on the roll stick: the window
        // must not widen, so the session never reaches the failure limit
        let mut now = 5000;
        for _ in 0..60 {
            now += 1000;
            let mut inputs = hover_inputs(now);
            inputs.gyro_yaw_dps = 50.0;
            inputs.roll_centered = false;
            tune.step(&mut mixer, &inputs, &mut platform);
        }
        assert!(matches!(tune.state, TtState::Active { .. }));
        assert!(!platform.alerts.contains(&Alert::Failure));
    }

    #[test]
    fn implausible_average_fails_without_commit() {
        let mut mixer = mixer();
        let mut tune = ThrustTorqueTune::new();
        let mut platform = Recorder::new();
        let before = mixer.settings.thrust_factor;

        // Samples at the untouched center angle average 90.0 degrees,
        // below the plausibility window
        tune.state = TtState::WaitForDisarm {
            sum: 900 * SAMPLE_TARGET,
            count: SAMPLE_TARGET,
            alert_ms: 0,
        };
        let mut inputs = hover_inputs(20_000);
        inputs.armed = false;
        tune.step(&mut mixer, &inputs, &mut platform);

        assert!(matches!(tune.state, TtState::Fail { .. }));
        assert_eq!(mixer.settings.thrust_factor, before);
        assert_eq!(platform.saves, 0);
    }
}
