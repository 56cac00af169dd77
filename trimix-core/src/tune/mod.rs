//! In-Flight Tail Tuning
//!
//! ## Overview
//!
//! Two calibration procedures hang off a single transmitter switch:
//!
//! - Armed with the switch on, the [thrust torque](thrust_torque) procedure
//!   measures the tail servo angle that holds a steady hover and derives
//!   the rotor thrust factor from it.
//! - Disarmed with the switch on, the [servo setup](servo_setup) procedure
//!   lets the pilot jog the servo endpoints with the sticks and runs the
//!   feedback-ADC and servo-speed calibration sequence.
//!
//! The supervisor here owns the session lifecycle: which procedure runs,
//! when the session tears down, and the arming lockout while the servo is
//! being driven outside pilot control. The procedures themselves live in
//! the submodules and communicate with the pilot exclusively through
//! [`Alert`](crate::config::Alert) cues.

mod servo_setup;
mod thrust_torque;

use core::mem;

use crate::config::Platform;
use crate::mixer::{TailMixer, TickInputs};

pub(crate) use servo_setup::ServoSetupTune;
pub(crate) use thrust_torque::ThrustTorqueTune;

/// Which tuning procedure, if any, the mixer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneStatus {
    /// No session active.
    Inactive,
    /// Armed thrust-factor measurement in progress.
    ThrustTorque,
    /// Disarmed servo endpoint/feedback calibration in progress.
    ServoSetup,
}

/// Active tuning session state.
#[derive(Debug, Default)]
pub(crate) enum TuneSession {
    #[default]
    Inactive,
    ThrustTorque(ThrustTorqueTune),
    ServoSetup(ServoSetupTune),
}

impl TailMixer {
    /// Which tuning procedure is currently running.
    pub fn tune_status(&self) -> TuneStatus {
        match self.tune {
            TuneSession::Inactive => TuneStatus::Inactive,
            TuneSession::ThrustTorque(_) => TuneStatus::ThrustTorque,
            TuneSession::ServoSetup(_) => TuneStatus::ServoSetup,
        }
    }

    /// Session supervisor, run once per tick.
    ///
    /// Flipping the switch off tears the session down immediately, wherever
    /// it was; nothing is committed except at the procedures' own commit
    /// points, so a torn-down session leaves persisted state untouched.
    pub(crate) fn tune_step<P: Platform>(
        &mut self,
        inputs: &TickInputs,
        platform: &mut P,
        servo_command: &mut u16,
    ) {
        if !inputs.tune_switch {
            if !matches!(self.tune, TuneSession::Inactive) {
                self.prevent_arming = false;
                self.tune_active = false;
                self.tune = TuneSession::Inactive;
            }
            return;
        }

        self.tune_active = true;
        if matches!(self.tune, TuneSession::Inactive) {
            if inputs.armed {
                self.tune = TuneSession::ThrustTorque(ThrustTorqueTune::new());
            } else {
                // The servo is about to be driven by the procedure, not the
                // pilot; arming mid-calibration must be impossible.
                self.prevent_arming = true;
                self.tune = TuneSession::ServoSetup(ServoSetupTune::new(self.limits.mid));
            }
        }

        // The session borrows the mixer mutably while stepping, so it is
        // taken out of the struct for the duration.
        let mut session = mem::take(&mut self.tune);
        match &mut session {
            TuneSession::Inactive => {}
            TuneSession::ThrustTorque(tune) => tune.step(self, inputs, platform),
            TuneSession::ServoSetup(tune) => tune.step(self, inputs, platform, servo_command),
        }
        self.tune = session;
    }
}
