//! First-Order Low-Pass (PT1) Filter
//!
//! Used in two places with very different cutoffs:
//!
//! - 70 Hz on the raw servo-feedback ADC samples, to strip electrical noise
//!   without adding meaningful lag to the position estimate.
//! - 5 Hz on the virtual tail motor output, to emulate spin-up inertia (a
//!   5 Hz cutoff corresponds to roughly 14 ms of equivalent delay).
//!
//! The gain is recomputed from the cutoff on every call so a variable tick
//! duration is handled for free:
//!
//! ```text
//! rc = 1 / (2π·f_cut)
//! k  = dt / (rc + dt)
//! y += k · (x − y)
//! ```

/// PT1 low-pass filter state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pt1Filter {
    state: f32,
}

impl Pt1Filter {
    /// New filter with zero initial state.
    pub const fn new() -> Self {
        Self { state: 0.0 }
    }

    /// Apply one sample with the given cutoff frequency and tick duration.
    pub fn apply(&mut self, input: f32, cutoff_hz: f32, dt_s: f32) -> f32 {
        let rc = 1.0 / (2.0 * core::f32::consts::PI * cutoff_hz);
        let k = dt_s / (rc + dt_s);
        self.state += k * (input - self.state);
        self.state
    }

    /// Current filter output.
    pub fn output(&self) -> f32 {
        self.state
    }
}
