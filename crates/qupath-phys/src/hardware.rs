//! Hardware calibration profiles.
//!
//! A [`HardwareProfile`] captures the four accuracies that the swap and
//! purify formulas depend on: one-qubit gates, two-qubit gates, Bell-state
//! measurement, and the success probability of a swap. The Werner formulas
//! only ever see two derived constants, `p` (the product of the gate
//! accuracies) and `eta` (the BSM accuracy).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PhysError, PhysResult};

/// Raw calibration record as it appears in configuration files.
///
/// Deserialization of [`HardwareProfile`] goes through this type so that
/// every loaded profile is range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareParams {
    /// One-qubit gate accuracy.
    pub accuracy_1q: f64,
    /// Two-qubit gate accuracy.
    pub accuracy_2q: f64,
    /// Bell-state measurement accuracy.
    pub accuracy_bsm: f64,
    /// Success probability of an entanglement swap.
    pub prob_swap: f64,
}

/// Immutable, validated hardware calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HardwareParams", into = "HardwareParams")]
pub struct HardwareProfile {
    accuracy_1q: f64,
    accuracy_2q: f64,
    accuracy_bsm: f64,
    prob_swap: f64,
}

impl HardwareProfile {
    /// Create a profile, checking that every value is a probability.
    pub fn new(
        accuracy_1q: f64,
        accuracy_2q: f64,
        accuracy_bsm: f64,
        prob_swap: f64,
    ) -> PhysResult<Self> {
        let named = [
            ("accuracy_1q", accuracy_1q),
            ("accuracy_2q", accuracy_2q),
            ("accuracy_bsm", accuracy_bsm),
            ("prob_swap", prob_swap),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(PhysError::InvalidParameter(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(Self {
            accuracy_1q,
            accuracy_2q,
            accuracy_bsm,
            prob_swap,
        })
    }

    /// Create a profile from a calibration tuple of exactly four values,
    /// ordered one-qubit, two-qubit, BSM, swap probability.
    pub fn from_slice(params: &[f64]) -> PhysResult<Self> {
        match *params {
            [a1, a2, bsm, ps] => Self::new(a1, a2, bsm, ps),
            _ => Err(PhysError::InvalidParameter(format!(
                "calibration tuple must have 4 entries, got {}",
                params.len()
            ))),
        }
    }

    /// Noiseless hardware with deterministic swaps.
    pub fn perfect() -> Self {
        HardwarePreset::Perfect.profile()
    }

    /// One-qubit gate accuracy.
    #[inline]
    pub fn accuracy_1q(&self) -> f64 {
        self.accuracy_1q
    }

    /// Two-qubit gate accuracy.
    #[inline]
    pub fn accuracy_2q(&self) -> f64 {
        self.accuracy_2q
    }

    /// Bell-state measurement accuracy.
    #[inline]
    pub fn accuracy_bsm(&self) -> f64 {
        self.accuracy_bsm
    }

    /// Success probability of a swap.
    #[inline]
    pub fn prob_swap(&self) -> f64 {
        self.prob_swap
    }

    /// Combined gate accuracy `p = accuracy_1q * accuracy_2q`.
    #[inline]
    pub fn p(&self) -> f64 {
        self.accuracy_1q * self.accuracy_2q
    }

    /// Measurement accuracy `eta = accuracy_bsm`.
    #[inline]
    pub fn eta(&self) -> f64 {
        self.accuracy_bsm
    }

    /// `false` only when all four values are exactly 1.
    pub fn is_noisy(&self) -> bool {
        !(self.accuracy_1q == 1.0
            && self.accuracy_2q == 1.0
            && self.accuracy_bsm == 1.0
            && self.prob_swap == 1.0)
    }

    /// The calibration as a plain record.
    pub fn params(&self) -> HardwareParams {
        HardwareParams {
            accuracy_1q: self.accuracy_1q,
            accuracy_2q: self.accuracy_2q,
            accuracy_bsm: self.accuracy_bsm,
            prob_swap: self.prob_swap,
        }
    }
}

impl TryFrom<HardwareParams> for HardwareProfile {
    type Error = PhysError;

    fn try_from(raw: HardwareParams) -> PhysResult<Self> {
        Self::new(
            raw.accuracy_1q,
            raw.accuracy_2q,
            raw.accuracy_bsm,
            raw.prob_swap,
        )
    }
}

impl From<HardwareProfile> for HardwareParams {
    fn from(profile: HardwareProfile) -> Self {
        profile.params()
    }
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "1q={} 2q={} bsm={} swap={}",
            self.accuracy_1q, self.accuracy_2q, self.accuracy_bsm, self.prob_swap
        )
    }
}

/// Named calibration points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwarePreset {
    /// All accuracies 1.
    Perfect,
    /// Noisy, high accuracy.
    High,
    /// Noisy, medium accuracy.
    Medium,
    /// Noisy, low accuracy.
    Low,
}

impl HardwarePreset {
    /// All presets, best hardware first.
    pub const ALL: [HardwarePreset; 4] = [
        HardwarePreset::Perfect,
        HardwarePreset::High,
        HardwarePreset::Medium,
        HardwarePreset::Low,
    ];

    /// The calibration values of this preset.
    pub fn profile(self) -> HardwareProfile {
        let (accuracy_1q, accuracy_2q, accuracy_bsm, prob_swap) = match self {
            HardwarePreset::Perfect => (1.0, 1.0, 1.0, 1.0),
            HardwarePreset::High => (0.999, 0.999, 0.999, 0.995),
            HardwarePreset::Medium => (0.995, 0.995, 0.995, 0.99),
            HardwarePreset::Low => (0.99, 0.99, 0.99, 0.975),
        };
        // Preset values are in range by construction.
        HardwareProfile {
            accuracy_1q,
            accuracy_2q,
            accuracy_bsm,
            prob_swap,
        }
    }

    /// Lowercase preset name.
    pub fn name(self) -> &'static str {
        match self {
            HardwarePreset::Perfect => "perfect",
            HardwarePreset::High => "high",
            HardwarePreset::Medium => "medium",
            HardwarePreset::Low => "low",
        }
    }
}

impl fmt::Display for HardwarePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HardwarePreset {
    type Err = PhysError;

    fn from_str(s: &str) -> PhysResult<Self> {
        match s.to_lowercase().as_str() {
            "perfect" | "p" => Ok(HardwarePreset::Perfect),
            "high" | "h" => Ok(HardwarePreset::High),
            "medium" | "m" => Ok(HardwarePreset::Medium),
            "low" | "l" => Ok(HardwarePreset::Low),
            other => Err(PhysError::InvalidParameter(format!(
                "unknown hardware preset '{other}'"
            ))),
        }
    }
}
