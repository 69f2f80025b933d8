//! Operation vocabulary shared by the gate model and the scheme tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

use crate::error::{PhysError, PhysResult};

/// Entanglement fidelity, a value in `(0, 1]`.
pub type Fidelity = f64;
/// Success probability of an operation.
pub type Prob = f64;
/// Integer count of elementary attempts.
pub type Cost = u32;
/// Expected number of elementary attempts.
pub type ExpCost = f64;
/// Result of a forward operation: `(fidelity, success probability)`.
pub type OpResult = (Fidelity, Prob);

/// Noise model used to represent an entangled pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntType {
    /// Dephased (Bell-diagonal rank-2) states. Noiseless hardware only.
    Dephased,
    /// Werner states.
    Werner,
}

impl fmt::Display for EntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntType::Dephased => write!(f, "dephased"),
            EntType::Werner => write!(f, "werner"),
        }
    }
}

impl FromStr for EntType {
    type Err = PhysError;

    fn from_str(s: &str) -> PhysResult<Self> {
        match s.to_lowercase().as_str() {
            "dephased" => Ok(EntType::Dephased),
            "werner" => Ok(EntType::Werner),
            other => Err(PhysError::UnsupportedOperation(format!(
                "entanglement representation '{other}' (expected dephased or werner)"
            ))),
        }
    }
}

/// A two-input entanglement operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Join two adjacent links into one spanning link.
    Swap,
    /// Consume two pairs on the same link to distil one better pair.
    Purify,
}

impl OpKind {
    /// Single-letter tag used when printing trees.
    pub fn tag(self) -> char {
        match self {
            OpKind::Swap => 'S',
            OpKind::Purify => 'P',
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Swap => write!(f, "swap"),
            OpKind::Purify => write!(f, "purify"),
        }
    }
}

impl FromStr for OpKind {
    type Err = PhysError;

    fn from_str(s: &str) -> PhysResult<Self> {
        match s.to_lowercase().as_str() {
            "swap" => Ok(OpKind::Swap),
            "purify" => Ok(OpKind::Purify),
            other => Err(PhysError::UnsupportedOperation(format!(
                "operation '{other}' (expected swap or purify)"
            ))),
        }
    }
}

/// Which operand a partial derivative is taken with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// First operand (`partial = 1`).
    Left,
    /// Second operand (`partial = 2`).
    Right,
}

impl Side {
    /// Numeric selector, 1 or 2.
    pub fn partial(self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = PhysError;

    fn try_from(partial: u8) -> PhysResult<Self> {
        match partial {
            1 => Ok(Side::Left),
            2 => Ok(Side::Right),
            other => Err(PhysError::InvalidArgument(format!(
                "partial must be 1 or 2, got {other}"
            ))),
        }
    }
}

/// Sensitivity triple carried through the scheme tree.
///
/// `fidelity` is ∂fidelity/∂input, `cost_count` is ∂cost/∂count and
/// `cost_fidelity` is ∂cost/∂input-fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grad {
    /// Fidelity sensitivity.
    pub fidelity: f64,
    /// Cost sensitivity to the input's attempt count.
    pub cost_count: f64,
    /// Cost sensitivity to the input's fidelity.
    pub cost_fidelity: f64,
}

impl Grad {
    /// The identity triple `(1, 1, 1)`.
    pub const IDENTITY: Grad = Grad::new(1.0, 1.0, 1.0);

    /// Create a gradient triple.
    pub const fn new(fidelity: f64, cost_count: f64, cost_fidelity: f64) -> Self {
        Self {
            fidelity,
            cost_count,
            cost_fidelity,
        }
    }
}

impl Default for Grad {
    fn default() -> Self {
        Grad::IDENTITY
    }
}

/// Elementwise product, used for the chain rule.
impl Mul for Grad {
    type Output = Grad;

    fn mul(self, rhs: Grad) -> Grad {
        Grad::new(
            self.fidelity * rhs.fidelity,
            self.cost_count * rhs.cost_count,
            self.cost_fidelity * rhs.cost_fidelity,
        )
    }
}
