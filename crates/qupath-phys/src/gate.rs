//! Closed-form swap and purify operations.
//!
//! A [`Gate`] pairs an entanglement representation with a hardware profile
//! and exposes the forward operations, their analytic gradients, and the
//! sequential and balanced combinators built on top of them.
//!
//! # Formulas
//!
//! Dephased swap: `f = f1·f2 + (1−f1)(1−f2)`, probability `prob_swap`.
//!
//! Werner swap: `f = 1/4 + (1/36)·p·(4η²−1)·(4f1−1)·(4f2−1)`, probability
//! `prob_swap`.
//!
//! Dephased purify: `prob = f1·f2 + (1−f1)(1−f2)`, `f = f1·f2 / prob`.
//!
//! Werner purify, with `e_i = (1−f_i)/3`, `η_m = η² + (1−η)²`,
//! `x = 2η(1−η)` and `p_m = (1−p²)/p²`:
//!
//! ```text
//! N = η_m(f1 f2 + e1 e2) + x(f1 e2 + f2 e1) + p_m/8
//! D = η_m(f1 f2 + f1 e2 + f2 e1 + 5 e1 e2) + x(2 f1 e2 + 2 f2 e1 + 4 e1 e2) + p_m/2
//! f = N / D,  prob = D·p²
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PhysError, PhysResult};
use crate::hardware::{HardwarePreset, HardwareProfile};
use crate::op::{EntType, Fidelity, Grad, OpKind, OpResult, Prob, Side};

/// Raw gate record as it appears in configuration files.
///
/// Deserialization of [`Gate`] goes through [`Gate::new`] so that the
/// representation and hardware rules hold for every loaded gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateParams {
    /// Entanglement representation.
    pub ent_type: EntType,
    /// Hardware calibration.
    pub hw: HardwareProfile,
}

/// Physical operation model for one representation on one hardware profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GateParams", into = "GateParams")]
pub struct Gate {
    ent_type: EntType,
    hw: HardwareProfile,
}

impl Gate {
    /// Create a gate.
    ///
    /// The dephased representation is only defined for noiseless hardware,
    /// and the Werner purification formula needs a non-zero gate accuracy.
    pub fn new(ent_type: EntType, hw: HardwareProfile) -> PhysResult<Self> {
        match ent_type {
            EntType::Dephased if hw.is_noisy() => Err(PhysError::InvalidConfiguration(format!(
                "noisy hardware ({hw}) is not supported with dephased states"
            ))),
            EntType::Werner if hw.p() == 0.0 => Err(PhysError::InvalidConfiguration(
                "werner states require non-zero gate accuracy".to_string(),
            )),
            _ => Ok(Self { ent_type, hw }),
        }
    }

    /// Dephased states on perfect hardware.
    pub fn dephased_perfect() -> Self {
        Self {
            ent_type: EntType::Dephased,
            hw: HardwareProfile::perfect(),
        }
    }

    /// Werner states on a preset calibration.
    pub fn werner(preset: HardwarePreset) -> Self {
        Self {
            ent_type: EntType::Werner,
            hw: preset.profile(),
        }
    }

    /// The entanglement representation.
    #[inline]
    pub fn ent_type(&self) -> EntType {
        self.ent_type
    }

    /// The hardware profile.
    #[inline]
    pub fn hw(&self) -> &HardwareProfile {
        &self.hw
    }

    // ------------------------------------------------------------------
    // Forward operations
    // ------------------------------------------------------------------

    /// Swap two adjacent links.
    pub fn swap(&self, f1: Fidelity, f2: Fidelity) -> OpResult {
        let f = match self.ent_type {
            EntType::Dephased => f1 * f2 + (1.0 - f1) * (1.0 - f2),
            EntType::Werner => {
                let (p, eta) = (self.hw.p(), self.hw.eta());
                0.25 + (1.0 / 36.0)
                    * p
                    * (4.0 * eta * eta - 1.0)
                    * (4.0 * f1 - 1.0)
                    * (4.0 * f2 - 1.0)
            }
        };
        (f, self.hw.prob_swap())
    }

    /// Purify two pairs on the same link.
    pub fn purify(&self, f1: Fidelity, f2: Fidelity) -> OpResult {
        match self.ent_type {
            EntType::Dephased => {
                let prob = f1 * f2 + (1.0 - f1) * (1.0 - f2);
                (f1 * f2 / prob, prob)
            }
            EntType::Werner => {
                let terms = WernerPurify::new(&self.hw, f1, f2);
                (terms.nume / terms.deno, terms.deno * terms.p2)
            }
        }
    }

    /// Apply `op` to a pair of fidelities.
    pub fn apply(&self, op: OpKind, f1: Fidelity, f2: Fidelity) -> OpResult {
        match op {
            OpKind::Swap => self.swap(f1, f2),
            OpKind::Purify => self.purify(f1, f2),
        }
    }

    // ------------------------------------------------------------------
    // Gradients
    // ------------------------------------------------------------------

    /// Partial derivatives of a swap with respect to one operand.
    ///
    /// The cost of a swap does not depend on the input fidelities, so the
    /// `cost_fidelity` component is always zero.
    pub fn swap_grad(&self, f1: Fidelity, f2: Fidelity, side: Side) -> Grad {
        let other = match side {
            Side::Left => f2,
            Side::Right => f1,
        };
        let grad_f = match self.ent_type {
            EntType::Dephased => other - (1.0 - other),
            EntType::Werner => {
                let (p, eta) = (self.hw.p(), self.hw.eta());
                (1.0 / 9.0) * p * (4.0 * eta * eta - 1.0) * (4.0 * other - 1.0)
            }
        };
        Grad::new(grad_f, 1.0 / self.hw.prob_swap(), 0.0)
    }

    /// Partial derivatives of a purification with respect to one operand.
    ///
    /// `n1` and `n2` are the expected costs of the two inputs; the result's
    /// cost is `(n1 + n2) / prob`.
    pub fn purify_grad(
        &self,
        f1: Fidelity,
        f2: Fidelity,
        n1: f64,
        n2: f64,
        side: Side,
    ) -> Grad {
        match self.ent_type {
            EntType::Dephased => {
                let prob = f1 * f2 + (1.0 - f1) * (1.0 - f2);
                let deno = prob * prob;
                // d(prob)/d(self) depends only on the other operand.
                let (this, other) = match side {
                    Side::Left => (f1, f2),
                    Side::Right => (f2, f1),
                };
                let d_prob = other - (1.0 - other);
                let nume_f = other * prob - this * other * d_prob;
                Grad::new(nume_f / deno, 1.0 / prob, -(n1 + n2) * d_prob / deno)
            }
            EntType::Werner => {
                let terms = WernerPurify::new(&self.hw, f1, f2);
                let (d_nume, d_deno) = terms.partials(side);
                let deno_sq = terms.deno * terms.deno;
                let grad_f = (d_nume * terms.deno - terms.nume * d_deno) / deno_sq;
                let grad_cn = 1.0 / (terms.deno * terms.p2);
                let grad_cf = -(n1 + n2) * d_deno / (deno_sq * terms.p2);
                Grad::new(grad_f, grad_cn, grad_cf)
            }
        }
    }

    /// Gradient of `op` with respect to one operand.
    pub fn op_grad(
        &self,
        op: OpKind,
        f1: Fidelity,
        f2: Fidelity,
        n1: f64,
        n2: f64,
        side: Side,
    ) -> Grad {
        match op {
            OpKind::Swap => self.swap_grad(f1, f2, side),
            OpKind::Purify => self.purify_grad(f1, f2, n1, n2, side),
        }
    }

    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    /// Left-fold `fids` through swaps, multiplying the probabilities.
    pub fn seq_swap(&self, fids: &[Fidelity]) -> PhysResult<OpResult> {
        self.seq(OpKind::Swap, fids)
    }

    /// Left-fold `fids` through purifications, multiplying the probabilities.
    pub fn seq_purify(&self, fids: &[Fidelity]) -> PhysResult<OpResult> {
        self.seq(OpKind::Purify, fids)
    }

    /// Derivative of the [`seq_swap`](Self::seq_swap) fidelity with respect
    /// to `fids[index]`.
    ///
    /// Both swap laws are affine in a shifted fidelity (`f − 1/2` for
    /// dephased, `4f − 1` for Werner), so a chain of swaps is a scaled
    /// product and the derivative is the product of the other factors.
    pub fn seq_swap_grad(&self, fids: &[Fidelity], index: usize) -> PhysResult<f64> {
        if index >= fids.len() {
            return Err(PhysError::InvalidArgument(format!(
                "index {index} out of range for {} fidelities",
                fids.len()
            )));
        }
        let others = fids
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .map(|(_, &f)| f);
        let n_ops = (fids.len() - 1) as i32;
        let grad = match self.ent_type {
            EntType::Dephased => 2f64.powi(n_ops) * others.map(|f| f - 0.5).product::<f64>(),
            EntType::Werner => {
                let (p, eta) = (self.hw.p(), self.hw.eta());
                let k = p * (4.0 * eta * eta - 1.0) / 9.0;
                k.powi(n_ops) * others.map(|f| 4.0 * f - 1.0).product::<f64>()
            }
        };
        Ok(grad)
    }

    /// Swap neighbours pairwise, round by round, until one link remains.
    ///
    /// An odd element at the end of a round is carried unmerged into the
    /// next round.
    pub fn balanced_swap(&self, fids: &[Fidelity]) -> PhysResult<OpResult> {
        self.balanced(OpKind::Swap, fids)
    }

    /// Purify neighbours pairwise, round by round, until one pair remains.
    ///
    /// An odd element at the end of a round is carried unmerged into the
    /// next round.
    pub fn balanced_purify(&self, fids: &[Fidelity]) -> PhysResult<OpResult> {
        self.balanced(OpKind::Purify, fids)
    }

    fn seq(&self, op: OpKind, fids: &[Fidelity]) -> PhysResult<OpResult> {
        let (&first, rest) = fids.split_first().ok_or_else(|| empty_input(op))?;
        Ok(rest.iter().fold((first, 1.0), |(f, prob), &next| {
            let (f, p) = self.apply(op, f, next);
            (f, prob * p)
        }))
    }

    fn balanced(&self, op: OpKind, fids: &[Fidelity]) -> PhysResult<OpResult> {
        if fids.is_empty() {
            return Err(empty_input(op));
        }
        let mut current = fids.to_vec();
        let mut prob: Prob = 1.0;
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                match *pair {
                    [f1, f2] => {
                        let (f, p) = self.apply(op, f1, f2);
                        prob *= p;
                        next.push(f);
                    }
                    _ => next.extend_from_slice(pair),
                }
            }
            current = next;
        }
        Ok((current[0], prob))
    }
}

impl TryFrom<GateParams> for Gate {
    type Error = PhysError;

    fn try_from(raw: GateParams) -> PhysResult<Self> {
        Self::new(raw.ent_type, raw.hw)
    }
}

impl From<Gate> for GateParams {
    fn from(gate: Gate) -> Self {
        Self {
            ent_type: gate.ent_type,
            hw: gate.hw,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.ent_type, self.hw)
    }
}

fn empty_input(op: OpKind) -> PhysError {
    PhysError::InvalidArgument(format!("{op} needs at least one fidelity"))
}

/// Intermediate terms of the Werner purification formula.
struct WernerPurify {
    f1: f64,
    f2: f64,
    e1: f64,
    e2: f64,
    eta_m: f64,
    cross: f64,
    p2: f64,
    nume: f64,
    deno: f64,
}

impl WernerPurify {
    fn new(hw: &HardwareProfile, f1: f64, f2: f64) -> Self {
        let (e1, e2) = ((1.0 - f1) / 3.0, (1.0 - f2) / 3.0);
        let (p, eta) = (hw.p(), hw.eta());
        let p2 = p * p;
        let eta_m = eta * eta + (1.0 - eta) * (1.0 - eta);
        let cross = 2.0 * eta * (1.0 - eta);
        let p_m = (1.0 - p2) / p2;

        let nume = eta_m * (f1 * f2 + e1 * e2) + cross * (f1 * e2 + f2 * e1) + p_m / 8.0;
        let deno = eta_m * (f1 * f2 + f1 * e2 + f2 * e1 + 5.0 * e1 * e2)
            + cross * (2.0 * f1 * e2 + 2.0 * f2 * e1 + 4.0 * e1 * e2)
            + p_m / 2.0;

        Self {
            f1,
            f2,
            e1,
            e2,
            eta_m,
            cross,
            p2,
            nume,
            deno,
        }
    }

    /// `(∂N/∂f, ∂D/∂f)` for the selected operand, using `∂e/∂f = −1/3`.
    fn partials(&self, side: Side) -> (f64, f64) {
        let (f, e) = match side {
            Side::Left => (self.f2, self.e2),
            Side::Right => (self.f1, self.e1),
        };
        let d_nume = self.eta_m * (f - e / 3.0) + self.cross * (e - f / 3.0);
        let d_deno = self.eta_m * (f + e - f / 3.0 - 5.0 * e / 3.0)
            + self.cross * (2.0 * e - 2.0 * f / 3.0 - 4.0 * e / 3.0);
        (d_nume, d_deno)
    }
}
