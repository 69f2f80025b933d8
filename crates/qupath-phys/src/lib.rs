//! Physical entanglement model for quantum repeater paths.
//!
//! This crate provides the closed-form operation model that the scheme-tree
//! crate builds on: how two entangled links combine under a **swap** (joining
//! adjacent links) or a **purify** (distilling two pairs on the same link),
//! what fidelity comes out, how likely the operation is to succeed, and the
//! analytic partial derivatives of both.
//!
//! # Core Components
//!
//! - **Network identities**: [`NodeId`], [`Edge`]
//! - **Hardware**: [`HardwareProfile`] calibration and [`HardwarePreset`]s
//! - **Operations**: [`EntType`] (dephased / Werner), [`OpKind`], [`Side`],
//!   [`Grad`]
//! - **Gate**: [`Gate`], the forward operations, gradients and combinators
//!
//! # Example: Swapping Two Werner Links
//!
//! ```rust
//! use qupath_phys::{EntType, Gate, HardwareProfile};
//!
//! let hw = HardwareProfile::new(0.99, 0.99, 0.99, 0.9).unwrap();
//! let gate = Gate::new(EntType::Werner, hw).unwrap();
//!
//! let (fidelity, prob) = gate.swap(0.9, 0.9);
//! assert!(fidelity < 0.9);
//! assert_eq!(prob, 0.9);
//!
//! // Purifying two copies raises the fidelity.
//! let (purified, _) = gate.purify(fidelity, fidelity);
//! assert!(purified > fidelity);
//! ```
//!
//! # Presets
//!
//! | Preset | 1q | 2q | BSM | swap |
//! |--------|----|----|-----|------|
//! | `perfect` | 1 | 1 | 1 | 1 |
//! | `high` | 0.999 | 0.999 | 0.999 | 0.995 |
//! | `medium` | 0.995 | 0.995 | 0.995 | 0.99 |
//! | `low` | 0.99 | 0.99 | 0.99 | 0.975 |

pub mod error;
pub mod gate;
pub mod hardware;
pub mod network;
pub mod op;

pub use error::{PhysError, PhysResult};
pub use gate::{Gate, GateParams};
pub use hardware::{HardwareParams, HardwarePreset, HardwareProfile};
pub use network::{Edge, NodeId};
pub use op::{Cost, EntType, ExpCost, Fidelity, Grad, OpKind, OpResult, Prob, Side};
