//! CLI command implementations.

pub mod common;
pub mod compare;
pub mod ops;
pub mod presets;
pub mod solve;
pub mod tree;

pub use common::PathArgs;
