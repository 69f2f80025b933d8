//! Tree-shape strategies for the initial scheme tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TreeError;

/// How [`Spst::build`](crate::Spst::build) merges the elementary links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Purify-chain: fold the links front to back into a left-deep tree.
    Linked,
    /// Swap neighbours pairwise, round by round, carrying an odd leftover.
    #[default]
    Balanced,
    /// Greedy: repeatedly swap the adjacent pair with the smallest summed cost.
    StOpt,
    /// Path-tree optimum. Declared but not implemented.
    PtOpt,
}

impl BuildStrategy {
    /// Strategies that [`Spst::build`](crate::Spst::build) can execute.
    pub const IMPLEMENTED: [BuildStrategy; 3] = [
        BuildStrategy::Linked,
        BuildStrategy::Balanced,
        BuildStrategy::StOpt,
    ];

    /// Configuration name of the strategy.
    pub fn name(self) -> &'static str {
        match self {
            BuildStrategy::Linked => "linked",
            BuildStrategy::Balanced => "balanced",
            BuildStrategy::StOpt => "st_opt",
            BuildStrategy::PtOpt => "pt_opt",
        }
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildStrategy {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, TreeError> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "linked" => Ok(BuildStrategy::Linked),
            "balanced" => Ok(BuildStrategy::Balanced),
            "st_opt" => Ok(BuildStrategy::StOpt),
            "pt_opt" => Ok(BuildStrategy::PtOpt),
            other => Err(TreeError::NotImplemented(format!(
                "tree build strategy '{other}'"
            ))),
        }
    }
}
