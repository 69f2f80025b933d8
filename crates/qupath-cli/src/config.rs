//! Configuration for the qupath CLI.
//!
//! A YAML document describes the gate, the path and the solver settings.
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`QUPATH_` prefix)
//! 2. Configuration file
//! 3. Default values

use qupath_phys::{
    Edge, EntType, ExpCost, Fidelity, Gate, HardwarePreset, HardwareProfile, NodeId,
};
use qupath_tree::{BuildStrategy, SearchRange, SolverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Physical model
    #[serde(default)]
    pub gate: GateConfig,
    /// Elementary links in path order
    #[serde(default)]
    pub path: Vec<LinkConfig>,
    /// Initial tree construction
    #[serde(default)]
    pub build: BuildConfig,
    /// Greedy solver settings
    #[serde(default)]
    pub solver: SolverSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gate selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Entanglement representation: "dephased" or "werner"
    #[serde(default = "default_representation")]
    pub representation: EntType,
    /// Hardware calibration: a preset name or explicit accuracies
    #[serde(default)]
    pub hardware: HardwareSpec,
}

/// Hardware calibration as a preset name or as four explicit values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HardwareSpec {
    /// Named calibration point
    Preset(HardwarePreset),
    /// `{accuracy_1q, accuracy_2q, accuracy_bsm, prob_swap}`
    Custom(HardwareProfile),
}

impl Default for HardwareSpec {
    fn default() -> Self {
        HardwareSpec::Preset(HardwarePreset::Perfect)
    }
}

impl HardwareSpec {
    /// The calibration this entry stands for.
    pub fn profile(&self) -> HardwareProfile {
        match self {
            HardwareSpec::Preset(preset) => preset.profile(),
            HardwareSpec::Custom(profile) => *profile,
        }
    }
}

/// One elementary link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// First endpoint
    pub from: u32,
    /// Second endpoint
    pub to: u32,
    /// Initial fidelity
    pub fidelity: Fidelity,
    /// Expected attempts of one elementary pair (default 1)
    #[serde(default)]
    pub cost: Option<ExpCost>,
}

/// Tree construction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Strategy: "linked", "balanced", "st_opt" or "pt_opt"
    #[serde(default)]
    pub strategy: BuildStrategy,
}

/// Solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSection {
    /// End-to-end fidelity to reach
    #[serde(default = "default_target_fidelity")]
    pub target_fidelity: f64,
    /// Upper bound on purification rounds
    #[serde(default = "default_max_purifications")]
    pub max_purifications: usize,
    /// Candidate nodes: "all", "leaves" or "branches"
    #[serde(default)]
    pub search: SearchRange,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions

fn default_representation() -> EntType {
    EntType::Werner
}

fn default_target_fidelity() -> f64 {
    SolverConfig::default().target_fidelity
}

fn default_max_purifications() -> usize {
    SolverConfig::default().max_purifications
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            representation: default_representation(),
            hardware: HardwareSpec::default(),
        }
    }
}

impl Default for SolverSection {
    fn default() -> Self {
        SolverSection {
            target_fidelity: default_target_fidelity(),
            max_purifications: default_max_purifications(),
            search: SearchRange::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration with the following precedence:
    /// 1. Environment variable overrides
    /// 2. File, if provided
    /// 3. Defaults
    ///
    /// The result is not validated yet; callers may still patch it (e.g.
    /// from command-line flags) before calling [`validate`](Self::validate).
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.merge_env()
    }

    /// Merge `QUPATH_*` environment variables into this configuration.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge overrides looked up by variable name.
    ///
    /// Only variables that are set override the current values. A set but
    /// unparsable value is an error.
    pub fn merge_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("QUPATH_STRATEGY") {
            self.build.strategy = v
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("QUPATH_STRATEGY: {e}")))?;
        }
        if let Some(v) = lookup("QUPATH_TARGET_FIDELITY") {
            self.solver.target_fidelity = parse_var("QUPATH_TARGET_FIDELITY", &v)?;
        }
        if let Some(v) = lookup("QUPATH_MAX_PURIFICATIONS") {
            self.solver.max_purifications = parse_var("QUPATH_MAX_PURIFICATIONS", &v)?;
        }
        if let Some(v) = lookup("QUPATH_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("QUPATH_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate log level
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        // Validate log format
        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        if self.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "path must contain at least one link".to_string(),
            ));
        }
        for link in &self.path {
            if !(link.fidelity > 0.0 && link.fidelity <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "link {}-{}: fidelity {} is outside (0, 1]",
                    link.from, link.to, link.fidelity
                )));
            }
            if let Some(cost) = link.cost {
                if !(cost.is_finite() && cost > 0.0) {
                    return Err(ConfigError::ValidationError(format!(
                        "link {}-{}: cost must be positive, got {cost}",
                        link.from, link.to
                    )));
                }
            }
        }

        let target = self.solver.target_fidelity;
        if !(target > 0.0 && target <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "target_fidelity must be in (0, 1], got {target}"
            )));
        }
        if self.solver.max_purifications == 0 {
            return Err(ConfigError::ValidationError(
                "max_purifications must be greater than 0".to_string(),
            ));
        }

        self.gate()?;
        Ok(())
    }

    /// The configured gate.
    pub fn gate(&self) -> Result<Gate, ConfigError> {
        Gate::new(self.gate.representation, self.gate.hardware.profile())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// The links with their initial fidelities, in path order.
    pub fn links(&self) -> Vec<(Edge, Fidelity)> {
        self.path
            .iter()
            .map(|l| (Edge(NodeId(l.from), NodeId(l.to)), l.fidelity))
            .collect()
    }

    /// Per-link cost overrides, or `None` if no link sets one.
    pub fn costs(&self) -> Option<Vec<ExpCost>> {
        self.path
            .iter()
            .any(|l| l.cost.is_some())
            .then(|| self.path.iter().map(|l| l.cost.unwrap_or(1.0)).collect())
    }

    /// Replace the path by consecutive links `0-1, 1-2, ...` with `fids`.
    pub fn set_fidelities(&mut self, fids: &[Fidelity]) {
        self.path = (0u32..)
            .zip(fids)
            .map(|(i, &fidelity)| LinkConfig {
                from: i,
                to: i + 1,
                fidelity,
                cost: None,
            })
            .collect();
    }

    /// Settings for the greedy tree solver.
    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            strategy: self.build.strategy,
            target_fidelity: self.solver.target_fidelity,
            max_purifications: self.solver.max_purifications,
            search: self.solver.search,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key}: cannot parse '{value}'")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = r#"
gate:
  representation: werner
  hardware: low
path:
  - { from: 0, to: 1, fidelity: 0.95 }
  - { from: 1, to: 2, fidelity: 0.93, cost: 2.0 }
build:
  strategy: st_opt
solver:
  target_fidelity: 0.85
  search: leaves
logging:
  level: info
  format: json
"#;

    fn valid() -> Config {
        let mut config = Config::default();
        config.set_fidelities(&[0.9, 0.9]);
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gate.representation, EntType::Werner);
        assert_eq!(config.build.strategy, BuildStrategy::Balanced);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.solver.max_purifications, 64);
        assert!(config.path.is_empty());
    }

    #[test]
    fn test_parse_example() {
        let config = Config::from_yaml(EXAMPLE).unwrap();
        assert_eq!(config.gate.hardware, HardwareSpec::Preset(HardwarePreset::Low));
        assert_eq!(config.build.strategy, BuildStrategy::StOpt);
        assert_eq!(config.solver.search, SearchRange::Leaves);
        assert_eq!(config.solver.max_purifications, 64);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.costs(), Some(vec![1.0, 2.0]));
        assert_eq!(config.links()[1].0, Edge::from((1, 2)));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_custom_hardware() {
        let yaml = r#"
gate:
  hardware: { accuracy_1q: 0.99, accuracy_2q: 0.98, accuracy_bsm: 0.97, prob_swap: 0.5 }
path:
  - { from: 0, to: 1, fidelity: 0.9 }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let hw = config.gate.hardware.profile();
        assert_eq!(hw.accuracy_2q(), 0.98);
        assert_eq!(hw.prob_swap(), 0.5);
    }

    #[test]
    fn test_out_of_range_hardware_is_parse_error() {
        let yaml = r#"
gate:
  hardware: { accuracy_1q: 1.5, accuracy_2q: 0.98, accuracy_bsm: 0.97, prob_swap: 0.5 }
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.path.len(), 2);

        assert!(matches!(
            Config::from_file("/nonexistent/qupath.yaml"),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());

        let mut config = valid();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.solver.target_fidelity = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.solver.max_purifications = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.path[0].fidelity = 1.1;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.path[0].fidelity = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dephased_needs_perfect_hardware() {
        let mut config = valid();
        config.gate.representation = EntType::Dephased;
        assert!(config.validate().is_ok());
        config.gate.hardware = HardwareSpec::Preset(HardwarePreset::High);
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_merge_vars() {
        let vars = |key: &str| match key {
            "QUPATH_STRATEGY" => Some("linked".to_string()),
            "QUPATH_TARGET_FIDELITY" => Some("0.95".to_string()),
            "QUPATH_LOG_LEVEL" => Some("debug".to_string()),
            _ => None,
        };
        let config = valid().merge_vars(vars).unwrap();
        assert_eq!(config.build.strategy, BuildStrategy::Linked);
        assert_eq!(config.solver.target_fidelity, 0.95);
        assert_eq!(config.solver.max_purifications, 64);
        assert_eq!(config.logging.level, "debug");

        let bad = valid()
            .merge_vars(|key| (key == "QUPATH_MAX_PURIFICATIONS").then(|| "many".to_string()));
        assert!(matches!(bad, Err(ConfigError::ValidationError(_))));

        let unknown =
            valid().merge_vars(|key| (key == "QUPATH_STRATEGY").then(|| "random".to_string()));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_solver_config() {
        let config = Config::from_yaml(EXAMPLE).unwrap();
        let solver = config.solver_config();
        assert_eq!(solver.strategy, BuildStrategy::StOpt);
        assert_eq!(solver.target_fidelity, 0.85);
    }
}
