//! Lowering configuration
//!
//! Loaded from code (`LoweringConfig::default()` plus builder methods) or from
//! a versioned YAML file:
//!
//! ```yaml
//! version: 1
//! lowering:
//!   max_nesting_depth: 512
//!   verify_after_build: true
//!   debug_annotations:
//!     - { line: 4, column: 2 }
//!   parallel:
//!     num_threads: 4
//! ```

use super::error::{ConfigError, ConfigResult};
use super::validation::Validatable;
use crate::shared::models::AnnotationPos;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Largest accepted `max_nesting_depth`
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Per-method lowering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringConfig {
    /// Expression nesting beyond this depth lowers to `NotSupported` (1..=[`MAX_NESTING_DEPTH`])
    pub max_nesting_depth: usize,

    /// Run the structural verifier on every finished graph
    pub verify_after_build: bool,

    /// Positions at which a `DebugEnvironment` instruction is emitted
    pub debug_annotations: Vec<AnnotationPos>,

    /// Unit-level parallelism
    pub parallel: ParallelConfig,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 256,
            verify_after_build: true,
            debug_annotations: Vec::new(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl LoweringConfig {
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn verify_after_build(mut self, verify: bool) -> Self {
        self.verify_after_build = verify;
        self
    }

    pub fn annotate(mut self, pos: AnnotationPos) -> Self {
        self.debug_annotations.push(pos);
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.parallel.num_threads = threads;
        self
    }

    /// Parse a versioned YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let version = raw
            .get("version")
            .and_then(serde_yaml::Value::as_u64)
            .ok_or(ConfigError::MissingVersion)? as u32;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let file: LoweringConfigFileV1 = serde_yaml::from_value(raw)?;
        file.lowering.validate()?;
        Ok(file.lowering)
    }

    /// Load a versioned YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Export as a versioned YAML document
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = LoweringConfigFileV1 {
            version: 1,
            lowering: self.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}

impl Validatable for LoweringConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_NESTING_DEPTH).contains(&self.max_nesting_depth) {
            return Err(ConfigError::range(
                "max_nesting_depth",
                self.max_nesting_depth,
                1,
                MAX_NESTING_DEPTH,
                "Deeply nested trees lower to NotSupported past this depth",
            ));
        }
        self.parallel.validate()
    }
}

/// Parallel unit lowering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallelConfig {
    /// Worker threads for unit lowering (0 = rayon global pool, 1 = sequential)
    pub num_threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { num_threads: 0 }
    }
}

impl Validatable for ParallelConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.num_threads > 1024 {
            return Err(ConfigError::range(
                "num_threads",
                self.num_threads,
                0,
                1024,
                "Use 0 to share the global rayon pool",
            ));
        }
        Ok(())
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoweringConfigFileV1 {
    version: u32,
    #[serde(default)]
    lowering: LoweringConfig,
}
