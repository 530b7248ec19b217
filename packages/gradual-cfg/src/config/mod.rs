//! Configuration system
//!
//! A single `LoweringConfig` controls the builder: recursion guard, the
//! post-build verifier, debug annotations and unit-level parallelism. It can
//! be assembled in code or loaded from a versioned YAML file.
//!
//! # Examples
//!
//! ```rust,ignore
//! use gradual_cfg::config::LoweringConfig;
//!
//! let config = LoweringConfig::default().max_nesting_depth(512);
//! let config = LoweringConfig::from_yaml_file("lowering.yaml")?;
//! ```

pub mod error;
pub mod lowering_config;
pub mod validation;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use lowering_config::{LoweringConfig, ParallelConfig, MAX_NESTING_DEPTH};
pub use validation::Validatable;
