//! Configuration validation
//!
//! Every configuration struct implements [`Validatable`]; loaders call it
//! before handing the configuration to a builder.

use super::error::ConfigResult;

/// Trait for validatable configuration objects
pub trait Validatable {
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;
}
