//! Control-flow graph feature
//!
//! Hexagonal layout:
//! - `domain`: locals, the instruction set, blocks, links and the finished [`Cfg`]
//! - `infrastructure`: the builder and whole-graph passes (verify, analysis, dumps)
//! - `application`: the use case callers go through

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CfgLoweringUseCase, CfgLoweringUseCaseImpl, LowerUnitOutput, LoweringStats};
pub use domain::*;
pub use infrastructure::{build_cfg, CfgDump, CfgViolation};
