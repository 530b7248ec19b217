//! CFG application layer

mod lower_method;

pub use lower_method::{CfgLoweringUseCase, CfgLoweringUseCaseImpl, LowerUnitOutput, LoweringStats};
