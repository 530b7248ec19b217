//! CFG infrastructure: the builder and the passes over finished graphs

pub mod analysis;
pub mod builder;
mod finalize;
pub mod render;
pub mod verify;

pub use analysis::{back_edges, immediate_dominators, reverse_postorder, to_graph};
pub use builder::build_cfg;
pub use render::{BlockDump, CfgDump, LinkDump};
pub use verify::CfgViolation;
