//! Shared models

mod ids;
mod literal;
mod span;

pub use ids::{NameRef, SymbolRef, TypeRef};
pub use literal::{AnnotationPos, CastKind, LiteralType, ParamKind};
pub use span::{Location, Span};
