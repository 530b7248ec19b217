//! Instruction set
//!
//! A closed sum of simple, three-address style steps. Every instruction
//! produces one value, bound by the enclosing [`Binding`] to exactly one
//! local-variable version. Code holding a generic `&Instruction` narrows it
//! with [`Instruction::cast`], which is total: a mismatch yields `None`.

use super::link::{LinkId, SendAndBlockLink};
use super::local::{LocalTable, LocalVariable};
use crate::shared::models::{AnnotationPos, CastKind, LiteralType, NameRef, Span, SymbolRef, TypeRef};
use crate::shared::ports::SymbolTable;
use once_cell::sync::OnceCell;
use std::fmt;

/// Read-only view used to render names while dumping instructions
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub table: &'a dyn SymbolTable,
    pub locals: &'a LocalTable,
    pub links: &'a [SendAndBlockLink],
}

impl<'a> RenderContext<'a> {
    pub fn local(&self, var: LocalVariable) -> String {
        self.locals.debug_name(var, self.table)
    }

    pub fn name(&self, name: NameRef) -> String {
        self.table.name_text(name)
    }

    fn link(&self, link: LinkId) -> String {
        match self.links.get(link.0 as usize) {
            Some(record) => format!("{} {}", link, self.name(record.fun)),
            None => link.to_string(),
        }
    }
}

/// Copies another local
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub what: LocalVariable,
}

/// Binds a resolved symbol (class or module reference)
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub what: SymbolRef,
}

/// Binds the receiver's `self`
#[derive(Debug, Clone, PartialEq)]
pub struct SelfRef {
    pub klass: SymbolRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralType,
}

/// Binds the `arg`-th declared parameter of `method`
#[derive(Debug, Clone, PartialEq)]
pub struct LoadArg {
    pub receiver: LocalVariable,
    pub method: NameRef,
    pub arg: u32,
}

/// Binds the values yielded into a closure body
#[derive(Debug, Clone, PartialEq)]
pub struct LoadYieldParams {
    pub link: LinkId,
    /// Enclosing class of the closure
    pub block: SymbolRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Send {
    pub recv: LocalVariable,
    pub fun: NameRef,
    pub receiver_span: Span,
    pub args: Vec<LocalVariable>,
    pub arg_spans: Vec<Span>,
    /// Present when a closure is attached
    pub link: Option<LinkId>,
}

/// Forces resolution of the generic constraint collected for a call
#[derive(Debug, Clone, PartialEq)]
pub struct SolveConstraint {
    pub link: LinkId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    pub value: LocalVariable,
    pub ty: TypeRef,
    pub cast: CastKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub what: LocalVariable,
}

/// Leaves a closure body, yielding `what` back through the link
#[derive(Debug, Clone, PartialEq)]
pub struct BlockReturn {
    pub link: LinkId,
    pub what: LocalVariable,
}

/// A value only known at runtime (e.g. whether a closure is called again)
#[derive(Debug, Clone, PartialEq)]
pub struct Unanalyzable;

/// A construct the builder does not model precisely
#[derive(Debug, Clone, PartialEq)]
pub struct NotSupported {
    pub why: String,
}

/// Asks inference to dump its environment at a source position
#[derive(Debug, Clone, PartialEq)]
pub struct DebugEnvironment {
    pub pos: AnnotationPos,
    environment: OnceCell<String>,
}

impl DebugEnvironment {
    pub fn new(pos: AnnotationPos) -> Self {
        Self {
            pos,
            environment: OnceCell::new(),
        }
    }

    /// Text recorded by inference, if it has run
    pub fn environment(&self) -> Option<&str> {
        self.environment.get().map(String::as_str)
    }

    /// Record the inferred environment. Only the first recording sticks.
    pub fn record(&self, text: String) -> Result<(), String> {
        self.environment.set(text)
    }
}

static UNANALYZABLE: Unanalyzable = Unanalyzable;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Ident(Ident),
    Alias(Alias),
    SelfRef(SelfRef),
    Literal(Literal),
    LoadArg(LoadArg),
    LoadYieldParams(LoadYieldParams),
    Send(Send),
    SolveConstraint(SolveConstraint),
    Cast(Cast),
    Return(Return),
    BlockReturn(BlockReturn),
    Unanalyzable(Unanalyzable),
    NotSupported(NotSupported),
    DebugEnvironment(DebugEnvironment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    Ident,
    Alias,
    SelfRef,
    Literal,
    LoadArg,
    LoadYieldParams,
    Send,
    SolveConstraint,
    Cast,
    Return,
    BlockReturn,
    Unanalyzable,
    NotSupported,
    DebugEnvironment,
}

impl InstructionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionKind::Ident => "ident",
            InstructionKind::Alias => "alias",
            InstructionKind::SelfRef => "self",
            InstructionKind::Literal => "literal",
            InstructionKind::LoadArg => "loadarg",
            InstructionKind::LoadYieldParams => "loadyieldparams",
            InstructionKind::Send => "send",
            InstructionKind::SolveConstraint => "solveconstraint",
            InstructionKind::Cast => "cast",
            InstructionKind::Return => "return",
            InstructionKind::BlockReturn => "blockreturn",
            InstructionKind::Unanalyzable => "unanalyzable",
            InstructionKind::NotSupported => "notsupported",
            InstructionKind::DebugEnvironment => "debugenvironment",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checked narrowing from `Instruction` to one variant payload
pub trait InstructionVariant {
    fn from_instruction(insn: &Instruction) -> Option<&Self>;
}

macro_rules! instruction_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl InstructionVariant for $variant {
                fn from_instruction(insn: &Instruction) -> Option<&Self> {
                    match insn {
                        Instruction::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for Instruction {
                fn from(payload: $variant) -> Self {
                    Instruction::$variant(payload)
                }
            }
        )*
    };
}

instruction_variant!(
    Ident,
    Alias,
    SelfRef,
    Literal,
    LoadArg,
    LoadYieldParams,
    Send,
    SolveConstraint,
    Cast,
    Return,
    BlockReturn,
    NotSupported,
    DebugEnvironment,
);

// NotSupported refines Unanalyzable: narrowing either to `Unanalyzable` succeeds.
impl InstructionVariant for Unanalyzable {
    fn from_instruction(insn: &Instruction) -> Option<&Self> {
        match insn {
            Instruction::Unanalyzable(payload) => Some(payload),
            Instruction::NotSupported(_) => Some(&UNANALYZABLE),
            _ => None,
        }
    }
}

impl From<Unanalyzable> for Instruction {
    fn from(payload: Unanalyzable) -> Self {
        Instruction::Unanalyzable(payload)
    }
}

impl Instruction {
    pub fn cast<T: InstructionVariant>(&self) -> Option<&T> {
        T::from_instruction(self)
    }

    pub fn isa<T: InstructionVariant>(&self) -> bool {
        self.cast::<T>().is_some()
    }

    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Ident(_) => InstructionKind::Ident,
            Instruction::Alias(_) => InstructionKind::Alias,
            Instruction::SelfRef(_) => InstructionKind::SelfRef,
            Instruction::Literal(_) => InstructionKind::Literal,
            Instruction::LoadArg(_) => InstructionKind::LoadArg,
            Instruction::LoadYieldParams(_) => InstructionKind::LoadYieldParams,
            Instruction::Send(_) => InstructionKind::Send,
            Instruction::SolveConstraint(_) => InstructionKind::SolveConstraint,
            Instruction::Cast(_) => InstructionKind::Cast,
            Instruction::Return(_) => InstructionKind::Return,
            Instruction::BlockReturn(_) => InstructionKind::BlockReturn,
            Instruction::Unanalyzable(_) => InstructionKind::Unanalyzable,
            Instruction::NotSupported(_) => InstructionKind::NotSupported,
            Instruction::DebugEnvironment(_) => InstructionKind::DebugEnvironment,
        }
    }

    /// True for both `Unanalyzable` and `NotSupported`: inference must treat
    /// the bound local as fully unknown.
    pub fn is_unanalyzable(&self) -> bool {
        self.isa::<Unanalyzable>()
    }

    pub fn unanalyzable_reason(&self) -> Option<&str> {
        match self {
            Instruction::Unanalyzable(_) => Some("value is only known at runtime"),
            Instruction::NotSupported(payload) => Some(&payload.why),
            _ => None,
        }
    }

    /// Call/closure link this instruction participates in
    pub fn link(&self) -> Option<LinkId> {
        match self {
            Instruction::Send(send) => send.link,
            Instruction::LoadYieldParams(load) => Some(load.link),
            Instruction::SolveConstraint(solve) => Some(solve.link),
            Instruction::BlockReturn(ret) => Some(ret.link),
            _ => None,
        }
    }

    /// Locals read, in operand order
    pub fn reads(&self) -> Vec<LocalVariable> {
        match self {
            Instruction::Ident(ident) => vec![ident.what],
            Instruction::LoadArg(load) => vec![load.receiver],
            Instruction::Send(send) => {
                let mut reads = Vec::with_capacity(send.args.len() + 1);
                reads.push(send.recv);
                reads.extend(send.args.iter().copied());
                reads
            }
            Instruction::Cast(cast) => vec![cast.value],
            Instruction::Return(ret) => vec![ret.what],
            Instruction::BlockReturn(ret) => vec![ret.what],
            Instruction::Alias(_)
            | Instruction::SelfRef(_)
            | Instruction::Literal(_)
            | Instruction::LoadYieldParams(_)
            | Instruction::SolveConstraint(_)
            | Instruction::Unanalyzable(_)
            | Instruction::NotSupported(_)
            | Instruction::DebugEnvironment(_) => Vec::new(),
        }
    }

    pub(crate) fn reads_mut(&mut self) -> Vec<&mut LocalVariable> {
        match self {
            Instruction::Ident(ident) => vec![&mut ident.what],
            Instruction::LoadArg(load) => vec![&mut load.receiver],
            Instruction::Send(send) => {
                let mut reads = Vec::with_capacity(send.args.len() + 1);
                reads.push(&mut send.recv);
                reads.extend(send.args.iter_mut());
                reads
            }
            Instruction::Cast(cast) => vec![&mut cast.value],
            Instruction::Return(ret) => vec![&mut ret.what],
            Instruction::BlockReturn(ret) => vec![&mut ret.what],
            _ => Vec::new(),
        }
    }

    pub(crate) fn link_mut(&mut self) -> Option<&mut LinkId> {
        match self {
            Instruction::Send(send) => send.link.as_mut(),
            Instruction::LoadYieldParams(load) => Some(&mut load.link),
            Instruction::SolveConstraint(solve) => Some(&mut solve.link),
            Instruction::BlockReturn(ret) => Some(&mut ret.link),
            _ => None,
        }
    }

    /// Debug rendering, used by graph dumps and snapshot tests
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            Instruction::Ident(ident) => ctx.local(ident.what),
            Instruction::Alias(alias) => format!("alias {}", ctx.table.symbol_name(alias.what)),
            Instruction::SelfRef(this) => format!("self({})", ctx.table.symbol_name(this.klass)),
            Instruction::Literal(literal) => format!("literal({})", literal.value.render(ctx.table)),
            Instruction::LoadArg(load) => format!(
                "load_arg({}#{}, {})",
                ctx.local(load.receiver),
                ctx.name(load.method),
                load.arg
            ),
            Instruction::LoadYieldParams(load) => format!(
                "load_yield_params<{}>({})",
                ctx.link(load.link),
                ctx.table.symbol_name(load.block)
            ),
            Instruction::Send(send) => {
                let args: Vec<String> = send.args.iter().map(|arg| ctx.local(*arg)).collect();
                let mut out = format!("{}.{}({})", ctx.local(send.recv), ctx.name(send.fun), args.join(", "));
                if let Some(link) = send.link {
                    out.push_str(&format!(" do<{}>", link));
                }
                out
            }
            Instruction::SolveConstraint(solve) => format!("solve<{}>", ctx.link(solve.link)),
            Instruction::Cast(cast) => format!(
                "cast({}, {}, {})",
                ctx.local(cast.value),
                ctx.table.type_name(cast.ty),
                cast.cast
            ),
            Instruction::Return(ret) => format!("return {}", ctx.local(ret.what)),
            Instruction::BlockReturn(ret) => {
                format!("blockreturn<{}> {}", ctx.link(ret.link), ctx.local(ret.what))
            }
            Instruction::Unanalyzable(_) => "<unanalyzable>".to_string(),
            Instruction::NotSupported(payload) => format!("<not-supported: {}>", payload.why),
            Instruction::DebugEnvironment(debug) => match debug.environment() {
                Some(text) => format!("debug_env({}) {{{}}}", debug.pos, text),
                None => format!("debug_env({})", debug.pos),
            },
        }
    }
}

/// An instruction bound to the local version it produces
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub bind: LocalVariable,
    pub span: Span,
    pub value: Instruction,
    /// Inserted by the builder rather than traceable to source text
    pub synthetic: bool,
}

impl Binding {
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        format!("{} = {}", ctx.local(self.bind), self.value.render(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cfg::domain::local::LocalSlot;
    use crate::shared::ports::InMemorySymbolTable;

    fn var(slot: u32, version: u32) -> LocalVariable {
        LocalVariable::new(LocalSlot(slot), version)
    }

    #[test]
    fn test_cast_matches_only_own_variant() {
        let insn: Instruction = Return { what: var(1, 1) }.into();
        assert_eq!(insn.cast::<Return>().map(|r| r.what), Some(var(1, 1)));
        assert!(insn.cast::<Send>().is_none());
        assert!(insn.cast::<BlockReturn>().is_none());
        assert!(!insn.is_unanalyzable());
    }

    #[test]
    fn test_not_supported_narrows_to_unanalyzable() {
        let insn: Instruction = NotSupported {
            why: "retry is not supported".to_string(),
        }
        .into();
        assert!(insn.isa::<Unanalyzable>());
        assert!(insn.isa::<NotSupported>());
        assert_eq!(insn.unanalyzable_reason(), Some("retry is not supported"));

        let bare: Instruction = Unanalyzable.into();
        assert!(bare.isa::<Unanalyzable>());
        assert!(!bare.isa::<NotSupported>());
        assert!(!bare.unanalyzable_reason().unwrap().is_empty());
    }

    #[test]
    fn test_send_reads_receiver_then_args() {
        let insn: Instruction = Send {
            recv: var(1, 1),
            fun: NameRef(0),
            receiver_span: Span::zero(),
            args: vec![var(2, 1), var(3, 2)],
            arg_spans: vec![Span::zero(), Span::zero()],
            link: Some(LinkId(0)),
        }
        .into();
        assert_eq!(insn.reads(), vec![var(1, 1), var(2, 1), var(3, 2)]);
        assert_eq!(insn.link(), Some(LinkId(0)));
        assert_eq!(insn.kind(), InstructionKind::Send);
    }

    #[test]
    fn test_render_uses_names() {
        let table = InMemorySymbolTable::new();
        let mut locals = LocalTable::new(table.enter_name("<self>"));
        let x = locals.source_slot(crate::features::ast::LocalRef::new(table.enter_name("x")));
        let foo = table.enter_name("foo");
        let ctx = RenderContext {
            table: &table,
            locals: &locals,
            links: &[],
        };

        let send: Instruction = Send {
            recv: LocalVariable::receiver(),
            fun: foo,
            receiver_span: Span::zero(),
            args: vec![LocalVariable::new(x, 2)],
            arg_spans: vec![Span::zero()],
            link: None,
        }
        .into();
        assert_eq!(send.render(&ctx), "<self>@0.foo(x@2)");

        let lit: Instruction = Literal {
            value: LiteralType::Integer(3),
        }
        .into();
        let binding = Binding {
            bind: LocalVariable::new(x, 3),
            span: Span::zero(),
            value: lit,
            synthetic: false,
        };
        assert_eq!(binding.render(&ctx), "x@3 = literal(3)");
    }

    #[test]
    fn test_debug_environment_records_once() {
        let debug = DebugEnvironment::new(AnnotationPos::new(3, 4));
        assert_eq!(debug.environment(), None);
        assert!(debug.record("x: Integer".to_string()).is_ok());
        assert!(debug.record("x: String".to_string()).is_err());
        assert_eq!(debug.environment(), Some("x: Integer"));
    }
}
