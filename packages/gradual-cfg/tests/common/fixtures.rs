//! Test fixtures
//!
//! A [`Fixture`] owns a symbol table with one owner class entered, and
//! interns names on demand so trees read close to source.

use gradual_cfg::config::LoweringConfig;
use gradual_cfg::features::ast::{mk, Expr, LocalRef, MethodDef, Param};
use gradual_cfg::features::cfg::{build_cfg, Cfg};
use gradual_cfg::shared::models::{NameRef, Span, SymbolRef};
use gradual_cfg::shared::ports::{InMemorySymbolTable, SymbolTable};
use gradual_cfg::Result;
use std::sync::Arc;

pub struct Fixture {
    pub table: Arc<InMemorySymbolTable>,
    pub owner: SymbolRef,
    pub config: LoweringConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let table = Arc::new(InMemorySymbolTable::new());
        let owner = table.enter_symbol("Foo");
        Self {
            table,
            owner,
            config: LoweringConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoweringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self, text: &str) -> NameRef {
        self.table.enter_name(text)
    }

    pub fn symbol(&self, text: &str) -> SymbolRef {
        self.table.enter_symbol(text)
    }

    pub fn local(&self, text: &str) -> LocalRef {
        LocalRef::new(self.name(text))
    }

    pub fn var(&self, text: &str) -> Expr {
        mk::local(self.local(text))
    }

    pub fn param(&self, text: &str) -> Param {
        mk::param(self.local(text))
    }

    /// `self.fun(args)`
    pub fn call(&self, fun: &str, args: Vec<Expr>) -> Expr {
        mk::send(mk::self_(), self.name(fun), args)
    }

    pub fn method(&self, name: &str, params: Vec<Param>, body: Expr) -> MethodDef {
        mk::method(self.name(name), self.owner, params, body)
    }

    pub fn try_lower(&self, method: &MethodDef) -> Result<Cfg> {
        build_cfg(method, self.table.as_ref(), &self.config)
    }

    /// Lower and verify, failing the test on any error
    pub fn lower(&self, method: &MethodDef) -> Cfg {
        let cfg = self
            .try_lower(method)
            .unwrap_or_else(|err| panic!("lowering failed: {}", err));
        crate::common::assert_well_formed(&cfg, self.table.as_ref());
        cfg
    }

    pub fn text(&self, cfg: &Cfg) -> String {
        cfg.to_text(self.table.as_ref())
    }

    /// Rendered instructions of one block
    pub fn block_text(&self, cfg: &Cfg, index: u32) -> Vec<String> {
        let ctx = cfg.render_context(self.table.as_ref());
        cfg.blocks()[index as usize]
            .instructions
            .iter()
            .map(|binding| binding.render(&ctx))
            .collect()
    }
}

/// Span on one line, for annotation tests
pub fn on_line(line: u32) -> Span {
    Span::new(line, 0, line, 10)
}

