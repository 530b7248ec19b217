//! CFG lowering use case
//!
//! The entry point for callers: lower one method, or a whole compilation
//! unit of independent methods.
//!
//! # Architecture
//! ```text
//! Checker pipeline
//!        ↓
//! CfgLoweringUseCase (this module)
//!        ↓
//! build_cfg (infrastructure)
//!        ↓
//! Cfg (domain)
//! ```

use crate::config::{ConfigError, LoweringConfig, Validatable};
use crate::errors::Result;
use crate::features::ast::MethodDef;
use crate::features::cfg::domain::{Cfg, InstructionKind};
use crate::features::cfg::infrastructure::build_cfg;
use crate::shared::ports::SymbolTable;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Output of lowering a compilation unit
#[derive(Debug)]
pub struct LowerUnitOutput {
    /// One result per input method, in input order
    pub graphs: Vec<Result<Cfg>>,
    pub stats: LoweringStats,
}

/// Unit-level statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoweringStats {
    pub methods: usize,
    pub failed: usize,
    pub blocks: usize,
    pub instructions: usize,
    pub links: usize,
    /// Instructions per kind, summed over every lowered method
    pub histogram: BTreeMap<InstructionKind, usize>,
    pub elapsed_ms: u64,
}

impl LoweringStats {
    fn from_graphs(graphs: &[Result<Cfg>], elapsed_ms: u64) -> Self {
        let mut stats = Self {
            methods: graphs.len(),
            elapsed_ms,
            ..Default::default()
        };
        for graph in graphs {
            match graph {
                Ok(cfg) => {
                    stats.blocks += cfg.len();
                    stats.instructions += cfg.instruction_count();
                    stats.links += cfg.links().len();
                    for (kind, count) in cfg.instruction_histogram() {
                        *stats.histogram.entry(kind).or_insert(0) += count;
                    }
                }
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// CFG Lowering UseCase Trait
pub trait CfgLoweringUseCase: Send + Sync {
    /// Lower one method body
    fn lower_method(&self, method: &MethodDef) -> Result<Cfg>;

    /// Lower independent methods; a failing method does not affect the others
    fn lower_unit(&self, methods: &[MethodDef]) -> LowerUnitOutput;
}

/// CFG Lowering UseCase Implementation
pub struct CfgLoweringUseCaseImpl {
    table: Arc<dyn SymbolTable>,
    config: LoweringConfig,
    pool: Option<rayon::ThreadPool>,
}

impl CfgLoweringUseCaseImpl {
    /// Validates `config` and sets up the worker pool it asks for
    ///
    /// `parallel.num_threads`: 0 uses rayon's global pool, 1 lowers
    /// sequentially, n builds a dedicated pool of n workers.
    pub fn new(table: Arc<dyn SymbolTable>, config: LoweringConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.parallel.num_threads {
            0 | 1 => None,
            threads => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("cfg-lower-{}", index))
                    .build()
                    .map_err(|err| ConfigError::ThreadPool(err.to_string()))?,
            ),
        };
        Ok(Self { table, config, pool })
    }

    pub fn with_defaults(table: Arc<dyn SymbolTable>) -> Self {
        Self {
            table,
            config: LoweringConfig::default(),
            pool: None,
        }
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    fn lower_all(&self, methods: &[MethodDef]) -> Vec<Result<Cfg>> {
        let lower = |method: &MethodDef| build_cfg(method, self.table.as_ref(), &self.config);
        if self.config.parallel.num_threads == 1 || !cfg!(feature = "parallel") {
            return methods.iter().map(lower).collect();
        }
        match &self.pool {
            Some(pool) => pool.install(|| methods.par_iter().map(lower).collect()),
            None => methods.par_iter().map(lower).collect(),
        }
    }
}

impl CfgLoweringUseCase for CfgLoweringUseCaseImpl {
    fn lower_method(&self, method: &MethodDef) -> Result<Cfg> {
        build_cfg(method, self.table.as_ref(), &self.config)
    }

    fn lower_unit(&self, methods: &[MethodDef]) -> LowerUnitOutput {
        let start = Instant::now();
        let graphs = self.lower_all(methods);
        let stats = LoweringStats::from_graphs(&graphs, start.elapsed().as_millis() as u64);

        for (method, graph) in methods.iter().zip(&graphs) {
            if let Err(err) = graph {
                tracing::warn!(
                    method = %self.table.name_text(method.name),
                    error = %err,
                    "method abandoned"
                );
            }
        }
        tracing::debug!(
            methods = stats.methods,
            failed = stats.failed,
            blocks = stats.blocks,
            elapsed_ms = stats.elapsed_ms,
            "lowered unit"
        );

        LowerUnitOutput { graphs, stats }
    }
}
