//! Unit-level lowering, dumps and configuration
//!
//! Exercises the use case the checker calls (parallel and sequential), the
//! text/dot/JSON dumps, and YAML configuration loading.

mod common;

use common::*;
use gradual_cfg::config::{ConfigError, LoweringConfig, Validatable};
use gradual_cfg::features::ast::{mk, MethodDef};
use gradual_cfg::features::cfg::{
    BlockRole, CfgDump, CfgLoweringUseCase, CfgLoweringUseCaseImpl, InstructionKind,
};
use gradual_cfg::shared::models::{AnnotationPos, Span};
use gradual_cfg::{LoweringError, SymbolTable};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// A spread of shapes, plus one method that breaks an invariant
fn sample_unit(fx: &Fixture) -> Vec<MethodDef> {
    let x = fx.local("x");
    let mut methods = Vec::new();
    for index in 0..12 {
        let body = match index % 4 {
            0 => mk::if_(fx.var("a"), mk::int(index), Some(fx.call("other", vec![]))),
            1 => mk::ins_seq(
                vec![
                    mk::assign(x, mk::int(0)),
                    mk::while_(fx.var("x"), mk::assign(x, fx.call("step", vec![fx.var("x")]))),
                ],
                fx.var("x"),
            ),
            2 => mk::send_with_closure(
                fx.var("a"),
                fx.name("map"),
                vec![],
                mk::closure(vec![fx.param("item")], fx.call("wrap", vec![fx.var("item")])),
            ),
            _ => mk::rescue(
                fx.call("risky", vec![]),
                vec![mk::rescue_clause(vec![], Some(fx.local("e")), fx.var("e"))],
                None,
                Some(fx.call("cleanup", vec![])),
            ),
        };
        methods.push(fx.method(&format!("m{}", index), vec![fx.param("a")], body));
    }
    methods.push(fx.method("broken", vec![], mk::rescue(mk::nil(), vec![], None, None)));
    methods
}

fn use_case(fx: &Fixture, threads: usize) -> CfgLoweringUseCaseImpl {
    let table: Arc<dyn SymbolTable> = fx.table.clone();
    CfgLoweringUseCaseImpl::new(table, LoweringConfig::default().num_threads(threads)).expect("valid config")
}

// ============================================================================
// Use case
// ============================================================================

#[test]
fn test_lower_unit_keeps_input_order_and_isolates_failures() {
    let fx = Fixture::new();
    let methods = sample_unit(&fx);
    let output = use_case(&fx, 2).lower_unit(&methods);

    assert_eq!(output.graphs.len(), methods.len());
    assert_eq!(output.stats.methods, methods.len());
    assert_eq!(output.stats.failed, 1);
    for (method, graph) in methods.iter().zip(&output.graphs[..12]) {
        let cfg = graph.as_ref().expect("lowered");
        assert_eq!(cfg.method(), method.name);
        assert_well_formed(cfg, fx.table.as_ref());
    }
    assert!(matches!(
        output.graphs.last(),
        Some(Err(LoweringError::InvariantViolation { .. }))
    ));
}

#[test]
fn test_parallel_matches_sequential() {
    let fx = Fixture::new();
    let methods = sample_unit(&fx);
    let render = |threads: usize| -> Vec<String> {
        use_case(&fx, threads)
            .lower_unit(&methods)
            .graphs
            .iter()
            .map(|graph| match graph {
                Ok(cfg) => fx.text(cfg),
                Err(err) => err.to_string(),
            })
            .collect()
    };

    let sequential = render(1);
    assert_eq!(render(0), sequential);
    assert_eq!(render(4), sequential);
}

#[test]
fn test_stats_sum_over_successful_methods() {
    let fx = Fixture::new();
    let methods = sample_unit(&fx);
    let output = use_case(&fx, 1).lower_unit(&methods);

    let graphs: Vec<_> = output.graphs.iter().filter_map(|g| g.as_ref().ok()).collect();
    assert_eq!(output.stats.blocks, graphs.iter().map(|g| g.len()).sum::<usize>());
    assert_eq!(
        output.stats.instructions,
        graphs.iter().map(|g| g.instruction_count()).sum::<usize>()
    );
    assert_eq!(output.stats.links, 3);
    assert_eq!(output.stats.histogram.get(&InstructionKind::SolveConstraint), Some(&3));
    assert_eq!(
        output.stats.histogram.values().sum::<usize>(),
        output.stats.instructions
    );
}

#[test]
fn test_lower_method_matches_build() {
    let fx = Fixture::new();
    let method = fx.method("foo", vec![], mk::self_());
    let cfg = use_case(&fx, 1).lower_method(&method).expect("lowered");
    assert_eq!(fx.text(&cfg), fx.text(&fx.lower(&method)));
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let fx = Fixture::new();
    let table: Arc<dyn SymbolTable> = fx.table.clone();
    let result = CfgLoweringUseCaseImpl::new(table, LoweringConfig::default().max_nesting_depth(0));
    assert!(matches!(
        result,
        Err(LoweringError::Config(ConfigError::Range { .. }))
    ));
}

#[test]
fn test_verifier_can_be_switched_off() {
    let fx = Fixture::new().with_config(LoweringConfig::default().verify_after_build(false));
    let cfg = fx.lower(&fx.method("foo", vec![], mk::int(1)));
    assert_eq!(cfg.len(), 1);
}

// ============================================================================
// Dumps
// ============================================================================

#[test]
fn test_dot_marks_closures_and_exits() {
    let fx = Fixture::new();
    let body = mk::send_with_closure(mk::self_(), fx.name("each"), vec![], mk::closure(vec![], mk::nil()));
    let cfg = fx.lower(&fx.method("foo", vec![], body));
    let dot = cfg.to_dot(fx.table.as_ref());

    assert!(dot.starts_with("digraph \"Foo#foo\" {"), "{dot}");
    assert!(dot.contains("style=dashed"), "{dot}");
    assert!(dot.contains("peripheries=2"), "{dot}");
    assert!(dot.contains("bb1 -> bb2 [label=\"then\"]"), "{dot}");
    assert!(dot.contains("bb1 -> bb3 [label=\"else\"]"), "{dot}");
    assert!(dot.contains("bb2 -> bb1 [label=\"jump\"]"), "{dot}");
    assert!(dot.contains("\\<blockCall\\>"), "{dot}");
}

#[test]
fn test_json_dump_roundtrips() {
    let fx = Fixture::new();
    let body = mk::send_with_closure(
        mk::self_(),
        fx.name("each"),
        vec![],
        mk::closure(vec![fx.param("x")], fx.var("x")),
    );
    let cfg = fx.lower(&fx.method("foo", vec![], body));
    let dump = cfg.dump(fx.table.as_ref());

    assert_eq!(dump.method, "Foo#foo");
    assert_eq!(dump.entry, 0);
    assert_eq!(dump.exits, vec![4]);
    assert_eq!(dump.links.len(), 1);
    assert_eq!(dump.links[0].fun, "each");
    assert_eq!(dump.links[0].arity, 1);
    assert_eq!(dump.blocks[2].role, BlockRole::ClosureBody);
    assert_eq!(dump.blocks[1].successors, vec![2, 3]);
    assert_eq!(dump.blocks[1].predecessors, vec![0, 2]);

    let json = dump.to_json().expect("serialize");
    assert!(json.contains("\"closure_body\""));
    assert_eq!(CfgDump::from_json(&json).expect("deserialize"), dump);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_yaml_config_drives_the_builder() {
    let yaml = "\
version: 1
lowering:
  max_nesting_depth: 2
  debug_annotations:
    - { line: 1, column: 0 }
  parallel:
    num_threads: 1
";
    let config = LoweringConfig::from_yaml_str(yaml).expect("valid yaml");
    assert_eq!(config.max_nesting_depth, 2);
    assert!(config.verify_after_build);
    assert_eq!(config.debug_annotations, vec![AnnotationPos::new(1, 0)]);
    assert!(config.validate().is_ok());

    let fx = Fixture::new().with_config(config);
    let body = mk::ins_seq(vec![], mk::array(vec![mk::array(vec![mk::int(1)])]).at(Span::line(1)));
    let cfg = fx.lower(&fx.method("foo", vec![], body));
    assert_eq!(count_kind(&cfg, InstructionKind::DebugEnvironment), 1);
    assert_eq!(count_kind(&cfg, InstructionKind::NotSupported), 1);
}

#[test]
fn test_yaml_rejects_unknown_version_and_fields() {
    assert!(matches!(
        LoweringConfig::from_yaml_str("version: 7\n"),
        Err(ConfigError::UnsupportedVersion { found: 7, .. })
    ));
    assert!(matches!(
        LoweringConfig::from_yaml_str("version: 1\nlowering:\n  max_depth: 3\n"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        LoweringConfig::from_yaml_str("version: 1\nlowering:\n  parallel:\n    num_threads: 5000\n"),
        Err(ConfigError::Range { .. })
    ));
}

#[test]
fn test_yaml_file_roundtrip() {
    let path = std::env::temp_dir().join(format!("gradual-cfg-{}.yaml", std::process::id()));
    let config = LoweringConfig::default()
        .max_nesting_depth(64)
        .annotate(AnnotationPos::new(3, 1));
    std::fs::write(&path, config.to_yaml().expect("serialize")).expect("write");

    let loaded = LoweringConfig::from_yaml_file(&path);
    let _ = std::fs::remove_file(&path);
    assert_eq!(loaded.expect("load"), config);
}
