//! Lowering benchmarks
//!
//! - Straight-line bodies: per-instruction cost of the walk
//! - Nested loops and closures: block merging and finalize
//! - Whole units: rayon scaling across methods

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gradual_cfg::features::ast::{mk, Expr, LocalRef, MethodDef};
use gradual_cfg::features::cfg::{build_cfg, CfgLoweringUseCase, CfgLoweringUseCaseImpl};
use gradual_cfg::{InMemorySymbolTable, LoweringConfig, SymbolTable};
use std::sync::Arc;

fn straight_line(table: &InMemorySymbolTable, statements: usize) -> MethodDef {
    let x = LocalRef::new(table.enter_name("x"));
    let add = table.enter_name("+");
    let stats = (0..statements)
        .map(|i| mk::assign(x, mk::send(mk::local(x), add, vec![mk::int(i as i64)])))
        .collect();
    let body = mk::ins_seq(vec![mk::assign(x, mk::int(0))], mk::ins_seq(stats, mk::local(x)));
    mk::method(table.enter_name("sum"), table.enter_symbol("Bench"), vec![], body)
}

/// `depth` nested `while` loops, each wrapping a closure call
fn nested_control(table: &InMemorySymbolTable, depth: usize) -> MethodDef {
    let x = LocalRef::new(table.enter_name("x"));
    let each = table.enter_name("each");
    let mut body: Expr = mk::assign(x, mk::int(1));
    for level in 0..depth {
        let param = LocalRef {
            name: table.enter_name("item"),
            unique: level as u32 + 1,
        };
        let call = mk::send_with_closure(
            mk::local(x),
            each,
            vec![],
            mk::closure(vec![mk::param(param)], mk::ins_seq(vec![body], mk::local(param))),
        );
        body = mk::while_(mk::local(x), mk::if_(mk::local(x), call, Some(mk::break_(None))));
    }
    mk::method(table.enter_name("nested"), table.enter_symbol("Bench"), vec![], body)
}

// ============================================================================
// Single methods
// ============================================================================

fn bench_straight_line(c: &mut Criterion) {
    let table = InMemorySymbolTable::new();
    let config = LoweringConfig::default();
    let mut group = c.benchmark_group("straight_line");

    for statements in [10usize, 100, 1_000] {
        let method = straight_line(&table, statements);
        group.throughput(Throughput::Elements(statements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(statements), &method, |b, method| {
            b.iter(|| black_box(build_cfg(black_box(method), &table, &config)))
        });
    }

    group.finish();
}

fn bench_nested_control(c: &mut Criterion) {
    let table = InMemorySymbolTable::new();
    let mut group = c.benchmark_group("nested_control");

    for depth in [2usize, 8, 32] {
        let method = nested_control(&table, depth);
        for verify in [false, true] {
            let config = LoweringConfig::default().verify_after_build(verify);
            let id = BenchmarkId::new(if verify { "verified" } else { "unverified" }, depth);
            group.bench_with_input(id, &method, |b, method| {
                b.iter(|| black_box(build_cfg(black_box(method), &table, &config)))
            });
        }
    }

    group.finish();
}

// ============================================================================
// Units
// ============================================================================

fn bench_unit(c: &mut Criterion) {
    let table = Arc::new(InMemorySymbolTable::new());
    let methods: Vec<MethodDef> = (0..256)
        .map(|i| if i % 2 == 0 { straight_line(&table, 50) } else { nested_control(&table, 4) })
        .collect();
    let mut group = c.benchmark_group("unit");
    group.throughput(Throughput::Elements(methods.len() as u64));

    for threads in [1usize, 0] {
        let shared: Arc<dyn SymbolTable> = table.clone();
        let use_case = CfgLoweringUseCaseImpl::new(shared, LoweringConfig::default().num_threads(threads))
            .expect("valid config");
        let label = if threads == 1 { "sequential" } else { "rayon" };
        group.bench_function(label, |b| b.iter(|| black_box(use_case.lower_unit(black_box(&methods)))));
    }

    group.finish();
}

criterion_group!(benches, bench_straight_line, bench_nested_control, bench_unit);
criterion_main!(benches);
