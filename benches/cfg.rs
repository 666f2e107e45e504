#![allow(unused)]
extern crate regscope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use regscope::ir::{InsnArg, InsnNode, JumpRecord, Opcode, RawMethod, TryRange};
use regscope::pipeline::{process_batch, process_method};
use regscope::types::{TypeHierarchy, TypeRef};
use std::hint::black_box;

/// Builds a method shaped like a long if/else ladder: `rungs` conditional
/// branches, each with its own join, ending in a single return.
fn ladder_method(rungs: u32) -> RawMethod {
    let mut instructions = Vec::new();
    let mut jumps = Vec::new();
    for rung in 0..rungs {
        let base = rung * 3;
        // if -> skip over the rung body
        instructions.push(Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])));
        jumps.push(JumpRecord::new(base, base + 2));
        instructions.push(Some(
            InsnNode::new(Opcode::Const, vec![InsnArg::lit_int(i64::from(rung))]).with_result(1),
        ));
        instructions.push(Some(InsnNode::new(Opcode::Nop, vec![])));
    }
    instructions.push(Some(InsnNode::new(Opcode::Return, vec![])));
    RawMethod {
        instructions,
        jumps,
        try_ranges: vec![],
        ret_type: None,
    }
}

/// Same ladder with every third rung wrapped in a try range targeting one
/// shared catch-all handler at the end.
fn guarded_ladder_method(rungs: u32) -> RawMethod {
    let mut raw = ladder_method(rungs);
    let ret_offset = u32::try_from(raw.instructions.len()).unwrap() - 1;
    raw.instructions.push(Some(
        InsnNode::new(Opcode::MoveException, vec![]).with_result(2),
    ));
    raw.instructions
        .push(Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(2)])));
    let handler = ret_offset + 1;
    for rung in (0..rungs).step_by(3) {
        let base = rung * 3;
        raw.try_ranges.push(TryRange {
            start: base + 1,
            end: base + 2,
            handlers: vec![(handler, Some(TypeRef::class("java.lang.Exception")))],
            catch_all: None,
        });
    }
    raw
}

fn throwables() -> TypeHierarchy {
    let types = TypeHierarchy::new();
    types.add_class("java.lang.Exception", Some("java.lang.Throwable"));
    types.add_class("java.lang.RuntimeException", Some("java.lang.Exception"));
    types
}

/// Benchmark the full per-method pipeline on branch-heavy methods.
fn bench_ladder(c: &mut Criterion) {
    let types = throwables();
    let mut group = c.benchmark_group("pipeline_ladder");
    for rungs in [16u32, 64, 256] {
        let raw = ladder_method(rungs);
        group.throughput(Throughput::Elements(u64::from(rungs)));
        group.bench_function(format!("rungs_{rungs}"), |b| {
            b.iter(|| {
                let result = process_method(black_box(raw.clone()), &types);
                black_box(result)
            });
        });
    }
    group.finish();
}

/// Benchmark exception region attachment on top of the same shapes.
fn bench_guarded_ladder(c: &mut Criterion) {
    let types = throwables();
    let mut group = c.benchmark_group("pipeline_guarded_ladder");
    for rungs in [16u32, 64, 256] {
        let raw = guarded_ladder_method(rungs);
        group.throughput(Throughput::Elements(u64::from(rungs)));
        group.bench_function(format!("rungs_{rungs}"), |b| {
            b.iter(|| {
                let result = process_method(black_box(raw.clone()), &types);
                black_box(result)
            });
        });
    }
    group.finish();
}

/// Benchmark batch scheduling across the worker pool.
fn bench_batch(c: &mut Criterion) {
    let types = throwables();
    let methods: Vec<RawMethod> = (0..64).map(|_| ladder_method(32)).collect();
    let mut group = c.benchmark_group("pipeline_batch");
    group.throughput(Throughput::Elements(methods.len() as u64));
    group.bench_function("methods_64", |b| {
        b.iter(|| {
            let results = process_batch(black_box(methods.clone()), &types);
            black_box(results)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_ladder, bench_guarded_ladder, bench_batch);
criterion_main!(benches);
