//! # Store Benchmark
//!
//! Measures:
//! - Entity creation plus component attach (group migration cost)
//! - View passes over mixed signatures
//! - Indexed view vs linear signature scan
//!
//! Run with: `cargo bench --package sigil_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sigil_core::{EntityId, Store, StoreConfig};

const ENTITY_COUNT: u32 = 100_000;

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy)]
struct Transform {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy)]
struct Health {
    hp: i32,
}

fn new_store(count: u32) -> Store {
    let mut store = Store::new(StoreConfig {
        max_entities: count,
        dense_capacity_hint: count as usize,
        ..StoreConfig::default()
    })
    .unwrap();
    store.register_component::<Velocity>().unwrap();
    store.register_component::<Transform>().unwrap();
    store.register_component::<Health>().unwrap();
    store
}

/// Three signatures: {Vel, Tr}, {Vel, Tr, H} and {Tr}.
fn populated_store(count: u32) -> Store {
    let mut store = new_store(count);
    for i in 0..count {
        let e = store.create_entity().unwrap();
        store.attach(e, Transform { x: 0.0, y: 0.0 }).unwrap();
        if i % 4 != 0 {
            store.attach(e, Velocity { dx: 1.0, dy: 0.5 }).unwrap();
        }
        if i % 2 == 0 {
            store.attach(e, Health { hp: 100 }).unwrap();
        }
    }
    store
}

/// Benchmark: create entities and attach two components each.
fn bench_create_and_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_and_attach");

    for count in [1_000, 10_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut store = new_store(count);
                for _ in 0..count {
                    let e = store.create_entity().unwrap();
                    store.attach(e, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
                    store.attach(e, Transform { x: 0.0, y: 0.0 }).unwrap();
                }
                black_box(store.alive_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: one movement pass over the populated store.
fn bench_view_pass(c: &mut Criterion) {
    let mut store = populated_store(ENTITY_COUNT);
    let view = store.view::<(Velocity, Transform)>().unwrap();

    c.bench_function("view_pass_velocity_transform_100K", |b| {
        b.iter(|| {
            view.for_each(&mut store, |(vel, tr): (&mut Velocity, &mut Transform)| {
                tr.x += vel.dx;
                tr.y += vel.dy;
            })
            .unwrap();
        });
    });
}

/// Benchmark: indexed view entity listing vs linear scan.
fn bench_index_vs_scan(c: &mut Criterion) {
    let store = populated_store(ENTITY_COUNT);
    let view = store.view::<(Velocity, Transform, Health)>().unwrap();

    c.bench_function("indexed_entities_100K", |b| {
        b.iter(|| black_box(view.entities(&store).unwrap().len()));
    });
    c.bench_function("linear_scan_100K", |b| {
        b.iter(|| black_box(store.scan_matching(view.signature()).len()));
    });
}

/// Benchmark: random get lookups.
fn bench_component_access(c: &mut Criterion) {
    let store = populated_store(ENTITY_COUNT);
    let mut state = 0x2545_F491_u32;
    let ids: Vec<EntityId> = (0..10_000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            EntityId::new(state % ENTITY_COUNT)
        })
        .collect();

    c.bench_function("random_get_health_10K", |b| {
        b.iter(|| {
            let mut total = 0i64;
            for &e in &ids {
                if let Ok(Some(health)) = store.get::<Health>(e) {
                    total += i64::from(health.hp);
                }
            }
            black_box(total)
        });
    });
}

criterion_group!(
    benches,
    bench_create_and_attach,
    bench_view_pass,
    bench_index_vs_scan,
    bench_component_access,
);

criterion_main!(benches);
