//! Benchmarks for passage rendering.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use tale_renderer::Session;
use tale_state::StateManager;

/// Passage with `sections` conditional blocks, each holding a loop.
fn generate_passage(sections: usize, items: usize) -> String {
    let mut text = String::with_capacity(sections * 200);
    text.push_str("# Chapter\n\n::set{key=gold value=12}\n\n");
    for i in 0..sections {
        text.push_str(&format!(":::if[gold > {i}]\n"));
        text.push_str(&format!("Section {i} has **gold** :show[gold].\n\n"));
        text.push_str(&format!("::::for[x in {items}]\n- item :show[x]\n::::\n"));
        text.push_str(":::else\nNothing here.\n:::\n\n");
    }
    text
}

fn session() -> Session {
    let state = json!({"player": {"name": "Ada", "hp": 7}});
    Session::new(StateManager::with_data(
        state.as_object().cloned().unwrap_or_default(),
    ))
}

fn bench_render_simple(c: &mut Criterion) {
    let mut session = session();
    c.bench_function("render_simple_passage", |b| {
        b.iter(|| session.render_passage("Hello :show[player.name], you have :show[player.hp] hp."));
    });
}

fn bench_render_varying_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_by_size");

    for (sections, items) in [(5, 2), (20, 3), (50, 5)] {
        let passage = generate_passage(sections, items);
        group.throughput(Throughput::Bytes(passage.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("passage", format!("{sections}s_{items}i")),
            &passage,
            |b, passage| {
                let mut session = session();
                b.iter(|| session.render_passage(passage));
            },
        );
    }

    group.finish();
}

fn bench_watcher_ticks(c: &mut Criterion) {
    let mut session = session();
    session.render_passage(":::effect{watch=gold}\n::increment{key=spent}\n:::");
    let mut gold = 0;

    c.bench_function("watcher_tick", |b| {
        b.iter(|| {
            gold += 1;
            let _ = session.set_input("gold", json!(gold));
            session.tick()
        });
    });
}

criterion_group!(
    benches,
    bench_render_simple,
    bench_render_varying_sizes,
    bench_watcher_ticks
);
criterion_main!(benches);
