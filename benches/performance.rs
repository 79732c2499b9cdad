//! Performance benchmarks for the broker's hot paths.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mcp_broker::message::Message;
use mcp_broker::metrics::MetricsRegistry;
use mcp_broker::rate_limit::RateLimiter;
use mcp_broker::sse::{EventStore, SseEvent};

fn bench_message_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("message");
    group.throughput(Throughput::Elements(1));

    let small = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"read_file","arguments":{"path":"/tmp/test.txt"}}}"#;

    let large_args: serde_json::Value = serde_json::json!({
        "files": (0..100).map(|i| format!("/tmp/file_{}.txt", i)).collect::<Vec<_>>(),
        "options": {
            "recursive": true,
            "max_depth": 10,
            "follow_symlinks": false,
            "include_hidden": true
        }
    });
    let large = serde_json::to_string(&serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": "batch_read", "arguments": large_args }
    }))
    .unwrap();

    group.bench_function("decode/small", |b| {
        b.iter(|| black_box(Message::decode(black_box(small)).unwrap()));
    });

    group.bench_function("decode/large", |b| {
        b.iter(|| black_box(Message::decode(black_box(&large)).unwrap()));
    });

    let parsed = Message::decode(small).unwrap();
    group.bench_function("encode/small", |b| {
        b.iter(|| black_box(parsed.encode().unwrap()));
    });

    group.finish();
}

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");
    group.throughput(Throughput::Elements(1));

    let limiter = RateLimiter::new(1_000_000.0);
    group.bench_function("allow/enabled", |b| {
        b.iter(|| black_box(limiter.allow()));
    });

    let disabled = RateLimiter::new(0.0);
    group.bench_function("allow/disabled", |b| {
        b.iter(|| black_box(disabled.allow()));
    });

    group.finish();
}

fn bench_event_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_store");
    group.throughput(Throughput::Elements(1));

    for capacity in [100, 1000, 10_000] {
        let store = EventStore::new(capacity);
        for i in 0..capacity {
            store.add(SseEvent::new(i.to_string(), "message", "payload"));
        }

        group.bench_with_input(BenchmarkId::new("add_at_capacity", capacity), &capacity, |b, _| {
            let mut next = capacity as u64;
            b.iter(|| {
                store.add(SseEvent::new(next.to_string(), "message", "payload"));
                next += 1;
            });
        });

        group.bench_with_input(BenchmarkId::new("get_since", capacity), &capacity, |b, _| {
            let anchor = (capacity / 2).to_string();
            b.iter(|| black_box(store.get_since(black_box(&anchor))));
        });
    }

    group.finish();
}

fn bench_metrics_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    group.throughput(Throughput::Elements(1));

    let registry = MetricsRegistry::new();
    for i in 0..50 {
        registry.record_request(&format!("tool_{i}"), "ok", 0.01 * i as f64);
    }

    group.bench_function("write_prometheus", |b| {
        b.iter(|| black_box(registry.write_prometheus()));
    });

    group.finish();
}

criterion_group!(benches, bench_message_codec, bench_rate_limiter, bench_event_store, bench_metrics_render);
criterion_main!(benches);
