use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use figload::record::{Document, PortRef, Record};
use figload::{Canvas, Reader, ReaderConfig};
use std::hint::black_box;

/// `nodes` rectangles on a grid, a chain through them, and `extra_edges`
/// long-range connections that cross the chain.
fn grid_document(nodes: usize, extra_edges: usize, reversed: bool) -> Document {
    let mut records = Vec::with_capacity(nodes * 2 + extra_edges);
    let columns = (nodes as f32).sqrt().ceil().max(1.0) as usize;
    for i in 0..nodes {
        records.push(
            Record::new("Rectangle", &format!("N{i}"))
                .with("x", (i % columns) as f32 * 120.0)
                .with("y", (i / columns) as f32 * 80.0)
                .with("width", 60)
                .with("height", 40),
        );
    }
    for i in 0..nodes.saturating_sub(1) {
        records.push(connection(&format!("E{i}"), i, i + 1));
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 2)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            records.push(connection(&format!("X{count}"), j, i));
            count += 1;
        }
    }
    if reversed {
        records.reverse();
    }
    Document::from_records(records)
}

fn connection(id: &str, from: usize, to: usize) -> Record {
    Record::new("Connection", id)
        .with("source", PortRef::new(&format!("N{from}"), "output0"))
        .with("target", PortRef::new(&format!("N{to}"), "input0"))
}

fn bench_unmarshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("unmarshal");
    let reader = Reader::new();
    for (nodes, extra_edges) in [(20usize, 20usize), (80, 120), (200, 400)] {
        let document = grid_document(nodes, extra_edges, false);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("grid_{nodes}_{extra_edges}")),
            &document,
            |b, document| {
                b.iter(|| {
                    let mut canvas = Canvas::new();
                    let figures = reader
                        .unmarshal(&mut canvas, black_box(document.clone()))
                        .expect("load failed");
                    black_box(figures.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_forward_references(c: &mut Criterion) {
    let mut group = c.benchmark_group("unmarshal_forward_references");
    let deferring = Reader::new();
    let first_pass_only = Reader::new()
        .with_config(ReaderConfig {
            defer_forward_references: false,
            ..ReaderConfig::default()
        })
        .expect("config rejected");
    for (nodes, extra_edges) in [(40usize, 60usize), (120, 240)] {
        let document = grid_document(nodes, extra_edges, true);
        let name = format!("reversed_{nodes}_{extra_edges}");
        for (mode, reader) in [("deferred", &deferring), ("first_pass", &first_pass_only)] {
            group.bench_with_input(BenchmarkId::new(mode, &name), &document, |b, document| {
                b.iter(|| {
                    let mut canvas = Canvas::new();
                    let report = reader
                        .unmarshal_with_report(&mut canvas, black_box(document.clone()))
                        .expect("load failed");
                    black_box(report.diagnostics.len());
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_unmarshal, bench_forward_references);
criterion_main!(benches);
