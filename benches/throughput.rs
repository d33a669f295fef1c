//! Throughput benchmarks

use chrono::Local;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use termline_core::core::transport::pair;
use termline_core::{
    AutoAction, AutoActionSettings, ByteDecoder, Direction, DisplaySettings, Origin, Pipeline,
    Radix, Terminal, TerminalSettings, TriggerSettings,
};

fn capture(lines: usize) -> Vec<u8> {
    (0..lines)
        .flat_map(|i| format!("sensor {} reading {} ERROR: {}\r\n", i % 8, i, i % 13).into_bytes())
        .collect()
}

fn decode_benchmark(c: &mut Criterion) {
    let data = capture(64);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for radix in [Radix::String, Radix::Hex, Radix::Unicode] {
        group.bench_function(radix.name(), |b| {
            let mut decoder = ByteDecoder::new(DisplaySettings {
                radix,
                ..Default::default()
            });
            let now = Local::now();
            b.iter(|| {
                let elements = decoder.decode(Direction::Rx, Origin::Remote, black_box(&data), now);
                black_box(elements)
            })
        });
    }

    group.finish();
}

fn pipeline_benchmark(c: &mut Criterion) {
    let data = capture(64);

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("assemble", |b| {
        let mut pipeline = Pipeline::new(&TerminalSettings::default(), "bench", Local::now()).unwrap();
        b.iter(|| {
            let out = pipeline.ingest(Direction::Rx, Origin::Remote, black_box(&data), Local::now());
            black_box(out)
        })
    });

    group.bench_function("regex_trigger", |b| {
        let settings = TerminalSettings::default().with_auto_action(AutoActionSettings::new(
            TriggerSettings::text(r"ERROR:\s+1\d").regex(true),
            AutoAction::Highlight,
        ));
        let mut pipeline = Pipeline::new(&settings, "bench", Local::now()).unwrap();
        b.iter(|| {
            let out = pipeline.ingest(Direction::Rx, Origin::Remote, black_box(&data), Local::now());
            black_box(out)
        })
    });

    group.finish();
}

fn terminal_benchmark(c: &mut Criterion) {
    let data = capture(256);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("terminal");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("loopback", |b| {
        b.to_async(&runtime).iter(|| async {
            let (transport, remote) = pair("bench");
            let mut terminal = Terminal::new(TerminalSettings::default()).unwrap();
            terminal.start(Box::new(transport)).unwrap();
            remote.inject(data.clone());
            remote.close();
            let snapshot = terminal.wait().await.unwrap();
            black_box(snapshot)
        })
    });

    group.finish();
}

criterion_group!(benches, decode_benchmark, pipeline_benchmark, terminal_benchmark);
criterion_main!(benches);
