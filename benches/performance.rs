//! Performance benchmarks for turtle-signals
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use turtle_signals::cache::PriceCache;
use turtle_signals::data::{PriceSource, SyntheticSource};
use turtle_signals::indicators::{atr14, donchian55_high, ma200};
use turtle_signals::scan::Scanner;
use turtle_signals::storage::ScanTrigger;
use turtle_signals::{compute_turtle_indicators, generate_signals, ScanConfig, Ticker};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap_or_default()
}

fn benchmark_indicators(c: &mut Criterion) {
    let bars = SyntheticSource::default()
        .fetch_history(&Ticker::new("BENCH"), as_of(), 400)
        .expect("synthetic bars");

    let mut group = c.benchmark_group("indicators");
    group.bench_function("atr14", |b| b.iter(|| atr14(black_box(&bars))));
    group.bench_function("donchian55_high", |b| b.iter(|| donchian55_high(black_box(&bars))));
    group.bench_function("ma200", |b| b.iter(|| ma200(black_box(&bars))));
    group.bench_function("turtle_set", |b| {
        b.iter(|| compute_turtle_indicators(black_box(&bars)))
    });
    group.finish();
}

fn benchmark_signals(c: &mut Criterion) {
    let ticker = Ticker::new("BENCH");
    let bars = SyntheticSource::default()
        .fetch_history(&ticker, as_of(), 400)
        .expect("synthetic bars");
    let config = ScanConfig::default();

    c.bench_function("generate_signals", |b| {
        b.iter(|| generate_signals(black_box(&ticker), black_box(&bars), &config))
    });
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    group.sample_size(20);

    for size in [50usize, 500] {
        let tickers: Vec<Ticker> = (0..size).map(|i| Ticker::new(format!("T{:04}", i))).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &tickers, |b, tickers| {
            b.iter(|| {
                let mut scanner =
                    Scanner::new(SyntheticSource::default(), PriceCache::default(), ScanConfig::default());
                scanner.scan(tickers, as_of(), ScanTrigger::Manual, None)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_indicators, benchmark_signals, benchmark_scan);
criterion_main!(benches);
