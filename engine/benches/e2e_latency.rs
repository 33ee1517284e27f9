// End-to-end component latency benchmarks
//
// Tests:
// - Frame parsing (zero-copy deserialization)
// - Command dispatch through the book
// - Full frame-to-applied path

use common::{OrderType, Side};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine::order_book::Orderbook;
use engine::protocol::{OrderFrame, ORDER_FRAME_SIZE};
use engine::telemetry::Telemetry;
use std::sync::Arc;

/// Benchmark frame parsing (zero-copy deserialization)
fn bench_frame_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("e2e_frame_parsing");

    let frame = OrderFrame::new(OrderType::Limit, Side::Bid, 12345, 10050, 100, 7);
    let bytes = frame.as_bytes();

    group.bench_function("parse_frame", |b| {
        b.iter(|| {
            let parsed = OrderFrame::from_bytes(black_box(bytes));
            black_box(parsed)
        });
    });

    group.bench_function("parse_and_decode", |b| {
        b.iter(|| {
            let cmd = OrderFrame::from_bytes(black_box(bytes)).and_then(OrderFrame::decode);
            black_box(cmd)
        });
    });

    group.finish();
}

/// Benchmark the full frame-to-applied path
fn bench_frame_to_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("e2e_apply");

    group.bench_function("decode_and_apply_limit", |b| {
        let mut book = Orderbook::new(Arc::new(Telemetry::new()));
        let mut order_id = 1u64;
        let mut buf = [0u8; ORDER_FRAME_SIZE];
        b.iter(|| {
            let frame = OrderFrame::new(
                OrderType::Limit,
                Side::Bid,
                black_box(order_id),
                black_box(10000),
                black_box(100),
                7,
            );
            buf.copy_from_slice(frame.as_bytes());

            let parsed = OrderFrame::from_bytes(black_box(&buf)).expect("exact frame");
            let cmd = parsed.decode().expect("valid frame");
            book.apply(&cmd);
            order_id += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_frame_parsing, bench_frame_to_book);
criterion_main!(benches);
