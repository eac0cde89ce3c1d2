use criterion::{black_box, criterion_group, criterion_main, Criterion};
use matchbook::book::Book;
use matchbook::order::{Order, OrderType, Side};

fn bench_sweep_resting_bids(c: &mut Criterion) {
    c.bench_function("Book::add sweeping 1k resting bids over 50 levels", |b| {
        b.iter(|| {
            let mut book = Book::new();
            for i in 0u64..1_000 {
                book.add(Order::new(
                    OrderType::GoodTillCancel,
                    i,
                    Side::Buy,
                    1_000 + (i % 50) as i64,
                    10,
                ));
            }
            let trades = book.add(Order::new(
                OrderType::GoodTillCancel,
                1_000_000,
                Side::Sell,
                1_000,
                10_000,
            ));
            black_box(trades);
        });
    });
}

criterion_group!(benches, bench_sweep_resting_bids);
criterion_main!(benches);
