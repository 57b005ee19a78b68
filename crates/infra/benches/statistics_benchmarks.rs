use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use depot_core::{Money, ProductId, TransactionId};
use depot_infra::InMemoryLedgerStore;
use depot_infra::engine::{EngineSettings, InventoryEngine};
use depot_inventory::{
    DateWindow, MovementKind, MovementRequest, NewProduct, Product, Statistics, StockTransaction,
};
use std::sync::Arc;

fn sample_products(count: usize) -> Vec<Product> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            NewProduct {
                name: format!("Item {i}"),
                description: String::new(),
                price: Money::from_minor(100 + i as u64),
                quantity: (i % 25) as i64,
                unit: "pcs".to_string(),
                category: "bench".to_string(),
            }
            .into_product(ProductId::new(), now)
        })
        .collect()
}

fn sample_ledger(products: &[Product], count: usize) -> Vec<StockTransaction> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let product = &products[i % products.len()];
            StockTransaction {
                id: TransactionId::new(),
                product_id: product.id,
                kind: if i % 3 == 0 {
                    MovementKind::Out
                } else {
                    MovementKind::In
                },
                quantity: 1 + (i % 7) as i64,
                unit_price: product.price,
                // Spread over two months so half the ledger falls outside the window.
                date: base + Duration::minutes(i as i64 * 5),
                description: String::new(),
                created_at: base,
            }
        })
        .collect()
}

fn bench_statistics_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics_fold");
    let window = DateWindow::from_calendar_dates("2024-03-01", "2024-04-01").unwrap();
    let products = sample_products(500);

    for ledger_size in [100, 1_000, 10_000].iter() {
        let ledger = sample_ledger(&products, *ledger_size);
        group.throughput(Throughput::Elements(*ledger_size as u64));
        group.bench_with_input(
            BenchmarkId::new("compute", ledger_size),
            &ledger,
            |b, ledger| {
                b.iter(|| black_box(Statistics::compute(&window, &products, ledger)));
            },
        );
    }

    group.finish();
}

fn bench_movement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_latency");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    group.bench_function("inbound_in_memory", |b| {
        let engine = InventoryEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            EngineSettings::default(),
        );
        let product = rt
            .block_on(engine.create_product(NewProduct {
                name: "Bench".to_string(),
                description: String::new(),
                price: Money::from_minor(250),
                quantity: 0,
                unit: "pcs".to_string(),
                category: "bench".to_string(),
            }))
            .unwrap();

        b.iter(|| {
            let request = MovementRequest {
                product_id: product.id,
                kind: MovementKind::In,
                quantity: black_box(3),
                date: None,
                description: String::new(),
            };
            black_box(rt.block_on(engine.apply_transaction(request)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_statistics_fold, bench_movement_latency);
criterion_main!(benches);
