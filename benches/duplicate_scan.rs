use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_overwrite::{
    dataset::{self, LoadOptions},
    duplicates::analyze,
    reconcile::reconcile,
};

fn generate_orders(rows: usize) -> Vec<u8> {
    let mut csv = String::from("id,status,amount,ordered_at\n");
    for i in 0..rows {
        // every tenth row repeats its predecessor
        let id = if i % 10 == 9 { i - 1 } else { i };
        let status = match id % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (id % 28) + 1;
        csv.push_str(&format!("{id},{status},{}.50,2024-01-{day:02}\n", id % 500));
    }
    csv.into_bytes()
}

fn bench_duplicate_scan(c: &mut Criterion) {
    let bytes = generate_orders(50_000);
    let loaded = dataset::load(&bytes, &LoadOptions::default()).expect("load orders");
    assert_eq!(analyze(&loaded).duplicates, 5_000);
    let target = ["ORDERED_AT", "ID", "AMOUNT", "STATUS"]
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    c.bench_function("load_50k_rows", |b| {
        b.iter(|| dataset::load(&bytes, &LoadOptions::default()).expect("load"))
    });

    c.bench_function("reconcile_and_analyze_50k_rows", |b| {
        b.iter_batched(
            || loaded.clone(),
            |data| {
                let aligned = reconcile(&data, &target).expect("reconcile");
                analyze(&aligned)
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_duplicate_scan);
criterion_main!(benches);
