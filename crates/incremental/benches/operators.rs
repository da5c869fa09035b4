//! Benchmarks for ripple-incremental operators.
//!
//! Target: one add through a sorted, paged pipeline over 10k items < 50μs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{Change, ChangeSet, PageRequest};
use ripple_incremental::{window_changes, ListStreamExt, Pager, SortComparer, Sorter};
use ripple_reactive::SourceList;

fn shuffled(size: u64) -> Vec<u64> {
    // Multiplicative hash keeps the order deterministic.
    (0..size).map(|i| i.wrapping_mul(2_654_435_761) % 1_000_003).collect()
}

fn bench_sort_initial(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/initial");

    for size in [100, 1_000, 10_000] {
        let items = ChangeSet::initial(shuffled(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                let mut sorter = Sorter::new(SortComparer::ascending(|x: &u64| *x));
                black_box(sorter.process(items))
            })
        });
    }

    group.finish();
}

fn bench_sort_single_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/single_add");

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut sorter = Sorter::new(SortComparer::ascending(|x: &u64| *x));
            let _ = sorter.process(&ChangeSet::initial(shuffled(size)));
            let add = ChangeSet::from_changes(vec![Change::Add {
                item: 500_000,
                index: 0,
            }]);
            let remove = ChangeSet::from_changes(vec![Change::Remove {
                item: 500_000,
                index: 0,
            }]);
            b.iter(|| {
                black_box(sorter.process(&add));
                black_box(sorter.process(&remove));
            })
        });
    }

    group.finish();
}

fn bench_window_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("page/window_changes");

    for size in [10, 50, 100] {
        let old: Vec<u64> = (0..size).collect();
        let shifted: Vec<u64> = (1..=size).collect();
        group.bench_with_input(BenchmarkId::new("shift_by_one", size), &size, |b, _| {
            b.iter(|| window_changes(black_box(&old), black_box(&shifted)))
        });
    }

    group.finish();
}

fn bench_pager_turn_page(c: &mut Criterion) {
    c.bench_function("page/turn_page", |b| {
        let mut pager = Pager::new();
        let _ = pager.apply_changes(&ChangeSet::initial((0..10_000u64).collect()));
        let first = PageRequest::new(1, 50).unwrap();
        let second = PageRequest::new(2, 50).unwrap();
        b.iter(|| {
            black_box(pager.apply_request(first));
            black_box(pager.apply_request(second));
        })
    });
}

fn bench_pipeline_add(c: &mut Criterion) {
    c.bench_function("pipeline/sort_page_add_remove", |b| {
        let source = SourceList::with_items(shuffled(10_000));
        let _sub = source
            .connect()
            .sort(SortComparer::ascending(|x: &u64| *x))
            .page_with(PageRequest::new(1, 25).unwrap())
            .subscribe(|page| {
                black_box(page.items().len());
            });
        b.iter(|| {
            source.add(black_box(0));
            source.remove_at(10_000).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_sort_initial,
    bench_sort_single_add,
    bench_window_changes,
    bench_pager_turn_page,
    bench_pipeline_add,
);

criterion_main!(benches);
