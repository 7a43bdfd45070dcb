//! Queue handoff benchmarks.

use criterion::{Criterion, criterion_group, criterion_main};
use fastmem_core::queue::{Link, Queue, QueueChain, QueueNode};

struct Item {
    value: u64,
    link: Link<Item>,
}

impl Item {
    fn boxed(value: u64) -> Box<Self> {
        Box::new(Self {
            value,
            link: Link::new(),
        })
    }
}

impl QueueNode for Item {
    fn next_link(&mut self) -> &mut Link<Self> {
        &mut self.link
    }
}

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop");

    let queue: Queue<Item> = Queue::new();
    group.bench_function("single", |b| {
        b.iter(|| {
            queue.push(Item::boxed(1));
            criterion::black_box(queue.try_pop());
        });
    });

    group.finish();
}

fn bench_batch_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_drain");

    let queue: Queue<Item> = Queue::new();
    group.bench_function("100_pop_all", |b| {
        b.iter(|| {
            for value in 0..100 {
                queue.push(Item::boxed(value));
            }
            let mut batch = queue.try_pop_all();
            let mut sum = 0u64;
            while let Some(item) = batch.pop_front() {
                sum += item.value;
            }
            criterion::black_box(sum);
        });
    });

    group.finish();
}

fn bench_head_splice(c: &mut Criterion) {
    let mut group = c.benchmark_group("head_splice");

    let queue: Queue<Item> = Queue::new();
    group.bench_function("requeue_100", |b| {
        b.iter(|| {
            let mut batch = QueueChain::new();
            for value in 0..100 {
                batch.push_back(Item::boxed(value));
            }
            queue.push_chain_to_head(batch);
            criterion::black_box(queue.pop_to_chain());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_batch_drain, bench_head_splice);
criterion_main!(benches);
