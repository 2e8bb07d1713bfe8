//! Core bookkeeping throughput: slot search and in-order result draining.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use devsched::ipc::protocol::{decode, encode, CoreOutbound, DEFAULT_MAX_FRAME};
use devsched::scheduler::{PendingResults, Sequence, SlotMatrix, Topology};
use devsched::task::TaskOutcome;

fn topology(devices: u32, capacity: usize) -> Topology {
    Topology::new((0..devices).collect(), vec![capacity; devices as usize]).unwrap()
}

fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_fill");

    for (devices, capacity) in [(2u32, 2usize), (8, 4), (16, 16)] {
        let topo = topology(devices, capacity);
        let total = topo.total_capacity();
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(
            BenchmarkId::new("layout", format!("{devices}x{capacity}")),
            &topo,
            |b, topo| {
                b.iter(|| {
                    let mut slots = SlotMatrix::new(topo);
                    let mut seq = 0;
                    while let Some(id) = slots.find_free() {
                        slots.occupy(id, Sequence(seq));
                        seq += 1;
                    }
                    black_box(slots.occupied_count())
                })
            },
        );
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending_drain");

    for n in [64u64, 1024] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::new("reverse_completion", n), &n, |b, &n| {
            b.iter(|| {
                let mut pending = PendingResults::new();
                let seqs: Vec<Sequence> = (0..n).map(|_| pending.allocate()).collect();
                let mut delivered = 0;
                // worst case: every result waits for the head
                for seq in seqs.into_iter().rev() {
                    pending.complete(seq, TaskOutcome::Empty);
                    while pending.pop_ready().is_some() {
                        delivered += 1;
                    }
                }
                black_box(delivered)
            })
        });
    }

    group.finish();
}

fn bench_outcome_codec(c: &mut Criterion) {
    let message = CoreOutbound::Outcome {
        sequence: Sequence(42),
        outcome: TaskOutcome::value(serde_json::json!({"device": 1, "values": [1, 2, 3]})),
    };
    c.bench_function("outcome_roundtrip", |b| {
        b.iter(|| {
            let bytes = encode(black_box(&message), DEFAULT_MAX_FRAME).unwrap();
            let back: CoreOutbound = decode(&bytes, DEFAULT_MAX_FRAME).unwrap();
            black_box(back)
        })
    });
}

criterion_group!(benches, bench_fill, bench_drain, bench_outcome_codec);
criterion_main!(benches);
