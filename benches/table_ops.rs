use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use slabtable::{BufferId, BufferTable, SessionId};

fn bench_allocate_free(c: &mut Criterion) {
    let table = Arc::new(BufferTable::with_defaults());
    let session = table.open_session(SessionId::new(1)).unwrap();

    c.bench_function("allocate_free_4k", |b| {
        b.iter(|| {
            let slab = session.allocate(black_box(4096), black_box(256)).unwrap();
            session.free(slab.buffer_id()).unwrap();
        })
    });
}

fn bench_get(c: &mut Criterion) {
    let table = Arc::new(BufferTable::with_defaults());
    let session = table.open_session(SessionId::new(1)).unwrap();
    let ids: Vec<BufferId> = (0..1024)
        .map(|_| session.allocate(64, 64).unwrap().buffer_id())
        .collect();

    let mut next = 0;
    c.bench_function("get_1024_live", |b| {
        b.iter(|| {
            let id = ids[next % ids.len()];
            next += 1;
            let guard = table.get(black_box(id), SessionId::new(1)).unwrap();
            black_box(guard.user()[0]);
        })
    });
}

fn bench_teardown(c: &mut Criterion) {
    let table = Arc::new(BufferTable::with_defaults());

    c.bench_function("teardown_256", |b| {
        b.iter_batched(
            || {
                let session = table.open_session(SessionId::new(2)).unwrap();
                for _ in 0..256 {
                    session.allocate(64, 64).unwrap();
                }
                session
            },
            |session| black_box(session.close()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_allocate_free, bench_get, bench_teardown);
criterion_main!(benches);
