use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frame_grabber::{Frame, FrameSlot};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn frame(index: u64) -> Arc<Frame> {
    Arc::new(Frame::new(vec![0u8; 640 * 480], 640, 480, index))
}

fn bench_slot(c: &mut Criterion) {
    let slot = FrameSlot::new();
    let frames: Vec<_> = (0..64).map(frame).collect();

    c.bench_function("set_frame", |b| {
        let mut i = 0;
        b.iter(|| {
            slot.set_frame(Arc::clone(&frames[i % frames.len()]));
            i += 1;
        })
    });

    c.bench_function("set_then_take_new", |b| {
        b.iter(|| {
            slot.set_frame(Arc::clone(&frames[0]));
            black_box(slot.take_new())
        })
    });

    c.bench_function("get_frame", |b| b.iter(|| black_box(slot.get_frame())));

    // Slot already holds a frame newer than the request instant
    c.bench_function("wait_for_fresh_ready", |b| {
        b.iter(|| {
            let since = Instant::now();
            slot.set_frame(Arc::new(Frame::new(Vec::new(), 0, 0, 0)));
            black_box(slot.wait_for_fresh(since, Duration::from_millis(1)))
        })
    });
}

criterion_group!(benches, bench_slot);
criterion_main!(benches);
