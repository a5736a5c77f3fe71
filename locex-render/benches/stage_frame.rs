use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use locex_core::SphericalCoordinate;
use locex_render::{Overlay, StageRenderer, StageView};
use locex_timing::MonotonicTimer;

fn harness() -> (StageRenderer, Vec<u8>, MonotonicTimer) {
    let width = 1280u32;
    let height = 720u32;
    let r = StageRenderer::new(width, height, None).expect("renderer");
    let fb = vec![0u8; (width * height * 4) as usize];
    (r, fb, MonotonicTimer::new())
}

pub fn bench_stage_frame(c: &mut Criterion) {
    let mut g = c.benchmark_group("stage_frame");
    g.sample_size(40);

    g.bench_function("trial_frame", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb, t)| {
                let view = StageView {
                    progress: Some((10, 40)),
                    selection: Some(SphericalCoordinate::new(30.0, 15.0)),
                    hover: Some(SphericalCoordinate::new(45.0, 15.0)),
                    ..StageView::new(Overlay::Trial, "Frontal plane")
                };
                let stats = r.render_frame(&view, &mut fb, &t);
                black_box(stats.ok());
            },
            BatchSize::SmallInput,
        )
    });

    g.bench_function("orbit_and_pick", |b| {
        let (mut r, _, _) = harness();
        b.iter(|| {
            r.camera_mut().orbit(3.0, 0.5);
            black_box(r.pick(700.0, 300.0));
        })
    });

    g.finish();
}

criterion_group!(benches, bench_stage_frame);
criterion_main!(benches);
