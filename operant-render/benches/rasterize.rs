use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use operant_core::surface::{BLACK, WHITE};
use operant_core::{Bounds, ClickAction, Surface};
use operant_render::{SkiaSurface, Viewport};
use std::time::Duration;

const KEY: Bounds = Bounds::new(416.0, 288.0, 608.0, 480.0);

/// Background plus the trial key, as drawn at every trial start
fn key_screen(s: &mut SkiaSurface) {
    s.clear().ok();
    s.draw_rect(Bounds::new(0.0, 0.0, 1024.0, 768.0), Some(BLACK), Some(BLACK), Some("bkgrd"));
    s.bind_click("bkgrd", ClickAction::BackgroundPeck);
    s.draw_oval(KEY.inflate(20.0), Some(BLACK), Some(BLACK), Some("key"));
    s.draw_rect(KEY, Some(WHITE), None, Some("key"));
    s.draw_oval(KEY, None, Some(BLACK), Some("key"));
    s.bind_click("key", ClickAction::KeyPeck);
}

pub fn bench_rasterize(c: &mut Criterion) {
    let mut group = c.benchmark_group("rasterize");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(2));

    group.bench_function("key_screen", |b| {
        b.iter_batched(
            || {
                let mut s = SkiaSurface::new(None).unwrap();
                key_screen(&mut s);
                s
            },
            |mut s| black_box(s.rasterize()),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("present_1080p", |b| {
        let mut s = SkiaSurface::new(None).unwrap();
        key_screen(&mut s);
        s.rasterize();
        let v = Viewport::fit(1920, 1080);
        let mut frame = vec![0u8; 1920 * 1080 * 4];
        b.iter(|| s.present(black_box(&v), &mut frame));
    });

    group.bench_function("hit_test", |b| {
        let mut s = SkiaSurface::new(None).unwrap();
        key_screen(&mut s);
        b.iter(|| black_box(s.hit(black_box(512.0), black_box(384.0))));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .confidence_level(0.95)
        .noise_threshold(0.02);
    targets = bench_rasterize
}

criterion_main!(benches);
