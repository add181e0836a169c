use blob_tracker::capture::{Camera, CaptureConfig, Frame, MockCamera, MockTarget};
use blob_tracker::detection::{in_range, min_enclosing_circle, ColorPreset, Detector};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::Rgb;
use imageproc::point::Point;

fn make_frame(width: u32, height: u32, targets: usize) -> Frame {
    let mut camera = MockCamera::new();
    for i in 0..targets as i32 {
        camera = camera.with_target(MockTarget {
            center: (80 + i * 120, 60 + (i % 3) * 140),
            radius: 30,
            color: Rgb([255, 220, 0]),
            velocity: (0, 0),
        });
    }
    camera
        .open(&CaptureConfig::with_dimensions(width, height))
        .expect("mock camera opens");
    camera.capture().expect("mock camera captures")
}

fn bench_in_range(c: &mut Criterion) {
    let frame = make_frame(640, 480, 1);
    let range = ColorPreset::Yellow.range();

    c.bench_function("in_range_640x480", |b| {
        b.iter(|| {
            let mask = in_range(black_box(frame.image()), black_box(&range));
            black_box(mask.width())
        })
    });
}

fn bench_detect(c: &mut Criterion) {
    let detector = Detector::default();
    let single = make_frame(640, 480, 1);
    let several = make_frame(640, 480, 5);
    let hd = make_frame(1280, 720, 5);

    c.bench_function("detect_640x480_1_target", |b| {
        b.iter(|| black_box(detector.detect(black_box(&single)).iter().count()))
    });

    c.bench_function("detect_640x480_5_targets", |b| {
        b.iter(|| black_box(detector.detect(black_box(&several)).iter().count()))
    });

    c.bench_function("detect_1280x720_5_targets", |b| {
        b.iter(|| black_box(detector.detect(black_box(&hd)).iter().count()))
    });
}

fn bench_enclosing_circle(c: &mut Criterion) {
    let points: Vec<Point<i32>> = (0..200)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * f64::from(i) / 200.0;
            Point::new(
                (320.0 + 40.0 * t.cos()).round() as i32,
                (240.0 + 25.0 * t.sin()).round() as i32,
            )
        })
        .collect();

    c.bench_function("min_enclosing_circle_200pts", |b| {
        b.iter(|| black_box(min_enclosing_circle(black_box(&points))))
    });
}

criterion_group!(detect, bench_in_range, bench_detect, bench_enclosing_circle);
criterion_main!(detect);
