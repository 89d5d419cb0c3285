use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rovermap::classify::{classify, ClassifyConfig};
use rovermap::decision::{step, PolicyInput, PolicyState};
use rovermap::{Rover, RoverConfig, Telemetry, Tunables};

/// Sand below the horizon, dark rock patches scattered through it.
fn synthetic_frame(seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_fn(320, 160, |_, y| {
        if y < 80 {
            Rgb([90, 80, 70])
        } else {
            Rgb([205, 185, 165])
        }
    });
    for _ in 0..12 {
        let cx = rng.gen_range(10..310u32);
        let cy = rng.gen_range(85..150u32);
        let r = rng.gen_range(3..10u32);
        for y in cy.saturating_sub(r)..(cy + r).min(160) {
            for x in cx.saturating_sub(r)..(cx + r).min(320) {
                img.put_pixel(x, y, Rgb([50, 45, 40]));
            }
        }
    }
    img
}

fn bench_rectify(c: &mut Criterion) {
    let rover = Rover::new(RoverConfig::default()).unwrap();
    let frame = synthetic_frame(1);
    c.bench_function("rectify_320x160", |b| {
        b.iter(|| rover.rectifier().rectify(black_box(&frame)).unwrap())
    });
}

fn bench_classify(c: &mut Criterion) {
    let rover = Rover::new(RoverConfig::default()).unwrap();
    let rectified = rover.rectifier().rectify(&synthetic_frame(2)).unwrap();
    let cfg = ClassifyConfig::default();
    c.bench_function("classify_320x160", |b| {
        b.iter(|| classify(black_box(&rectified.image), &rectified.valid, &cfg))
    });
}

fn bench_tick(c: &mut Criterion) {
    let rover = Rover::new(RoverConfig::default()).unwrap();
    let frame = synthetic_frame(3);
    let telemetry = Telemetry {
        pos: [100.0, 100.0],
        yaw: 45.0,
        vel: 1.0,
        ..Telemetry::default()
    };
    let mut state = rover.new_state();
    c.bench_function("tick_full", |b| {
        b.iter(|| rover.tick(&mut state, black_box(&frame), &telemetry).unwrap())
    });
}

fn bench_policy(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(4);
    let angles: Vec<f64> = (0..20_000).map(|_| rng.gen_range(-1.2..1.2)).collect();
    let tunables = Tunables::default();
    let input = PolicyInput {
        angles: &angles,
        vel: 1.0,
        near_sample: false,
        picking_up: false,
    };
    c.bench_function("policy_step_20k_bearings", |b| {
        b.iter(|| step(PolicyState::default(), black_box(&input), &tunables))
    });
}

criterion_group!(benches, bench_rectify, bench_classify, bench_tick, bench_policy);
criterion_main!(benches);
