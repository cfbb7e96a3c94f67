use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rockfall::core::vec2::Vec2;
use rockfall::game::collision::scan_hits;
use rockfall::game::config::WorldConfig;
use rockfall::game::input::InputBatch;
use rockfall::game::state::{Hazard, Projectile, World};
use rockfall::game::tick::advance;

fn field(rng: &mut StdRng, hazards: usize, projectiles: usize) -> (Vec<Hazard>, Vec<Projectile>) {
    let hazards = (0..hazards)
        .map(|_| {
            Hazard::new(
                Vec2::new(rng.gen_range(0.0..800.0), rng.gen_range(0.0..600.0)),
                Vec2::new(0.0, rng.gen_range(1.0..4.0)),
                20.0,
            )
        })
        .collect();
    let projectiles = (0..projectiles)
        .map(|_| {
            Projectile::new(
                Vec2::new(rng.gen_range(0.0..800.0), rng.gen_range(0.0..600.0)),
                Vec2::new(0.0, -10.0),
            )
        })
        .collect();
    (hazards, projectiles)
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_hits");
    let mut rng = StdRng::seed_from_u64(1);

    for &(hazards, projectiles) in &[(16, 32), (256, 512), (2048, 2048)] {
        let (h, p) = field(&mut rng, hazards, projectiles);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", hazards, projectiles)),
            &(h, p),
            |b, (h, p)| b.iter(|| scan_hits(black_box(h), black_box(p))),
        );
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let config = WorldConfig::default();
    let mut rng = StdRng::seed_from_u64(2);
    let (hazards, projectiles) = field(&mut rng, 256, 512);
    let mut base = World::new();
    base.hazards = hazards;
    base.projectiles = projectiles;
    let inputs = InputBatch::new();

    c.bench_function("advance_256x512", |b| {
        b.iter_batched(
            || base.clone(),
            |mut world| advance(&mut world, &inputs, &config, &mut rng),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_scan, bench_tick);
criterion_main!(benches);
