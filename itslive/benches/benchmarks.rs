use criterion::{criterion_group, criterion_main, Criterion};
use itslive::{
    mosaic::MosaicWriter, CoordMode, FlowlineQuery, Interp, MosaicStore, Region, StoreConfig, C,
};
use tempfile::TempDir;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const N: usize = 512;
const SPACING: C = 120.0;

/// A 512 x 512 vortex around the ALA origin.
fn vortex_store() -> (TempDir, MosaicStore) {
    let half = SPACING * (N / 2) as C;
    let x: Vec<C> = (0..N).map(|i| -half + SPACING * i as C).collect();
    let y: Vec<C> = (0..N).map(|j| half - SPACING * j as C).collect();
    let cells = || y.iter().flat_map(|&yj| x.iter().map(move |&xi| (xi, yj)));
    let vx: Vec<f32> = cells().map(|(_, y)| (-0.01 * y) as f32).collect();
    let vy: Vec<f32> = cells().map(|(x, _)| (0.01 * x) as f32).collect();
    let v = vx.iter().zip(&vy).map(|(a, b)| a.hypot(*b)).collect();

    let dir = TempDir::new().unwrap();
    MosaicWriter::new(x, y)
        .rows_per_strip(16)
        .continuous("vx", vx, None)
        .continuous("vy", vy, None)
        .continuous("v", v, None)
        .write(dir.path().join("ALA_G0120_0000.tif"))
        .unwrap();
    let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
    (dir, store)
}

fn interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interpolation");
    let (_dir, store) = vortex_store();
    let region = Region::lookup("ALA").unwrap();

    let points: Vec<(C, C)> = (0..1000)
        .map(|i| {
            let t = i as C / 1000.0 * std::f64::consts::TAU;
            (20_000.0 * t.cos(), 20_000.0 * t.sin())
        })
        .collect();

    group.bench_with_input("1000 points", &points, |b, points| {
        b.iter(|| {
            Interp::builder()
                .region(region)
                .variable("v")
                .points(points.clone(), CoordMode::Native)
                .build(&store)
                .unwrap()
        })
    });
}

fn flowline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Flowline");
    group.sample_size(20);
    let (_dir, store) = vortex_store();
    let region = Region::lookup("ALA").unwrap();

    group.bench_function("vortex", |b| {
        b.iter(|| {
            FlowlineQuery::builder()
                .region(region)
                .seeds(vec![(10_000.0, 0.0)], CoordMode::Native)
                .spacing(120.0)
                .buffer(20.0)
                .build(&store)
                .unwrap()
        })
    });
}

criterion_group!(benches, interpolation, flowline);
criterion_main!(benches);
