//! Synthetic mosaics for unit tests.
//!
//! Every fixture shares one 41 x 31 grid with 1 km spacing centered
//! on the ALA projection origin:
//!
//! - `x` runs from -20 km to 20 km, `y` from 15 km down to -15 km,
//! - `landice` is true west of x = 10 km,
//! - `count` drops to 1 east of x = 15 km,
//! - `v_error` is 2 m/yr with a fill at the north-west corner,
//! - `date` is noon on 2018-07-02 everywhere.

use crate::{MosaicStore, StoreConfig, C};
use mosaic::{MosaicWriter, Orientation};
use std::path::Path;
use tempfile::TempDir;

pub(crate) const NX: usize = 41;
pub(crate) const NY: usize = 31;
pub(crate) const SPACING: C = 1000.0;
pub(crate) const FILL: f32 = -32767.0;
pub(crate) const DATENUM: f32 = 737_243.5;

/// Eastward speed of the uniform summary field.
pub(crate) const SPEED: f32 = 100.0;

pub(crate) fn axes() -> (Vec<C>, Vec<C>) {
    let x = (0..NX).map(|i| -20_000.0 + SPACING * i as C).collect();
    let y = (0..NY).map(|j| 15_000.0 - SPACING * j as C).collect();
    (x, y)
}

pub(crate) fn file_name(year: u16) -> String {
    format!("ALA_G0120_{year:04}.tif")
}

pub(crate) fn write_field(
    path: &Path,
    orientation: Orientation,
    vx: &dyn Fn(C, C) -> f32,
    vy: &dyn Fn(C, C) -> f32,
) {
    let (x, y) = axes();
    let cells = || y.iter().flat_map(|&yj| x.iter().map(move |&xi| (xi, yj)));
    let vx_samples: Vec<f32> = cells().map(|(x, y)| vx(x, y)).collect();
    let vy_samples: Vec<f32> = cells().map(|(x, y)| vy(x, y)).collect();
    let v = vx_samples
        .iter()
        .zip(&vy_samples)
        .map(|(u, v)| u.hypot(*v))
        .collect();
    let mut v_error = vec![2.0; NX * NY];
    v_error[0] = FILL;
    let count = cells().map(|(x, _)| if x > 15_000.0 { 1.0 } else { 10.0 }).collect();
    let landice = cells().map(|(x, _)| x < 10_000.0).collect();

    MosaicWriter::new(x.clone(), y.clone())
        .orientation(orientation)
        .rows_per_strip(4)
        .continuous("vx", vx_samples, None)
        .continuous("vy", vy_samples, None)
        .continuous("v", v, None)
        .continuous("v_error", v_error, Some(FILL))
        .continuous("count", count, None)
        .continuous("date", vec![DATENUM; NX * NY], None)
        .mask("landice", landice)
        .write(path)
        .unwrap();
}

/// Writes the uniform eastward field. The speed is `SPEED` plus the
/// last two digits of the year, so each year slot is distinct.
pub(crate) fn write_uniform(dir: &Path, name: &str) {
    let year: u16 = name
        .rsplit('_')
        .next()
        .and_then(|last| last.get(..4))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0);
    let speed = SPEED + f32::from(year % 100);
    write_field(&dir.join(name), Orientation::NorthUp, &|_, _| speed, &|_, _| 0.0);
}

pub(crate) fn uniform_store(years: &[u16]) -> (TempDir, MosaicStore) {
    let dir = TempDir::new().unwrap();
    for &year in years {
        write_uniform(dir.path(), &file_name(year));
    }
    let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
    (dir, store)
}

/// Store holding a summary mosaic of the given field.
pub(crate) fn field_store(
    vx: &dyn Fn(C, C) -> f32,
    vy: &dyn Fn(C, C) -> f32,
) -> (TempDir, MosaicStore) {
    let dir = TempDir::new().unwrap();
    write_field(&dir.path().join(file_name(0)), Orientation::NorthUp, vx, vy);
    let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
    (dir, store)
}
