#![allow(dead_code)]

//! A synthetic Greenland outlet glacier.
//!
//! The field accelerates linearly eastward around a point near
//! Jakobshavn Isbrae. The summary slot is stored north-up and the 2018
//! slot, 10% faster, south-up.

use itslive::{
    mosaic::{MosaicWriter, Orientation},
    MosaicStore, Region, StoreConfig, C,
};
use std::path::Path;
use tempfile::TempDir;

pub const LAT: C = 69.1;
pub const LON: C = -49.5;
pub const NX: usize = 61;
pub const NY: usize = 41;
pub const SPACING: C = 500.0;

/// Speed (m/yr) at the grid center.
pub const CENTER_SPEED: C = 1000.0;

/// Distance over which the speed doubles.
pub const RAMP: C = 30_000.0;

pub const FILL: f32 = -32767.0;

pub struct Outlet {
    pub dir: TempDir,
    pub store: MosaicStore,
    pub region: &'static Region,

    /// Grid center, on the 500 m lattice.
    pub x0: C,
    pub y0: C,
}

impl Outlet {
    pub fn speed(&self, x: C, factor: C) -> C {
        factor * CENTER_SPEED * (1.0 + (x - self.x0) / RAMP)
    }
}

pub fn outlet() -> Outlet {
    let region = Region::lookup("GRE").unwrap();
    let center = region.projection.forward(LAT, LON).unwrap();
    let x0 = (center.x / SPACING).round() * SPACING;
    let y0 = (center.y / SPACING).round() * SPACING;

    let dir = TempDir::new().unwrap();
    write(dir.path(), "GRE_G0120_0000.tif", x0, y0, 1.0, Orientation::NorthUp);
    write(dir.path(), "GRE_G0120_2018.tif", x0, y0, 1.1, Orientation::SouthUp);
    let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
    Outlet {
        dir,
        store,
        region,
        x0,
        y0,
    }
}

fn write(dir: &Path, name: &str, x0: C, y0: C, factor: C, orientation: Orientation) {
    let x: Vec<C> = (0..NX).map(|i| x0 - 15_000.0 + SPACING * i as C).collect();
    let y: Vec<C> = (0..NY).map(|j| y0 + 10_000.0 - SPACING * j as C).collect();
    let vx: Vec<f32> = y
        .iter()
        .flat_map(|_| x.iter().map(|&xi| (factor * CENTER_SPEED * (1.0 + (xi - x0) / RAMP)) as f32))
        .collect();
    let mut v_error = vec![5.0; NX * NY];
    v_error[NX * NY - 1] = FILL;

    MosaicWriter::new(x, y)
        .orientation(orientation)
        .rows_per_strip(8)
        .continuous("vx", vx.clone(), None)
        .continuous("vy", vec![0.0; NX * NY], None)
        .continuous("v", vx, None)
        .continuous("v_error", v_error, Some(FILL))
        .continuous("count", vec![20.0; NX * NY], None)
        .mask("landice", vec![true; NX * NY])
        .write(dir.join(name))
        .unwrap();
}
