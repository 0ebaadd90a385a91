use crate::{
    options::{Cli, Data, Pair},
    output::{self, Record, Value},
    progress,
};
use anyhow::Result;
use indicatif::ProgressBar;
use itslive::{Grid, GridCoords, GridQuery, Region, Values};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct NativeCell {
    year: u16,
    x: f64,
    y: f64,
    value: Value,
}

impl Record for NativeCell {
    const HEADER: &'static str = "year,x,y,value";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{},{},{},{}", self.year, self.x, self.y, self.value)
    }
}

#[derive(Serialize)]
struct GeoCell {
    year: u16,
    lat: f64,
    lon: f64,
    value: Value,
}

impl Record for GeoCell {
    const HEADER: &'static str = "year,lat,lon,value";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{},{},{},{}", self.year, self.lat, self.lon, self.value)
    }
}

impl Data {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let pb = ProgressBar::hidden();
        let sink = progress::sink(&pb, cli.yes);

        let mut query = GridQuery::builder()
            .region(region)
            .variable(&self.variable)
            .geo_output(self.geo)
            .progress(&sink);
        if let Some(Pair(a, b)) = self.xlim {
            query = query.xlim(a, b);
        }
        if let Some(Pair(a, b)) = self.ylim {
            query = query.ylim(a, b);
        }
        if let Some(Pair(a, b)) = self.latlim {
            query = query.latlim(a, b);
        }
        if let Some(Pair(a, b)) = self.lonlim {
            query = query.lonlim(a, b);
        }
        if !self.point.is_empty() {
            let points = self.point.iter().map(|p| (p.0, p.1)).collect();
            query = query.points(points, self.coords.mode());
        }
        if let Some(buffer) = self.buffer {
            query = query.buffer(buffer.0);
        }
        if !self.years.is_empty() {
            query = query.years(self.years.clone());
        }

        let grid = query.build(&store)?;
        match &grid.coords {
            GridCoords::Native { x, y } => {
                let cells = cells(&grid, |year, row, col, value| NativeCell {
                    year,
                    x: x[col],
                    y: y[row],
                    value,
                });
                output::print(cli.format, &cells)
            }
            GridCoords::Geographic { lat, lon } => {
                let cells = cells(&grid, |year, row, col, value| GeoCell {
                    year,
                    lat: lat[[row, col]],
                    lon: lon[[row, col]],
                    value,
                });
                output::print(cli.format, &cells)
            }
        }
    }
}

/// Flattens a grid year by year, north to south, west to east.
fn cells<T>(grid: &Grid, make: impl Fn(u16, usize, usize, Value) -> T) -> Vec<T> {
    let (rows, cols, _) = grid.values.dim();
    let mut out = Vec::with_capacity(grid.values.dim().0 * cols * grid.years.len());
    for (k, &year) in grid.years.iter().enumerate() {
        for row in 0..rows {
            for col in 0..cols {
                let value = match &grid.values {
                    Values::Continuous(v) => Value::Number(f64::from(v[[row, col, k]])),
                    Values::Mask(v) => Value::Flag(v[[row, col, k]]),
                };
                out.push(make(year, row, col, value));
            }
        }
    }
    out
}
