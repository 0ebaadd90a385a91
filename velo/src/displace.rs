use crate::{
    options::{Cli, Displace},
    output::{self, Record},
    progress,
};
use anyhow::Result;
use itslive::{Displacement, Region};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct Advected {
    point: usize,
    dt: f64,
    x: f64,
    y: f64,
}

impl Record for Advected {
    const HEADER: &'static str = "point,dt,x,y";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{},{},{},{}", self.point, self.dt, self.x, self.y)
    }
}

impl Displace {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let points = self.point.iter().map(|p| (p.0, p.1)).collect();
        let total = self.point.len() * self.dt.len();
        let pb = progress::bar(format!("Advecting {total} particles"), total as u64);
        let sink = progress::sink(&pb, cli.yes);

        let mut query = Displacement::builder()
            .region(region)
            .points(points, self.coords.mode())
            .dt(self.dt.clone())
            .year(self.year)
            .progress(&sink);
        if let Some(window) = self.window {
            query = query.window(window);
        }
        let out = query.build(&store)?;
        pb.finish_and_clear();

        let mut records = Vec::with_capacity(total);
        for point in 0..self.point.len() {
            for (k, &dt) in self.dt.iter().enumerate() {
                records.push(Advected {
                    point,
                    dt,
                    x: out.x[[point, k]],
                    y: out.y[[point, k]],
                });
            }
        }
        output::print(cli.format, &records)
    }
}
