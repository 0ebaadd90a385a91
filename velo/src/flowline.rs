use crate::{
    options::{Cli, Flowline},
    output::{self, Record},
    progress,
};
use anyhow::Result;
use itslive::{FlowlineQuery, Region, Screening};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct Vertex {
    line: usize,
    x: f64,
    y: f64,
    distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
}

impl Record for Vertex {
    const HEADER: &'static str = "line,x,y,distance,speed";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        let speed = self.speed.map(|s| s.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{speed}",
            self.line, self.x, self.y, self.distance
        )
    }
}

impl Flowline {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let seeds = self.seed.iter().map(|p| (p.0, p.1)).collect();
        let total = self.seed.len();
        let pb = progress::bar(format!("Tracing {total} flowlines"), total as u64);
        let sink = progress::sink(&pb, cli.yes);

        let mut query = FlowlineQuery::builder()
            .region(region)
            .seeds(seeds, self.coords.mode())
            .year(self.year)
            .grounding_line(self.grounding_line)
            .with_speed(self.speed)
            .progress(&sink);
        if let Some(spacing) = self.spacing {
            query = query.spacing(spacing);
        }
        if let Some(buffer) = self.buffer {
            query = query.buffer(buffer);
        }
        if let Some(min_speed) = self.min_speed {
            query = query.min_speed(min_speed);
        }
        if self.screen {
            query = query.screening(Screening::default());
        }
        let lines = query.build(&store)?.into_vec();
        pb.finish_and_clear();

        let mut vertices = Vec::new();
        for (line, flowline) in lines.iter().enumerate() {
            for i in 0..flowline.len() {
                vertices.push(Vertex {
                    line,
                    x: flowline.x[i],
                    y: flowline.y[i],
                    distance: flowline.distance[i],
                    speed: flowline.speed.as_ref().map(|s| s[i]),
                });
            }
        }
        output::print(cli.format, &vertices)
    }
}
