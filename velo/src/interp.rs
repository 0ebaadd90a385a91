use crate::{
    options::{Cli, Interp},
    output::{self, Record, Value},
};
use anyhow::Result;
use itslive::{time, Interp as Query, InterpValues, Method, Quantity, Region};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct PointRecord {
    point: usize,
    a: f64,
    b: f64,
    year: u16,
    value: Value,
}

impl Record for PointRecord {
    const HEADER: &'static str = "point,a,b,year,value";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{},{},{},{},{}",
            self.point, self.a, self.b, self.year, self.value
        )
    }
}

impl Interp {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let quantity: Quantity = self.quantity.parse().unwrap_or_else(|never| match never {});
        let points: Vec<(f64, f64)> = self.point.iter().map(|p| (p.0, p.1)).collect();

        let mut query = Query::builder()
            .region(region)
            .quantity(quantity)
            .points(points.clone(), self.coords.mode());
        if let Some(method) = &self.method {
            query = query.method(method.parse::<Method>()?);
        }
        if !self.years.is_empty() {
            query = query.years(self.years.clone());
        }
        let out = query.build(&store)?;

        let mut records = Vec::with_capacity(points.len() * out.years.len());
        for (i, &(a, b)) in points.iter().enumerate() {
            for (k, &year) in out.years.iter().enumerate() {
                let value = match &out.values {
                    InterpValues::Continuous(v) if self.decimal_year => {
                        Value::Number(time::datenum_to_decimal_year(v[[i, k]])?)
                    }
                    InterpValues::Continuous(v) => Value::Number(v[[i, k]]),
                    InterpValues::Mask(v) => Value::Flag(v[[i, k]]),
                };
                records.push(PointRecord {
                    point: i,
                    a,
                    b,
                    year,
                    value,
                });
            }
        }
        output::print(cli.format, &records)
    }
}
