use crate::{
    options::{Cli, Vars, Years},
    output::{self, Format, Record},
};
use anyhow::Result;
use itslive::{mosaic::VariableKind, Region, REGIONS};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct RegionRecord {
    id: u8,
    code: &'static str,
    name: &'static str,
    projection: &'static str,
}

impl Record for RegionRecord {
    const HEADER: &'static str = "id,code,name,projection";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{},{},\"{}\",{}", self.id, self.code, self.name, self.projection)
    }
}

#[derive(Serialize)]
struct YearRecord {
    year: u16,
}

impl Record for YearRecord {
    const HEADER: &'static str = "year";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.year)
    }
}

#[derive(Serialize)]
struct VariableRecord {
    name: String,
    kind: &'static str,
    fill: Option<f64>,
}

impl Record for VariableRecord {
    const HEADER: &'static str = "name,kind,fill";

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        let fill = self.fill.map(|f| f.to_string()).unwrap_or_default();
        writeln!(out, "{},{},{fill}", self.name, self.kind)
    }
}

pub fn regions(format: Format) -> Result<()> {
    let records: Vec<RegionRecord> = REGIONS
        .iter()
        .map(|region| RegionRecord {
            id: region.id,
            code: region.code,
            name: region.name,
            projection: region.projection.code(),
        })
        .collect();
    output::print(format, &records)
}

impl Years {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let records: Vec<YearRecord> = store
            .available_years(region)?
            .into_iter()
            .map(|year| YearRecord { year })
            .collect();
        output::print(cli.format, &records)
    }
}

impl Vars {
    pub fn run(&self, cli: &Cli) -> Result<()> {
        let store = cli.store()?;
        let region = Region::lookup(&self.region)?;
        let mosaic = store.open(region, self.year)?;
        let records: Vec<VariableRecord> = store
            .list_variables(region, self.year)?
            .into_iter()
            .map(|name| {
                let (kind, fill) = match mosaic.variable(&name) {
                    Ok(var) => (
                        match var.kind() {
                            VariableKind::Continuous => "continuous",
                            VariableKind::Mask => "mask",
                        },
                        var.fill(),
                    ),
                    Err(_) => ("axis", None),
                };
                VariableRecord { name, kind, fill }
            })
            .collect();
        output::print(cli.format, &records)
    }
}
