use crate::output::Format;
use anyhow::{anyhow, Error as AnyError, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use itslive::{
    Buffer, CoordMode, MosaicStore, StoreConfig, DEFAULT_EXTENSION, DEFAULT_PRODUCT_TAG,
};
use std::{path::PathBuf, str::FromStr};

/// Query ITS_LIVE glacier velocity mosaics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing velocity mosaics.
    #[arg(short, long, env = "ITSLIVE_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Product tag in mosaic file names.
    #[arg(long, default_value = DEFAULT_PRODUCT_TAG)]
    pub product: String,

    /// Mosaic file extension.
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub ext: String,

    /// Memory budget for open mosaics, in MiB.
    #[arg(long, default_value_t = 64)]
    pub cache_mb: usize,

    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Proceed with slow operations without asking.
    #[arg(short, long)]
    pub yes: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

impl Cli {
    pub fn store(&self) -> Result<MosaicStore> {
        let root = self
            .data_dir
            .clone()
            .ok_or_else(|| anyhow!("no mosaic directory, pass --data-dir or set ITSLIVE_DIR"))?;
        debug!("reading mosaics from {}", root.display());
        let config = StoreConfig {
            product_tag: self.product.clone(),
            extension: self.ext.clone(),
            cache_budget_bytes: self.cache_mb * 1024 * 1024,
            ..StoreConfig::new(root)
        };
        Ok(MosaicStore::new(config)?)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the region catalog.
    Regions,

    /// List year slots on disk for a region. 0 is the summary mosaic.
    Years(Years),

    /// Print the variables of a region's mosaic.
    Vars(Vars),

    /// Load a gridded subset of one variable.
    Data(Data),

    /// Interpolate a variable, or along/across-track velocity, at
    /// points.
    Interp(Interp),

    /// Trace flowlines from seed points.
    Flowline(Flowline),

    /// Advect points through the velocity field.
    Displace(Displace),
}

#[derive(Debug, Clone, Args)]
pub struct Years {
    /// Region code, name, or RGI number.
    pub region: String,
}

#[derive(Debug, Clone, Args)]
pub struct Vars {
    pub region: String,

    #[arg(short, long, default_value_t = 0)]
    pub year: u16,
}

#[derive(Debug, Clone, Args)]
pub struct Data {
    pub region: String,

    pub variable: String,

    /// Native x range "min,max" in meters.
    #[arg(long, allow_hyphen_values = true)]
    pub xlim: Option<Pair>,

    /// Native y range "min,max" in meters.
    #[arg(long, allow_hyphen_values = true)]
    pub ylim: Option<Pair>,

    /// Latitude range "min,max".
    #[arg(long, allow_hyphen_values = true, requires = "lonlim")]
    pub latlim: Option<Pair>,

    /// Longitude range "min,max".
    #[arg(long, allow_hyphen_values = true, requires = "latlim")]
    pub lonlim: Option<Pair>,

    /// Point to cover, repeatable.
    #[arg(short, long, allow_hyphen_values = true)]
    pub point: Vec<Pair>,

    #[command(flatten)]
    pub coords: CoordArgs,

    /// Buffer in km, "b" or "bx,by".
    #[arg(short, long)]
    pub buffer: Option<BufferArg>,

    /// Year slots, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub years: Vec<u16>,

    /// Output per-cell latitude and longitude.
    #[arg(long)]
    pub geo: bool,
}

#[derive(Debug, Clone, Args)]
pub struct Interp {
    pub region: String,

    /// Variable name, `along`, or `across`.
    pub quantity: String,

    /// Query point, repeatable. Order matters for along/across.
    #[arg(short, long, required = true, allow_hyphen_values = true)]
    pub point: Vec<Pair>,

    #[command(flatten)]
    pub coords: CoordArgs,

    #[arg(long, value_delimiter = ',')]
    pub years: Vec<u16>,

    /// `linear` or `nearest`.
    #[arg(short, long)]
    pub method: Option<String>,

    /// Convert day numbers to decimal years (for `date`).
    #[arg(long)]
    pub decimal_year: bool,
}

#[derive(Debug, Clone, Args)]
pub struct Flowline {
    pub region: String,

    /// Seed point, repeatable.
    #[arg(short, long, required = true, allow_hyphen_values = true)]
    pub seed: Vec<Pair>,

    #[command(flatten)]
    pub coords: CoordArgs,

    /// Vertex spacing in meters.
    #[arg(long)]
    pub spacing: Option<f64>,

    /// Velocity window around the seeds, in km.
    #[arg(short, long)]
    pub buffer: Option<f64>,

    /// Stop where speed drops to this (m/yr).
    #[arg(long)]
    pub min_speed: Option<f64>,

    /// Drop slow, sparse, noisy, or ice-free cells first.
    #[arg(long)]
    pub screen: bool,

    /// Measure distance from the grounding line.
    #[arg(long)]
    pub grounding_line: bool,

    /// Include speed at each vertex.
    #[arg(long)]
    pub speed: bool,

    #[arg(short, long, default_value_t = 0)]
    pub year: u16,
}

#[derive(Debug, Clone, Args)]
pub struct Displace {
    pub region: String,

    /// Start point, repeatable.
    #[arg(short, long, required = true, allow_hyphen_values = true)]
    pub point: Vec<Pair>,

    #[command(flatten)]
    pub coords: CoordArgs,

    /// Elapsed years, repeatable, negative to go back.
    #[arg(long, required = true, allow_negative_numbers = true)]
    pub dt: Vec<f64>,

    /// Velocity window half-width, in km.
    #[arg(short, long)]
    pub window: Option<f64>,

    #[arg(short, long, default_value_t = 0)]
    pub year: u16,
}

/// Forces how coordinate pairs are read. Guessed from their range
/// otherwise.
#[derive(Debug, Clone, Copy, Args)]
pub struct CoordArgs {
    /// Pairs are native "x,y" meters.
    #[arg(long, conflicts_with = "geographic")]
    pub native: bool,

    /// Pairs are "lat,lon" degrees.
    #[arg(long)]
    pub geographic: bool,
}

impl CoordArgs {
    pub fn mode(self) -> CoordMode {
        match (self.native, self.geographic) {
            (true, _) => CoordMode::Native,
            (_, true) => CoordMode::Geographic,
            _ => CoordMode::Auto,
        }
    }
}

/// A comma separated pair of numbers.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Pair(pub f64, pub f64);

impl FromStr for Pair {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (a, b) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid 'a,b' pair"))?;
        Ok(Self(f64::from_str(a.trim())?, f64::from_str(b.trim())?))
    }
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct BufferArg(pub Buffer);

impl FromStr for BufferArg {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        Ok(Self(match s.parse::<Pair>() {
            Ok(Pair(x, y)) => Buffer::PerAxis { x, y },
            Err(_) => Buffer::Uniform(f64::from_str(s)?),
        }))
    }
}
