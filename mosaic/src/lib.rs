//! ITS_LIVE velocity mosaic (`.tif`) file format.
//!
//! A mosaic holds every gridded variable for one region and one year
//! slot as a multi-page GeoTIFF. Each page is one variable:
//!
//! - `ImageDescription` carries the variable name,
//! - `GDAL_NODATA` carries the fill sentinel, if any,
//! - `ModelPixelScale` + `ModelTiepoint` (north-up) or
//!   `ModelTransformation` (either orientation) locate the grid.
//!
//! All pages share one grid. Reads are windowed: only the strips or
//! tiles intersecting the requested rows and columns are decoded.
//!
//! # References
//!
//! 1. [ITS_LIVE](https://its-live.jpl.nasa.gov)
//! 1. [OGC GeoTIFF standard](https://docs.ogc.org/is/19-008r4/19-008r4.html)
//! 1. [GDAL GeoTIFF driver, nodata](https://gdal.org/drivers/raster/gtiff.html#nodata-value)

mod error;
mod writer;

pub use crate::{
    error::MosaicError,
    writer::{MosaicWriter, Orientation},
};
use ndarray::Array2;
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    mem::size_of,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    tags::Tag,
    ColorType,
};

/// Base floating point type used for grid coordinates.
pub type C = f64;

/// Variables treated as masks when their storage type doesn't say.
pub const MASK_NAMES: [&str; 5] = ["landice", "floatingice", "rock", "ocean", "sensor_flag"];

/// Grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// How a variable's samples are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Floating point field, NaN filled, linearly interpolable.
    Continuous,

    /// Boolean or categorical field, nearest-neighbor only, false
    /// filled.
    Mask,
}

impl VariableKind {
    /// Resolves the kind of variable `name` stored as `pixel`.
    ///
    /// Byte pages are masks and floating point pages are continuous.
    /// Wider integer pages are ambiguous (ITS_LIVE stores both
    /// velocities and flags as integers), so those fall back to
    /// [`MASK_NAMES`].
    pub fn resolve(name: &str, pixel: PixelType) -> Self {
        match pixel {
            PixelType::U8 | PixelType::I8 => Self::Mask,
            PixelType::F32 | PixelType::F64 => Self::Continuous,
            _ => Self::from_name(name),
        }
    }

    pub fn from_name(name: &str) -> Self {
        if MASK_NAMES.contains(&name) {
            Self::Mask
        } else {
            Self::Continuous
        }
    }
}

/// Storage type of a variable's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    fn from_tiff(color: ColorType, sample_format: u32) -> Option<Self> {
        match (color, sample_format) {
            (ColorType::Gray(8), 1) => Some(Self::U8),
            (ColorType::Gray(8), 2) => Some(Self::I8),
            (ColorType::Gray(16), 1) => Some(Self::U16),
            (ColorType::Gray(16), 2) => Some(Self::I16),
            (ColorType::Gray(32), 1) => Some(Self::U32),
            (ColorType::Gray(32), 2) => Some(Self::I32),
            (ColorType::Gray(32), 3) => Some(Self::F32),
            (ColorType::Gray(64), 3) => Some(Self::F64),
            _ => None,
        }
    }
}

/// One entry of a mosaic's variable catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    /// Zero-based TIFF page (IFD) holding this variable.
    page: usize,
    pixel: PixelType,
    kind: VariableKind,
    fill: Option<f64>,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixel(&self) -> PixelType {
        self.pixel
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Raw value marking missing samples, as written in `GDAL_NODATA`.
    pub fn fill(&self) -> Option<f64> {
        self.fill
    }

    /// Returns true if `sample`, as returned by [`Mosaic::read_window`],
    /// is this variable's fill value.
    ///
    /// The sentinel goes through the same narrowing to `f32` as the
    /// samples, so a value such as `-9999.9` that `f32` can't hold
    /// exactly still matches.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn is_fill(&self, sample: f32) -> bool {
        match self.fill {
            Some(fill) if fill.is_nan() => sample.is_nan(),
            Some(fill) => sample == fill as f32,
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Mosaic {
    path: PathBuf,

    /// Pixel-center eastings, one per column, in storage order.
    x: Vec<C>,

    /// Pixel-center northings, one per row, in storage order.
    y: Vec<C>,

    /// Catalog, in page order.
    variables: Vec<Variable>,
}

impl Mosaic {
    /// Opens the mosaic at `path` and reads its catalog and axes.
    ///
    /// Sample data is not read until [`Mosaic::read_window`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MosaicError> {
        let path = path.as_ref().to_owned();
        let mut decoder = open_decoder(&path)?;
        let dimensions = decoder.dimensions()?;
        let (x, y) = read_axes(&mut decoder, dimensions)?
            .ok_or_else(|| MosaicError::Georeference(path.clone()))?;

        let mut variables: Vec<Variable> = Vec::new();
        let mut page = 0;
        loop {
            let found = decoder.dimensions()?;
            let name = ascii_tag(&mut decoder, Tag::ImageDescription)?
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("band{}", page + 1));
            if found != dimensions {
                return Err(MosaicError::Dimensions {
                    name,
                    found,
                    expected: dimensions,
                });
            }
            if variables.iter().any(|v| v.name == name) {
                return Err(MosaicError::Invalid(format!("duplicate variable '{name}'")));
            }
            let sample_format = match decoder.find_tag(Tag::SampleFormat)? {
                Some(value) => value.into_u32()?,
                None => 1,
            };
            let pixel = PixelType::from_tiff(decoder.colortype()?, sample_format)
                .ok_or_else(|| MosaicError::Pixels(name.clone()))?;
            let fill = ascii_tag(&mut decoder, Tag::GdalNodata)?
                .and_then(|nodata| nodata.parse::<f64>().ok());
            let kind = VariableKind::resolve(&name, pixel);
            variables.push(Variable {
                name,
                page,
                pixel,
                kind,
                fill,
            });

            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
            page += 1;
        }

        Ok(Self {
            path,
            x,
            y,
            variables,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns (rows, columns).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Returns the pixel-center coordinates along `axis`, in storage
    /// order.
    pub fn axis(&self, axis: Axis) -> &[C] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Returns every name in the catalog, including the `x` and `y`
    /// axes.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|v| v.name.clone())
            .chain(["x".to_owned(), "y".to_owned()])
            .collect()
    }

    /// Returns the named variable, or an error listing the catalog.
    pub fn variable(&self, name: &str) -> Result<&Variable, MosaicError> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| MosaicError::UnknownVariable {
                name: name.to_owned(),
                available: self.variable_names(),
            })
    }

    /// Reads the closed `rows` x `cols` window of variable `name`.
    ///
    /// Samples are returned raw, in storage orientation, with no fill
    /// substitution.
    pub fn read_window(
        &self,
        name: &str,
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
    ) -> Result<Array2<f32>, MosaicError> {
        let variable = self.variable(name)?;
        let (height, width) = self.dimensions();
        if rows.is_empty() || cols.is_empty() || *rows.end() >= height || *cols.end() >= width {
            return Err(MosaicError::Window {
                rows,
                cols,
                height,
                width,
            });
        }

        let mut decoder = open_decoder(&self.path)?;
        for _ in 0..variable.page {
            decoder.next_image()?;
        }

        let (chunk_w, chunk_h) = {
            let (w, h) = decoder.chunk_dimensions();
            (w as usize, h as usize)
        };
        let chunks_across = width.div_ceil(chunk_w);
        let (row_lo, row_hi) = (*rows.start(), *rows.end());
        let (col_lo, col_hi) = (*cols.start(), *cols.end());
        let mut window = Array2::from_elem((row_hi - row_lo + 1, col_hi - col_lo + 1), f32::NAN);

        for chunk_row in (row_lo / chunk_h)..=(row_hi / chunk_h) {
            for chunk_col in (col_lo / chunk_w)..=(col_hi / chunk_w) {
                #[allow(clippy::cast_possible_truncation)]
                let index = (chunk_row * chunks_across + chunk_col) as u32;
                let (data_w, data_h) = {
                    let (w, h) = decoder.chunk_data_dimensions(index);
                    (w as usize, h as usize)
                };
                let samples = to_f32(decoder.read_chunk(index)?, &variable.name)?;
                let (row0, col0) = (chunk_row * chunk_h, chunk_col * chunk_w);
                for row in row_lo.max(row0)..=row_hi.min(row0 + data_h - 1) {
                    for col in col_lo.max(col0)..=col_hi.min(col0 + data_w - 1) {
                        window[[row - row_lo, col - col_lo]] =
                            samples[(row - row0) * data_w + (col - col0)];
                    }
                }
            }
        }

        Ok(window)
    }

    /// Reads all of variable `name`.
    pub fn read(&self, name: &str) -> Result<Array2<f32>, MosaicError> {
        let (height, width) = self.dimensions();
        self.read_window(name, 0..=height.saturating_sub(1), 0..=width.saturating_sub(1))
    }

    /// Approximate number of heap bytes held by this handle.
    pub fn footprint(&self) -> usize {
        let catalog: usize = self
            .variables
            .iter()
            .map(|v| size_of::<Variable>() + v.name.len())
            .sum();
        size_of::<Self>()
            + (self.x.len() + self.y.len()) * size_of::<C>()
            + self.path.as_os_str().len()
            + catalog
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, MosaicError> {
    let file = BufReader::new(File::open(path)?);
    Ok(Decoder::new(file)?.with_limits(Limits::unlimited()))
}

fn ascii_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<String>, MosaicError> {
    Ok(match decoder.find_tag(tag)? {
        Some(value) => Some(value.into_string()?.trim_end_matches('\0').trim().to_owned()),
        None => None,
    })
}

fn f64_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, MosaicError> {
    Ok(match decoder.find_tag(tag)? {
        Some(value) => Some(value.into_f64_vec()?),
        None => None,
    })
}

/// Returns pixel-center (x, y) axes in storage order, or `None` if the
/// page isn't georeferenced by an axis-aligned transform.
#[allow(clippy::type_complexity)]
fn read_axes<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    (width, height): (u32, u32),
) -> Result<Option<(Vec<C>, Vec<C>)>, MosaicError> {
    let transform = if let Some(m) = f64_tag(decoder, Tag::ModelTransformationTag)? {
        // Row-major 4x4: x = m0*col + m1*row + m3, y = m4*col + m5*row + m7.
        if m.len() < 8 || m[1] != 0.0 || m[4] != 0.0 {
            return Ok(None);
        }
        (m[3], m[0], m[7], m[5])
    } else {
        let scale = f64_tag(decoder, Tag::ModelPixelScaleTag)?;
        let tiepoint = f64_tag(decoder, Tag::ModelTiepointTag)?;
        match (scale, tiepoint) {
            (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => (
                tie[3] - tie[0] * scale[0],
                scale[0],
                tie[4] + tie[1] * scale[1],
                -scale[1],
            ),
            _ => return Ok(None),
        }
    };

    let (origin_x, dx, origin_y, dy) = transform;
    if dx <= 0.0 || dy == 0.0 {
        return Ok(None);
    }
    let x = (0..width)
        .map(|col| origin_x + (C::from(col) + 0.5) * dx)
        .collect();
    let y = (0..height)
        .map(|row| origin_y + (C::from(row) + 0.5) * dy)
        .collect();
    Ok(Some((x, y)))
}

/// Widens or narrows decoded samples to `f32`.
///
/// `I32`, `U32` and `F64` pages lose precision beyond 24 significant
/// bits. Velocities, errors and counts are far inside that range, and
/// [`Variable::is_fill`] narrows the sentinel the same way.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn to_f32(result: DecodingResult, name: &str) -> Result<Vec<f32>, MosaicError> {
    Ok(match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
        _ => return Err(MosaicError::Pixels(name.to_owned())),
    })
}
