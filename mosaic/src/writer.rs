//! Mosaic writer.

use crate::{MosaicError, C};
use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
};
use tiff::{
    encoder::{colortype, TiffEncoder, TiffValue},
    tags::Tag,
};

/// Row order of pages on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// First stored row is the northernmost (the GeoTIFF norm).
    #[default]
    NorthUp,

    /// First stored row is the southernmost.
    SouthUp,
}

enum Samples {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

struct Page {
    name: String,
    fill: Option<f32>,
    samples: Samples,
}

/// Writes a multi-page GeoTIFF mosaic readable by [`crate::Mosaic`].
///
/// Pages are supplied north-up, row-major, and flipped on write when
/// the orientation is [`Orientation::SouthUp`].
pub struct MosaicWriter {
    /// Pixel-center eastings, ascending and evenly spaced.
    x: Vec<C>,

    /// Pixel-center northings, descending and evenly spaced.
    y: Vec<C>,

    orientation: Orientation,

    rows_per_strip: u32,

    pages: Vec<Page>,
}

impl MosaicWriter {
    pub fn new(x: Vec<C>, y: Vec<C>) -> Self {
        Self {
            x,
            y,
            orientation: Orientation::NorthUp,
            rows_per_strip: 64,
            pages: Vec::new(),
        }
    }

    #[must_use]
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    #[must_use]
    pub fn rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = rows.max(1);
        self
    }

    /// Adds a float page.
    #[must_use]
    pub fn continuous(mut self, name: &str, samples: Vec<f32>, fill: Option<f32>) -> Self {
        self.pages.push(Page {
            name: name.to_owned(),
            fill,
            samples: Samples::F32(samples),
        });
        self
    }

    /// Adds a byte page holding 0/1.
    #[must_use]
    pub fn mask(mut self, name: &str, samples: Vec<bool>) -> Self {
        self.pages.push(Page {
            name: name.to_owned(),
            fill: None,
            samples: Samples::U8(samples.into_iter().map(u8::from).collect()),
        });
        self
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), MosaicError> {
        let (dx, dy) = self.spacing()?;
        if self.pages.is_empty() {
            return Err(MosaicError::Invalid("mosaic has no variables".to_owned()));
        }
        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        for page in &self.pages {
            match &page.samples {
                Samples::F32(samples) => {
                    let stored = self.storage_order(samples, page)?;
                    self.write_page::<_, colortype::Gray32Float>(
                        &mut encoder,
                        page,
                        (dx, dy),
                        &stored,
                    )?;
                }
                Samples::U8(samples) => {
                    let stored = self.storage_order(samples, page)?;
                    self.write_page::<_, colortype::Gray8>(&mut encoder, page, (dx, dy), &stored)?;
                }
            }
        }
        Ok(())
    }
}

/// Private API.
impl MosaicWriter {
    /// Returns (dx, dy) after checking both axes are evenly spaced in
    /// the expected direction.
    fn spacing(&self) -> Result<(C, C), MosaicError> {
        fn step(axis: &[C], name: &str) -> Result<C, MosaicError> {
            let step = match axis {
                [] => return Err(MosaicError::Invalid(format!("empty {name} axis"))),
                [_] => return Err(MosaicError::Invalid(format!("{name} axis needs two samples"))),
                [a, b, ..] => b - a,
            };
            let even = axis
                .windows(2)
                .all(|w| ((w[1] - w[0]) - step).abs() <= step.abs() * 1e-9);
            if even {
                Ok(step)
            } else {
                Err(MosaicError::Invalid(format!("{name} axis is not evenly spaced")))
            }
        }
        let dx = step(&self.x, "x")?;
        let dy = step(&self.y, "y")?;
        if dx <= 0.0 || dy >= 0.0 {
            return Err(MosaicError::Invalid(
                "x must ascend and y must descend".to_owned(),
            ));
        }
        Ok((dx, -dy))
    }

    fn storage_order<T: Copy>(&self, samples: &[T], page: &Page) -> Result<Vec<T>, MosaicError> {
        let (width, height) = (self.x.len(), self.y.len());
        if samples.len() != width * height {
            return Err(MosaicError::Invalid(format!(
                "variable '{}' has {} samples, grid is {height}x{width}",
                page.name,
                samples.len()
            )));
        }
        Ok(match self.orientation {
            Orientation::NorthUp => samples.to_vec(),
            Orientation::SouthUp => samples
                .chunks_exact(width)
                .rev()
                .flatten()
                .copied()
                .collect(),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_page<W, K>(
        &self,
        encoder: &mut TiffEncoder<W>,
        page: &Page,
        (dx, dy): (C, C),
        samples: &[K::Inner],
    ) -> Result<(), MosaicError>
    where
        W: Write + Seek,
        K: colortype::ColorType,
        [K::Inner]: TiffValue,
    {
        let mut image = encoder.new_image::<K>(self.x.len() as u32, self.y.len() as u32)?;
        let west = self.x[0] - dx / 2.0;
        let north = self.y[0] + dy / 2.0;
        {
            let dir = image.encoder();
            dir.write_tag(Tag::ImageDescription, page.name.as_str())?;
            match self.orientation {
                Orientation::NorthUp => {
                    dir.write_tag(Tag::ModelPixelScaleTag, &[dx, dy, 0.0][..])?;
                    dir.write_tag(
                        Tag::ModelTiepointTag,
                        &[0.0, 0.0, 0.0, west, north, 0.0][..],
                    )?;
                }
                Orientation::SouthUp => {
                    let south = north - dy * self.y.len() as C;
                    #[rustfmt::skip]
                    let transform = [
                        dx,  0.0, 0.0, west,
                        0.0, dy,  0.0, south,
                        0.0, 0.0, 0.0, 0.0,
                        0.0, 0.0, 0.0, 1.0,
                    ];
                    dir.write_tag(Tag::ModelTransformationTag, &transform[..])?;
                }
            }
            // Version 1.1.0, GTModelType = projected, GTRasterType = area.
            let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
            dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;
            if let Some(fill) = page.fill {
                dir.write_tag(Tag::GdalNodata, fill.to_string().as_str())?;
            }
        }
        image.rows_per_strip(self.rows_per_strip)?;
        image.write_data(samples)?;
        Ok(())
    }
}
