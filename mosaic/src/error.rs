use std::{ops::RangeInclusive, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("missing or unsupported georeferencing in {0}")]
    Georeference(PathBuf),

    #[error("unknown variable '{name}', valid variables are: {}", available.join(", "))]
    UnknownVariable { name: String, available: Vec<String> },

    #[error("window rows {rows:?}, cols {cols:?} outside {height}x{width} grid")]
    Window {
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
        height: usize,
        width: usize,
    },

    #[error("variable '{0}' has an unsupported sample format")]
    Pixels(String),

    #[error("variable '{name}' is {found:?} (cols, rows), expected {expected:?}")]
    Dimensions {
        name: String,
        found: (u32, u32),
        expected: (u32, u32),
    },

    #[error("invalid mosaic: {0}")]
    Invalid(String),
}
