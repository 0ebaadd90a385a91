use mosaic::MosaicError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItsLiveError {
    #[error("missing required parameter: {0}")]
    Builder(&'static str),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("unknown region '{0}', valid regions are: {}", crate::region::catalog_summary())]
    UnknownRegion(String),

    #[error(
        "mosaic not found: {path:?}, available years for this region are: {}",
        year_list(available)
    )]
    MosaicNotFound { path: PathBuf, available: Vec<u16> },

    #[error("no mosaic files in {0:?}")]
    EmptyStore(PathBuf),

    #[error("unknown variable '{name}', valid variables are: {}", available.join(", "))]
    UnknownVariable { name: String, available: Vec<String> },

    #[error("no data in requested extent")]
    NoData,

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("projection: {0}")]
    Projection(String),

    #[error("iteration limit of {0} steps exceeded")]
    IterationLimit(usize),

    #[error("year {year} grid does not match year {reference}")]
    GridMismatch { year: u16, reference: u16 },

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Mosaic(MosaicError),
}

impl From<MosaicError> for ItsLiveError {
    fn from(err: MosaicError) -> Self {
        match err {
            MosaicError::UnknownVariable { name, available } => {
                Self::UnknownVariable { name, available }
            }
            other => Self::Mosaic(other),
        }
    }
}

impl From<crate::progress::Cancelled> for ItsLiveError {
    fn from(_: crate::progress::Cancelled) -> Self {
        Self::Cancelled
    }
}

fn year_list(years: &[u16]) -> String {
    if years.is_empty() {
        return "none".to_owned();
    }
    let years: Vec<String> = years.iter().map(|year| format!("{year:04}")).collect();
    years.join(", ")
}
