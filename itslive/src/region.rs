//! Static catalog of ITS_LIVE mosaic regions.

use crate::{projection::Projection, ItsLiveError};
use std::{fmt, str::FromStr};

/// A named mosaic region.
///
/// Regions are looked up from the static [`REGIONS`] table and never
/// constructed elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// RGI region number.
    pub id: u8,

    /// Three letter code used in file names.
    pub code: &'static str,

    pub name: &'static str,

    pub projection: Projection,
}

pub static REGIONS: [Region; 8] = [
    Region {
        id: 1,
        code: "ALA",
        name: "Alaska",
        projection: Projection::NorthPolarStereographic,
    },
    Region {
        id: 3,
        code: "CAN",
        name: "Arctic Canada",
        projection: Projection::NorthPolarStereographic,
    },
    Region {
        id: 5,
        code: "GRE",
        name: "Greenland",
        projection: Projection::NorthPolarStereographic,
    },
    Region {
        id: 6,
        code: "ICE",
        name: "Iceland",
        projection: Projection::NorthPolarStereographic,
    },
    Region {
        id: 7,
        code: "SRA",
        name: "Svalbard and Russian Arctic",
        projection: Projection::NorthPolarStereographic,
    },
    Region {
        id: 13,
        code: "HMA",
        name: "High Mountain Asia",
        projection: Projection::AsiaAlbers,
    },
    Region {
        id: 17,
        code: "PAT",
        name: "Patagonia",
        projection: Projection::Utm18South,
    },
    Region {
        id: 19,
        code: "ANT",
        name: "Antarctica",
        projection: Projection::SouthPolarStereographic,
    },
];

impl Region {
    /// Returns the region with RGI number `id`.
    pub fn from_id(id: u8) -> Result<&'static Self, ItsLiveError> {
        REGIONS
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ItsLiveError::UnknownRegion(id.to_string()))
    }

    /// Looks up a region by id, `RGInn`, code, or name.
    ///
    /// Codes and names are matched case-insensitively and names may
    /// use spaces, hyphens, or underscores between words.
    pub fn lookup(key: &str) -> Result<&'static Self, ItsLiveError> {
        let key = key.trim();
        let numeric = key
            .get(..3)
            .filter(|prefix| prefix.eq_ignore_ascii_case("rgi"))
            .map_or(key, |_| &key[3..]);
        if let Ok(id) = numeric.parse::<u8>() {
            return Self::from_id(id);
        }
        let normalized = normalize(key);
        REGIONS
            .iter()
            .find(|r| r.code.eq_ignore_ascii_case(key) || normalize(r.name) == normalized)
            .ok_or_else(|| ItsLiveError::UnknownRegion(key.to_owned()))
    }

    /// Returns the mosaic file name for `year` (0 is the summary
    /// mosaic).
    pub fn file_name(&self, product_tag: &str, year: u16, extension: &str) -> String {
        format!("{}_{product_tag}_{year:04}.{extension}", self.code)
    }

    /// Returns the mosaic file name keyed on the zero-padded region
    /// number instead of the code, e.g. `01_G0120_0000.tif`.
    pub fn numbered_file_name(&self, product_tag: &str, year: u16, extension: &str) -> String {
        format!("{:02}_{product_tag}_{year:04}.{extension}", self.id)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.name)
    }
}

impl FromStr for &'static Region {
    type Err = ItsLiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::lookup(s)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '_' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn catalog_summary() -> String {
    REGIONS
        .iter()
        .map(|r| format!("{} {}", r.id, r.code))
        .collect::<Vec<_>>()
        .join(", ")
}
