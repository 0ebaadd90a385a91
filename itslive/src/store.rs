//! Mosaic file store.

use crate::{
    projection::{CoordinateTransform, RegionTransform},
    ItsLiveError, Region, C,
};
use log::debug;
use lru::LruCache;
use mosaic::{Axis, Mosaic};
use ndarray::Array2;
use std::{
    ops::RangeInclusive,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

/// Default product tag in mosaic file names (120 m annual mosaics).
pub const DEFAULT_PRODUCT_TAG: &str = "G0120";

/// Default mosaic file extension.
pub const DEFAULT_EXTENSION: &str = "tif";

/// Default budget for cached mosaic handles.
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory containing mosaic files.
    pub root: PathBuf,

    /// Middle component of mosaic file names.
    pub product_tag: String,

    /// Mosaic file extension, without the dot.
    pub extension: String,

    /// Upper bound on bytes held by cached mosaic handles.
    pub cache_budget_bytes: usize,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            product_tag: DEFAULT_PRODUCT_TAG.to_owned(),
            extension: DEFAULT_EXTENSION.to_owned(),
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
        }
    }
}

/// Open mosaics, least recently used first out.
struct MosaicCache {
    entries: LruCache<(u8, u16), Arc<Mosaic>>,
    bytes: usize,
    budget: usize,
}

impl MosaicCache {
    fn insert(&mut self, key: (u8, u16), mosaic: Arc<Mosaic>) {
        let size = mosaic.footprint();
        if size > self.budget {
            debug!("not caching {:?}, {size} bytes exceeds budget", mosaic.path());
            return;
        }
        while self.bytes + size > self.budget {
            match self.entries.pop_lru() {
                Some((evicted, handle)) => {
                    debug!("evicting mosaic {evicted:?}");
                    self.bytes = self.bytes.saturating_sub(handle.footprint());
                }
                None => break,
            }
        }
        if let Some(old) = self.entries.put(key, mosaic) {
            self.bytes = self.bytes.saturating_sub(old.footprint());
        }
        self.bytes += size;
    }
}

/// Directory of mosaic files plus the coordinate transform for their
/// regions.
///
/// Mosaic handles (catalog and axes, not sample data) are cached and
/// shared between threads.
pub struct MosaicStore {
    config: StoreConfig,
    transform: Box<dyn CoordinateTransform>,
    cache: Mutex<MosaicCache>,
}

impl MosaicStore {
    pub fn new(config: StoreConfig) -> Result<Self, ItsLiveError> {
        let mut has_mosaics = false;

        // Fail early if the root holds nothing we could ever open.
        for entry in std::fs::read_dir(&config.root)? {
            let path = entry?.path();
            let ext = path.extension().and_then(std::ffi::OsStr::to_str);
            if ext.is_some_and(|ext| ext.eq_ignore_ascii_case(&config.extension)) {
                has_mosaics = true;
                break;
            }
        }

        if has_mosaics {
            let cache = Mutex::new(MosaicCache {
                entries: LruCache::unbounded(),
                bytes: 0,
                budget: config.cache_budget_bytes,
            });
            Ok(Self {
                config,
                transform: Box::new(RegionTransform::new()?),
                cache,
            })
        } else {
            Err(ItsLiveError::EmptyStore(config.root))
        }
    }

    /// Replaces the built-in region projections.
    #[must_use]
    pub fn with_transform(mut self, transform: Box<dyn CoordinateTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn transform(&self) -> &dyn CoordinateTransform {
        self.transform.as_ref()
    }

    /// Returns the path of the mosaic for `region` and `year`.
    ///
    /// Tries the canonical upper case name first, then lower case,
    /// then both again with the zero-padded region number in place of
    /// the code. A missing mosaic is reported with the years on disk.
    pub fn path(&self, region: &Region, year: u16) -> Result<PathBuf, ItsLiveError> {
        let StoreConfig {
            root,
            product_tag,
            extension,
            ..
        } = &self.config;
        let canonical = region.file_name(product_tag, year, extension);
        let numbered = region.numbered_file_name(product_tag, year, extension);
        let candidates = [
            canonical.clone(),
            canonical.to_lowercase(),
            numbered.clone(),
            numbered.to_lowercase(),
        ];
        for name in &candidates {
            let path = root.join(name);
            if path.exists() {
                return Ok(path);
            }
        }
        Err(ItsLiveError::MosaicNotFound {
            path: root.join(&canonical),
            available: self.available_years(region)?,
        })
    }

    /// Returns the mosaic for `region` and `year`, opening it if it
    /// isn't cached.
    pub fn open(&self, region: &Region, year: u16) -> Result<Arc<Mosaic>, ItsLiveError> {
        let key = (region.id, year);
        if let Some(mosaic) = self.lock().entries.get(&key) {
            return Ok(Arc::clone(mosaic));
        }
        let path = self.path(region, year)?;
        debug!("opening {path:?}");
        let mosaic = Arc::new(Mosaic::open(path)?);
        self.lock().insert(key, Arc::clone(&mosaic));
        Ok(mosaic)
    }

    /// Returns every variable name in the mosaic, `x` and `y`
    /// included.
    pub fn list_variables(&self, region: &Region, year: u16) -> Result<Vec<String>, ItsLiveError> {
        Ok(self.open(region, year)?.variable_names())
    }

    /// Reads raw samples, in storage orientation.
    pub fn read_window(
        &self,
        region: &Region,
        year: u16,
        variable: &str,
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
    ) -> Result<Array2<f32>, ItsLiveError> {
        Ok(self.open(region, year)?.read_window(variable, rows, cols)?)
    }

    /// Returns a full axis in storage order.
    pub fn read_axis(
        &self,
        region: &Region,
        year: u16,
        axis: Axis,
    ) -> Result<Vec<C>, ItsLiveError> {
        Ok(self.open(region, year)?.axis(axis).to_vec())
    }

    /// Returns the sorted year slots with a mosaic on disk for
    /// `region`.
    pub fn available_years(&self, region: &Region) -> Result<Vec<u16>, ItsLiveError> {
        let tag = &self.config.product_tag;
        let prefixes = [
            format!("{}_{tag}_", region.code).to_lowercase(),
            format!("{:02}_{tag}_", region.id).to_lowercase(),
        ];
        let suffix = format!(".{}", self.config.extension).to_lowercase();
        let mut years = Vec::new();
        for entry in std::fs::read_dir(&self.config.root)? {
            let name = entry?.file_name().to_string_lossy().to_lowercase();
            let year = prefixes
                .iter()
                .find_map(|prefix| name.strip_prefix(prefix.as_str()))
                .and_then(|rest| rest.strip_suffix(&suffix))
                .filter(|digits| digits.len() == 4)
                .and_then(|digits| digits.parse::<u16>().ok());
            if let Some(year) = year {
                years.push(year);
            }
        }
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }

    /// Returns true if the mosaic for `region` and `year` is cached.
    pub fn is_cached(&self, region: &Region, year: u16) -> bool {
        self.lock().entries.contains(&(region.id, year))
    }

    /// Bytes currently held by cached handles.
    pub fn cached_bytes(&self) -> usize {
        self.lock().bytes
    }
}

/// Private API.
impl MosaicStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MosaicCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{MosaicStore, StoreConfig};
    use crate::{projection::CoordinateTransform, testdata, ItsLiveError, Region, C};
    use geo::geometry::Coord;
    use mosaic::{Axis, Mosaic};
    use tempfile::TempDir;

    /// Kilometers per degree, good enough to tell it apart.
    struct Flat;

    impl CoordinateTransform for Flat {
        fn forward(&self, _: &Region, lat: C, lon: C) -> Result<Coord<C>, ItsLiveError> {
            Ok(Coord {
                x: lon * 1000.0,
                y: lat * 1000.0,
            })
        }

        fn inverse(&self, _: &Region, xy: Coord<C>) -> Result<(C, C), ItsLiveError> {
            Ok((xy.y / 1000.0, xy.x / 1000.0))
        }
    }

    #[test]
    fn test_replaced_transform() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let ala = Region::from_id(1).unwrap();
        let builtin = store.transform().forward(ala, 60.0, -140.0).unwrap();
        assert!(builtin.x < -1e6);

        let store = store.with_transform(Box::new(Flat));
        let xy = store.transform().forward(ala, 2.0, -3.0).unwrap();
        assert_eq!((xy.x, xy.y), (-3000.0, 2000.0));
        assert_eq!(store.transform().inverse(ala, xy).unwrap(), (2.0, -3.0));
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            MosaicStore::new(StoreConfig::new(dir.path())),
            Err(ItsLiveError::EmptyStore(_))
        ));
    }

    #[test]
    fn test_missing_mosaic() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let ala = Region::from_id(1).unwrap();
        match store.open(ala, 1999) {
            Err(ItsLiveError::MosaicNotFound { path, available }) => {
                assert!(path.ends_with("ALA_G0120_1999.tif"));
                assert_eq!(available, [0]);
            }
            other => panic!("expected MosaicNotFound, got {:?}", other.map(|_| ())),
        }
        let ant = Region::from_id(19).unwrap();
        assert!(store.open(ant, 0).is_err());
    }

    #[test]
    fn test_missing_mosaic_lists_years() {
        let (_dir, store) = testdata::uniform_store(&[0, 2018]);
        let ala = Region::from_id(1).unwrap();
        let msg = store.open(ala, 1999).unwrap_err().to_string();
        assert!(msg.contains("ALA_G0120_1999.tif"), "{msg}");
        assert!(msg.contains("0000, 2018"), "{msg}");

        let ant = Region::from_id(19).unwrap();
        let msg = store.open(ant, 2018).unwrap_err().to_string();
        assert!(msg.ends_with("are: none"), "{msg}");
    }

    #[test]
    fn test_region_number_file_names() {
        let dir = TempDir::new().unwrap();
        testdata::write_uniform(dir.path(), "01_G0120_0000.tif");
        testdata::write_uniform(dir.path(), "01_g0120_2018.tif");
        let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
        let ala = Region::from_id(1).unwrap();
        assert!(store.path(ala, 0).unwrap().ends_with("01_G0120_0000.tif"));
        assert!(store.path(ala, 2018).unwrap().ends_with("01_g0120_2018.tif"));
        assert_eq!(store.available_years(ala).unwrap(), [0, 2018]);
        assert!(store.open(ala, 2018).is_ok());
        let ant = Region::from_id(19).unwrap();
        assert!(store.available_years(ant).unwrap().is_empty());
    }

    #[test]
    fn test_lower_case_fallback() {
        let dir = TempDir::new().unwrap();
        testdata::write_uniform(dir.path(), "ala_g0120_0000.tif");
        let store = MosaicStore::new(StoreConfig::new(dir.path())).unwrap();
        let ala = Region::from_id(1).unwrap();
        assert!(store.path(ala, 0).unwrap().ends_with("ala_g0120_0000.tif"));
    }

    #[test]
    fn test_catalog_and_axes() {
        let (_dir, store) = testdata::uniform_store(&[0]);
        let ala = Region::from_id(1).unwrap();
        let names = store.list_variables(ala, 0).unwrap();
        for expected in ["vx", "vy", "v", "v_error", "count", "landice", "date", "x", "y"] {
            assert!(names.iter().any(|n| n == expected), "{expected}");
        }
        let (x, y) = testdata::axes();
        assert_eq!(store.read_axis(ala, 0, Axis::X).unwrap(), x);
        assert_eq!(store.read_axis(ala, 0, Axis::Y).unwrap(), y);
        let window = store.read_window(ala, 0, "vx", 2..=3, 4..=6).unwrap();
        assert_eq!(window.dim(), (2, 3));

        assert!(matches!(
            store.read_window(ala, 0, "speed", 0..=0, 0..=0),
            Err(ItsLiveError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_available_years() {
        let (dir, store) = testdata::uniform_store(&[2019, 0, 2018]);
        std::fs::write(dir.path().join("ALA_G0120_20x9.tif"), b"").unwrap();
        std::fs::write(dir.path().join("ANT_G0120_2018.tif"), b"").unwrap();
        std::fs::write(dir.path().join("ALA_G0240_2017.tif"), b"").unwrap();
        let ala = Region::from_id(1).unwrap();
        assert_eq!(store.available_years(ala).unwrap(), [0, 2018, 2019]);
        let ant = Region::from_id(19).unwrap();
        assert_eq!(store.available_years(ant).unwrap(), [2018]);
    }

    #[test]
    fn test_lru_eviction() {
        let (dir, _) = testdata::uniform_store(&[0, 2018, 2019]);
        let ala = Region::from_id(1).unwrap();
        let footprint = Mosaic::open(dir.path().join("ALA_G0120_0000.tif"))
            .unwrap()
            .footprint();
        let mut config = StoreConfig::new(dir.path());
        config.cache_budget_bytes = footprint * 5 / 2;
        let store = MosaicStore::new(config).unwrap();

        store.open(ala, 0).unwrap();
        store.open(ala, 2018).unwrap();
        // Touch 0 so 2018 becomes least recently used.
        store.open(ala, 0).unwrap();
        store.open(ala, 2019).unwrap();

        assert!(store.is_cached(ala, 0));
        assert!(!store.is_cached(ala, 2018));
        assert!(store.is_cached(ala, 2019));
        assert!(store.cached_bytes() <= footprint * 5 / 2);
    }

    #[test]
    fn test_zero_budget_still_opens() {
        let (dir, _) = testdata::uniform_store(&[0]);
        let mut config = StoreConfig::new(dir.path());
        config.cache_budget_bytes = 0;
        let store = MosaicStore::new(config).unwrap();
        let ala = Region::from_id(1).unwrap();
        assert!(store.open(ala, 0).is_ok());
        assert!(!store.is_cached(ala, 0));
        assert_eq!(store.cached_bytes(), 0);
    }
}
