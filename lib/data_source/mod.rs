pub mod normalize;
pub mod record;

use log::info;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use normalize::normalize_datacenter;
pub use record::Record;

#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of records to import.
///
/// Split into insertable (no id yet) and updatable (has an id) subsets.
pub trait DataSource: Send + Sync {
    fn insertable(&self) -> Vec<Record>;

    fn updatable(&self) -> Vec<Record>;

    /// Sets `import: true` on every record. The api rejects records without it.
    fn enable_import(&mut self);

    /// Resolves building references and date formats ahead of import.
    fn normalize(&mut self) {}
}

/// Datacenters and buildings loaded from the JSON export.
#[derive(Debug, Clone, Default)]
pub struct DataClient {
    datacenters: Vec<Record>,
    buildings: Vec<Record>,
}

impl DataClient {
    pub fn new(datacenters: Vec<Record>, buildings: Vec<Record>) -> Self {
        Self {
            datacenters,
            buildings,
        }
    }

    /// Loads both exports. No schema validation happens here; malformed records
    /// only surface as validation errors from the api.
    pub fn load(
        datacenters_path: impl AsRef<Path>,
        buildings_path: impl AsRef<Path>,
    ) -> Result<Self, DataSourceError> {
        let datacenters = load_records(datacenters_path.as_ref())?;
        let buildings = load_records(buildings_path.as_ref())?;
        info!(
            "Loaded {} datacenters and {} buildings",
            datacenters.len(),
            buildings.len()
        );
        Ok(Self::new(datacenters, buildings))
    }

    pub fn datacenters(&self) -> &[Record] {
        &self.datacenters
    }

    pub fn buildings(&self) -> &[Record] {
        &self.buildings
    }
}

impl DataSource for DataClient {
    fn insertable(&self) -> Vec<Record> {
        self.datacenters
            .iter()
            .filter(|dc| !dc.has_id())
            .cloned()
            .collect()
    }

    fn updatable(&self) -> Vec<Record> {
        self.datacenters
            .iter()
            .filter(|dc| dc.has_id())
            .cloned()
            .collect()
    }

    fn enable_import(&mut self) {
        for dc in self.datacenters.iter_mut() {
            dc.insert("import", Value::Bool(true));
        }
    }

    fn normalize(&mut self) {
        let buildings = &self.buildings;
        self.datacenters = self
            .datacenters
            .iter()
            .map(|dc| normalize_datacenter(dc, buildings))
            .collect();
    }
}

fn load_records(path: &Path) -> Result<Vec<Record>, DataSourceError> {
    let raw = fs::read_to_string(path).map_err(|source| DataSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| DataSourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}
