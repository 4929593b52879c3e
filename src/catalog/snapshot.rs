use super::{MetadataProvider, Result, SnapshotJsonSnafu, SnapshotReadSnafu, SnapshotYamlSnafu};
use crate::models::{IndexDescriptor, ObjectFilter, RowGroupDescriptor};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::fs;
use std::path::Path;

/// Catalog contents captured ahead of time, loadable from YAML or JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub row_groups: Vec<RowGroupDescriptor>,
}

/// Offline metadata provider over a [`CatalogSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotCatalog {
    name: String,
    snapshot: CatalogSnapshot,
}

impl SnapshotCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        let name = snapshot
            .database
            .clone()
            .unwrap_or_else(|| "snapshot".to_string());
        Self { name, snapshot }
    }

    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = fs::read_to_string(path).context(SnapshotReadSnafu { path: &display })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let snapshot: CatalogSnapshot = if is_json {
            serde_json::from_str(&content).context(SnapshotJsonSnafu { path: &display })?
        } else {
            serde_yaml::from_str(&content).context(SnapshotYamlSnafu { path: &display })?
        };

        Ok(Self::new(snapshot))
    }
}

impl MetadataProvider for SnapshotCatalog {
    fn target(&self) -> &str {
        &self.name
    }

    async fn list_columnstore_indexes(
        &mut self,
        filter: &ObjectFilter,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(self
            .snapshot
            .indexes
            .iter()
            .filter(|index| index.kind.is_columnstore())
            .filter(|index| filter.matches(&index.schema_name, &index.table_name))
            .cloned()
            .collect())
    }

    async fn list_row_groups(
        &mut self,
        index: &IndexDescriptor,
    ) -> Result<Vec<RowGroupDescriptor>> {
        Ok(self
            .snapshot
            .row_groups
            .iter()
            .filter(|group| group.belongs_to(index))
            .cloned()
            .collect())
    }
}
