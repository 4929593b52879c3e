use crate::models::{IndexDescriptor, ObjectFilter, RowGroupDescriptor};
use snafu::Snafu;

mod snapshot;
mod sql_server;

pub use snapshot::{CatalogSnapshot, SnapshotCatalog};
pub use sql_server::SqlServerCatalog;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CatalogError {
    #[snafu(display("Failed to connect to SQL Server at {}: {}", address, source))]
    ConnectionError {
        address: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to open SQL Server session: {}", source))]
    LoginError { source: tiberius::error::Error },

    #[snafu(display("Failed to execute query: {}", query))]
    QueryError {
        query: String,
        source: tiberius::error::Error,
    },

    #[snafu(display("Column {} is missing or NULL in result of: {}", column, query))]
    MissingColumn { column: String, query: String },

    #[snafu(display("Failed to read catalog snapshot {}: {}", path, source))]
    SnapshotRead {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse YAML catalog snapshot {}: {}", path, source))]
    SnapshotYaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Failed to parse JSON catalog snapshot {}: {}", path, source))]
    SnapshotJson {
        path: String,
        source: serde_json::Error,
    },
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// Read-only access to column-store index metadata.
#[allow(async_fn_in_trait)]
pub trait MetadataProvider {
    /// Name of the database the metadata comes from, used in reports.
    fn target(&self) -> &str;

    /// Clustered and non-clustered column-store indexes matching `filter`.
    async fn list_columnstore_indexes(
        &mut self,
        filter: &ObjectFilter,
    ) -> Result<Vec<IndexDescriptor>>;

    /// Row groups belonging to `index`.
    async fn list_row_groups(&mut self, index: &IndexDescriptor)
        -> Result<Vec<RowGroupDescriptor>>;
}

/// Runs a single DDL statement, returning the affected row count.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn execute(&mut self, command: &str) -> Result<u64>;
}
