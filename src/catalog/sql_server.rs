use super::{
    CommandRunner, ConnectionSnafu, LoginSnafu, MetadataProvider, MissingColumnSnafu, QuerySnafu,
    Result,
};
use crate::config::DbConfig;
use crate::models::{IndexDescriptor, IndexKind, ObjectFilter, RowGroupDescriptor, RowGroupState};
use snafu::{OptionExt, ResultExt};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

const APPLICATION_NAME: &str = "colfrag";

const COLUMNSTORE_INDEX_QUERY: &str = r#"
    SELECT
        i.object_id,
        s.name AS schema_name,
        t.name AS table_name,
        i.name AS index_name,
        i.index_id,
        i.type AS index_type
    FROM sys.indexes AS i
    JOIN sys.tables AS t ON t.object_id = i.object_id
    JOIN sys.schemas AS s ON s.schema_id = t.schema_id
    WHERE i.type IN (5, 6)
      AND (@P1 IS NULL OR s.name = @P1)
      AND (@P2 IS NULL OR t.name = @P2)
    ORDER BY s.name, t.name, i.name
"#;

const ROW_GROUP_QUERY: &str = r#"
    SELECT
        rg.object_id,
        rg.index_id,
        rg.row_group_id,
        rg.state_description,
        rg.total_rows,
        rg.deleted_rows
    FROM sys.column_store_row_groups AS rg
    WHERE rg.object_id = @P1
      AND rg.index_id = @P2
    ORDER BY rg.row_group_id
"#;

/// Metadata provider backed by a live SQL Server connection.
pub struct SqlServerCatalog {
    database: String,
    client: Client<Compat<TcpStream>>,
}

impl SqlServerCatalog {
    /// Opens a session. `read_only` sets read-intent, which excludes running maintenance commands.
    pub async fn connect(config: &DbConfig, read_only: bool) -> Result<Self> {
        let mut tds_config = Config::new();
        tds_config.host(&config.host);
        tds_config.port(config.port);
        tds_config.database(&config.database);
        tds_config.authentication(AuthMethod::sql_server(&config.username, &config.password));
        tds_config.application_name(APPLICATION_NAME);
        tds_config.readonly(read_only);
        if config.trust_cert {
            tds_config.trust_cert();
        }
        tds_config.encryption(if config.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });

        let address = tds_config.get_addr();
        info!("Connecting to SQL Server at {}", address);

        let tcp = TcpStream::connect(&address).await.context(ConnectionSnafu {
            address: address.clone(),
        })?;
        tcp.set_nodelay(true)
            .context(ConnectionSnafu { address })?;

        let client = Client::connect(tds_config, tcp.compat_write())
            .await
            .context(LoginSnafu)?;

        info!("Successfully connected to database: {}", config.database);

        Ok(Self {
            database: config.database.clone(),
            client,
        })
    }

    async fn fetch_rows(&mut self, query: Query<'_>, text: &str) -> Result<Vec<Row>> {
        let stream = query
            .query(&mut self.client)
            .await
            .context(QuerySnafu { query: text })?;
        stream
            .into_first_result()
            .await
            .context(QuerySnafu { query: text })
    }
}

fn required<'a, R>(row: &'a Row, column: &str, query: &str) -> Result<R>
where
    R: FromSql<'a>,
{
    row.try_get::<R, _>(column)
        .context(QuerySnafu { query })?
        .context(MissingColumnSnafu { column, query })
}

impl MetadataProvider for SqlServerCatalog {
    fn target(&self) -> &str {
        &self.database
    }

    async fn list_columnstore_indexes(
        &mut self,
        filter: &ObjectFilter,
    ) -> Result<Vec<IndexDescriptor>> {
        let mut query = Query::new(COLUMNSTORE_INDEX_QUERY);
        query.bind(filter.schema.clone());
        query.bind(filter.table.clone());

        let rows = self.fetch_rows(query, COLUMNSTORE_INDEX_QUERY).await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let schema_name: &str = required(row, "schema_name", COLUMNSTORE_INDEX_QUERY)?;
            let table_name: &str = required(row, "table_name", COLUMNSTORE_INDEX_QUERY)?;
            let index_name: &str = required(row, "index_name", COLUMNSTORE_INDEX_QUERY)?;
            let index_type: u8 = required(row, "index_type", COLUMNSTORE_INDEX_QUERY)?;

            indexes.push(IndexDescriptor {
                object_id: required(row, "object_id", COLUMNSTORE_INDEX_QUERY)?,
                schema_name: schema_name.to_string(),
                table_name: table_name.to_string(),
                index_name: index_name.to_string(),
                index_id: required(row, "index_id", COLUMNSTORE_INDEX_QUERY)?,
                kind: IndexKind::from_type_code(index_type),
            });
        }

        debug!("Fetched {} column-store indexes ({})", indexes.len(), filter);
        Ok(indexes)
    }

    async fn list_row_groups(
        &mut self,
        index: &IndexDescriptor,
    ) -> Result<Vec<RowGroupDescriptor>> {
        let mut query = Query::new(ROW_GROUP_QUERY);
        query.bind(index.object_id);
        query.bind(index.index_id);

        let rows = self.fetch_rows(query, ROW_GROUP_QUERY).await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            let state: &str = required(row, "state_description", ROW_GROUP_QUERY)?;
            let deleted_rows: Option<i64> = row
                .try_get("deleted_rows")
                .context(QuerySnafu {
                    query: ROW_GROUP_QUERY,
                })?;

            groups.push(RowGroupDescriptor {
                object_id: required(row, "object_id", ROW_GROUP_QUERY)?,
                index_id: required(row, "index_id", ROW_GROUP_QUERY)?,
                row_group_id: required(row, "row_group_id", ROW_GROUP_QUERY)?,
                state: RowGroupState::from_description(state),
                total_rows: required(row, "total_rows", ROW_GROUP_QUERY)?,
                deleted_rows,
            });
        }

        debug!(
            "Fetched {} row groups for {}.{}.{}",
            groups.len(),
            index.schema_name,
            index.table_name,
            index.index_name
        );
        Ok(groups)
    }
}

impl CommandRunner for SqlServerCatalog {
    async fn execute(&mut self, command: &str) -> Result<u64> {
        let result = self
            .client
            .execute(command, &[])
            .await
            .context(QuerySnafu { query: command })?;
        Ok(result.total())
    }
}
