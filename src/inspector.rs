use crate::analysis::{commands, fragmentation};
use crate::catalog::{CatalogError, CommandRunner, MetadataProvider};
use crate::models::{
    Action, ActionOutput, ExecutedCommand, FragmentationRow, InspectionResults,
    MaintenanceCommandRow, ObjectFilter,
};
use snafu::{ResultExt, Snafu};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Snafu)]
pub enum InspectorError {
    #[snafu(display("Failed to read catalog metadata: {}", source))]
    CatalogError { source: CatalogError },

    #[snafu(display(
        "Maintenance command failed after {} succeeded: {}: {}",
        completed,
        command,
        source
    ))]
    ExecutionError {
        command: String,
        completed: usize,
        source: CatalogError,
    },
}

type Result<T, E = InspectorError> = std::result::Result<T, E>;

/// Runs one fragmentation report or command generation against a metadata provider.
pub struct FragmentationInspector<P> {
    provider: P,
}

impl<P: MetadataProvider> FragmentationInspector<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    pub async fn inspect(
        &mut self,
        filter: &ObjectFilter,
        action: Action,
    ) -> Result<InspectionResults> {
        info!(
            "Inspecting column-store indexes in {} ({}, action {})",
            self.provider.target(),
            filter,
            action.code()
        );

        let output = match action {
            Action::Report => {
                ActionOutput::Fragmentation(self.fragmentation_report(filter, false).await?)
            }
            Action::Fragmented => {
                ActionOutput::Fragmentation(self.fragmentation_report(filter, true).await?)
            }
            Action::Commands => ActionOutput::Commands(self.maintenance_commands(filter).await?),
        };

        if output.is_empty() {
            warn!("No column-store indexes matched {}", filter);
        }

        Ok(InspectionResults {
            target: self.provider.target().to_string(),
            action,
            filter: filter.clone(),
            output,
            executed: Vec::new(),
        })
    }

    async fn fragmentation_report(
        &mut self,
        filter: &ObjectFilter,
        only_fragmented: bool,
    ) -> Result<Vec<FragmentationRow>> {
        let indexes = self
            .provider
            .list_columnstore_indexes(filter)
            .await
            .context(CatalogSnafu)?;

        let mut row_groups = Vec::new();
        for index in &indexes {
            let groups = self
                .provider
                .list_row_groups(index)
                .await
                .context(CatalogSnafu)?;
            row_groups.extend(groups);
        }
        debug!(
            "Loaded {} row groups across {} indexes",
            row_groups.len(),
            indexes.len()
        );

        Ok(fragmentation::build_report(
            &indexes,
            &row_groups,
            only_fragmented,
        ))
    }

    async fn maintenance_commands(
        &mut self,
        filter: &ObjectFilter,
    ) -> Result<Vec<MaintenanceCommandRow>> {
        let indexes = self
            .provider
            .list_columnstore_indexes(filter)
            .await
            .context(CatalogSnafu)?;

        Ok(commands::build_commands(&indexes))
    }
}

/// Runs generated commands in output order: the compress pass then the final
/// reorganize for each index. Stops at the first failure; nothing is retried.
pub async fn execute_commands<R: CommandRunner>(
    runner: &mut R,
    rows: &[MaintenanceCommandRow],
) -> Result<Vec<ExecutedCommand>> {
    let mut executed = Vec::with_capacity(rows.len() * 2);

    for row in rows {
        for command in [&row.reorganize_command, &row.final_reorganize_command] {
            info!("Executing: {}", command);
            let started = Instant::now();
            runner.execute(command).await.context(ExecutionSnafu {
                command: command.as_str(),
                completed: executed.len(),
            })?;
            executed.push(ExecutedCommand {
                command: command.clone(),
                elapsed_ms: started.elapsed().as_millis(),
            });
        }
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, SnapshotCatalog};
    use crate::models::{IndexDescriptor, IndexKind, RowGroupDescriptor, RowGroupState};

    fn snapshot() -> CatalogSnapshot {
        let index = |object_id: i32, schema: &str, table: &str, name: &str, kind| IndexDescriptor {
            object_id,
            schema_name: schema.into(),
            table_name: table.into(),
            index_name: name.into(),
            index_id: 1,
            kind,
        };
        let group = |object_id: i32, row_group_id: i32, total_rows: i64, deleted_rows| {
            RowGroupDescriptor {
                object_id,
                index_id: 1,
                row_group_id,
                state: RowGroupState::Compressed,
                total_rows,
                deleted_rows,
            }
        };

        CatalogSnapshot {
            database: Some("warehouse".into()),
            indexes: vec![
                index(1, "dbo", "Sales", "CCI_Sales", IndexKind::ClusteredColumnstore),
                index(2, "dbo", "Fact", "CCI_Fact", IndexKind::ClusteredColumnstore),
                index(3, "stage", "Sales", "NCCI_Sales", IndexKind::NonclusteredColumnstore),
                index(4, "dbo", "Dim", "PK_Dim", IndexKind::Clustered),
            ],
            row_groups: vec![
                group(1, 0, 1000, Some(250)),
                group(1, 1, 500, Some(0)),
                group(2, 0, 0, None),
                group(3, 0, 200, None),
                group(3, 1, 200, Some(20)),
            ],
        }
    }

    fn inspector() -> FragmentationInspector<SnapshotCatalog> {
        FragmentationInspector::new(SnapshotCatalog::new(snapshot()))
    }

    fn fragmentation_rows(results: &InspectionResults) -> &[FragmentationRow] {
        match &results.output {
            ActionOutput::Fragmentation(rows) => rows,
            other => panic!("expected fragmentation rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fragmented_report_is_subset_of_full_report() {
        let filter = ObjectFilter::default();
        let full = inspector().inspect(&filter, Action::Report).await.unwrap();
        let fragmented = inspector()
            .inspect(&filter, Action::Fragmented)
            .await
            .unwrap();

        let full_rows = fragmentation_rows(&full);
        let fragmented_rows = fragmentation_rows(&fragmented);
        assert_eq!(full_rows.len(), 5);
        assert_eq!(fragmented_rows.len(), 2);

        let expected: Vec<_> = full_rows
            .iter()
            .filter(|row| row.deleted_rows > 0)
            .cloned()
            .collect();
        assert_eq!(fragmented_rows, expected.as_slice());
    }

    #[tokio::test]
    async fn command_count_matches_columnstore_indexes_regardless_of_fragmentation() {
        let results = inspector()
            .inspect(&ObjectFilter::default(), Action::Commands)
            .await
            .unwrap();

        assert_eq!(results.target, "warehouse");
        match results.output {
            ActionOutput::Commands(rows) => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[0].index_name, "CCI_Fact");
            }
            other => panic!("expected command rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn filters_are_conjunctive() {
        let filter = ObjectFilter::new(Some("dbo".into()), Some("Sales".into()));
        let results = inspector().inspect(&filter, Action::Report).await.unwrap();

        let rows = fragmentation_rows(&results);
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|row| row.schema_name == "dbo" && row.table_name == "Sales"));
    }

    #[tokio::test]
    async fn unmatched_filter_yields_empty_output() {
        let filter = ObjectFilter::new(Some("nope".into()), None);
        let results = inspector().inspect(&filter, Action::Commands).await.unwrap();
        assert!(results.output.is_empty());
    }

    #[derive(Default)]
    struct RecordingRunner {
        executed: Vec<String>,
        fail_on: Option<String>,
    }

    impl CommandRunner for RecordingRunner {
        async fn execute(&mut self, command: &str) -> crate::catalog::Result<u64> {
            if self.fail_on.as_deref() == Some(command) {
                return Err(CatalogError::MissingColumn {
                    column: "simulated".into(),
                    query: command.into(),
                });
            }
            self.executed.push(command.to_string());
            Ok(0)
        }
    }

    fn command_rows() -> Vec<MaintenanceCommandRow> {
        let indexes = snapshot().indexes;
        commands::build_commands(&indexes)
    }

    #[tokio::test]
    async fn executes_compress_pass_before_final_reorganize() {
        let rows = command_rows();
        let mut runner = RecordingRunner::default();

        let executed = execute_commands(&mut runner, &rows).await.unwrap();
        assert_eq!(executed.len(), 6);
        assert_eq!(runner.executed[0], rows[0].reorganize_command);
        assert_eq!(runner.executed[1], rows[0].final_reorganize_command);
        assert_eq!(runner.executed[2], rows[1].reorganize_command);
    }

    #[tokio::test]
    async fn execution_stops_at_first_failure() {
        let rows = command_rows();
        let mut runner = RecordingRunner {
            fail_on: Some(rows[1].reorganize_command.clone()),
            ..Default::default()
        };

        let err = execute_commands(&mut runner, &rows).await.unwrap_err();
        match err {
            InspectorError::ExecutionError {
                command, completed, ..
            } => {
                assert_eq!(command, rows[1].reorganize_command);
                assert_eq!(completed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.executed.len(), 2);
    }
}
