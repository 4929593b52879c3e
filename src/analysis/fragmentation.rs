use super::{cmp_fragmentation_rows, rounded_percent};
use crate::models::{FragmentationRow, IndexDescriptor, RowGroupDescriptor};
use std::collections::HashMap;

/// Share of logically deleted rows, in percent. Empty row groups report 0.
pub fn fragmentation_percent(total_rows: i64, deleted_rows: i64) -> f64 {
    if total_rows == 0 {
        0.0
    } else {
        rounded_percent(deleted_rows, total_rows)
    }
}

/// Share of live rows, in percent. Empty row groups report 0.
pub fn percent_full(total_rows: i64, deleted_rows: i64) -> f64 {
    if total_rows == 0 {
        0.0
    } else {
        rounded_percent(total_rows - deleted_rows, total_rows)
    }
}

/// Joins indexes to their row groups and computes per-row-group fragmentation.
///
/// Row groups without a matching index are dropped. When `only_fragmented` is
/// set, row groups with no deleted rows (missing counts included) are skipped.
/// Rows come back ordered by schema, table, index name and row group id.
pub fn build_report(
    indexes: &[IndexDescriptor],
    row_groups: &[RowGroupDescriptor],
    only_fragmented: bool,
) -> Vec<FragmentationRow> {
    let mut groups_by_index: HashMap<(i32, i32), Vec<&RowGroupDescriptor>> = HashMap::new();
    for group in row_groups {
        groups_by_index
            .entry((group.object_id, group.index_id))
            .or_default()
            .push(group);
    }

    let mut rows: Vec<FragmentationRow> = indexes
        .iter()
        .filter(|index| index.kind.is_columnstore())
        .flat_map(|index| {
            groups_by_index
                .get(&(index.object_id, index.index_id))
                .into_iter()
                .flatten()
                .filter(move |group| !only_fragmented || group.deleted_rows_or_zero() > 0)
                .map(move |group| to_row(index, group))
        })
        .collect();

    rows.sort_by(cmp_fragmentation_rows);
    rows
}

fn to_row(index: &IndexDescriptor, group: &RowGroupDescriptor) -> FragmentationRow {
    let deleted_rows = group.deleted_rows_or_zero();
    FragmentationRow {
        object_id: index.object_id,
        schema_name: index.schema_name.clone(),
        table_name: index.table_name.clone(),
        index_name: index.index_name.clone(),
        index_id: index.index_id,
        type_desc: index.kind.type_desc().to_string(),
        row_group_id: group.row_group_id,
        state_desc: group.state.as_str().to_string(),
        total_rows: group.total_rows,
        deleted_rows,
        fragmentation_percent: fragmentation_percent(group.total_rows, deleted_rows),
        percent_full: percent_full(group.total_rows, deleted_rows),
    }
}
