pub mod commands;
pub mod fragmentation;

use crate::models::{FragmentationRow, MaintenanceCommandRow};
use std::cmp::Ordering;

/// `100 * part / total`, rounded half away from zero to two decimal places.
///
/// Works in integer hundredths so exact ties such as 23/160 = 14.375% round up.
/// `total` must be non-zero.
pub(crate) fn rounded_percent(part: i64, total: i64) -> f64 {
    let scaled = (part as i128 * 10_000).abs();
    let divisor = (total as i128).abs();
    let mut hundredths = scaled / divisor;
    if 2 * (scaled % divisor) >= divisor {
        hundredths += 1;
    }
    let negative = (part < 0) != (total < 0);
    let signed = if negative { -hundredths } else { hundredths };
    signed as f64 / 100.0
}

pub(crate) fn cmp_fragmentation_rows(a: &FragmentationRow, b: &FragmentationRow) -> Ordering {
    (&a.schema_name, &a.table_name, &a.index_name, a.row_group_id).cmp(&(
        &b.schema_name,
        &b.table_name,
        &b.index_name,
        b.row_group_id,
    ))
}

pub(crate) fn cmp_command_rows(a: &MaintenanceCommandRow, b: &MaintenanceCommandRow) -> Ordering {
    (&a.schema_name, &a.table_name, &a.index_name).cmp(&(
        &b.schema_name,
        &b.table_name,
        &b.index_name,
    ))
}
