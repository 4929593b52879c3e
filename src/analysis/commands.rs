use super::cmp_command_rows;
use crate::models::{IndexDescriptor, MaintenanceCommandRow};
use itertools::Itertools;

/// Bracket-quotes an identifier, doubling any embedded `]`.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn alter_index_target(schema: &str, table: &str, index: &str) -> String {
    format!(
        "ALTER INDEX {} ON {}.{}",
        quote_identifier(index),
        quote_identifier(schema),
        quote_identifier(table)
    )
}

/// First maintenance pass: compresses OPEN/CLOSED row groups and merges small ones.
pub fn reorganize_command(schema: &str, table: &str, index: &str) -> String {
    format!(
        "{} REORGANIZE WITH (COMPRESS_ALL_ROW_GROUPS = ON);",
        alter_index_target(schema, table, index)
    )
}

/// Follow-up pass that removes deleted rows from compressed row groups.
pub fn final_reorganize_command(schema: &str, table: &str, index: &str) -> String {
    format!("{} REORGANIZE;", alter_index_target(schema, table, index))
}

/// One command row per column-store index, ordered by schema, table and index name.
/// Row-group state is not consulted.
pub fn build_commands(indexes: &[IndexDescriptor]) -> Vec<MaintenanceCommandRow> {
    let mut rows: Vec<MaintenanceCommandRow> = indexes
        .iter()
        .filter(|index| index.kind.is_columnstore())
        .unique_by(|index| (index.object_id, index.index_id))
        .map(|index| MaintenanceCommandRow {
            schema_name: index.schema_name.clone(),
            table_name: index.table_name.clone(),
            index_name: index.index_name.clone(),
            reorganize_command: reorganize_command(
                &index.schema_name,
                &index.table_name,
                &index.index_name,
            ),
            final_reorganize_command: final_reorganize_command(
                &index.schema_name,
                &index.table_name,
                &index.index_name,
            ),
        })
        .collect();

    rows.sort_by(cmp_command_rows);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexKind;
    use rstest::rstest;

    fn index(object_id: i32, schema: &str, table: &str, name: &str, kind: IndexKind) -> IndexDescriptor {
        IndexDescriptor {
            object_id,
            schema_name: schema.into(),
            table_name: table.into(),
            index_name: name.into(),
            index_id: 1,
            kind,
        }
    }

    #[rstest]
    #[case("dbo", "[dbo]")]
    #[case("Order Details", "[Order Details]")]
    #[case("select", "[select]")]
    #[case("odd]name", "[odd]]name]")]
    #[case("[already]", "[[already]]]")]
    #[case("", "[]")]
    fn quotes_identifiers(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote_identifier(input), expected);
    }

    #[test]
    fn renders_both_reorganize_commands() {
        assert_eq!(
            reorganize_command("dbo", "Fact", "CCI_Fact"),
            "ALTER INDEX [CCI_Fact] ON [dbo].[Fact] REORGANIZE WITH (COMPRESS_ALL_ROW_GROUPS = ON);"
        );
        assert_eq!(
            final_reorganize_command("dbo", "Fact", "CCI_Fact"),
            "ALTER INDEX [CCI_Fact] ON [dbo].[Fact] REORGANIZE;"
        );
    }

    #[test]
    fn escapes_closing_brackets_inside_names() {
        assert_eq!(
            final_reorganize_command("we]ird", "Fact", "CCI"),
            "ALTER INDEX [CCI] ON [we]]ird].[Fact] REORGANIZE;"
        );
    }

    #[test]
    fn one_row_per_columnstore_index_in_sorted_order() {
        let indexes = vec![
            index(3, "stage", "Fact", "CCI_Fact", IndexKind::ClusteredColumnstore),
            index(2, "dbo", "Sales", "NCCI_Sales", IndexKind::NonclusteredColumnstore),
            index(2, "dbo", "Sales", "NCCI_Sales", IndexKind::NonclusteredColumnstore),
            index(4, "dbo", "Dim", "PK_Dim", IndexKind::Clustered),
            index(1, "dbo", "Fact", "CCI_Fact", IndexKind::ClusteredColumnstore),
        ];

        let rows = build_commands(&indexes);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| format!("{}.{}.{}", r.schema_name, r.table_name, r.index_name))
            .collect();
        assert_eq!(
            keys,
            vec!["dbo.Fact.CCI_Fact", "dbo.Sales.NCCI_Sales", "stage.Fact.CCI_Fact"]
        );
        assert_eq!(
            rows[1].reorganize_command,
            "ALTER INDEX [NCCI_Sales] ON [dbo].[Sales] REORGANIZE WITH (COMPRESS_ALL_ROW_GROUPS = ON);"
        );
    }
}
