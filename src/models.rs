use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

/// Storage type of an index as reported by the engine's `sys.indexes.type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Heap,
    Clustered,
    Nonclustered,
    Xml,
    Spatial,
    ClusteredColumnstore,
    NonclusteredColumnstore,
    NonclusteredHash,
    Unknown,
}

impl IndexKind {
    pub fn from_type_code(code: u8) -> Self {
        match code {
            0 => IndexKind::Heap,
            1 => IndexKind::Clustered,
            2 => IndexKind::Nonclustered,
            3 => IndexKind::Xml,
            4 => IndexKind::Spatial,
            5 => IndexKind::ClusteredColumnstore,
            6 => IndexKind::NonclusteredColumnstore,
            7 => IndexKind::NonclusteredHash,
            _ => IndexKind::Unknown,
        }
    }

    pub fn is_columnstore(&self) -> bool {
        matches!(
            self,
            IndexKind::ClusteredColumnstore | IndexKind::NonclusteredColumnstore
        )
    }

    /// Matches the engine's `type_desc` text
    pub fn type_desc(&self) -> &'static str {
        match self {
            IndexKind::Heap => "HEAP",
            IndexKind::Clustered => "CLUSTERED",
            IndexKind::Nonclustered => "NONCLUSTERED",
            IndexKind::Xml => "XML",
            IndexKind::Spatial => "SPATIAL",
            IndexKind::ClusteredColumnstore => "CLUSTERED COLUMNSTORE",
            IndexKind::NonclusteredColumnstore => "NONCLUSTERED COLUMNSTORE",
            IndexKind::NonclusteredHash => "NONCLUSTERED HASH",
            IndexKind::Unknown => "UNKNOWN",
        }
    }
}

/// Lifecycle state of a column-store row group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowGroupState {
    Invisible,
    Open,
    Closed,
    Compressed,
    Tombstone,
    #[serde(other)]
    Unknown,
}

impl RowGroupState {
    pub fn from_description(desc: &str) -> Self {
        match desc.trim().to_ascii_uppercase().as_str() {
            "INVISIBLE" => RowGroupState::Invisible,
            "OPEN" => RowGroupState::Open,
            "CLOSED" => RowGroupState::Closed,
            "COMPRESSED" => RowGroupState::Compressed,
            "TOMBSTONE" => RowGroupState::Tombstone,
            _ => RowGroupState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowGroupState::Invisible => "INVISIBLE",
            RowGroupState::Open => "OPEN",
            RowGroupState::Closed => "CLOSED",
            RowGroupState::Compressed => "COMPRESSED",
            RowGroupState::Tombstone => "TOMBSTONE",
            RowGroupState::Unknown => "UNKNOWN",
        }
    }
}

/// Identifies one index in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub object_id: i32,
    pub schema_name: String,
    pub table_name: String,
    pub index_name: String,
    pub index_id: i32,
    pub kind: IndexKind,
}

/// One row group of a column-store index, linked by (object_id, index_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowGroupDescriptor {
    pub object_id: i32,
    pub index_id: i32,
    pub row_group_id: i32,
    pub state: RowGroupState,
    pub total_rows: i64,
    #[serde(default)]
    pub deleted_rows: Option<i64>,
}

impl RowGroupDescriptor {
    pub fn deleted_rows_or_zero(&self) -> i64 {
        self.deleted_rows.unwrap_or(0)
    }

    pub fn belongs_to(&self, index: &IndexDescriptor) -> bool {
        self.object_id == index.object_id && self.index_id == index.index_id
    }
}

/// Exact-match schema/table filter. Absent parts match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFilter {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

impl ObjectFilter {
    pub fn new(schema: Option<String>, table: Option<String>) -> Self {
        Self { schema, table }
    }

    pub fn matches(&self, schema_name: &str, table_name: &str) -> bool {
        self.schema.as_deref().map_or(true, |s| s == schema_name)
            && self.table.as_deref().map_or(true, |t| t == table_name)
    }
}

impl fmt::Display for ObjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema={} table={}",
            self.schema.as_deref().unwrap_or("*"),
            self.table.as_deref().unwrap_or("*")
        )
    }
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "Unknown action code {}; expected 0 (report), 1 (fragmented) or 2 (commands)",
    code
))]
pub struct UnknownActionError {
    pub code: i64,
}

/// What a single invocation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase", try_from = "ActionRepr")]
pub enum Action {
    /// Every row group of every matching column-store index
    #[default]
    #[value(alias = "0")]
    Report,
    /// Only row groups holding deleted rows
    #[value(alias = "1")]
    Fragmented,
    /// REORGANIZE commands for every matching column-store index
    #[value(alias = "2")]
    Commands,
}

impl Action {
    pub fn from_code(code: i64) -> Result<Self, UnknownActionError> {
        match code {
            0 => Ok(Action::Report),
            1 => Ok(Action::Fragmented),
            2 => Ok(Action::Commands),
            code => Err(UnknownActionError { code }),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Action::Report => 0,
            Action::Fragmented => 1,
            Action::Commands => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Report => "Fragmentation Report",
            Action::Fragmented => "Fragmented Row Groups",
            Action::Commands => "Maintenance Commands",
        }
    }
}

/// Config files may name the action or use its numeric code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<ActionRepr> for Action {
    type Error = String;

    fn try_from(repr: ActionRepr) -> Result<Self, Self::Error> {
        match repr {
            ActionRepr::Code(code) => Action::from_code(code).map_err(|e| e.to_string()),
            ActionRepr::Name(name) => Action::from_str(&name, true),
        }
    }
}

impl TryFrom<i64> for Action {
    type Error = UnknownActionError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Action::from_code(code)
    }
}

/// One (index, row group) line of the fragmentation report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FragmentationRow {
    pub object_id: i32,
    pub schema_name: String,
    pub table_name: String,
    pub index_name: String,
    pub index_id: i32,
    pub type_desc: String,
    pub row_group_id: i32,
    pub state_desc: String,
    pub total_rows: i64,
    pub deleted_rows: i64,
    pub fragmentation_percent: f64,
    pub percent_full: f64,
}

/// Generated REORGANIZE statements for one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaintenanceCommandRow {
    pub schema_name: String,
    pub table_name: String,
    pub index_name: String,
    pub reorganize_command: String,
    pub final_reorganize_command: String,
}

/// Result set shape depends on the requested action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum ActionOutput {
    Fragmentation(Vec<FragmentationRow>),
    Commands(Vec<MaintenanceCommandRow>),
}

impl ActionOutput {
    pub fn len(&self) -> usize {
        match self {
            ActionOutput::Fragmentation(rows) => rows.len(),
            ActionOutput::Commands(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A maintenance statement that was actually run against the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedCommand {
    pub command: String,
    pub elapsed_ms: u128,
}

/// Overall results of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionResults {
    /// Database the metadata was read from
    pub target: String,
    pub action: Action,
    pub filter: ObjectFilter,
    pub output: ActionOutput,
    /// Commands run when execution was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executed: Vec<ExecutedCommand>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(5, IndexKind::ClusteredColumnstore, true)]
    #[case(6, IndexKind::NonclusteredColumnstore, true)]
    #[case(1, IndexKind::Clustered, false)]
    #[case(2, IndexKind::Nonclustered, false)]
    #[case(42, IndexKind::Unknown, false)]
    fn index_kind_from_type_code(
        #[case] code: u8,
        #[case] expected: IndexKind,
        #[case] columnstore: bool,
    ) {
        let kind = IndexKind::from_type_code(code);
        assert_eq!(kind, expected);
        assert_eq!(kind.is_columnstore(), columnstore);
    }

    #[test]
    fn row_group_state_parses_case_insensitively() {
        assert_eq!(
            RowGroupState::from_description("compressed"),
            RowGroupState::Compressed
        );
        assert_eq!(RowGroupState::from_description(" OPEN "), RowGroupState::Open);
        assert_eq!(
            RowGroupState::from_description("RESIDUAL"),
            RowGroupState::Unknown
        );
    }

    #[test]
    fn filter_is_conjunctive() {
        let both = ObjectFilter::new(Some("dbo".into()), Some("Fact".into()));
        assert!(both.matches("dbo", "Fact"));
        assert!(!both.matches("dbo", "Dim"));
        assert!(!both.matches("stage", "Fact"));

        let none = ObjectFilter::default();
        assert!(none.matches("anything", "at_all"));

        let schema_only = ObjectFilter::new(Some("dbo".into()), None);
        assert!(schema_only.matches("dbo", "Dim"));
        assert!(!schema_only.matches("DBO", "Dim"));
    }

    #[rstest]
    #[case(0, Action::Report)]
    #[case(1, Action::Fragmented)]
    #[case(2, Action::Commands)]
    fn action_codes_round_trip(#[case] code: i64, #[case] action: Action) {
        assert_eq!(Action::from_code(code).unwrap(), action);
        assert_eq!(action.code() as i64, code);
    }

    #[test]
    fn unknown_action_code_is_rejected() {
        let err = Action::try_from(3).unwrap_err();
        assert_eq!(err.code, 3);
        assert!(err.to_string().contains("Unknown action code 3"));
    }

    #[rstest]
    #[case("commands", Action::Commands)]
    #[case("Fragmented", Action::Fragmented)]
    #[case("0", Action::Report)]
    #[case("2", Action::Commands)]
    fn action_deserializes_from_name_or_code(#[case] yaml: &str, #[case] expected: Action) {
        let action: Action = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(action, expected);
    }

    #[test]
    fn action_rejects_unknown_code_in_config() {
        assert!(serde_yaml::from_str::<Action>("7").is_err());
        assert!(serde_yaml::from_str::<Action>("vacuum").is_err());
    }

    #[test]
    fn fragmentation_rows_serialize_with_result_set_column_names() {
        let row = FragmentationRow {
            object_id: 1,
            schema_name: "dbo".into(),
            table_name: "Fact".into(),
            index_name: "CCI_Fact".into(),
            index_id: 1,
            type_desc: "CLUSTERED COLUMNSTORE".into(),
            row_group_id: 0,
            state_desc: "COMPRESSED".into(),
            total_rows: 10,
            deleted_rows: 0,
            fragmentation_percent: 0.0,
            percent_full: 100.0,
        };

        let json = serde_json::to_value(&row).expect("row should serialize");
        for column in [
            "ObjectId",
            "SchemaName",
            "TableName",
            "IndexName",
            "IndexId",
            "TypeDesc",
            "RowGroupId",
            "StateDesc",
            "TotalRows",
            "DeletedRows",
            "FragmentationPercent",
            "PercentFull",
        ] {
            assert!(json.get(column).is_some(), "missing column {column}");
        }
    }
}
