use crate::models::{
    ActionOutput, ExecutedCommand, FragmentationRow, InspectionResults, MaintenanceCommandRow,
};
use clap::ValueEnum;
use itertools::Itertools;
use snafu::{ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
pub enum ReporterError {
    #[snafu(display("Failed to write output: {}", source))]
    OutputError { source: std::io::Error },

    #[snafu(display("Failed to serialize report: {}", source))]
    SerializeError { source: serde_json::Error },
}

type Result<T, E = ReporterError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Markdown formatted report
    Markdown,
    /// JSON formatted report
    Json,
    /// Plain text summary
    Text,
}

const FRAGMENTATION_COLUMNS: [&str; 12] = [
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
];

const COMMAND_COLUMNS: [&str; 5] = [
    "SchemaName",
    "TableName",
    "IndexName",
    "ReorganizeCommand",
    "FinalReorganizeCommand",
];

pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn report(&self, results: &InspectionResults) -> Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.write_report(&mut handle, results)
    }

    pub fn write_report<W: Write>(&self, out: &mut W, results: &InspectionResults) -> Result<()> {
        match self.format {
            ReportFormat::Markdown => self.report_markdown(out, results),
            ReportFormat::Json => self.report_json(out, results),
            ReportFormat::Text => self.report_text(out, results),
        }
    }

    fn report_markdown<W: Write>(&self, out: &mut W, results: &InspectionResults) -> Result<()> {
        writeln!(out, "# Column-Store {}\n", results.action.as_str()).context(OutputSnafu)?;

        writeln!(out, "- **Database**: {}", results.target).context(OutputSnafu)?;
        writeln!(
            out,
            "- **Action**: {} ({})",
            results.action.as_str(),
            results.action.code()
        )
        .context(OutputSnafu)?;
        writeln!(out, "- **Filter**: {}", results.filter).context(OutputSnafu)?;
        writeln!(out, "- **Rows**: {}", results.output.len()).context(OutputSnafu)?;
        writeln!(out).context(OutputSnafu)?;

        if results.output.is_empty() {
            writeln!(out, "_No matching column-store indexes._").context(OutputSnafu)?;
            return Ok(());
        }

        match &results.output {
            ActionOutput::Fragmentation(rows) => {
                write_markdown_table(
                    out,
                    &FRAGMENTATION_COLUMNS,
                    rows.iter().map(fragmentation_cells),
                )?;
            }
            ActionOutput::Commands(rows) => {
                write_markdown_table(
                    out,
                    &COMMAND_COLUMNS,
                    rows.iter().map(|row| {
                        let mut cells = command_cells(row);
                        for cell in &mut cells[3..] {
                            *cell = code_span(cell);
                        }
                        cells
                    }),
                )?;

                let fence = "`".repeat(
                    rows.iter()
                        .flat_map(|row| [&row.reorganize_command, &row.final_reorganize_command])
                        .map(|command| longest_backtick_run(command) + 1)
                        .fold(3, usize::max),
                );
                writeln!(out, "\n## Script\n").context(OutputSnafu)?;
                writeln!(out, "{}sql", fence).context(OutputSnafu)?;
                for row in rows {
                    writeln!(out, "{}", row.reorganize_command).context(OutputSnafu)?;
                }
                for row in rows {
                    writeln!(out, "{}", row.final_reorganize_command).context(OutputSnafu)?;
                }
                writeln!(out, "{}", fence).context(OutputSnafu)?;
            }
        }

        if !results.executed.is_empty() {
            writeln!(out, "\n## Executed\n").context(OutputSnafu)?;
            for executed in &results.executed {
                writeln!(
                    out,
                    "- {} ({} ms)",
                    code_span(&executed.command),
                    executed.elapsed_ms
                )
                    .context(OutputSnafu)?;
            }
        }

        Ok(())
    }

    fn report_json<W: Write>(&self, out: &mut W, results: &InspectionResults) -> Result<()> {
        let json = serde_json::to_string_pretty(results).context(SerializeSnafu)?;
        writeln!(out, "{}", json).context(OutputSnafu)?;
        Ok(())
    }

    fn report_text<W: Write>(&self, out: &mut W, results: &InspectionResults) -> Result<()> {
        let title = format!("{} - {}", results.action.as_str(), results.target);
        writeln!(out, "{}", title).context(OutputSnafu)?;
        writeln!(out, "{}", "=".repeat(title.len())).context(OutputSnafu)?;
        writeln!(out, "Filter: {}", results.filter).context(OutputSnafu)?;
        writeln!(out).context(OutputSnafu)?;

        if results.output.is_empty() {
            writeln!(out, "No matching column-store indexes.").context(OutputSnafu)?;
            return Ok(());
        }

        match &results.output {
            ActionOutput::Fragmentation(rows) => {
                let cells: Vec<Vec<String>> = rows.iter().map(fragmentation_cells).collect();
                write_text_table(out, &FRAGMENTATION_COLUMNS, &cells)?;
            }
            ActionOutput::Commands(rows) => {
                for row in rows {
                    writeln!(out, "{}.{}.{}", row.schema_name, row.table_name, row.index_name)
                        .context(OutputSnafu)?;
                    writeln!(out, "  {}", row.reorganize_command).context(OutputSnafu)?;
                    writeln!(out, "  {}", row.final_reorganize_command).context(OutputSnafu)?;
                }
            }
        }

        write_executed_text(out, &results.executed)
    }
}

fn fragmentation_cells(row: &FragmentationRow) -> Vec<String> {
    vec![
        row.object_id.to_string(),
        row.schema_name.clone(),
        row.table_name.clone(),
        row.index_name.clone(),
        row.index_id.to_string(),
        row.type_desc.clone(),
        row.row_group_id.to_string(),
        row.state_desc.clone(),
        row.total_rows.to_string(),
        row.deleted_rows.to_string(),
        format!("{:.2}", row.fragmentation_percent),
        format!("{:.2}", row.percent_full),
    ]
}

fn command_cells(row: &MaintenanceCommandRow) -> Vec<String> {
    vec![
        row.schema_name.clone(),
        row.table_name.clone(),
        row.index_name.clone(),
        row.reorganize_command.clone(),
        row.final_reorganize_command.clone(),
    ]
}

fn write_markdown_table<W, I>(out: &mut W, headers: &[&str], rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    writeln!(out, "| {} |", headers.iter().join(" | ")).context(OutputSnafu)?;
    writeln!(
        out,
        "|{}|",
        headers.iter().map(|h| "-".repeat(h.len() + 2)).join("|")
    )
    .context(OutputSnafu)?;
    for cells in rows {
        let escaped = cells.iter().map(|c| c.replace('|', "\\|")).join(" | ");
        writeln!(out, "| {} |", escaped).context(OutputSnafu)?;
    }
    Ok(())
}

/// Inline Markdown code span whose fence is longer than any backtick run in `text`.
fn code_span(text: &str) -> String {
    match longest_backtick_run(text) {
        0 => format!("`{}`", text),
        run => {
            let fence = "`".repeat(run + 1);
            format!("{fence} {text} {fence}")
        }
    }
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

fn write_text_table<W: Write>(out: &mut W, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|cells| cells[i].chars().count())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    writeln!(out, "{}", render_row(headers.iter().copied(), &widths)).context(OutputSnafu)?;
    writeln!(
        out,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).join("  ")
    )
    .context(OutputSnafu)?;
    for cells in rows {
        writeln!(out, "{}", render_row(cells.iter().map(String::as_str), &widths))
            .context(OutputSnafu)?;
    }
    Ok(())
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .join("  ")
        .trim_end()
        .to_string()
}

fn write_executed_text<W: Write>(out: &mut W, executed: &[ExecutedCommand]) -> Result<()> {
    if executed.is_empty() {
        return Ok(());
    }
    writeln!(out).context(OutputSnafu)?;
    writeln!(out, "Executed {} commands:", executed.len()).context(OutputSnafu)?;
    for command in executed {
        writeln!(out, "  [{} ms] {}", command.elapsed_ms, command.command).context(OutputSnafu)?;
    }
    Ok(())
}
