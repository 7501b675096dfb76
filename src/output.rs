//! Result persistence.
//!
//! Each review round is saved as `第{n}回.{ext}` (round one is `第一回`), so a
//! directory of results sorts the way the reviewers refer to them.

use crate::error::ReviewError;
use crate::schema::{ReviewRow, ReviewTable};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column headers of the review sheet, in row-field order.
pub const COLUMN_HEADERS: [&str; 8] = [
    "要求No",
    "要求内容 (ペルソナ: 指令)",
    "評価 (〇/△/×)",
    "適合/不適合箇所",
    "適合/不適合理由",
    "修正案 (ゴールデンケースを含む)",
    "対応有無",
    "対応方法／非対応理由",
];

const KANJI_NUMERALS: [&str; 10] = ["一", "二", "三", "四", "五", "六", "七", "八", "九", "十"];

/// Summary of a review run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    /// Number of input documents.
    pub documents: usize,
    /// Rows in the extracted table.
    pub rows: usize,
    /// Wall time including retries and backoff.
    pub duration_ms: u64,
}

/// The complete result of [`crate::review`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub table: ReviewTable,
    pub stats: ReviewStats,
}

/// On-disk format of a saved table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(ReviewError::InvalidConfig(format!(
                "unknown output format '{other}' (expected json or markdown)"
            ))),
        }
    }
}

/// Kanji numeral for rounds one to ten, decimal beyond.
pub fn round_label(round: u32) -> String {
    match round {
        1..=10 => KANJI_NUMERALS[(round - 1) as usize].to_string(),
        n => n.to_string(),
    }
}

/// File stem for a round, e.g. `第三回`.
pub fn result_file_stem(round: u32) -> String {
    format!("第{}回", round_label(round))
}

/// Render `table` as a GitHub-flavoured Markdown table.
pub fn render_markdown(table: &ReviewTable) -> String {
    let mut out = String::new();
    out.push_str(&markdown_row(COLUMN_HEADERS));
    out.push_str(&markdown_row(["---"; 8]));
    for row in &table.rows {
        out.push_str(&markdown_row(row.cells().map(escape_cell)));
    }
    out
}

fn markdown_row<S: AsRef<str>>(cells: [S; 8]) -> String {
    let joined = cells
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(" | ");
    format!("| {joined} |\n")
}

fn escape_cell(cell: &str) -> String {
    cell.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

/// Serialize `table` in `format`.
pub fn render(table: &ReviewTable, format: OutputFormat) -> Result<String, ReviewError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(table)
            .map_err(|e| ReviewError::Internal(format!("Failed to serialize review table: {e}"))),
        OutputFormat::Markdown => Ok(render_markdown(table)),
    }
}

/// Save `table` as round `round` under `dir` and return the written path.
///
/// Writes to a temporary file in `dir` and renames it into place, so a
/// reader never sees a partial result.
pub fn save_results(
    table: &ReviewTable,
    dir: &Path,
    round: u32,
    format: OutputFormat,
) -> Result<PathBuf, ReviewError> {
    if table.is_empty() {
        return Err(ReviewError::EmptyTable);
    }

    let path = dir.join(format!("{}.{}", result_file_stem(round), format.extension()));
    let write_err = |source| ReviewError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let body = render(table, format)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(body.as_bytes()).map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    info!("Saved {} rows to {}", table.len(), path.display());
    Ok(path)
}

/// Rows whose evaluation is not a pass, for quick summaries.
pub fn open_findings(table: &ReviewTable) -> impl Iterator<Item = &ReviewRow> {
    table
        .rows
        .iter()
        .filter(|r| r.verdict() != Some(crate::schema::Verdict::Pass))
}
