//! CSV export of benchmark reports.
//!
//! UTF-8 with a byte order mark so spreadsheet tools pick the encoding up.

use crate::benchmark::{BenchmarkReport, QueryResult, RunMode};
use crate::error::{RagError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Modelo")]
    model: &'a str,
    #[serde(rename = "Pergunta")]
    question: &'a str,
    #[serde(rename = "Tempo(s)")]
    elapsed_secs: f64,
    #[serde(rename = "Resposta")]
    response: &'a str,
    #[serde(rename = "Fontes")]
    sources: String,
}

impl<'a> From<&'a QueryResult> for ExportRow<'a> {
    fn from(row: &'a QueryResult) -> Self {
        Self {
            model: &row.model,
            question: &row.question,
            elapsed_secs: row.elapsed_secs,
            response: &row.response,
            sources: row.sources_field(),
        }
    }
}

/// `benchmark_<YYYYmmdd_HHMMSS>.csv` or `resultados_<model>_<YYYYmmdd_HHMM>.csv`.
pub fn export_file_name(mode: &RunMode, at: DateTime<Local>) -> String {
    match mode {
        RunMode::Comparative => format!("benchmark_{}.csv", at.format("%Y%m%d_%H%M%S")),
        RunMode::Batch { model } => {
            format!("resultados_{}_{}.csv", model, at.format("%Y%m%d_%H%M"))
        }
    }
}

/// Write rows, header first, to any writer (no BOM).
pub fn write_rows<W: Write>(rows: &[QueryResult], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(ExportRow::from(row))
            .map_err(|e| RagError::Serialization(e.to_string()))?;
    }
    csv.flush()
        .map_err(|e| RagError::Serialization(e.to_string()))?;
    Ok(())
}

/// Save `report` into `dir`. Returns `None` without touching the disk when
/// the report has no rows.
pub fn save_report(report: &BenchmarkReport, dir: &Path) -> Result<Option<PathBuf>> {
    if report.is_empty() {
        tracing::info!("No results to export");
        return Ok(None);
    }

    std::fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;
    let path = dir.join(export_file_name(&report.mode, Local::now()));

    let mut file = File::create(&path).map_err(|e| RagError::io(&path, e))?;
    file.write_all(UTF8_BOM)
        .map_err(|e| RagError::io(&path, e))?;
    write_rows(&report.rows, file)?;

    tracing::info!("Saved {} rows to {}", report.rows.len(), path.display());
    Ok(Some(path))
}
