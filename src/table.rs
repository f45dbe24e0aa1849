use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;

use crate::models::{GradeRow, StudentSummary, SummaryRow};

pub const RAW_COLUMNS: [&str; 9] = [
    "id_estudiante",
    "nombre",
    "asignatura",
    "periodo",
    "nota1",
    "nota2",
    "nota3",
    "asistencia_%",
    "participacion",
];

pub const SUMMARY_COLUMNS: [&str; 5] = [
    "id_estudiante",
    "nombre",
    "promedio_actual",
    "necesita_en_periodo4",
    "estado",
];

/// Columns a raw grade table must carry before aggregation may run.
pub const RAW_REQUIRED: [&str; 5] = ["id_estudiante", "nombre", "nota1", "nota2", "nota3"];

/// Reads a tabular file as text: UTF-8 first, then one Latin-1 retry.
///
/// Latin-1 maps every byte to the code point of the same value, so the
/// retry itself cannot fail; a missing file is the only fatal case here.
pub fn read_decoded(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            println!(
                "Warning: {} is not valid UTF-8, retrying as Latin-1.",
                path.display()
            );
            Ok(err.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}

/// Fails before any computation when required columns are absent, naming
/// every missing column.
pub fn require_columns(
    headers: &csv::StringRecord,
    required: &[&str],
    path: &Path,
) -> anyhow::Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        bail!(
            "missing required column(s) in {}: {}",
            path.display(),
            missing.join(", ")
        )
    }
}

fn load_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> anyhow::Result<Vec<T>> {
    let text = read_decoded(path)?;
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    require_columns(&headers, required, path)?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        let row = result.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn load_grade_rows(path: &Path) -> anyhow::Result<Vec<GradeRow>> {
    load_rows(path, &RAW_REQUIRED)
}

pub fn load_summary_rows(path: &Path, required: &[&str]) -> anyhow::Result<Vec<SummaryRow>> {
    load_rows(path, required)
}

fn writer_for(path: &Path) -> anyhow::Result<csv::Writer<fs::File>> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        }
    }
    csv::Writer::from_path(path)
        .with_context(|| format!("failed to open output file {}", path.display()))
}

/// Writes the raw grade table, floats fixed at two decimals so identical
/// datasets produce byte-identical files.
pub fn write_grade_rows(path: &Path, rows: &[GradeRow]) -> anyhow::Result<()> {
    let mut writer = writer_for(path)?;
    writer.write_record(RAW_COLUMNS)?;
    for row in rows {
        writer.write_record(&[
            row.student_id.to_string(),
            row.student_name.clone(),
            row.subject.clone(),
            row.period.to_string(),
            format!("{:.2}", row.score_1),
            format!("{:.2}", row.score_2),
            format!("{:.2}", row.score_3),
            format!("{:.2}", row.attendance_pct),
            format!("{:.2}", row.participation),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summaries(path: &Path, summaries: &[StudentSummary]) -> anyhow::Result<()> {
    let mut writer = writer_for(path)?;
    writer.write_record(SUMMARY_COLUMNS)?;
    for summary in summaries {
        writer.write_record(&[
            summary.student_id.to_string(),
            summary.student_name.clone(),
            format!("{:.2}", summary.current_average),
            format!("{:.2}", summary.required_next_period_grade.unwrap_or(0.0)),
            summary.status.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_at_risk(path: &Path, rows: &[SummaryRow]) -> anyhow::Result<()> {
    let mut writer = writer_for(path)?;
    writer.write_record(["nombre", "promedio_actual", "necesita_en_periodo4"])?;
    for row in rows {
        writer.write_record(&[
            row.student_name.clone(),
            format!("{:.2}", row.current_average),
            format!("{:.2}", row.required_next_period_grade),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
