use std::fmt;

use serde::{Deserialize, Deserializer};

/// Thresholds and grade-range settings shared by every pipeline stage.
///
/// Built once in `main` from CLI flags and passed by reference; no stage
/// carries its own copy of these values.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub grade_min: f64,
    pub grade_max: f64,
    pub passing_grade: f64,
    pub top_threshold: f64,
    pub periods_total: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            grade_min: 0.0,
            grade_max: 5.0,
            passing_grade: 3.0,
            top_threshold: 4.5,
            periods_total: 4,
        }
    }
}

/// One raw grade record: a student in a subject during one grading period.
///
/// Score, attendance and participation cells are coerced to NaN when the
/// input file carries junk; downstream means skip NaN instead of failing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradeRow {
    #[serde(rename = "id_estudiante")]
    pub student_id: u32,
    #[serde(rename = "nombre")]
    pub student_name: String,
    #[serde(rename = "asignatura", default)]
    pub subject: String,
    #[serde(rename = "periodo", default, deserialize_with = "lenient_period")]
    pub period: u32,
    #[serde(rename = "nota1", default = "nan", deserialize_with = "lenient_f64")]
    pub score_1: f64,
    #[serde(rename = "nota2", default = "nan", deserialize_with = "lenient_f64")]
    pub score_2: f64,
    #[serde(rename = "nota3", default = "nan", deserialize_with = "lenient_f64")]
    pub score_3: f64,
    #[serde(rename = "asistencia_%", default = "nan", deserialize_with = "lenient_f64")]
    pub attendance_pct: f64,
    #[serde(rename = "participacion", default = "nan", deserialize_with = "lenient_f64")]
    pub participation: f64,
}

/// Per-student result of the aggregation/projection/classification stage.
#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub student_id: u32,
    pub student_name: String,
    pub current_average: f64,
    /// Average needed in the remaining period to reach the passing grade.
    /// `None` when all periods are complete or no period data exists;
    /// serialized as 0.0 by policy.
    pub required_next_period_grade: Option<f64>,
    pub status: Status,
}

/// A summary-report row read back from disk, for the views that consume the
/// general report instead of raw grades.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "nombre")]
    pub student_name: String,
    #[serde(rename = "promedio_actual", default = "nan", deserialize_with = "lenient_f64")]
    pub current_average: f64,
    #[serde(rename = "necesita_en_periodo4", default = "nan", deserialize_with = "lenient_f64")]
    pub required_next_period_grade: f64,
}

/// Performance tier derived from the cumulative average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Top,
    Approved,
    AtRisk,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Top => "Top",
            Status::Approved => "Approved",
            Status::AtRisk => "At risk",
        };
        f.write_str(label)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn nan() -> f64 {
    f64::NAN
}

/// Parses a cell as f64, coercing anything non-numeric (including empty
/// cells) to NaN instead of failing the row.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().unwrap_or(f64::NAN))
}

/// Parses a period cell, treating junk and non-positive values as 0
/// ("no period information").
fn lenient_period<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let value: f64 = raw.trim().parse().unwrap_or(0.0);
    if value.is_finite() && value > 0.0 {
        Ok(value as u32)
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(Status::Top.to_string(), "Top");
        assert_eq!(Status::Approved.to_string(), "Approved");
        assert_eq!(Status::AtRisk.to_string(), "At risk");
    }

    #[test]
    fn round2_rounds_to_cents() {
        assert_eq!(round2(2.678), 2.68);
        assert_eq!(round2(4.499999), 4.5);
        assert_eq!(round2(3.0), 3.0);
    }

    #[test]
    fn lenient_cells_coerce_to_nan() {
        let data = "id_estudiante,nombre,asignatura,periodo,nota1,nota2,nota3\n\
                    1,Avery Lee,Redes,two,abc,4.0,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let row: GradeRow = reader.deserialize().next().unwrap().unwrap();
        assert!(row.score_1.is_nan());
        assert_eq!(row.score_2, 4.0);
        assert!(row.score_3.is_nan());
        assert_eq!(row.period, 0);
        assert!(row.attendance_pct.is_nan());
    }
}
