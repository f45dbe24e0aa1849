use std::collections::HashMap;

use crate::models::{round2, AnalyticsConfig, GradeRow, Status, StudentSummary};

/// Mean of the numeric scores in one row. Junk cells arrive as NaN and are
/// excluded; a row with no numeric score at all averages to NaN.
pub fn row_average(row: &GradeRow) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for score in [row.score_1, row.score_2, row.score_3] {
        if score.is_finite() {
            sum += score;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Highest period present in the raw table, 0 when there is none.
pub fn periods_observed(rows: &[GradeRow]) -> u32 {
    rows.iter().map(|row| row.period).max().unwrap_or(0)
}

/// Average needed in the single remaining period to finish at the passing
/// grade, assuming every period weighs equally in the cumulative average.
///
/// `None` when all periods are already complete or no period information
/// exists; callers report that as 0.0 by policy. The result is clamped to
/// the valid grade range, so an already-safe student needs 0.00 and a lost
/// cause caps at `grade_max`.
pub fn required_grade(
    current_average: f64,
    periods_observed: u32,
    config: &AnalyticsConfig,
) -> Option<f64> {
    if periods_observed == 0 || periods_observed >= config.periods_total {
        return None;
    }

    let total = f64::from(config.periods_total);
    let observed = f64::from(periods_observed);
    let raw = (config.passing_grade * total - current_average * observed) / (total - observed);

    Some(round2(raw.clamp(0.0, config.grade_max)))
}

/// Tier thresholds are half-open: a boundary average lands in the higher
/// tier (4.5 is Top, 3.0 is Approved).
pub fn classify(average: f64, config: &AnalyticsConfig) -> Status {
    if average >= config.top_threshold {
        Status::Top
    } else if average < config.passing_grade {
        Status::AtRisk
    } else {
        Status::Approved
    }
}

/// Reduces raw rows to one summary per student: cumulative average across
/// all observed subject/period rows, projection, and tier.
///
/// Grouping keeps the first name seen for a student id; conflicting names
/// later in the file are ignored rather than failing the run.
pub fn summarize(rows: &[GradeRow], config: &AnalyticsConfig) -> Vec<StudentSummary> {
    let observed = periods_observed(rows);

    struct Accumulator {
        name: String,
        sum: f64,
        count: usize,
    }

    let mut groups: HashMap<u32, Accumulator> = HashMap::new();
    for row in rows {
        let entry = groups.entry(row.student_id).or_insert_with(|| Accumulator {
            name: row.student_name.clone(),
            sum: 0.0,
            count: 0,
        });
        let average = row_average(row);
        if average.is_finite() {
            entry.sum += average;
            entry.count += 1;
        }
    }

    let mut summaries: Vec<StudentSummary> = groups
        .into_iter()
        .map(|(student_id, acc)| {
            let current_average = if acc.count == 0 {
                f64::NAN
            } else {
                round2(acc.sum / acc.count as f64)
            };
            StudentSummary {
                student_id,
                student_name: acc.name,
                current_average,
                required_next_period_grade: required_grade(current_average, observed, config),
                status: classify(current_average, config),
            }
        })
        .collect();

    summaries.sort_by_key(|summary| summary.student_id);
    summaries
}
