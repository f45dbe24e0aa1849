use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AnalyticsConfig, GradeRow, Status, StudentSummary, SummaryRow};
use crate::summary;

/// The summary rows sitting below the passing grade. NaN averages compare
/// false and are excluded, matching the aggregation's coercion policy.
pub fn at_risk_rows(rows: &[SummaryRow], config: &AnalyticsConfig) -> Vec<SummaryRow> {
    rows.iter()
        .filter(|row| row.current_average < config.passing_grade)
        .cloned()
        .collect()
}

/// Every student tied for the maximum cumulative average.
///
/// Ties are exact equality over already-rounded two-decimal values, so a
/// shared maximum is common and all holders are reported. `None` when no
/// numeric average exists at all.
#[derive(Debug, Clone, Serialize)]
pub struct TopPerformers {
    pub max_average: f64,
    pub names: Vec<String>,
}

pub fn top_performers(rows: &[SummaryRow]) -> Option<TopPerformers> {
    let max_average = rows
        .iter()
        .map(|row| row.current_average)
        .filter(|value| value.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if !max_average.is_finite() {
        return None;
    }

    let names = rows
        .iter()
        .filter(|row| row.current_average == max_average)
        .map(|row| row.student_name.clone())
        .collect();

    Some(TopPerformers { max_average, names })
}

#[derive(Debug, Clone)]
pub struct PeriodAverage {
    pub period: u32,
    pub average: f64,
}

/// Course-wide mean of row averages, per period, in period order.
pub fn course_period_averages(rows: &[GradeRow]) -> Vec<PeriodAverage> {
    let mut groups: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let average = summary::row_average(row);
        if average.is_finite() {
            let entry = groups.entry(row.period).or_insert((0.0, 0));
            entry.0 += average;
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(period, (sum, count))| PeriodAverage {
            period,
            average: sum / count as f64,
        })
        .collect()
}

/// Builds the markdown course report: per-period averages, cohort summary,
/// and the at-risk list.
pub fn build_report(
    generated_on: NaiveDate,
    rows: &[GradeRow],
    summaries: &[StudentSummary],
    config: &AnalyticsConfig,
) -> String {
    let mut output = String::new();
    let observed = summary::periods_observed(rows);

    let _ = writeln!(output, "# Course Grade Report");
    let _ = writeln!(
        output,
        "Generated on {} ({} students, {} raw rows, periods observed: {} of {})",
        generated_on,
        summaries.len(),
        rows.len(),
        observed,
        config.periods_total
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Averages by Period");

    let period_averages = course_period_averages(rows);
    if period_averages.is_empty() {
        let _ = writeln!(output, "No numeric grades in the dataset.");
    } else {
        for entry in &period_averages {
            let _ = writeln!(output, "- Period {}: {:.2}", entry.period, entry.average);
        }
        let overall =
            period_averages.iter().map(|e| e.average).sum::<f64>() / period_averages.len() as f64;
        let _ = writeln!(output, "- Overall: {:.2}", overall);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Summary");

    let numeric_averages: Vec<f64> = summaries
        .iter()
        .map(|s| s.current_average)
        .filter(|value| value.is_finite())
        .collect();

    if numeric_averages.is_empty() {
        let _ = writeln!(output, "No students with numeric averages.");
    } else {
        let group_average =
            numeric_averages.iter().sum::<f64>() / numeric_averages.len() as f64;
        let _ = writeln!(output, "- Group average: {:.2}", group_average);

        let max_average = numeric_averages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let best: Vec<&str> = summaries
            .iter()
            .filter(|s| s.current_average == max_average)
            .map(|s| s.student_name.as_str())
            .collect();
        if best.len() == 1 {
            let _ = writeln!(output, "- Best student: {} ({:.2})", best[0], max_average);
        } else {
            let _ = writeln!(
                output,
                "- Best students (tie of {}): {} ({:.2})",
                best.len(),
                best.join(", "),
                max_average
            );
        }

        let at_risk_count = summaries.iter().filter(|s| s.status == Status::AtRisk).count();
        let _ = writeln!(
            output,
            "- At risk (< {:.1}): {} of {} ({:.2}%)",
            config.passing_grade,
            at_risk_count,
            summaries.len(),
            at_risk_count as f64 / summaries.len() as f64 * 100.0
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students At Risk");

    let flagged: Vec<&StudentSummary> = summaries
        .iter()
        .filter(|s| s.status == Status::AtRisk)
        .collect();

    if flagged.is_empty() {
        let _ = writeln!(output, "No students at risk.");
    } else {
        for student in flagged {
            let _ = writeln!(
                output,
                "- {} average {:.2}, needs {:.2} in the final period",
                student.student_name,
                student.current_average,
                student.required_next_period_grade.unwrap_or(0.0)
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_row(name: &str, average: f64) -> SummaryRow {
        SummaryRow {
            student_name: name.to_string(),
            current_average: average,
            required_next_period_grade: 0.0,
        }
    }

    fn student_summary(id: u32, name: &str, average: f64, status: Status) -> StudentSummary {
        StudentSummary {
            student_id: id,
            student_name: name.to_string(),
            current_average: average,
            required_next_period_grade: Some(1.0),
            status,
        }
    }

    #[test]
    fn exact_ties_return_all_holders() {
        let rows = vec![
            summary_row("A", 4.2),
            summary_row("B", 4.2),
            summary_row("C", 4.0),
        ];
        let top = top_performers(&rows).unwrap();
        assert_eq!(top.max_average, 4.2);
        assert_eq!(top.names, vec!["A", "B"]);
    }

    #[test]
    fn single_winner_has_cardinality_one() {
        let rows = vec![summary_row("A", 4.6), summary_row("B", 4.2)];
        let top = top_performers(&rows).unwrap();
        assert_eq!(top.names, vec!["A"]);
    }

    #[test]
    fn all_nan_averages_yield_none() {
        let rows = vec![summary_row("A", f64::NAN), summary_row("B", f64::NAN)];
        assert!(top_performers(&rows).is_none());
        assert!(top_performers(&[]).is_none());
    }

    #[test]
    fn at_risk_filter_excludes_passing_and_nan() {
        let config = AnalyticsConfig::default();
        let rows = vec![
            summary_row("A", 2.4),
            summary_row("B", 3.0),
            summary_row("C", f64::NAN),
            summary_row("D", 2.99),
        ];
        let flagged = at_risk_rows(&rows, &config);
        let names: Vec<&str> = flagged.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn at_risk_can_be_empty() {
        let config = AnalyticsConfig::default();
        let rows = vec![summary_row("A", 3.5), summary_row("B", 4.8)];
        assert!(at_risk_rows(&rows, &config).is_empty());
    }

    #[test]
    fn period_averages_group_in_order() {
        let mut row = crate::models::GradeRow {
            student_id: 1,
            student_name: "Ana Gómez".to_string(),
            subject: "Redes".to_string(),
            period: 2,
            score_1: 4.0,
            score_2: 4.0,
            score_3: 4.0,
            attendance_pct: 90.0,
            participation: 0.8,
        };
        let mut rows = vec![row.clone()];
        row.period = 1;
        row.score_1 = 2.0;
        row.score_2 = 2.0;
        row.score_3 = 2.0;
        rows.push(row);

        let averages = course_period_averages(&rows);
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].period, 1);
        assert_eq!(averages[0].average, 2.0);
        assert_eq!(averages[1].period, 2);
        assert_eq!(averages[1].average, 4.0);
    }

    #[test]
    fn report_mentions_empty_risk_outcome() {
        let config = AnalyticsConfig::default();
        let summaries = vec![
            student_summary(1, "Ana Gómez", 4.2, Status::Approved),
            student_summary(2, "Juan Pérez", 3.4, Status::Approved),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let report = build_report(date, &[], &summaries, &config);

        assert!(report.contains("# Course Grade Report"));
        assert!(report.contains("No students at risk."));
        assert!(report.contains("Group average: 3.80"));
        assert!(report.contains("Best student: Ana Gómez (4.20)"));
    }

    #[test]
    fn report_ties_list_every_best_student() {
        let config = AnalyticsConfig::default();
        let summaries = vec![
            student_summary(1, "Ana Gómez", 4.2, Status::Approved),
            student_summary(2, "Juan Pérez", 4.2, Status::Approved),
            student_summary(3, "Sara Ríos", 2.1, Status::AtRisk),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let report = build_report(date, &[], &summaries, &config);

        assert!(report.contains("Best students (tie of 2): Ana Gómez, Juan Pérez (4.20)"));
        assert!(report.contains("- Sara Ríos average 2.10, needs 1.00 in the final period"));
    }
}
