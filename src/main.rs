use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

mod generator;
mod models;
mod report;
mod summary;
mod table;

use models::AnalyticsConfig;

#[derive(Parser)]
#[command(name = "cohort-grade-analytics")]
#[command(about = "Grade analytics for a student cohort: synthetic datasets, summaries, risk and top reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic grade dataset
    Generate {
        #[arg(long, default_value_t = 40)]
        students: usize,
        #[arg(long, default_value_t = 3)]
        periods: u32,
        #[arg(long, default_value = "data-generada.csv")]
        out: PathBuf,
        /// Seed for reproducibility (default: current Unix timestamp)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Build the per-student summary report from raw grades
    Summarize {
        #[arg(long, default_value = "data-generada.csv")]
        input: PathBuf,
        #[arg(long, default_value = "reporte_general.csv")]
        out: PathBuf,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// List students below the passing grade
    AtRisk {
        #[arg(long, default_value = "reporte_general.csv")]
        input: PathBuf,
        #[arg(long, default_value = "estudiantes_en_riesgo.csv")]
        out: PathBuf,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Show the student(s) with the highest cumulative average
    Top {
        #[arg(long, default_value = "reporte_general.csv")]
        input: PathBuf,
        /// Print the result as JSON instead of plain text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a markdown course report from raw grades
    Report {
        #[arg(long, default_value = "data-generada.csv")]
        input: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

#[derive(Args)]
struct ThresholdArgs {
    #[arg(long, default_value_t = AnalyticsConfig::default().passing_grade)]
    passing_grade: f64,
    #[arg(long, default_value_t = AnalyticsConfig::default().top_threshold)]
    top_threshold: f64,
    #[arg(long, default_value_t = AnalyticsConfig::default().periods_total)]
    periods_total: u32,
    #[arg(long, default_value_t = AnalyticsConfig::default().grade_max)]
    grade_max: f64,
}

impl ThresholdArgs {
    fn to_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            passing_grade: self.passing_grade,
            top_threshold: self.top_threshold,
            periods_total: self.periods_total,
            grade_max: self.grade_max,
            ..AnalyticsConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            students,
            periods,
            out,
            seed,
        } => {
            let config = AnalyticsConfig::default();
            let seed = seed.unwrap_or_else(|| Utc::now().timestamp() as u64);
            let params = generator::GeneratorParams {
                num_students: students,
                num_periods: periods,
                seed,
                ..generator::GeneratorParams::default()
            };

            let rows = generator::generate(&params, &config)?;
            table::write_grade_rows(&out, &rows)?;
            println!(
                "Generated {} rows for {} students (seed {}) into {}.",
                rows.len(),
                students,
                seed,
                out.display()
            );
        }
        Commands::Summarize {
            input,
            out,
            thresholds,
        } => {
            let config = thresholds.to_config();
            let rows = table::load_grade_rows(&input)?;
            println!("Loaded {} rows from {}.", rows.len(), input.display());

            let summaries = summary::summarize(&rows, &config);
            table::write_summaries(&out, &summaries)?;
            println!(
                "Summary for {} students (periods observed: {} of {}) written to {}.",
                summaries.len(),
                summary::periods_observed(&rows),
                config.periods_total,
                out.display()
            );

            print_course_summary(&summaries, &config);
        }
        Commands::AtRisk {
            input,
            out,
            thresholds,
        } => {
            let config = thresholds.to_config();
            let rows = table::load_summary_rows(
                &input,
                &["nombre", "promedio_actual", "necesita_en_periodo4"],
            )?;

            let flagged = report::at_risk_rows(&rows, &config);
            if flagged.is_empty() {
                println!(
                    "No students at risk: every average is at or above {:.1}.",
                    config.passing_grade
                );
                return Ok(());
            }

            println!("Students below the passing grade ({:.1}):", config.passing_grade);
            for row in &flagged {
                println!(
                    "- {} average {:.2}, needs {:.2} in the final period",
                    row.student_name, row.current_average, row.required_next_period_grade
                );
            }
            println!("Total at risk: {}", flagged.len());

            table::write_at_risk(&out, &flagged)?;
            println!("At-risk report written to {}.", out.display());
        }
        Commands::Top { input, json } => {
            let rows = table::load_summary_rows(&input, &["nombre", "promedio_actual"])?;
            let top = report::top_performers(&rows).with_context(|| {
                format!("no numeric averages found in {}", input.display())
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else {
                println!("Highest cumulative average: {:.2}", top.max_average);
                if top.names.len() == 1 {
                    println!("Top student: {}", top.names[0]);
                } else {
                    println!(
                        "Top students (tie of {}): {}",
                        top.names.len(),
                        top.names.join(", ")
                    );
                }
            }
        }
        Commands::Report {
            input,
            out,
            thresholds,
        } => {
            let config = thresholds.to_config();
            let rows = table::load_grade_rows(&input)?;
            let summaries = summary::summarize(&rows, &config);

            let rendered =
                report::build_report(Utc::now().date_naive(), &rows, &summaries, &config);
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_course_summary(summaries: &[models::StudentSummary], config: &AnalyticsConfig) {
    let numeric: Vec<f64> = summaries
        .iter()
        .map(|s| s.current_average)
        .filter(|value| value.is_finite())
        .collect();

    if numeric.is_empty() {
        println!("No students with numeric averages to summarize.");
        return;
    }

    let group_average = numeric.iter().sum::<f64>() / numeric.len() as f64;
    println!("Group average: {:.2}", group_average);

    let max_average = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let best: Vec<&str> = summaries
        .iter()
        .filter(|s| s.current_average == max_average)
        .map(|s| s.student_name.as_str())
        .collect();
    println!("Best student(s): {} ({:.2})", best.join(", "), max_average);

    let at_risk = summaries
        .iter()
        .filter(|s| s.status == models::Status::AtRisk)
        .count();
    println!(
        "At risk (< {:.1}): {} of {} ({:.2}%)",
        config.passing_grade,
        at_risk,
        summaries.len(),
        at_risk as f64 / summaries.len() as f64 * 100.0
    );
}
