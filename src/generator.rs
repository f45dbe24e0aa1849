use std::collections::HashSet;

use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::models::{round2, AnalyticsConfig, GradeRow};

/// Statistical model constants. Scores for one (student, subject, period)
/// cell are drawn around `base + student_bias + subject_bias + trend`.
const BASE_MEAN: f64 = 3.0;
const BASE_SD: f64 = 0.8;
const STUDENT_BIAS_SD: f64 = 0.25;
const STUDENT_BIAS_LIMIT: f64 = 0.6;
const SUBJECT_BIAS_SD: f64 = 0.4;
const SUBJECT_BIAS_LIMIT: f64 = 0.8;
const SCORE_SD: f64 = 0.5;
const ATTENDANCE_SD: f64 = 10.0;
const PARTICIPATION_SD: f64 = 0.2;

/// Per-period drift options and their weights. The drawn step is scaled by
/// `period - 1`, so period 1 never drifts.
const TREND_STEPS: [f64; 5] = [-0.15, -0.05, 0.0, 0.05, 0.15];
const TREND_WEIGHTS: [u32; 5] = [15, 20, 30, 20, 15];

const NAME_RETRY_LIMIT: u32 = 20;

pub const DEFAULT_SUBJECTS: [&str; 7] = [
    "Programación",
    "Matemáticas",
    "Bases de Datos",
    "Algoritmos",
    "Sistemas",
    "Redes",
    "Ingeniería de Software",
];

const FIRST_NAMES: [&str; 53] = [
    "Catalina", "Juan", "Sofía", "Andrés", "Valentina", "Diego", "María", "Mateo",
    "Laura", "Felipe", "Isabella", "Luis", "Camila", "Alejandro", "Gabriela", "Carlos",
    "Daniela", "Sebastián", "Natalia", "Miguel", "Paula", "Santiago", "Alejandra", "José",
    "Juliana", "Nicolás", "Valeria", "Samuel", "Ana", "David", "Carolina", "Mariana",
    "Daniel", "Lucía", "Tomás", "Sara", "Martín", "Emma", "Gabriel", "Victoria",
    "Leonardo", "Manuela", "Emilio", "Maximiliano", "Antonella", "Ricardo", "Julieta",
    "Eduardo", "Renata", "Fernando", "Adriana", "Joaquín", "Elena",
];

const LAST_NAMES: [&str; 40] = [
    "Rodríguez", "Gómez", "García", "Martínez", "López", "Pérez", "Sánchez", "Ramírez",
    "Torres", "Vargas", "Rojas", "Muñoz", "Castro", "Herrera", "Moreno", "Jiménez",
    "Ortiz", "Álvarez", "Romero", "Rincón", "Cárdenas", "Peña", "Mendoza", "Suárez",
    "Zapata", "Vega", "Reyes", "Silva", "Medina", "Gutiérrez", "Ruiz", "Díaz",
    "Parra", "Molina", "Ríos", "Mejía", "Salazar", "Bermúdez", "Pardo", "Valencia",
];

#[derive(Debug, Clone)]
pub struct GeneratorParams {
    pub num_students: usize,
    pub num_periods: u32,
    pub seed: u64,
    pub subjects: Vec<String>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        GeneratorParams {
            num_students: 40,
            num_periods: 3,
            seed: 0,
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Produces one synthetic grade dataset, sorted by (student, subject,
/// period). The same seed yields the same rows.
pub fn generate(params: &GeneratorParams, config: &AnalyticsConfig) -> anyhow::Result<Vec<GradeRow>> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let names = unique_names(&mut rng, params.num_students, &FIRST_NAMES, &LAST_NAMES);

    let base_dist = Normal::new(BASE_MEAN, BASE_SD)?;
    let student_bias_dist = Normal::new(0.0, STUDENT_BIAS_SD)?;
    let subject_bias_dist = Normal::new(0.0, SUBJECT_BIAS_SD)?;
    let trend_dist = WeightedIndex::new(TREND_WEIGHTS)?;

    let mut rows = Vec::with_capacity(params.num_students * params.subjects.len());

    for (index, student_name) in names.iter().enumerate() {
        let student_id = (index + 1) as u32;

        // Latent per-student traits: overall capability plus a persistent
        // cross-subject consistency bias.
        let base = base_dist
            .sample(&mut rng)
            .clamp(config.grade_min, config.grade_max);
        let student_bias = student_bias_dist
            .sample(&mut rng)
            .clamp(-STUDENT_BIAS_LIMIT, STUDENT_BIAS_LIMIT);

        for subject in &params.subjects {
            let subject_bias = subject_bias_dist
                .sample(&mut rng)
                .clamp(-SUBJECT_BIAS_LIMIT, SUBJECT_BIAS_LIMIT);

            for period in 1..=params.num_periods {
                let trend_step = TREND_STEPS[trend_dist.sample(&mut rng)];
                let trend = trend_step * f64::from(period - 1);

                let center = base + subject_bias + student_bias + trend;
                let score_dist = Normal::new(center, SCORE_SD)?;
                let mut scores = [0.0f64; 3];
                for score in scores.iter_mut() {
                    *score = round2(
                        score_dist
                            .sample(&mut rng)
                            .clamp(config.grade_min, config.grade_max),
                    );
                }

                // Attendance and participation correlate with the latent
                // base performance, not with the drawn scores.
                let attendance_mean = 70.0 + (base / config.grade_max) * 25.0;
                let attendance = round1(
                    Normal::new(attendance_mean, ATTENDANCE_SD)?
                        .sample(&mut rng)
                        .clamp(50.0, 100.0),
                );

                let participation_mean = 0.4 + (base / config.grade_max) * 0.5;
                let participation = round2(
                    Normal::new(participation_mean, PARTICIPATION_SD)?
                        .sample(&mut rng)
                        .clamp(0.0, 1.0),
                );

                rows.push(GradeRow {
                    student_id,
                    student_name: student_name.clone(),
                    subject: subject.clone(),
                    period,
                    score_1: scores[0],
                    score_2: scores[1],
                    score_3: scores[2],
                    attendance_pct: attendance,
                    participation,
                });
            }
        }
    }

    rows.sort_by(|a, b| {
        (a.student_id, &a.subject, a.period).cmp(&(b.student_id, &b.subject, b.period))
    });

    Ok(rows)
}

/// Draws unique "First Last" display names. After `NAME_RETRY_LIMIT`
/// collisions for one student, the ordinal index is appended instead, so
/// small pools still yield globally unique names.
fn unique_names(
    rng: &mut StdRng,
    count: usize,
    first_names: &[&str],
    last_names: &[&str],
) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(count);

    for index in 0..count {
        let mut attempts = 0;
        let name = loop {
            let candidate = format!(
                "{} {}",
                first_names[rng.random_range(0..first_names.len())],
                last_names[rng.random_range(0..last_names.len())]
            );
            attempts += 1;

            if used.insert(candidate.clone()) {
                break candidate;
            }
            if attempts > NAME_RETRY_LIMIT {
                let fallback = format!("{} {}", candidate, index + 1);
                used.insert(fallback.clone());
                break fallback;
            }
        };
        names.push(name);
    }

    names
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn params(students: usize, periods: u32, seed: u64) -> GeneratorParams {
        GeneratorParams {
            num_students: students,
            num_periods: periods,
            seed,
            ..GeneratorParams::default()
        }
    }

    #[test]
    fn same_seed_same_rows() {
        let config = AnalyticsConfig::default();
        let a = generate(&params(10, 3, 42), &config).unwrap();
        let b = generate(&params(10, 3, 42), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_seed_writes_byte_identical_files() {
        let config = AnalyticsConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");

        crate::table::write_grade_rows(&first, &generate(&params(6, 3, 11), &config).unwrap())
            .unwrap();
        crate::table::write_grade_rows(&second, &generate(&params(6, 3, 11), &config).unwrap())
            .unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn different_seeds_differ() {
        let config = AnalyticsConfig::default();
        let a = generate(&params(10, 3, 1), &config).unwrap();
        let b = generate(&params(10, 3, 2), &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn row_count_and_triple_uniqueness() {
        let config = AnalyticsConfig::default();
        let rows = generate(&params(12, 3, 7), &config).unwrap();
        assert_eq!(rows.len(), 12 * DEFAULT_SUBJECTS.len() * 3);

        let triples: HashSet<(u32, &str, u32)> = rows
            .iter()
            .map(|r| (r.student_id, r.subject.as_str(), r.period))
            .collect();
        assert_eq!(triples.len(), rows.len());
    }

    #[test]
    fn all_values_within_range() {
        let config = AnalyticsConfig::default();
        let rows = generate(&params(30, 3, 99), &config).unwrap();
        for row in &rows {
            for score in [row.score_1, row.score_2, row.score_3] {
                assert!(score >= config.grade_min && score <= config.grade_max);
            }
            assert!(row.attendance_pct >= 50.0 && row.attendance_pct <= 100.0);
            assert!(row.participation >= 0.0 && row.participation <= 1.0);
            assert!(row.period >= 1 && row.period <= 3);
        }
    }

    #[test]
    fn rows_sorted_by_student_subject_period() {
        let config = AnalyticsConfig::default();
        let rows = generate(&params(8, 3, 5), &config).unwrap();
        for pair in rows.windows(2) {
            let a = (pair[0].student_id, &pair[0].subject, pair[0].period);
            let b = (pair[1].student_id, &pair[1].subject, pair[1].period);
            assert!(a <= b);
        }
    }

    #[test]
    fn generated_names_are_unique() {
        let config = AnalyticsConfig::default();
        let rows = generate(&params(200, 1, 3), &config).unwrap();
        let names: HashSet<&str> = rows.iter().map(|r| r.student_name.as_str()).collect();
        let ids: HashSet<u32> = rows.iter().map(|r| r.student_id).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn exhausted_pool_falls_back_to_ordinal_suffix() {
        let mut rng = StdRng::seed_from_u64(0);
        let names = unique_names(&mut rng, 3, &["Ana"], &["Gómez"]);
        assert_eq!(names[0], "Ana Gómez");
        assert_eq!(names[1], "Ana Gómez 2");
        assert_eq!(names[2], "Ana Gómez 3");
        let distinct: HashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
    }
}
