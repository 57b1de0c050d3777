//! Scoring
//!
//! Compares measured metrics against the baseline references and produces
//! the mark breakdown. Per-config comparison is strict, the average
//! comparison admits ties. Pure over the loaded data so every gate is
//! testable in isolation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::bench::refs::{RefResults, BASELINES};
use crate::bench::results::{BenchResults, Metric};

/// Ceiling for the objective-metric mark.
pub const MAX_OBJECTIVE_MARK: u32 = 10;

/// Which metric the placement policy optimizes for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Objective {
    #[default]
    Turnaround,
    Utilisation,
    RentalCost,
}

impl Objective {
    pub fn metric(&self) -> Metric {
        match self {
            Objective::Turnaround => Metric::Turnaround,
            Objective::Utilisation => Metric::Utilisation,
            Objective::RentalCost => Metric::RentalCost,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Objective::Turnaround => "tt",
            Objective::Utilisation => "ru",
            Objective::RentalCost => "co",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tt" => Ok(Objective::Turnaround),
            "ru" => Ok(Objective::Utilisation),
            "co" => Ok(Objective::RentalCost),
            other => Err(format!("invalid objective '{}' (expected tt, ru or co)", other)),
        }
    }
}

/// Mark breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marks {
    /// Protocol handshake worked and every config produced results (/1)
    pub handshake: u32,
    /// No config left jobs unscheduled (/2)
    pub scheduled_all: u32,
    /// Average at least matches every baseline on every metric (/2)
    pub average_performance: u32,
    /// Configs where the objective metric strictly beats all baselines (/10)
    pub objective: u32,
}

/// One rendered line of a metric table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableLine {
    /// Config measured and compared
    Row {
        config: String,
        refs: Vec<Option<f64>>,
        student: f64,
        beats: usize,
    },
    /// Config produced no value
    Missing { config: String },
    /// Config left jobs unscheduled, so it is not compared
    Unscheduled { config: String, count: i64 },
}

/// Comparison table for one metric.
#[derive(Debug, Clone)]
pub struct MetricTable {
    pub metric: Metric,
    pub lines: Vec<TableLine>,
    /// Baseline averages over every config the reference file lists
    pub ref_averages: Vec<Option<f64>>,
    /// Mean of the measured values, unscheduled configs included
    pub student_average: f64,
    /// Baselines the average at least matches
    pub average_beats: usize,
    /// Normalisation rows: one per baseline, then the baseline mean
    pub normalised: Vec<NormalisedRow>,
}

#[derive(Debug, Clone)]
pub struct NormalisedRow {
    pub label: String,
    /// Columns follow [`BASELINES`] order with the student last
    pub values: Vec<Option<f64>>,
}

/// Full evaluation of one bench run against the references.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub tables: Vec<MetricTable>,
    /// Metrics with no results at all, in evaluation order
    pub missing_metrics: Vec<Metric>,
    pub marks: Marks,
}

fn beats_strict(metric: Metric, student: f64, reference: f64) -> bool {
    if metric.higher_is_better() {
        student > reference
    } else {
        student < reference
    }
}

fn beats_or_ties(metric: Metric, student: f64, reference: f64) -> bool {
    if metric.higher_is_better() {
        student >= reference
    } else {
        student <= reference
    }
}

/// Score a bench run.
pub fn evaluate(results: &BenchResults, refs: &RefResults, objective: Objective) -> Evaluation {
    let mut handshake = 1;
    let mut scheduled_all = 2;
    let mut tables = Vec::new();
    let mut missing_metrics = Vec::new();
    let mut baseline_scores: BTreeMap<Metric, BTreeMap<String, usize>> = BTreeMap::new();
    let mut average_scores: BTreeMap<Metric, usize> = BTreeMap::new();

    for metric in Metric::ALL {
        if results.metric_missing(metric) {
            missing_metrics.push(metric);
            handshake = 0;
            scheduled_all = 0;
            continue;
        }

        let mut lines = Vec::new();
        let mut per_config: BTreeMap<String, usize> = BTreeMap::new();
        let mut measured: Vec<f64> = Vec::new();

        for config in results.configs() {
            let Some(student) = results.value(metric, config) else {
                handshake = 0;
                lines.push(TableLine::Missing {
                    config: config.to_string(),
                });
                continue;
            };
            // The average includes every measured config, even ones skipped
            // below for unscheduled jobs.
            measured.push(student);

            if let Some(count) = results.unscheduled(config) {
                if count > 0 {
                    scheduled_all = 0;
                    lines.push(TableLine::Unscheduled {
                        config: config.to_string(),
                        count,
                    });
                    continue;
                }
            }

            let ref_row: Vec<Option<f64>> = BASELINES
                .iter()
                .map(|algo| refs.value(metric.label(), config, algo))
                .collect();
            let beats = ref_row
                .iter()
                .flatten()
                .filter(|reference| beats_strict(metric, student, **reference))
                .count();
            per_config.insert(config.to_string(), beats);
            lines.push(TableLine::Row {
                config: config.to_string(),
                refs: ref_row,
                student,
                beats,
            });
        }

        let ref_averages: Vec<Option<f64>> = BASELINES
            .iter()
            .map(|algo| refs.average(metric.label(), algo))
            .collect();
        let student_average = measured.iter().sum::<f64>() / measured.len() as f64;
        let average_beats = ref_averages
            .iter()
            .flatten()
            .filter(|reference| beats_or_ties(metric, student_average, **reference))
            .count();

        average_scores.insert(metric, average_beats);
        baseline_scores.insert(metric, per_config);

        let normalised = build_normalised(&ref_averages, student_average);
        tables.push(MetricTable {
            metric,
            lines,
            ref_averages,
            student_average,
            average_beats,
            normalised,
        });
    }

    let average_performance = if !average_scores.is_empty()
        && average_scores.values().all(|score| *score > 0)
    {
        2
    } else {
        0
    };

    let objective_metric = objective.metric();
    let objective_mark = if baseline_scores.contains_key(&objective_metric)
        && baseline_scores.values().any(|scores| !scores.is_empty())
        && average_performance > 0
    {
        let full_wins = baseline_scores[&objective_metric]
            .values()
            .filter(|score| **score == BASELINES.len())
            .count();
        (full_wins as u32).min(MAX_OBJECTIVE_MARK)
    } else {
        0
    };

    Evaluation {
        tables,
        missing_metrics,
        marks: Marks {
            handshake,
            scheduled_all,
            average_performance,
            objective: objective_mark,
        },
    }
}

fn build_normalised(ref_averages: &[Option<f64>], student_average: f64) -> Vec<NormalisedRow> {
    let columns: Vec<Option<f64>> = ref_averages
        .iter()
        .copied()
        .chain([Some(student_average)])
        .collect();
    let divide = |denominator: Option<f64>| -> Vec<Option<f64>> {
        columns
            .iter()
            .map(|value| match (value, denominator) {
                (Some(v), Some(d)) if d != 0.0 => Some(v / d),
                _ => None,
            })
            .collect()
    };

    let mut rows = Vec::new();
    for (i, base) in BASELINES.iter().enumerate() {
        rows.push(NormalisedRow {
            label: format!("Normalised ({})", base.to_uppercase()),
            values: divide(ref_averages[i]),
        });
    }

    let available: Vec<f64> = ref_averages.iter().flatten().copied().collect();
    let baseline_mean = if available.is_empty() {
        None
    } else {
        Some(available.iter().sum::<f64>() / available.len() as f64)
    };
    rows.push(NormalisedRow {
        label: "Normalised (Average)".to_string(),
        values: divide(baseline_mean),
    });
    rows
}
