//! Report rendering
//!
//! Plain-text tables for the evaluation, one block per metric. Pure string
//! building; the bench orchestrator decides where the text goes.

use crate::bench::refs::BASELINES;
use crate::bench::results::{BenchResults, Metric};
use crate::bench::score::{Evaluation, Marks, TableLine, MAX_OBJECTIVE_MARK};

const CONFIG_WIDTH: usize = 28;
const METRIC_WIDTH: usize = 10;

fn row(cells: &[String]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let width = if i == 0 { CONFIG_WIDTH } else { METRIC_WIDTH };
            format!("{:<width$}", cell, width = width)
        })
        .collect();
    padded.join("|")
}

fn header_row() -> String {
    let mut cells = vec!["Config".to_string()];
    cells.extend(BASELINES.iter().map(|algo| algo.to_uppercase()));
    cells.push("Yours".to_string());
    row(&cells)
}

/// Turnaround renders without decimals, the other metrics with two.
fn fmt_metric(metric: Metric, value: f64) -> String {
    if metric.integral() {
        if value.fract() == 0.0 {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        }
    } else {
        format!("{:.2}", value)
    }
}

fn fmt_opt(metric: Metric, value: Option<f64>) -> String {
    match value {
        Some(v) => fmt_metric(metric, v),
        None => "-".to_string(),
    }
}

fn fmt_avg(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn fmt_norm(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "-".to_string(),
    }
}

/// Render the comparison tables, one block per scored metric.
pub fn render_tables(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    for table in &evaluation.tables {
        out.push_str(table.metric.label());
        out.push('\n');
        out.push_str(&header_row());
        out.push('\n');

        for line in &table.lines {
            match line {
                TableLine::Row {
                    config,
                    refs,
                    student,
                    ..
                } => {
                    let mut cells = vec![config.clone()];
                    cells.extend(refs.iter().map(|r| fmt_opt(table.metric, *r)));
                    cells.push(fmt_metric(table.metric, *student));
                    out.push_str(&row(&cells));
                    out.push('\n');
                }
                TableLine::Missing { config } => {
                    out.push_str(&format!("No results found for {}\n", config));
                }
                TableLine::Unscheduled { config, count } => {
                    out.push_str(&format!("Unscheduled jobs for {}: {}\n", config, count));
                }
            }
        }

        let mut cells = vec!["Average".to_string()];
        cells.extend(table.ref_averages.iter().map(|r| fmt_avg(*r)));
        cells.push(format!("{:.2}", table.student_average));
        out.push_str(&row(&cells));
        out.push('\n');

        for norm in &table.normalised {
            let mut cells = vec![norm.label.clone()];
            cells.extend(norm.values.iter().map(|v| fmt_norm(*v)));
            out.push_str(&row(&cells));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Render the final mark block.
pub fn render_marks(marks: &Marks) -> String {
    format!(
        "Final results:\n\
         Handshake: {}/1\n\
         Scheduled All Jobs: {}/2\n\
         Average Performance: {}/2\n\
         Turnaround Performance: {}/{}\n",
        marks.handshake,
        marks.scheduled_all,
        marks.average_performance,
        marks.objective,
        MAX_OBJECTIVE_MARK
    )
}

/// Render measurements alone, for runs without reference results.
pub fn render_measurements(results: &BenchResults) -> String {
    let mut out = String::new();
    for metric in Metric::ALL {
        out.push_str(metric.label());
        out.push('\n');
        out.push_str(&row(&["Config".to_string(), "Measured".to_string()]));
        out.push('\n');
        for config in results.configs() {
            out.push_str(&row(&[
                config.to_string(),
                fmt_opt(metric, results.value(metric, config)),
            ]));
            out.push('\n');
        }
        out.push('\n');
    }
    for config in results.configs() {
        if let Some(count) = results.unscheduled(config) {
            if count > 0 {
                out.push_str(&format!("Unscheduled jobs for {}: {}\n", config, count));
            }
        }
    }
    out
}
