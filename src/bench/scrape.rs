//! Simulator output scraping
//!
//! The simulator prints its evaluation in the last three stdout lines when
//! run with brief verbosity. Anything that does not look exactly like that
//! block is treated as no result.

use regex_lite::Regex;

/// Closing metrics block of a simulator run.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryScrape {
    /// Jobs the simulator completed
    pub jobs: i64,
    /// Average utilisation, percent
    pub utilisation: f64,
    /// Total rental cost, dollars
    pub rental_cost: f64,
    /// Average turnaround time, seconds
    pub turnaround: i64,
}

/// Parse the metrics block from simulator stdout.
///
/// Expects, in the last three lines:
/// line 0 `... #jobs: N ...`, line 1 `... avg util: X ... total cost: $Y`,
/// line 2 `... avg turnaround time: T`. Returns `None` unless all four
/// values parse.
pub fn scrape_summary(stdout: &str) -> Option<SummaryScrape> {
    let jobs_re = Regex::new(r"#jobs: (\d+)").unwrap();
    let util_re = Regex::new(r"avg util: (\d+\.?\d*)").unwrap();
    let cost_re = Regex::new(r"total cost: \$(\d+\.?\d*)").unwrap();
    let time_re = Regex::new(r"avg turnaround time: (\d+)").unwrap();

    let lines: Vec<&str> = stdout.lines().collect();
    if lines.len() < 3 {
        return None;
    }
    let tail = &lines[lines.len() - 3..];

    let jobs = capture_at(&jobs_re, tail[0])?.parse().ok()?;
    let utilisation = capture_at(&util_re, tail[1])?.parse().ok()?;
    let rental_cost = capture_at(&cost_re, tail[1])?.parse().ok()?;
    let turnaround = capture_at(&time_re, tail[2])?.parse().ok()?;

    Some(SummaryScrape {
        jobs,
        utilisation,
        rental_cost,
        turnaround,
    })
}

/// Parse the unscheduled-job complaint from simulator stderr, if present.
pub fn scrape_unscheduled(stderr: &str) -> Option<i64> {
    // Pattern: "N jobs not scheduled!"
    let unscheduled_re = Regex::new(r"(\d+) jobs not scheduled!").unwrap();
    capture_at(&unscheduled_re, stderr)?.parse().ok()
}

fn capture_at<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
