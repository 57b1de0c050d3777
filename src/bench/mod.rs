//! Marking Bench
//!
//! Runs the scheduling client against a live simulator once per workload
//! config, scrapes the simulator's closing metrics, writes the results
//! artifact and scores everything against reference baselines.
//!
//! Simulator and client share one port, so workloads run strictly one
//! after another.

pub mod refs;
pub mod report;
pub mod results;
pub mod scrape;
pub mod score;

pub use refs::{RefResults, BASELINES};
pub use results::{
    BenchResults, ConfigMeasure, Metric, BENCH_RESULTS_SCHEMA_ID, BENCH_RESULTS_SCHEMA_VERSION,
};
pub use score::{evaluate, Evaluation, Marks, Objective, MAX_OBJECTIVE_MARK};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::summary::generate_run_id;

/// Bench failures.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("workload directory '{}' does not exist", .0.display())]
    ConfigDirMissing(PathBuf),

    #[error("simulator binary '{}' does not exist", .0.display())]
    ServerMissing(PathBuf),

    #[error("client command is empty")]
    EmptyClientCommand,

    #[error("failed to load references from '{}': {source}", .path.display())]
    Refs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Settings for one bench run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Directory of workload config XML files
    pub config_dir: PathBuf,
    /// Simulator binary launched once per workload
    pub server_bin: PathBuf,
    /// Client command line, split on whitespace
    pub client_command: String,
    /// Port handed to the simulator
    pub port: u16,
    /// Ask the simulator for newline-terminated messages
    pub newline: bool,
    /// Skip workload files named `*.ext.xml`
    pub skip_extra: bool,
    /// Reference results to score against, measurement-only when absent
    pub refs_path: Option<PathBuf>,
    /// Metric the objective mark counts
    pub objective: Objective,
    /// Directory receiving test_results.json
    pub out_dir: PathBuf,
    /// Delay between simulator launch and client launch
    pub settle: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("configs"),
            server_bin: PathBuf::from("./ds-server"),
            client_command: String::new(),
            port: dss_protocol::DEFAULT_PORT,
            newline: false,
            skip_extra: false,
            refs_path: None,
            objective: Objective::default(),
            out_dir: PathBuf::from("results"),
            settle: Duration::from_secs(4),
        }
    }
}

/// What a bench run produced.
#[derive(Debug)]
pub struct BenchOutcome {
    pub results: BenchResults,
    /// Present when references were supplied
    pub evaluation: Option<Evaluation>,
}

/// True for supplementary workloads excluded by `--skip-extra`.
pub fn is_extra_config(name: &str) -> bool {
    name.ends_with(".ext.xml")
}

/// Bench runner.
pub struct Bench {
    config: BenchConfig,
}

impl Bench {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    /// Measure every workload, write the artifact, then score and print.
    pub fn run(&self) -> Result<BenchOutcome, BenchError> {
        self.check_required()?;
        let configs = self.list_configs()?;

        let mut measures = BTreeMap::new();
        let mut digests = BTreeMap::new();
        for config in &configs {
            let name = config_name(config);
            println!("Running client with {}", name);
            digests.insert(name.clone(), file_digest(config)?);
            let measure = self.run_pair(config)?;
            measures.insert(name, measure);
        }

        let results = BenchResults::from_measures(generate_run_id(), &measures, digests);
        results.write_to_file(&self.config.out_dir.join("test_results.json"))?;
        println!();

        let evaluation = match &self.config.refs_path {
            Some(path) => {
                let refs = RefResults::from_file(path).map_err(|source| BenchError::Refs {
                    path: path.clone(),
                    source,
                })?;
                let evaluation = evaluate(&results, &refs, self.config.objective);
                for metric in &evaluation.missing_metrics {
                    eprintln!("Error: no results for {}", metric.label());
                }
                print!("{}", report::render_tables(&evaluation));
                print!("{}", report::render_marks(&evaluation.marks));
                Some(evaluation)
            }
            None => {
                print!("{}", report::render_measurements(&results));
                None
            }
        };

        Ok(BenchOutcome { results, evaluation })
    }

    fn check_required(&self) -> Result<(), BenchError> {
        if !self.config.config_dir.is_dir() {
            return Err(BenchError::ConfigDirMissing(self.config.config_dir.clone()));
        }
        if !self.config.server_bin.exists() {
            return Err(BenchError::ServerMissing(self.config.server_bin.clone()));
        }
        if self.config.client_command.split_whitespace().next().is_none() {
            return Err(BenchError::EmptyClientCommand);
        }
        Ok(())
    }

    /// Workload files, sorted by path.
    fn list_configs(&self) -> Result<Vec<PathBuf>, BenchError> {
        let mut configs = Vec::new();
        for entry in fs::read_dir(&self.config.config_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".xml") {
                continue;
            }
            if self.config.skip_extra && is_extra_config(name) {
                continue;
            }
            configs.push(path);
        }
        configs.sort();
        Ok(configs)
    }

    /// One measurement: launch the simulator, give it time to listen,
    /// launch the client, then collect the simulator's output. Launch
    /// failures leave the workload unmeasured rather than ending the run.
    fn run_pair(&self, config: &Path) -> Result<ConfigMeasure, BenchError> {
        let mut measure = ConfigMeasure::default();

        let mut server_cmd = Command::new(&self.config.server_bin);
        server_cmd
            .arg("-c")
            .arg(config)
            .args(["-v", "brief"])
            .args(["-p", &self.config.port.to_string()]);
        if self.config.newline {
            server_cmd.arg("-n");
        }
        let mut server = match server_cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                eprintln!(
                    "Error: failed to launch {}: {}",
                    self.config.server_bin.display(),
                    e
                );
                return Ok(measure);
            }
        };

        thread::sleep(self.config.settle);

        let tokens: Vec<&str> = self.config.client_command.split_whitespace().collect();
        let Some((program, args)) = tokens.split_first() else {
            let _ = server.kill();
            let _ = server.wait();
            return Err(BenchError::EmptyClientCommand);
        };
        let mut client = match Command::new(program).args(args).spawn() {
            Ok(child) => child,
            Err(e) => {
                eprintln!(
                    "Error: failed to launch client '{}': {}",
                    self.config.client_command, e
                );
                let _ = server.kill();
                let _ = server.wait();
                return Ok(measure);
            }
        };

        let output = server.wait_with_output()?;
        let _ = client.wait();

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eprintln!("Error encountered by ds-server:\n {}", stderr);
            measure.unscheduled_jobs = scrape::scrape_unscheduled(&stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match scrape::scrape_summary(&stdout) {
            Some(summary) => {
                measure.turnaround = Some(summary.turnaround);
                measure.utilisation = Some(summary.utilisation);
                measure.rental_cost = Some(summary.rental_cost);
                measure.scheduled_jobs = Some(summary.jobs);
            }
            None => eprintln!("Error: could not parse server output"),
        }

        Ok(measure)
    }
}

fn config_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// SHA-256 of a workload file, hex encoded.
fn file_digest(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
