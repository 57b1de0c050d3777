//! dss CLI
//!
//! Entry point for the `dss` command-line tool.

use clap::{Parser, Subcommand};
use dss_client::bench::{Bench, BenchConfig, Objective};
use dss_client::{
    ClientConfig, ClientError, ClientResult, CompletionReason, FallbackMode, PlacementRule,
    Scheduler, Session, SessionSummary, TcpLineTransport,
};
use dss_protocol::Framing;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dss")]
#[command(about = "Scheduling client and marking bench for ds-sim", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a simulator and schedule jobs until it has no more
    Run {
        /// Path to client config file (default: dss.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Simulator host
        #[arg(long)]
        host: Option<String>,

        /// Simulator port
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Username sent during authentication
        #[arg(long, short = 'u')]
        user: Option<String>,

        /// Placement rule (first-fit, largest-available)
        #[arg(long)]
        policy: Option<String>,

        /// Fallback when the primary query yields nothing (requery, none)
        #[arg(long)]
        fallback: Option<String>,

        /// Line terminator for outbound messages (lf, crlf)
        #[arg(long)]
        framing: Option<String>,

        /// Write a session summary JSON to this path
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Print protocol progress to stderr
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Measure a client over a directory of workload configs and score it
    Bench {
        /// Directory of workload config XML files
        #[arg(long, default_value = "configs")]
        config_dir: PathBuf,

        /// Simulator binary launched once per workload
        #[arg(long, default_value = "./ds-server")]
        server: PathBuf,

        /// Client command launched against each simulator
        #[arg(long)]
        client: String,

        /// Port handed to the simulator
        #[arg(long, short = 'p', default_value_t = dss_protocol::DEFAULT_PORT)]
        port: u16,

        /// Ask the simulator for newline-terminated messages
        #[arg(long, short = 'n')]
        newline: bool,

        /// Skip workload files named *.ext.xml
        #[arg(long)]
        skip_extra: bool,

        /// Reference results JSON to score against
        #[arg(long)]
        refs: Option<PathBuf>,

        /// Metric the objective mark counts (tt, ru, co)
        #[arg(long, default_value = "tt")]
        objective: String,

        /// Directory receiving test_results.json
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,

        /// Seconds the simulator gets to start listening
        #[arg(long, default_value_t = 4)]
        settle: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            host,
            port,
            user,
            policy,
            fallback,
            framing,
            summary,
            verbose,
        } => {
            run_schedule(
                config, host, port, user, policy, fallback, framing, summary, verbose,
            );
        }
        Commands::Bench {
            config_dir,
            server,
            client,
            port,
            newline,
            skip_extra,
            refs,
            objective,
            out_dir,
            settle,
        } => {
            run_bench(
                config_dir, server, client, port, newline, skip_extra, refs, &objective, out_dir,
                settle,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_schedule(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    policy: Option<String>,
    fallback: Option<String>,
    framing: Option<String>,
    summary_path: Option<PathBuf>,
    verbose: bool,
) {
    // Load config
    let mut config = match load_client_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    // CLI overrides
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(user) = user {
        config.user = user;
    }
    if let Some(ref policy) = policy {
        config.policy = parse_or_exit::<PlacementRule>(policy);
    }
    if let Some(ref fallback) = fallback {
        config.fallback = parse_or_exit::<FallbackMode>(fallback);
    }
    if let Some(ref framing) = framing {
        config.framing = parse_or_exit::<Framing>(framing);
    }
    if let Err(e) = config.validate() {
        eprintln!("Error loading config: {}", e);
        process::exit(1);
    }

    if let Err(e) = schedule(&config, summary_path, verbose) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn schedule(
    config: &ClientConfig,
    summary_path: Option<PathBuf>,
    verbose: bool,
) -> ClientResult<()> {
    let transport = TcpLineTransport::connect(
        &config.host,
        config.port,
        config.framing,
        Duration::from_secs(config.connect_timeout_secs),
        config.read_timeout_secs.map(Duration::from_secs),
    )
    .map_err(|source| ClientError::Connect {
        addr: config.addr(),
        source,
    })?;

    let session = Session::new(transport).with_verbose(verbose);
    let mut scheduler =
        Scheduler::new(session, config.policy, config.fallback).with_verbose(verbose);
    let outcome = scheduler.run(&config.user)?;

    let summary = SessionSummary::from_outcome(
        dss_client::summary::generate_run_id(),
        &config.addr(),
        &config.user,
        &config.policy.to_string(),
        &config.fallback.to_string(),
        &config.framing.to_string(),
        &outcome,
    );
    println!("{}", summary.human_summary);

    if outcome.reason == CompletionReason::PeerClosed {
        eprintln!("Warning: simulator closed the stream before signalling NONE");
    }
    if let Some(path) = summary_path {
        summary.write_to_file(&path)?;
        if verbose {
            eprintln!("Wrote session summary to {}", path.display());
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_bench(
    config_dir: PathBuf,
    server: PathBuf,
    client: String,
    port: u16,
    newline: bool,
    skip_extra: bool,
    refs: Option<PathBuf>,
    objective: &str,
    out_dir: PathBuf,
    settle: u64,
) {
    let objective = parse_or_exit::<Objective>(objective);

    let bench = Bench::new(BenchConfig {
        config_dir,
        server_bin: server,
        client_command: client,
        port,
        newline,
        skip_extra,
        refs_path: refs,
        objective,
        out_dir,
        settle: Duration::from_secs(settle),
    });

    if let Err(e) = bench.run() {
        let e = ClientError::from(e);
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn load_client_config(config_path: Option<PathBuf>) -> Result<ClientConfig, String> {
    match config_path {
        Some(path) => ClientConfig::load(&path).map_err(|e| e.to_string()),
        None => {
            let default = PathBuf::from("dss.toml");
            if default.exists() {
                ClientConfig::load(&default).map_err(|e| e.to_string())
            } else {
                Ok(ClientConfig::default())
            }
        }
    }
}

fn parse_or_exit<T: std::str::FromStr<Err = String>>(value: &str) -> T {
    match value.parse::<T>() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
