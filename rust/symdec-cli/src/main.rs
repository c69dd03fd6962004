//! Symdec CLI: replay decision-procedure scenarios.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use symdec_cli::{run, Report, Scenario, ScenarioError};
use symdec_dec::{available_backends, DecisionConfig};

fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}
fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

#[derive(Parser)]
#[command(
    name = "symdec",
    version,
    about = "Decision procedures for symbolic execution"
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario through the configured decision chain
    Check {
        /// Path to the scenario .toml file
        #[arg()]
        file: PathBuf,

        /// Configuration file (default: nearest symdec.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the backends usable on this system
    Backends {
        /// Configuration file (default: nearest symdec.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a default symdec.toml
    Init,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("symdec=debug")
    } else {
        EnvFilter::try_from_env("SYMDEC_LOG").unwrap_or_else(|_| EnvFilter::new("symdec=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Check { file, config, json } => cmd_check(&file, config.as_deref(), json),
        Commands::Backends { config } => cmd_backends(config.as_deref()),
        Commands::Init => {
            print!("{}", DecisionConfig::default_template());
            0
        }
    };
    std::process::exit(code);
}

fn load_config(path: Option<&Path>) -> Result<DecisionConfig, String> {
    match path {
        Some(path) => DecisionConfig::load_from(path),
        None => Ok(DecisionConfig::load()),
    }
}

fn cmd_check(file: &Path, config: Option<&Path>, json: bool) -> i32 {
    let config = match load_config(config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", red("error:"), e);
            return 1;
        }
    };
    let report = match Scenario::load(file).and_then(|scenario| run(&scenario, &config)) {
        Ok(report) => report,
        Err(e) => return report_error(&e),
    };
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("{} cannot render report: {}", red("error:"), e);
                return 1;
            }
        }
    } else {
        print_report(&report);
    }
    report.exit_code()
}

fn report_error(err: &ScenarioError) -> i32 {
    eprintln!("{} {}", red("error:"), err);
    err.exit_code()
}

fn print_report(report: &Report) {
    println!(
        "{} {}",
        bold(&report.scenario),
        gray(&format!("(backend: {})", report.backend))
    );
    for q in &report.queries {
        let verdict = match (q.verdict, &q.error) {
            (Some(true), _) => green("sat"),
            (Some(false), _) => yellow("unsat"),
            (None, Some(e)) => red(&format!("error: {}", e)),
            (None, None) => red("error"),
        };
        let note = if q.mismatched() {
            red(&format!(" (expected {})", if q.expected == Some(true) { "sat" } else { "unsat" }))
        } else {
            String::new()
        };
        println!("  {:>3}  {}  {}{}", q.step, q.fact, verdict, note);
    }
    if let Some(ms) = report.elapsed_ms {
        println!("{}", gray(&format!("decision time: {} ms", ms)));
    }
    let mismatches = report.mismatches();
    if mismatches > 0 {
        println!("{} {} expectation(s) failed", red("✗"), mismatches);
    }
}

fn cmd_backends(config: Option<&Path>) -> i32 {
    let config = match load_config(config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", red("error:"), e);
            return 1;
        }
    };
    for backend in available_backends(&config.smtlib) {
        let marker = if backend == config.backend { "*" } else { " " };
        println!("{} {}", marker, backend);
    }
    0
}
