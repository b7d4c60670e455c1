//! Testbox CLI - run JavaScript unit tests in a throwaway V8 isolate
//!
//! Usage:
//!   testbox run --source <file> --tests <file>   - Run tests, print the report
//!   testbox matchers                             - List supported matchers
//!   testbox shim                                 - Print the generated shim

mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use testbox_core::{shim, Matcher, RunnerConfig, TestRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "testbox")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Isolated JavaScript unit-test runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test file against a source file
    Run {
        /// JavaScript under test
        #[arg(long)]
        source: PathBuf,

        /// Test file using describe/it/test/expect
        #[arg(long)]
        tests: PathBuf,

        /// Heap ceiling in MiB
        #[arg(long)]
        memory_mb: Option<usize>,

        /// Wall-clock budget in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Config file (defaults to ~/.testbox/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the supported matchers
    Matchers,

    /// Print the generated shim source
    Shim,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            tests,
            memory_mb,
            timeout_ms,
            json,
            config,
        } => {
            let runner_config = match &config {
                Some(path) => config::load_from(path)?,
                None => config::load()?,
            };
            let runner_config = apply_overrides(runner_config, memory_mb, timeout_ms)?;

            let source_code = std::fs::read_to_string(&source)
                .with_context(|| format!("Failed to read {}", source.display()))?;
            let test_source = std::fs::read_to_string(&tests)
                .with_context(|| format!("Failed to read {}", tests.display()))?;

            let runner = TestRunner::new(&runner_config);
            let outcome = runner
                .run_async(runner_config.request(source_code, test_source))
                .await;

            if json {
                println!("{}", output::render_json(&outcome)?);
            } else {
                print!("{}", output::render_text(&outcome));
            }
            Ok(ExitCode::from(output::exit_code(&outcome)))
        }

        Commands::Matchers => {
            for matcher in Matcher::ALL {
                println!("{:<36} {}", matcher.signature(), matcher.description());
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Shim => {
            print!("{}", shim::source());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Layer command-line flags over the loaded config
fn apply_overrides(
    mut runner_config: RunnerConfig,
    memory_mb: Option<usize>,
    timeout_ms: Option<u64>,
) -> anyhow::Result<RunnerConfig> {
    if let Some(mb) = memory_mb {
        runner_config.memory_limit_bytes = mb
            .checked_mul(1024 * 1024)
            .context("--memory-mb is too large")?;
    }
    if let Some(ms) = timeout_ms {
        runner_config.timeout_ms = ms;
    }
    runner_config.validate()?;
    Ok(runner_config)
}
