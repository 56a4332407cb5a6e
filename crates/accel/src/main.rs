mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use tracing_subscriber::EnvFilter;

use cli::Settings;

/// Accel: discover and install native acceleration descriptors
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Engine configuration file (.json, .toml, .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory archive with extra type metadata (e.g. the host's own types)
    #[arg(long, global = true)]
    types: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the acceleration descriptors of an archive
    Scan {
        archive: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy one native binary out of an archive and print its path
    Extract {
        archive: PathBuf,
        /// Logical binary name, expanded with the configured folder/prefix/extension
        binary: String,
    },
    /// Install every descriptor of an archive, report, then tear down
    Install {
        archive: PathBuf,
        /// Abort on the first descriptor failure
        #[arg(long)]
        strict: bool,
        /// Advice panics fall back to the original method
        #[arg(long)]
        dev_mode: bool,
        /// Load native libraries on first call instead of while installing
        #[arg(long)]
        lazy: bool,
    },
}

fn init_logging() {
    // Route `log` records from accel-core into tracing
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let filter = EnvFilter::try_from_env("ACCEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging();

    let mut settings = Settings {
        config: args.config,
        types: args.types,
        ..Settings::default()
    };

    // The engine is synchronous; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || match args.command {
        Commands::Scan { archive, json } => cli::scan(&archive, &settings, json),
        Commands::Extract { archive, binary } => cli::extract(&archive, &binary, &settings),
        Commands::Install {
            archive,
            strict,
            dev_mode,
            lazy,
        } => {
            settings.strict = strict;
            settings.dev_mode = dev_mode;
            settings.lazy = lazy;
            cli::install(&archive, &settings)
        }
    })
    .await;

    match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: command task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
