#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use brisk_core::{Mode, PipelineFlags};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "brisk")]
#[command(author, version, about = "Build and serve front-end assets", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Build the project into the output directory
    Build {
        /// Build mode: production or development
        #[arg(long, short = 'm', default_value = "production")]
        mode: Mode,

        /// Write report.json describing every asset
        #[arg(long)]
        analyze: bool,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,

        /// Keep stable output names instead of content hashes
        #[arg(long)]
        no_hash: bool,

        /// Skip precompressed siblings
        #[arg(long)]
        no_compress: bool,

        /// Path to config file (relative to the project root)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Serve the project with rebuild on change and live updates
    Dev {
        /// Port to listen on (defaults to server.port, then 3000)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Host to bind to (defaults to server.host, then localhost)
        #[arg(long)]
        host: Option<String>,

        /// Quiet period before a batch of changes triggers a rebuild
        #[arg(long, default_value = "50", value_name = "MS")]
        debounce_ms: u64,

        /// Path to config file (relative to the project root)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Build {
            mode,
            analyze,
            no_minify,
            no_hash,
            no_compress,
            config,
        } => {
            logging::init(cli.verbose, cli.json);
            let action = commands::build::BuildAction {
                cwd,
                mode,
                flags: PipelineFlags {
                    analyze,
                    minify: !no_minify,
                    hash: !no_hash,
                    compress: !no_compress,
                },
                config,
            };
            commands::build::run(&action, cli.json)
        }
        Commands::Dev {
            port,
            host,
            debounce_ms,
            config,
        } => {
            logging::init(cli.verbose, cli.json);
            let action = commands::dev::DevAction {
                cwd,
                port,
                host,
                debounce: Duration::from_millis(debounce_ms),
                config,
            };
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::dev::run(action))
        }
    }
}
