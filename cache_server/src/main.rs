use std::path::PathBuf;
use std::process::ExitCode;

use cache_server::config::{read_config, CacheConfig};
use cache_server::server;
use clap::Parser;
use common::log::tracing_factory::{OutputType, TracingFactory, TracingFactoryOptions};
use db_adapter::MockAdapter;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "cache-server")]
#[command(version = "0.0.1")]
#[command(author = "rust-us")]
#[command(about = "In-memory read-through table cache with a binary socket protocol")]
struct CliArgs {
    /// Path to a TOML configuration file. Falls back to built-in defaults
    /// (no tables, TCP only on 127.0.0.1:7878) when omitted.
    #[arg(short, long, help = "Path to TOML configuration file", value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "enable debug logging", default_value_t = false)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => match read_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config {path:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => CacheConfig::default(),
    };

    let log_opts = TracingFactoryOptions::new(args.debug, OutputType::Stdout, None);
    TracingFactory::init_log_with_options(log_opts);

    // The non-goals explicitly exclude real database driver adapters; the
    // in-memory mock lets the binary run standalone for demos and tests.
    let adapter = Box::new(MockAdapter::new());

    match server::run(config, adapter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server exited with error");
            ExitCode::FAILURE
        }
    }
}
