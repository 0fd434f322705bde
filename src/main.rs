mod client;
mod commands;
mod config;
mod context;
mod converters;
mod emitter;
mod error;
mod hcl;
mod model;
mod output;
mod registry;
mod sanitizer;
mod scanner;
mod traits;

use anyhow::Result;
use clap::Parser;
use commands::ExportCommand;
use config::{CliValues, ExportConfig};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "octoterra")]
#[command(about = "Export an Octopus Deploy space as Terraform configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// URL of the Octopus server
    #[arg(long, env = "OCTOPUS_CLI_SERVER")]
    url: Option<String>,

    /// API key used to read the space
    #[arg(long, env = "OCTOPUS_CLI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// ID of the space to export
    #[arg(long, env = "OCTOPUS_SPACE_ID")]
    space: Option<String>,

    /// Directory to write the configuration to
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Print the configuration instead of writing files
    #[arg(long)]
    console: bool,

    /// Export only this project and its dependencies (can be repeated)
    #[arg(long = "project", value_name = "PROJECT_ID")]
    projects: Vec<String>,

    /// Fail when a reference points to a resource outside the export
    #[arg(long)]
    strict_references: bool,

    /// YAML file with default values for the options above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "octoterra=debug" } else { "octoterra=warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context::new();
    let values = CliValues {
        url: cli.url,
        api_key: cli.api_key,
        space: cli.space,
        dest: cli.dest,
        console: cli.console,
        projects: cli.projects,
        strict_references: cli.strict_references,
    };
    let config = ExportConfig::resolve(ctx.fs.as_ref(), values, cli.config.as_deref())?;

    ExportCommand::execute(&ctx, &config)
}
