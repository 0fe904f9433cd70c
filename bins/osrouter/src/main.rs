//! osrouter - apply declarative routing configuration files.
//!
//! Reads YAML/JSON files describing addresses, routes, rules, DNS servers and
//! an MTU, and reconciles the host to each in turn.

mod apply;
mod example;
mod file;
mod plan;

use clap::{Parser, Subcommand};
use osrouter::registry::{self, RegistryBuilder};

#[derive(Parser)]
#[command(name = "osrouter")]
#[command(about = "Reconcile host routing state with configuration files", long_about = None)]
#[command(version)]
struct Cli {
    /// Log progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the changes between two configuration files
    Plan(plan::PlanArgs),

    /// Apply configuration files in order
    Apply(apply::ApplyArgs),

    /// List available platforms
    Platforms,

    /// Generate example configuration
    Example(example::ExampleArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let mut builder = RegistryBuilder::new();
    osrouter::platform::register_builtin(&mut builder);
    builder.install()?;

    match cli.command {
        Command::Plan(args) => plan::run(args),
        Command::Apply(args) => apply::run(args).await,
        Command::Platforms => {
            for id in registry::global()?.platforms() {
                println!("{id}");
            }
            Ok(())
        }
        Command::Example(args) => example::run(args),
    }
}
