//! Apply command - reconcile the host to configuration files in order.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use osrouter::platform::dry_run;
use osrouter::{Reconciler, ReconcilerOptions, registry};

use crate::file;

#[derive(Args)]
pub struct ApplyArgs {
    /// Configuration files, applied one after another
    #[arg(required = true)]
    pub configs: Vec<PathBuf>,

    /// Platform to apply with
    #[arg(short, long, default_value = default_platform())]
    pub platform: String,

    /// Give up on a file after this many seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Log the changes instead of making them
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

fn default_platform() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else {
        dry_run::PLATFORM_ID
    }
}

pub async fn run(args: ApplyArgs) -> anyhow::Result<()> {
    let platform = if args.dry_run {
        dry_run::PLATFORM_ID
    } else {
        args.platform.as_str()
    };
    let applier = registry::global()?.create(platform)?;

    let mut options = ReconcilerOptions::new();
    if let Some(secs) = args.timeout {
        options = options.timeout(Duration::from_secs(secs));
    }
    let reconciler = Reconciler::with_options(applier, options);

    // Load everything up front so a typo in a later file fails early
    let configs = args
        .configs
        .iter()
        .map(|path| Ok((path, file::load(path)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    for (path, config) in configs {
        let plan = reconciler.plan(&config);
        println!("{}:", path.display());
        println!("{}", plan.summary());

        reconciler
            .set_desired(config)
            .await
            .with_context(|| format!("failed to apply {}", path.display()))?;
        println!("Applied {} change(s) with {}", plan.len(), reconciler.platform());
    }
    Ok(())
}
