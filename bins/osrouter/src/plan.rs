//! Plan command - show the changes between two configuration files.

use std::path::PathBuf;

use clap::Args;
use osrouter::Plan;

use crate::file;

#[derive(Args)]
pub struct PlanArgs {
    /// Configuration currently applied
    pub from: PathBuf,

    /// Configuration to move to
    pub to: PathBuf,

    /// Print mutations as JSON
    #[arg(short, long)]
    pub json: bool,
}

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let from = file::load(&args.from)?;
    let to = file::load(&args.to)?;
    let plan = Plan::between(&from, &to);

    if args.json {
        println!("{}", serde_json::to_string_pretty(plan.mutations())?);
    } else {
        println!("{}", plan.summary());
    }
    Ok(())
}
