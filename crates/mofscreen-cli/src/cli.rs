use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mofscreen",
    version,
    about = "Orchestrates multi-step adsorption screening campaigns on a SLURM cluster.",
    long_about = "This tool reads a campaign definition, submits per-batch jobs to SLURM and \
                  tracks their lifecycle across partial failures and resubmissions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        default_value = "./campaign.toml",
        help = "Campaign configuration file"
    )]
    pub config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Submit jobs and poll until every unit reaches a terminal state")]
    Run(RangeArgs),

    #[command(about = "Run a single submission pass without polling")]
    Submit(RangeArgs),

    #[command(about = "Show the tracking table, optionally reconciling it first")]
    Status(StatusArgs),

    #[command(about = "Resubmit failed or partially complete units")]
    Resubmit(RangeArgs),

    #[command(hide = true)]
    RunUnit(RunUnitArgs),
}

#[derive(Args)]
pub struct RangeArgs {
    #[arg(long, help = "Lowest batch id to consider (inclusive)")]
    pub from_batch: Option<u32>,

    #[arg(long, help = "Highest batch id to consider (inclusive)")]
    pub to_batch: Option<u32>,
}

impl RangeArgs {
    pub fn range(&self) -> Option<(u32, u32)> {
        match (self.from_batch, self.to_batch) {
            (None, None) => None,
            (lo, hi) => Some((lo.unwrap_or(0), hi.unwrap_or(u32::MAX))),
        }
    }
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long, help = "Query the scheduler and reconcile before printing")]
    pub update: bool,
}

#[derive(Args)]
pub struct RunUnitArgs {
    #[arg(long, help = "Unit to execute, e.g. batch_3 or batch_3_param_1")]
    pub unit: String,
}
