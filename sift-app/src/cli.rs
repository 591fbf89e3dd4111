//! Command-line argument parsing.

use clap::{Args, Parser, Subcommand, ValueEnum};
use sift_config::{LoopMode, PipelineSettings, ResearchStrategy};
use sift_research::Resume;
use std::path::PathBuf;

/// Multi-source web research with cited reports
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(
    about = "Fan a query out to several search backends and write a cited report",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the per-user sift.yaml, then ./sift.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research interactively, asking for approval on stdin
    Run(RunArgs),
    /// Advance a new run to its first suspension and save the snapshot
    Start(StartArgs),
    /// Resume a saved run with a query or an approval decision
    Resume(ResumeArgs),
}

#[derive(Args, Debug)]
pub struct LoopArgs {
    /// Skip the approval gate and write the report after one pass
    #[arg(long)]
    pub direct: bool,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

impl LoopArgs {
    pub fn mode(&self, settings: &PipelineSettings) -> LoopMode {
        if self.direct {
            LoopMode::Direct
        } else {
            settings.mode
        }
    }

    pub fn strategy(&self, settings: &PipelineSettings) -> ResearchStrategy {
        match self.strategy {
            Some(StrategyArg::Deep) => ResearchStrategy::Deep,
            Some(StrategyArg::FanOut) => ResearchStrategy::FanOut,
            None => settings.strategy,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    /// Planned queries plus one round of follow-ups
    Deep,
    /// A single aggregation pass over the query
    FanOut,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Research query; prompted for when omitted
    pub query: Option<String>,

    #[command(flatten)]
    pub loop_args: LoopArgs,

    /// Print the final output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    pub query: Option<String>,

    /// Where to write the run snapshot
    #[arg(long)]
    pub state: PathBuf,

    #[command(flatten)]
    pub loop_args: LoopArgs,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Snapshot written by `start` or a previous `resume`
    #[arg(long)]
    pub state: PathBuf,

    #[command(flatten)]
    pub answer: Answer,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Answer {
    /// Answer a query prompt
    #[arg(long)]
    pub query: Option<String>,

    /// Accept the research and write the report
    #[arg(long)]
    pub approve: bool,

    /// Reject the research and run it again
    #[arg(long)]
    pub reject: bool,
}

impl Answer {
    pub fn to_resume(&self) -> Resume {
        match &self.query {
            Some(query) => Resume::Query {
                query: query.clone(),
            },
            None => Resume::Approval {
                approved: self.approve,
            },
        }
    }
}
