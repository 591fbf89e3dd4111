mod cli;
mod session;
mod wiring;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use sift_common::observability::init_logging;
use sift_config::{SiftConfig, SiftConfigLoader, default_config_path};
use sift_research::{Advance, LoopState, ResearchLoop};
use sift_runtime::SiftRuntime;
use std::path::Path;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    let log_path = init_logging(cfg.logging.to_log_config("sift"))?;
    tracing::info!(log = %log_path.display(), "app.start");

    let runtime = SiftRuntime::build("sift", None)?;
    let handle = runtime.handle();
    let cancel = handle.cancellation();
    let result = runtime.block_on(async {
        let _ctrl_c = handle.cancel_on_ctrl_c();
        dispatch(cli.command, &cfg, &cancel).await
    });
    runtime.shutdown(Duration::from_millis(500));
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "app.failed");
    }
    result
}

/// Env overrides always win; the file is the explicit one or the optional defaults.
fn load_config(explicit: Option<&Path>) -> Result<SiftConfig> {
    let loader = match explicit {
        Some(path) => SiftConfigLoader::new().with_file(path),
        None => {
            let mut loader = SiftConfigLoader::new();
            if let Some(user) = default_config_path() {
                loader = loader.with_optional_file(user);
            }
            loader.with_optional_file("sift.yaml")
        }
    };
    loader.load().context("failed to load configuration")
}

async fn dispatch(command: Command, cfg: &SiftConfig, cancel: &CancellationToken) -> Result<()> {
    let services = wiring::build_services(cfg).await?;
    let settings = &cfg.pipeline;

    match command {
        Command::Run(args) => {
            let mut run = ResearchLoop::start(
                services,
                args.loop_args.mode(settings),
                args.loop_args.strategy(settings),
                args.query.as_deref(),
            );
            let mut stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            let output =
                session::drive_interactive(&mut run, &mut stdin, &mut stdout, cancel).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                session::render_report(&mut stdout, &output)?;
            }
        }
        Command::Start(args) => {
            let mut run = ResearchLoop::start(
                services,
                args.loop_args.mode(settings),
                args.loop_args.strategy(settings),
                args.query.as_deref(),
            );
            let advanced = session::step_and_save(&mut run, None, cancel, &args.state).await?;
            print_advance(&advanced)?;
        }
        Command::Resume(args) => {
            let snapshot = session::load_snapshot(&args.state)?;
            // A run cancelled mid-research has nothing to answer yet; pick it up where it stopped.
            let resume = match snapshot.state {
                LoopState::Researching { .. } => None,
                _ => Some(args.answer.to_resume()),
            };
            let mut run = ResearchLoop::from_snapshot(services, snapshot);
            let advanced =
                session::step_and_save(&mut run, resume, cancel, &args.state).await?;
            print_advance(&advanced)?;
        }
    }
    Ok(())
}

fn print_advance(advanced: &Advance) -> Result<()> {
    let json = match advanced {
        Advance::Suspended(suspension) => serde_json::to_string_pretty(suspension)?,
        Advance::Completed(output) => serde_json::to_string_pretty(output)?,
    };
    println!("{json}");
    Ok(())
}
