use std::process::ExitCode;

use anyhow::Context as _;
use beopsuny::cli::{Cli, Command, GatewayCommand, IndexCommand};
use beopsuny::context::AppContext;
use beopsuny::maintenance::{self, UpdateOutcome};
use clap::Parser as _;

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<ExitCode> {
    beopsuny::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let ctx = AppContext::load(&cli.home)?;

    match cli.command {
        Command::Search(args) => {
            beopsuny::search::search(args, &ctx).context("search")?;
        }
        Command::Exact(args) => {
            beopsuny::search::exact(args, &ctx).context("exact")?;
        }
        Command::Cases(args) => {
            beopsuny::search::cases(args, &ctx).context("cases")?;
        }
        Command::Recent(args) => {
            beopsuny::search::recent(args, &ctx).context("recent")?;
        }
        Command::Fetch(args) => {
            beopsuny::fetch::run(args, &ctx).context("fetch")?;
        }
        Command::Parse(args) => {
            beopsuny::render::run(args, &ctx.layout).context("parse")?;
        }
        Command::Index {
            command: IndexCommand::Build(args),
        } => {
            maintenance::index_build(args, &ctx).context("index build")?;
        }
        Command::Index {
            command: IndexCommand::Lookup(args),
        } => {
            maintenance::index_lookup(args, &ctx).context("index lookup")?;
        }
        Command::CheckUpdates(args) => {
            let outcome = maintenance::check_updates(args, &ctx).context("check-updates")?;
            return Ok(match outcome {
                UpdateOutcome::NoAmendments => ExitCode::SUCCESS,
                UpdateOutcome::AmendmentsFound => ExitCode::from(1),
                UpdateOutcome::CheckFailed => ExitCode::from(2),
            });
        }
        Command::ValidateCitations(args) => {
            let invalid =
                maintenance::validate_citations(args, &ctx).context("validate-citations")?;
            if invalid > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Gateway {
            command: GatewayCommand::Status,
        } => {
            maintenance::gateway_status(&ctx);
        }
    }

    Ok(ExitCode::SUCCESS)
}
