//! Command-line surface for the Jupiter engine.
//!
//! # Responsibility
//! - Bootstrap config, logging and the store for one invocation.
//! - Dispatch `init`, `gen`, `gc` and `stats` to core services.
//! - Print one summary line per command; details go to the log file.

use clap::{Parser, Subcommand};
use jiff::civil::Date;
use jupiter_core::model::logs::GenFilters;
use jupiter_core::schedule::parse_timezone;
use jupiter_core::{
    init_from_config, CoreConfig, DomainContext, EntityId, EventSource, GcService, GenRequest,
    GenService, InitWorkspaceRequest, NoOpProgressReporter, StatsService, Store, SyncTarget,
    TimeProvider, WorkspaceService,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "jupiter", version, about = "GTD recurring-work engine")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file; overrides `db-path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Workspace ref id; defaults to the only live workspace.
    #[arg(long, global = true)]
    workspace: Option<EntityId>,
    /// Run as if the local date were this day (YYYY-MM-DD).
    #[arg(long, global = true)]
    today: Option<Date>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a user and a workspace with default settings.
    Init {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long = "workspace-name", default_value = "Work")]
        workspace_name: String,
    },
    /// Materialize recurring inbox tasks.
    Gen {
        /// Comma-separated targets; every enabled generator target when absent.
        #[arg(long, value_delimiter = ',', value_parser = parse_target)]
        target: Vec<SyncTarget>,
        /// Resync instances of templates that were not recently modified.
        #[arg(long)]
        all: bool,
    },
    /// Archive finished work.
    Gc {
        #[arg(long, value_delimiter = ',', value_parser = parse_target)]
        target: Vec<SyncTarget>,
    },
    /// Count entities per target.
    Stats {
        #[arg(long, value_delimiter = ',', value_parser = parse_target)]
        target: Vec<SyncTarget>,
    },
}

fn parse_target(value: &str) -> Result<SyncTarget, String> {
    SyncTarget::parse(value).ok_or_else(|| format!("unknown target `{value}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    init_from_config(&config)?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.db_path.clone())
        .ok_or("no database given; pass --db or set `db-path` in the config")?;
    let mut store = Store::open(&db_path)?;

    if let Command::Init {
        email,
        name,
        timezone,
        workspace_name,
    } = &cli.command
    {
        let time = TimeProvider::system(parse_timezone(timezone)?);
        let ctx = DomainContext::from_time(EventSource::Cli, &time);
        let request = InitWorkspaceRequest::new(email, name, timezone, workspace_name);
        let result = WorkspaceService::new(&mut store).init(&ctx, &request)?;
        println!(
            "init ok user_ref_id={} workspace_ref_id={}",
            result.user.ref_id, result.workspace.ref_id
        );
        return Ok(());
    }

    let workspace = {
        let mut service = WorkspaceService::new(&mut store);
        match cli.workspace {
            Some(ref_id) => service.load(ref_id)?,
            None => {
                let mut live = service.list()?;
                if live.len() != 1 {
                    return Err(format!(
                        "found {} live workspaces; pass --workspace",
                        live.len()
                    )
                    .into());
                }
                live.remove(0)
            }
        }
    };
    let timezone = parse_timezone(&workspace.data.timezone)?;
    let time = match cli.today {
        Some(date) => TimeProvider::at_date(date, timezone),
        None => TimeProvider::system(timezone),
    };
    let today = time.today();
    let reporter = NoOpProgressReporter;

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Gen { target, all } => {
            let ctx = DomainContext::from_time(EventSource::Cli, &time);
            let request = GenRequest {
                today,
                targets: or_default(target, &workspace.data.available_targets(&SyncTarget::GEN)),
                filters: GenFilters::new(),
                gen_even_if_not_modified: all,
            };
            let entry = GenService::new(&mut store, &config).generate(
                &ctx,
                workspace.ref_id,
                &request,
                &reporter,
            )?;
            println!(
                "gen ok today={} created={} updated={}",
                today,
                entry.data.entity_created_records.len(),
                entry.data.entity_updated_records.len()
            );
            Ok(())
        }
        Command::Gc { target } => {
            let ctx = DomainContext::from_time(EventSource::Cli, &time);
            let entry = GcService::new(&mut store, &config).run(
                &ctx,
                workspace.ref_id,
                today,
                &or_default(target, &workspace.data.available_targets(&SyncTarget::GC)),
                &reporter,
            )?;
            println!(
                "gc ok today={} archived={}",
                today,
                entry.data.entity_records.len()
            );
            Ok(())
        }
        Command::Stats { target } => {
            let ctx = DomainContext::from_time(EventSource::Cli, &time);
            let entry = StatsService::new(&mut store).run(
                &ctx,
                workspace.ref_id,
                today,
                &or_default(target, &workspace.data.available_targets(&SyncTarget::ALL)),
            )?;
            for stats in &entry.data.stats {
                println!(
                    "stats target={} live={} completed={} archived={}",
                    stats.target, stats.live, stats.completed, stats.archived
                );
            }
            Ok(())
        }
    }
}

fn or_default(targets: Vec<SyncTarget>, defaults: &[SyncTarget]) -> Vec<SyncTarget> {
    if targets.is_empty() {
        defaults.to_vec()
    } else {
        targets
    }
}
