use std::{env, fs, io::ErrorKind, sync::Arc};

use clap::Parser;
use cli::{
    ArtifactAction, Args, Commands, ContentAction, JobAction, PublisherAction, RemoteAction,
    RepoAction,
};
use logging::setup_logging;
use progress::{spawn_event_handler, EventGuard};
use tracing::{info, warn};
use wharf_config::config::{
    self, config_path, generate_default_config, get_config, set_config_path, Config,
};
use wharf_core::{
    error::{ErrorContext, WharfError},
    WharfResult,
};
use wharf_events::{ChannelSink, EventSinkHandle, NullSink};
use wharf_operations::WharfContext;
use wharf_utils::path::resolve_path;

use crate::utils::{COLOR, JSON};

mod cli;
mod content;
mod jobs;
mod ledger;
mod logging;
mod progress;
mod utils;

/// Builds the operation context. Events are reported on a background thread unless the
/// output is quiet or machine readable.
pub fn create_context(report_events: bool) -> (WharfContext, Option<EventGuard>) {
    let config = get_config();

    if report_events {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        let ctx = WharfContext::new(config, events);
        let guard = spawn_event_handler(receiver);
        (ctx, Some(guard))
    } else {
        let events: EventSinkHandle = Arc::new(NullSink);
        (WharfContext::new(config, events), None)
    }
}

fn print_config() -> WharfResult<()> {
    let path = config_path();
    let content = match fs::read_to_string(&path) {
        Ok(v) => v,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("Config file {} not found", path.display());
            Config::default_config().to_annotated_document()?.to_string()
        }
        Err(err) => {
            return Err(WharfError::IoError {
                action: "reading config".to_string(),
                source: err,
            });
        }
    };
    info!("{}", content);
    Ok(())
}

fn print_env() -> WharfResult<()> {
    let config = get_config();

    info!("WHARF_CONFIG={}", config_path().display());
    info!("WHARF_DB={}", config.get_db_path()?.display());
    info!("WHARF_ARTIFACTS={}", config.get_artifacts_path()?.display());
    info!("WHARF_WORKSPACE={}", config.get_workspace_path()?.display());
    info!("WHARF_WORKERS={}", config.get_workers());
    Ok(())
}

async fn run_command(ctx: &WharfContext, command: Commands) -> WharfResult<()> {
    match command {
        Commands::Artifact {
            action,
        } => {
            match action {
                ArtifactAction::Import {
                    path,
                } => content::import_artifact(ctx, &path).await?,
                ArtifactAction::List => content::list_artifacts(ctx)?,
            }
        }
        Commands::Content {
            action,
        } => {
            match action {
                ContentAction::Create {
                    artifact,
                    filename,
                } => content::create_content(ctx, artifact, filename).await?,
                ContentAction::List {
                    filter,
                    repository_version,
                    limit,
                    offset,
                } => content::list_content(ctx, filter, repository_version, limit, offset)?,
                ContentAction::Show {
                    id,
                } => content::show_content(ctx, id)?,
            }
        }
        Commands::Repo {
            action,
        } => {
            match action {
                RepoAction::Create {
                    name,
                } => ledger::create_repository(ctx, &name)?,
                RepoAction::List => ledger::list_repositories(ctx)?,
                RepoAction::Versions {
                    name,
                } => ledger::list_versions(ctx, &name)?,
                RepoAction::Add {
                    name,
                    content,
                } => ledger::add_content(ctx, &name, &content)?,
            }
        }
        Commands::Remote {
            action,
        } => {
            match action {
                RemoteAction::Create {
                    name,
                    url,
                } => ledger::create_remote(ctx, &name, &url)?,
                RemoteAction::Update {
                    name,
                    url,
                } => ledger::update_remote(ctx, &name, &url)?,
                RemoteAction::List {
                    filter,
                } => ledger::list_remotes(ctx, filter)?,
            }
        }
        Commands::Publisher {
            action,
        } => {
            match action {
                PublisherAction::Create {
                    name,
                } => ledger::create_publisher(ctx, &name)?,
                PublisherAction::List => ledger::list_publishers(ctx)?,
                PublisherAction::Publications {
                    name,
                } => ledger::list_publications(ctx, name.as_deref())?,
            }
        }
        Commands::Sync {
            repository,
            remote,
            mirror,
        } => jobs::sync(ctx, repository, remote, mirror)?,
        Commands::Publish(args) => jobs::publish(ctx, args)?,
        Commands::Job {
            action,
        } => {
            match action {
                JobAction::Status {
                    id,
                } => jobs::job_status(ctx, id)?,
                JobAction::List {
                    state,
                    limit,
                } => jobs::list_jobs(ctx, state, limit)?,
                JobAction::Cancel {
                    id,
                } => jobs::cancel_job(ctx, id)?,
                JobAction::Recover => jobs::recover_jobs(ctx)?,
            }
        }
        Commands::Worker {
            drain,
            workers,
        } => jobs::run_workers(ctx, drain, workers).await?,
        Commands::DefConfig | Commands::Config | Commands::Env => unreachable!(),
    }

    Ok(())
}

async fn handle_cli() -> WharfResult<()> {
    let args = Args::parse_from(env::args());

    setup_logging(&args);

    if args.no_color {
        let mut color = COLOR.write().map_err(|_| WharfError::PoisonError)?;
        *color = false;
    }

    if args.json {
        let mut json = JSON.write().map_err(|_| WharfError::PoisonError)?;
        *json = true;
    }

    if let Some(ref c) = args.config {
        let path = resolve_path(c)?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        set_config_path(path);
    }

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
        }
        command => {
            config::init()?;

            match command {
                Commands::Config => print_config()?,
                Commands::Env => print_env()?,
                command => {
                    let (ctx, guard) = create_context(!args.quiet && !args.json);
                    let result = run_command(&ctx, command).await;

                    drop(ctx);
                    if let Some(guard) = guard {
                        guard.finish();
                    }
                    result?;
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
