//! Command dispatch

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::services::SyncEvent;
use crate::application::{ApplicationError, BoxError};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::IcdEntity;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::EntityStore;
use crate::infrastructure::{InfraError, SqliteEntityStore};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Sync => sync(&container(cli)?),
        Commands::Test => test_connection(&container(cli)?),
        Commands::Show { who_id } => show(&load_settings(cli)?, *who_id),
        Commands::Config { command } => config_command(cli, command),
        Commands::Completion { shell } => {
            completion(*shell);
            Ok(())
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    Ok(Settings::load(cli.config.as_deref())?)
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    Ok(ServiceContainer::new(load_settings(cli)?)?)
}

fn label(title: &Option<String>, who_id: u64) -> String {
    match title {
        Some(t) => t.clone(),
        None => format!("<untitled {}>", who_id),
    }
}

#[instrument(skip(container))]
fn sync(container: &ServiceContainer) -> CliResult<()> {
    let store = container.open_store()?;
    let mut crawler = container.crawler(store.clone())?;

    output::info("Requesting access token...");
    let report = crawler.sync(|event| match event {
        SyncEvent::Saved {
            who_id,
            title,
            created,
        } => {
            let verb = if *created { "Saved" } else { "Updated" };
            output::saved(verb, &label(title, *who_id));
        }
        SyncEvent::FetchFailed { path, reason }
        | SyncEvent::AuthFailed { path, reason }
        | SyncEvent::ParseFailed { path, reason } => output::skipped(path, reason),
        SyncEvent::Revisited { path } => output::warning(&format!("cycle at {}", path)),
        _ => {}
    })?;

    output::header("Summary");
    output::counter("visited", report.visited, false);
    output::counter("leaves", report.leaves, false);
    output::counter("inserted", report.inserted, false);
    output::counter("updated", report.updated, false);
    output::counter("unchanged", report.unchanged, false);
    output::counter("fetch errors", report.fetch_failures, true);
    output::counter("auth skips", report.auth_failures, true);
    output::counter("parse errors", report.parse_failures, true);
    if report.revisits > 0 {
        output::counter("revisits", report.revisits, false);
    }

    let stored = store.count().map_err(|e| ApplicationError::Store {
        context: "count stored entities".into(),
        source: e,
    })?;
    output::success(&format!(
        "ICD disease sync completed ({} diseases stored)",
        stored
    ));
    Ok(())
}

#[instrument(skip(container))]
fn test_connection(container: &ServiceContainer) -> CliResult<()> {
    let mut tokens = container.token_manager()?;
    let client = container.entity_client();

    let root = match client.probe_root(&mut tokens) {
        Ok(root) => root,
        Err(e) => {
            if let ApplicationError::Fetch { body, .. } = &e {
                output::success("Access token retrieved.");
                output::header("Response body:");
                output::info(body);
            }
            return Err(e.into());
        }
    };
    output::success("Access token retrieved.");
    output::field("Root Entity", root.title.as_deref().unwrap_or("No Title"));
    output::header("Child Entities:");
    for child in &root.children {
        output::detail(&format!("- {}", child));
    }
    Ok(())
}

fn print_entity(entity: &IcdEntity) {
    output::header(&label(&entity.title, entity.who_id));
    output::field("who_id", &entity.who_id);
    let parent = entity
        .parent_who_id
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".into());
    output::field("parent", &parent);
    output::field("code", entity.code.as_deref().unwrap_or("-"));
    if let Some(definition) = &entity.definition {
        output::field("definition", definition);
    }
    let release = match (&entity.release_id, entity.release_date) {
        (Some(id), Some(date)) => format!("{} ({})", id, date),
        (Some(id), None) => id.clone(),
        (None, Some(date)) => date.to_string(),
        (None, None) => "-".into(),
    };
    output::field("release", &release);
    output::field("created_at", &entity.created_at.to_rfc3339());
    output::field("updated_at", &entity.updated_at.to_rfc3339());
}

#[instrument(skip(settings))]
fn show(settings: &Settings, who_id: u64) -> CliResult<()> {
    let store = SqliteEntityStore::open(&settings.database_path)?;
    let lookup = |e: BoxError| ApplicationError::Store {
        context: format!("query who_id {}", who_id),
        source: e,
    };

    let entity = store
        .find(who_id)
        .map_err(lookup)?
        .ok_or(CliError::NotFound(who_id))?;
    print_entity(&entity);

    if let Some(parent_id) = entity.parent_who_id {
        if let Some(parent) = store.find(parent_id).map_err(lookup)? {
            output::field("stored parent", &label(&parent.title, parent.who_id));
        }
    }
    let children = store.children_of(who_id).map_err(lookup)?;
    if !children.is_empty() {
        output::header("Stored children:");
        for child in &children {
            output::detail(&format!("{} {}", child.who_id, label(&child.title, child.who_id)));
        }
    }
    Ok(())
}

fn config_command(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_display_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => {
                    let state = if path.exists() { "exists" } else { "not found" };
                    output::field("global", &format!("{} ({})", path.display(), state));
                }
                None => output::warning("cannot determine global config directory"),
            }
            if let Some(path) = &cli.config {
                output::field("explicit", &path.display());
            }
            Ok(())
        }
        ConfigCommands::Init => {
            let path = global_config_path().ok_or_else(|| {
                CliError::Usage("cannot determine global config directory".into())
            })?;
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            debug!("wrote config template to {}", path.display());
            output::success(&format!("Created {}", path.display()));
            Ok(())
        }
    }
}

fn completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
