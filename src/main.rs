mod assets;
mod cli;
mod config;
mod dispatch;
mod download;
mod error;
mod extract;
mod github;
mod homebrew;
mod install;
mod manager;
mod package;
mod paths;
mod platform;
mod repo_url;
mod system;
mod types;

#[cfg(test)]
mod tests;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use config::{load_app_store, save_app_store};
use console::Style;
use dispatch::{Dispatcher, Job, LiveBackend, Message};
use error::InstallError;
use github::GitHubClient;
use manager::{add_app, clean_failed, record_outcome, remove_app, update_available, AddResult};
use platform::HostEnv;
use system::check_installed;
use types::{AppStore, InstallMethod, InstallOutcome, InstallStatus, TrackedApp};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    match cli.command {
        Commands::Version => {
            println!("autonomix {}", cli::get_version());
        }

        Commands::List { format } => {
            let store = load_app_store()?;
            list_apps(&store, format)?;
        }

        Commands::Add { url, method } => {
            let env = HostEnv::detect();
            let mut store = load_app_store()?;
            let method = method.method().unwrap_or(store.settings.default_method);
            handle_add(&env, &mut store, &url, method).await?;
        }

        Commands::Update { name, method } => {
            let env = HostEnv::detect();
            let mut store = load_app_store()?;
            let method = method.unwrap_or(store.settings.default_method);
            handle_update(&env, &mut store, &name, method).await?;
        }

        Commands::Check => {
            let env = HostEnv::detect();
            let mut store = load_app_store()?;
            check_for_updates(&env, &mut store).await?;
        }

        Commands::Remove { name } => {
            let env = HostEnv::detect();
            let mut store = load_app_store()?;
            remove_app(&mut store, &name)?;
            save_app_store(&mut store, &env)?;
            println!("✓ Removed {}", name);
        }

        Commands::Clean => {
            let env = HostEnv::detect();
            let mut store = load_app_store()?;
            let removed = clean_failed(&mut store);
            if removed.is_empty() {
                println!("No failed installations to clean");
                return Ok(());
            }
            for name in &removed {
                println!("Removing failed: {}", name);
            }
            save_app_store(&mut store, &env)?;
            println!("✓ Cleaned {} failed installation(s)", removed.len());
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

async fn handle_add(
    env: &HostEnv,
    store: &mut AppStore,
    url: &str,
    method: InstallMethod,
) -> Result<()> {
    let client = GitHubClient::new(&store.settings.github_api_url)?;

    println!("Adding {}...", url);
    let result = add_app(store, &client, |name| check_installed(env, name), url).await?;
    if let AddResult::AlreadyTracked(existing) = &result {
        return Err(InstallError::AlreadyTracked(format!(
            "{} (as '{}')",
            existing.repo_url, existing.name
        ))
        .into());
    }
    let app = result.app().clone();

    println!("✓ Tracked {} (Latest: {})", app.name, app.latest_version);
    if !app.installed_version.is_empty() {
        println!("  Already installed: {}", app.installed_version);
        if let Some(tracked) = store.find_mut(&app.name) {
            tracked.install_status = Some(InstallStatus::Installed);
        }
        save_app_store(store, env)?;
        return Ok(());
    }
    save_app_store(store, env)?;

    println!("Installing...");
    let outcome = install_through_dispatcher(env, store, &app.name, method).await;
    save_app_store(store, env)?;
    report_outcome(&outcome?)
}

async fn handle_update(
    env: &HostEnv,
    store: &mut AppStore,
    name: &str,
    method: InstallMethod,
) -> Result<()> {
    if store.find(name).is_none() {
        return Err(anyhow!("{} not found", name));
    }

    println!("Updating {}...", name);
    let outcome = install_through_dispatcher(env, store, name, method).await;
    save_app_store(store, env)?;
    report_outcome(&outcome?)
}

/// Runs one install job in the background and writes its outcome into the
/// store. The store is not saved here.
async fn install_through_dispatcher(
    env: &HostEnv,
    store: &mut AppStore,
    name: &str,
    method: InstallMethod,
) -> Result<InstallOutcome> {
    let repo_url = store
        .find(name)
        .map(|a| a.repo_url.clone())
        .ok_or_else(|| anyhow!("{} not found", name))?;

    let backend = LiveBackend::new(env.clone(), &store.settings.github_api_url)?;
    let mut dispatcher = Dispatcher::new(backend);
    dispatcher.dispatch(Job::Install {
        app: name.to_string(),
        repo_url,
        method,
    })?;

    match dispatcher.next().await {
        Some(Message::InstallFinished { result, .. }) => {
            let report = result.with_context(|| format!("Failed to fetch release for {}", name))?;
            if let Some(app) = store.find_mut(name) {
                app.latest_version = report.release.tag_name.clone();
                app.last_checked = Utc::now().to_rfc3339();
            }
            record_outcome(store, name, &report.outcome)?;
            Ok(report.outcome)
        }
        _ => Err(anyhow!("Install of {} did not report back", name)),
    }
}

fn report_outcome(outcome: &InstallOutcome) -> Result<()> {
    if !outcome.succeeded {
        return Err(anyhow!("Error installing: {}", outcome.message));
    }

    println!("✓ Installed {} via {}", outcome.version, outcome.method);
    for line in outcome.message.lines() {
        println!("  {}", line);
    }
    if let Some(path) = &outcome.path {
        println!("  Path: {}", path.display());
    }
    Ok(())
}

async fn check_for_updates(env: &HostEnv, store: &mut AppStore) -> Result<()> {
    if store.apps.is_empty() {
        println!("No apps tracked");
        return Ok(());
    }

    let backend = LiveBackend::new(env.clone(), &store.settings.github_api_url)?;
    let mut dispatcher = Dispatcher::new(backend);
    for app in &store.apps {
        dispatcher.dispatch(Job::CheckUpdate {
            app: app.name.clone(),
            repo_url: app.repo_url.clone(),
        })?;
    }

    tracing::debug!("{} update check(s) in flight", dispatcher.in_flight());
    let mut failures = 0;
    while let Some(message) = dispatcher.next().await {
        let Message::UpdateChecked { app, result, .. } = message else {
            continue;
        };
        match result {
            Ok(release) => {
                if let Some(tracked) = store.find_mut(&app) {
                    tracked.latest_version = release.tag_name.clone();
                    tracked.last_checked = Utc::now().to_rfc3339();
                    if update_available(tracked) {
                        println!(
                            "{}: {} -> {}",
                            app, tracked.installed_version, tracked.latest_version
                        );
                    }
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!("Could not check {}: {}", app, e.user_message());
            }
        }
    }

    save_app_store(store, env)?;
    let updates = store.apps.iter().filter(|a| update_available(a)).count();
    println!(
        "✓ Checked {} app(s): {} update(s) available",
        store.apps.len() - failures,
        updates
    );
    if failures > 0 {
        return Err(anyhow!("{} update check(s) failed", failures));
    }
    Ok(())
}

fn list_apps(store: &AppStore, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&store.apps)?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(&store.apps)?);
            return Ok(());
        }
        OutputFormat::Plain => {}
    }

    if store.apps.is_empty() {
        println!("No apps tracked");
        return Ok(());
    }

    let header = Style::new().bold();
    println!(
        "{}",
        header.apply_to(format!(
            "{:<20} {:<14} {:<14} {:<10} STATUS",
            "NAME", "VERSION", "LATEST", "METHOD"
        ))
    );
    for app in &store.apps {
        let method = app
            .install_method
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<14} {:<14} {:<10} {}",
            app.name,
            or_dash(&app.installed_version),
            or_dash(&app.latest_version),
            method,
            status_label(app)
        );
    }
    Ok(())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn status_label(app: &TrackedApp) -> String {
    match app.install_status {
        Some(InstallStatus::Failed) => Style::new()
            .red()
            .apply_to(format!(
                "✗ {}",
                app.install_error.as_deref().unwrap_or("failed")
            ))
            .to_string(),
        _ if update_available(app) => Style::new()
            .yellow()
            .apply_to("Update available")
            .to_string(),
        Some(InstallStatus::Installed) => Style::new().green().apply_to("✓ Installed").to_string(),
        None => "-".to_string(),
    }
}
