use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

use settings_daemon::daemon::DebugHook;
use settings_daemon::{
    BuiltinModules, Config, ConfigOptions, Daemon, ServiceSlot, Settings, SettingsManager,
    SettingsService,
};

/// Settings daemon - loads desktop settings plugins for the session
#[derive(Parser)]
#[command(name = "settings-daemon", version, about)]
struct Cli {
    /// Replace the running settings daemon
    #[arg(long)]
    replace: bool,

    /// Enable debugging code
    #[arg(long, env = "SETTINGS_DAEMON_DEBUG")]
    debug: bool,

    /// Exit after a time (for debugging)
    #[arg(long)]
    timed_exit: bool,

    /// Plugin directory to scan (repeatable; replaces the defaults)
    #[arg(long = "plugin-dir", value_name = "DIR")]
    plugin_dirs: Vec<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Settings namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List discovered plugins with their settings
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn log_filter(verbose: u8, debug: bool) -> EnvFilter {
    let directive = match (verbose, debug) {
        (0, false) => "info,settings_daemon=info",
        (0 | 1, _) => "info,settings_daemon=debug",
        (2, _) => "debug",
        _ => "trace",
    };
    EnvFilter::new(directive)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Reloadable so settings files and SIGHUP can turn on debug output
    let (filter, filter_handle) = reload::Layer::new(log_filter(cli.verbose, cli.debug));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let verbose = cli.verbose;
    let set_debug = Arc::new(move |debug: bool| {
        if let Err(e) = filter_handle.reload(log_filter(verbose, debug)) {
            tracing::warn!(error = %e, "failed to update log filter");
        }
    });

    match run(cli, set_debug).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, set_debug: DebugHook) -> anyhow::Result<ExitCode> {
    let config = Config::load(ConfigOptions {
        plugin_dirs: cli.plugin_dirs,
        settings_path: cli.settings,
        namespace: cli.namespace,
        replace: cli.replace,
        debug: cli.debug,
        timed_exit: cli.timed_exit,
    });
    tracing::debug!(?config, "loaded configuration");

    let settings = Settings::load(config.namespace.clone(), &config.settings_path);
    if settings.debug() && !config.debug {
        set_debug(true);
    }

    let manager = SettingsManager::new(
        Box::new(settings),
        config.plugin_dirs.clone(),
        Box::new(BuiltinModules::new()),
    );

    if let Some(Command::List { json }) = cli.command {
        list(manager, json)?;
        return Ok(ExitCode::SUCCESS);
    }

    tracing::info!(
        replace = config.replace,
        dbus_activated = config.dbus_activated,
        "starting settings daemon"
    );

    let slot = ServiceSlot::new();
    let service = slot.get_or_init(|| SettingsService::new(manager));

    let reason = Daemon::new(config, service)
        .with_debug_hook(set_debug)
        .run()
        .await?;

    tracing::info!(reason = ?reason, "settings daemon exiting");
    Ok(if reason.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Print every plugin that would be registered
fn list(mut manager: SettingsManager, json: bool) -> anyhow::Result<()> {
    manager.discover();
    let plugins = manager.plugins();

    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!("{:<24} {:>8}  {:<8}  NAME", "LOCATION", "PRIORITY", "ENABLED");
    for plugin in plugins {
        println!(
            "{:<24} {:>8}  {:<8}  {}",
            plugin.location,
            plugin.priority,
            if plugin.enabled { "yes" } else { "no" },
            plugin.name.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
