use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use hemingway_guard::replay::{run_scenario, ReplayReport, Scenario};
use hemingway_guard::settings::SettingsStore;
use hemingway_guard::utils::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "hemingway-guard",
    version,
    about = "Hold the send key until the message reads well"
)]
struct Cli {
    #[arg(long, global = true, help = "Settings file (JSON)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a scripted scenario through the coordinator.
    Replay { scenario: PathBuf },
    /// List the apps whose text fields are monitored.
    Targets,
    /// Turn interception on and save it to the settings file.
    Enable,
    /// Turn interception off and save it to the settings file.
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let store = SettingsStore::load(cli.config.as_deref())?;
    let settings = store.current();

    match cli.command {
        Commands::Replay { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let report = run_scenario(&scenario, &settings).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Targets => {
            let catalog = settings.catalog();
            if cli.json {
                let targets: Vec<_> = catalog.iter().collect();
                println!("{}", serde_json::to_string_pretty(&targets)?);
            } else {
                for app in catalog.iter() {
                    println!(
                        "{:<12} {:<32} {}",
                        app.name,
                        app.bundle_id,
                        app.text_field_roles.join(", ")
                    );
                }
            }
        }
        Commands::Enable => toggle(&store, cli.config.is_some(), true, cli.json)?,
        Commands::Disable => toggle(&store, cli.config.is_some(), false, cli.json)?,
    }

    Ok(())
}

fn toggle(store: &SettingsStore, has_file: bool, enabled: bool, json: bool) -> Result<()> {
    if !has_file {
        bail!("--config is required to save the enabled flag");
    }
    store.set_enabled(enabled)?;
    if json {
        println!("{}", serde_json::json!({ "enabled": enabled }));
    } else {
        println!("interception {}", if enabled { "enabled" } else { "disabled" });
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    for step in &report.steps {
        let held = match step.swallowed {
            Some(true) => " (held)",
            Some(false) => " (passed)",
            None => "",
        };
        println!(
            "{:>6}ms  {:<40} {:?}{held}",
            step.at_ms, step.action, step.status.state
        );
    }

    let decision = report
        .last_decision()
        .map(|decision| decision.label())
        .unwrap_or("none");
    let counters = &report.final_status.counters;
    println!();
    println!("last decision: {decision}");
    println!(
        "delivered keys: {}",
        report
            .delivered
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    for (focus, text) in &report.writes {
        println!("wrote into #{}: {text}", focus.0);
    }
    println!(
        "validations: {}  flagged: {}  failed: {}  released: {}  replaced: {}  dropped: {}",
        counters.validations,
        counters.flagged,
        counters.failed,
        counters.released,
        counters.replaced,
        counters.dropped
    );
}
