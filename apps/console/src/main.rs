mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{ConsoleAction, HELP};
use conversation_core::{
    scenario::beacon_script,
    timers::{JitterSource, SeededJitter},
    views::select_view,
    ConversationHandle, ConversationRuntime, EngineSettings, ScriptTable, StepEngine,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Beacon AI sourcing assistant in the terminal")]
struct Args {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, default_value = "beacon.toml")]
    config: PathBuf,
    /// Conversation script in TOML; the built-in Beacon scenario when absent.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Multiplier for every delay; 0 replays without pauses.
    #[arg(long)]
    time_scale: Option<f64>,
    #[arg(long)]
    jitter_seed: Option<u64>,
    /// Print events as JSON lines instead of text.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config::LoadedSettings {
        mut settings,
        mut ignored,
    } = config::load_settings(&args.config);
    if let Some(script) = args.script {
        settings.script_path = Some(script);
    }
    if let Some(time_scale) = args.time_scale {
        if !config::set_time_scale(&mut settings, time_scale) {
            ignored.push(format!("--time-scale {time_scale}"));
        }
    }
    if let Some(seed) = args.jitter_seed {
        settings.jitter_seed = Some(seed);
    }
    if let Some(filter) = args.log {
        settings.log_filter = filter;
    }
    settings.json_events |= args.json;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    for setting in &ignored {
        warn!("config: ignoring invalid setting {setting}");
    }

    let script = match &settings.script_path {
        Some(path) => ScriptTable::load(path)
            .with_context(|| format!("failed to load script '{}'", path.display()))?,
        None => beacon_script(),
    };
    let jitter: Box<dyn JitterSource> = match settings.jitter_seed {
        Some(seed) => Box::new(SeededJitter::new(seed)),
        None => Box::new(SeededJitter::from_entropy()),
    };
    info!(
        steps = script.len(),
        time_scale = settings.time_scale,
        "console: starting conversation"
    );

    let engine = StepEngine::new(script, EngineSettings::default(), jitter);
    let suppliers = engine.suppliers().to_vec();
    let runtime = ConversationRuntime::new(engine, settings.time_scale);
    let printer = tokio::spawn(render::print_events(runtime.clone(), settings.json_events));
    runtime
        .start()
        .await
        .context("failed to start the conversation")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let options = runtime.snapshot().await.input.options;
        let action = match commands::parse_line(&line, &options) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match action {
            ConsoleAction::Quit => break,
            ConsoleAction::Help => println!("{HELP}"),
            ConsoleAction::State => {
                let snapshot = runtime.snapshot().await;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            ConsoleAction::View => {
                let view = select_view(&runtime.snapshot().await, &suppliers);
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            ConsoleAction::Engine(command) => {
                // Rejections are printed from the event stream.
                if let Err(rejected) = runtime.dispatch(command).await {
                    debug!(code = ?rejected.code, "console: command rejected");
                }
            }
        }
    }

    printer.abort();
    Ok(())
}
