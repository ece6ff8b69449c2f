mod acquisition;
mod app;
mod cli;
mod config;
mod error;
mod input;
mod k8s;
mod model;
mod runtime;
mod shell;
mod shortcuts;
mod targets;
mod tree;
mod ui;

use anyhow::{Context, Result};
use app::Dashboard;
use clap::Parser;
use cli::CliArgs;
use config::DashboardConfig;
use crossterm::event::{
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use error::DashboardError;
use k8s::KubeGateway;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use runtime::{ExitReason, RuntimeSettings, TuiTerminal};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use targets::TargetSpec;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let config = DashboardConfig::discover()?;
    let spec = target_spec(&args, &config)?;
    let gateway = Arc::new(KubeGateway::connect(&spec.contexts()).await?);
    let group = targets::resolve(spec, gateway.as_ref()).await?;
    info!(
        "watching group '{}' with {} target(s)",
        group.name,
        group.target_count()
    );

    if args.print_group {
        let rendered =
            serde_json::to_string_pretty(&group).context("failed to serialize group")?;
        println!("{rendered}");
        return Ok(());
    }

    let settings = RuntimeSettings {
        refresh_interval: Duration::from_secs(args.refresh_secs.max(1)),
        terminal_launcher: config.terminal.clone(),
        clipboard: config.clipboard.clone(),
    };
    let dashboard = Dashboard::new(group, config.shortcuts, config.exec_shell);

    match run(dashboard, gateway, settings).await? {
        ExitReason::TotalFailure(messages) => Err(DashboardError::TotalFetch { messages }.into()),
        ExitReason::Quit | ExitReason::InputClosed => Ok(()),
    }
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();
    let _ = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::sink).try_init(),
    };

    Ok(())
}

fn target_spec(args: &CliArgs, config: &DashboardConfig) -> Result<TargetSpec> {
    if let Some(selector) = args.group.as_deref() {
        return Ok(TargetSpec::Profile(config.find_group(selector)?));
    }

    let namespace = args
        .namespace
        .clone()
        .filter(|namespace| !namespace.trim().is_empty())
        .ok_or_else(|| DashboardError::config("either --namespace or --group is required"))?;
    let context = match args.context.clone() {
        Some(context) => context,
        None => KubeGateway::current_context()
            .map_err(|error| DashboardError::config(format!("{error:#}")))?,
    };

    Ok(TargetSpec::Namespace { context, namespace })
}

async fn run(
    dashboard: Dashboard,
    gateway: Arc<KubeGateway>,
    settings: RuntimeSettings,
) -> Result<ExitReason> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = runtime::run(&mut terminal, dashboard, gateway, settings).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(reason), Ok(())) => Ok(reason),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}
