use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tracing::{debug, info, warn};

use crate::acquisition::{CycleVerdict, classify, fetch_pod_lists};
use crate::app::{AppCommand, Dashboard};
use crate::error::compact_error;
use crate::input::{KeyDebouncer, map_key};
use crate::k8s::ClusterClient;
use crate::model::Group;
use crate::shell::{copy_to_clipboard, open_sessions};
use crate::ui;

pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const FETCHING_STATUS: &str = "Updating namespace info...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    InputClosed,
    TotalFailure(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub refresh_interval: Duration,
    pub terminal_launcher: Vec<String>,
    pub clipboard: Option<Vec<String>>,
}

/// Runs the refresh and input loops and renders on this task until one of them
/// reports an exit reason.
pub async fn run<C: ClusterClient>(
    terminal: &mut TuiTerminal,
    dashboard: Dashboard,
    client: Arc<C>,
    settings: RuntimeSettings,
) -> Result<ExitReason> {
    let group = dashboard.group().clone();
    let dashboard = Arc::new(Mutex::new(dashboard));
    let (status_tx, mut status_rx) = watch::channel(String::new());
    let redraw = Arc::new(Notify::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (exit_tx, mut exit_rx) = mpsc::channel::<ExitReason>(4);

    let refresh_task = tokio::spawn(refresh_loop(
        Arc::clone(&dashboard),
        client,
        group,
        settings.refresh_interval,
        status_tx.clone(),
        Arc::clone(&redraw),
        exit_tx.clone(),
        shutdown_rx.clone(),
    ));
    let input_task = tokio::spawn(input_loop(
        Arc::clone(&dashboard),
        settings,
        status_tx,
        Arc::clone(&redraw),
        exit_tx,
        shutdown_rx,
    ));

    let outcome = render_until_exit(terminal, &dashboard, &mut status_rx, &redraw, &mut exit_rx).await;

    let _ = shutdown_tx.send(true);
    refresh_task.abort();
    if let Err(error) = input_task.await {
        warn!("input loop ended abnormally: {error}");
    }

    outcome
}

/// Redraws on every status change or redraw request until an exit reason arrives.
async fn render_until_exit(
    terminal: &mut TuiTerminal,
    dashboard: &Mutex<Dashboard>,
    status_rx: &mut watch::Receiver<String>,
    redraw: &Notify,
    exit_rx: &mut mpsc::Receiver<ExitReason>,
) -> Result<ExitReason> {
    let mut status = String::new();
    loop {
        draw(terminal, dashboard, &status).await?;
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return Ok(ExitReason::InputClosed);
                }
                status = status_rx.borrow_and_update().clone();
            }
            _ = redraw.notified() => {}
            reason = exit_rx.recv() => {
                return Ok(reason.unwrap_or(ExitReason::InputClosed));
            }
        }
    }
}

async fn draw(terminal: &mut TuiTerminal, dashboard: &Mutex<Dashboard>, status: &str) -> Result<()> {
    let mut dashboard = dashboard.lock().await;
    terminal
        .draw(|frame| ui::render(frame, &mut dashboard, status))
        .context("failed to render terminal frame")?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn refresh_loop<C: ClusterClient>(
    dashboard: Arc<Mutex<Dashboard>>,
    client: Arc<C>,
    group: Group,
    interval: Duration,
    status_tx: watch::Sender<String>,
    redraw: Arc<Notify>,
    exit_tx: mpsc::Sender<ExitReason>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let _ = status_tx.send(FETCHING_STATUS.to_string());
        let started = Instant::now();
        let results = fetch_pod_lists(Arc::clone(&client), &group).await;
        let elapsed = started.elapsed();

        match classify(&results) {
            CycleVerdict::TotalFailure(messages) => {
                warn!("all {} target(s) failed, shutting down", messages.len());
                let _ = exit_tx.send(ExitReason::TotalFailure(messages)).await;
                return;
            }
            CycleVerdict::Usable { failed } => {
                info!(
                    "refreshed {} target(s) in {elapsed:?} ({failed} failed)",
                    results.len()
                );
                dashboard.lock().await.merge(results, elapsed);
                redraw.notify_one();
                let _ = status_tx.send(String::new());
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => return,
        }
    }
}

async fn input_loop(
    dashboard: Arc<Mutex<Dashboard>>,
    settings: RuntimeSettings,
    status_tx: watch::Sender<String>,
    redraw: Arc<Notify>,
    exit_tx: mpsc::Sender<ExitReason>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut reader = EventStream::new();
    let mut debouncer = KeyDebouncer::default();

    loop {
        let event = tokio::select! {
            event = reader.next() => event,
            _ = shutdown_rx.changed() => return,
        };

        match event {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                let command = {
                    let mut dashboard = dashboard.lock().await;
                    dispatch_key(&mut dashboard, &mut debouncer, key, Instant::now())
                };
                let Some(command) = command else {
                    continue;
                };
                redraw.notify_one();
                if execute_command(command, &settings, &status_tx).await {
                    let _ = exit_tx.send(ExitReason::Quit).await;
                    return;
                }
            }
            Some(Ok(Event::Resize(_, height))) => {
                apply_resize(&mut *dashboard.lock().await, height);
                redraw.notify_one();
            }
            Some(Ok(_)) => {}
            Some(Err(error)) => {
                let _ = status_tx.send(format!("Error: terminal event error: {error}"));
            }
            None => {
                let _ = exit_tx.send(ExitReason::InputClosed).await;
                return;
            }
        }
    }
}

/// Debounces and maps one key press, then applies it. `None` when the key is dropped
/// or unbound.
fn dispatch_key(
    dashboard: &mut Dashboard,
    debouncer: &mut KeyDebouncer,
    key: KeyEvent,
    now: Instant,
) -> Option<AppCommand> {
    if !debouncer.accept(key, now) {
        return None;
    }
    let action = map_key(key)?;
    debug!("action={action:?}");
    Some(dashboard.apply_action(action))
}

fn apply_resize(dashboard: &mut Dashboard, height: u16) {
    dashboard.resize(ui::tree_rows_for_height(height));
}

/// Carries out a dashboard command. Returns true when the dashboard should exit.
async fn execute_command(
    command: AppCommand,
    settings: &RuntimeSettings,
    status_tx: &watch::Sender<String>,
) -> bool {
    let status = match command {
        AppCommand::None => return false,
        AppCommand::Quit => return true,
        AppCommand::Notify(message) => message,
        AppCommand::CopyToClipboard(value) => {
            match copy_to_clipboard(settings.clipboard.as_deref(), &value).await {
                Ok(()) => format!("Clipboard: {value}"),
                Err(error) => {
                    warn!("clipboard copy failed: {error:#}");
                    format!("Error: {}", compact_error(&error))
                }
            }
        }
        AppCommand::OpenSessions { kind, commands } => {
            match open_sessions(&settings.terminal_launcher, &commands) {
                Ok(opened) => format!("Opened {opened} {} session(s)", kind.title()),
                Err(error) => {
                    warn!("session launch failed: {error:#}");
                    format!("Error: {}", compact_error(&error))
                }
            }
        }
    };

    let _ = status_tx.send(status);
    false
}

#[cfg(test)]
mod tests {
    use super::{
        ExitReason, RuntimeSettings, apply_resize, dispatch_key, execute_command, refresh_loop,
    };
    use crate::app::{AppCommand, Dashboard};
    use crate::input::KeyDebouncer;
    use crate::k8s::FakeCluster;
    use crate::model::{Group, PodListResult, PodRecord};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::time::Instant;
    use crate::shortcuts::ShortcutTable;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, Notify, mpsc, watch};

    fn settings(clipboard: Option<Vec<String>>) -> RuntimeSettings {
        RuntimeSettings {
            refresh_interval: Duration::from_secs(60),
            terminal_launcher: vec!["podscope-no-such-terminal".to_string()],
            clipboard,
        }
    }

    fn shared(group: &Group) -> Arc<Mutex<Dashboard>> {
        Arc::new(Mutex::new(Dashboard::new(
            group.clone(),
            ShortcutTable::defaults().expect("defaults parse"),
            "/bin/bash",
        )))
    }

    #[tokio::test]
    async fn total_failure_signals_exit_with_every_message() {
        let group = Group::single("g", "dev", vec!["a".to_string(), "b".to_string()]);
        let cluster = FakeCluster::default()
            .with_error("dev", "a", "Unauthorized")
            .with_error("dev", "b", "Unauthorized");
        let (status_tx, _status_rx) = watch::channel(String::new());
        let (exit_tx, mut exit_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(refresh_loop(
            shared(&group),
            Arc::new(cluster),
            group,
            Duration::from_secs(60),
            status_tx,
            Arc::new(Notify::new()),
            exit_tx,
            shutdown_rx,
        ));

        let reason = exit_rx.recv().await.expect("exit reason");
        let ExitReason::TotalFailure(messages) = reason else {
            panic!("expected total failure, got {reason:?}");
        };
        assert_eq!(messages.len(), 2);
        task.await.expect("refresh loop returns after total failure");
    }

    #[tokio::test]
    async fn partial_failure_merges_and_keeps_running() {
        let group = Group::single("g", "dev", vec!["ns-a".to_string(), "ns-b".to_string()]);
        let cluster = FakeCluster::default()
            .with_pods("dev", "ns-a", &["web-1", "web-2"])
            .with_error("dev", "ns-b", "Unauthorized");
        let dashboard = shared(&group);
        let redraw = Arc::new(Notify::new());
        let (status_tx, status_rx) = watch::channel(String::new());
        let (exit_tx, mut exit_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(refresh_loop(
            Arc::clone(&dashboard),
            Arc::new(cluster),
            group,
            Duration::from_secs(60),
            status_tx,
            Arc::clone(&redraw),
            exit_tx,
            shutdown_rx,
        ));

        redraw.notified().await;
        {
            let dashboard = dashboard.lock().await;
            assert_eq!(dashboard.tree().len(), 5);
            assert_eq!(dashboard.tree().failed_namespaces(), 1);
        }
        assert!(exit_rx.try_recv().is_err());

        shutdown_tx.send(true).expect("loop is listening");
        task.await.expect("refresh loop stops on shutdown");
        assert!(status_rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn commands_publish_status_text() {
        let (status_tx, status_rx) = watch::channel(String::new());

        assert!(execute_command(AppCommand::Quit, &settings(None), &status_tx).await);
        assert!(
            !execute_command(
                AppCommand::Notify("hint".to_string()),
                &settings(None),
                &status_tx
            )
            .await
        );
        assert_eq!(status_rx.borrow().as_str(), "hint");

        execute_command(
            AppCommand::OpenSessions {
                kind: crate::shell::SessionKind::Logs,
                commands: vec!["true".to_string()],
            },
            &settings(None),
            &status_tx,
        )
        .await;
        assert!(status_rx.borrow().starts_with("Error: "));
    }

    #[tokio::test]
    async fn clipboard_success_reports_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clip");
        let clipboard = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cat > '{}'", path.display()),
        ];
        let (status_tx, status_rx) = watch::channel(String::new());

        execute_command(
            AppCommand::CopyToClipboard("kubectl get all".to_string()),
            &settings(Some(clipboard)),
            &status_tx,
        )
        .await;
        assert_eq!(status_rx.borrow().as_str(), "Clipboard: kubectl get all");
    }

    fn loaded_dashboard(pod_count: usize) -> Dashboard {
        let group = Group::single("dev/shop", "dev", vec!["shop".to_string()]);
        let mut dashboard = Dashboard::new(
            group,
            ShortcutTable::defaults().expect("defaults parse"),
            "/bin/bash",
        );
        let pods = (0..pod_count)
            .map(|index| PodRecord {
                name: format!("worker-{index}"),
                ready: 1,
                total: 1,
                status: "Running".to_string(),
                ..PodRecord::default()
            })
            .collect();
        dashboard.merge(
            vec![PodListResult {
                context: "dev".to_string(),
                namespace: "shop".to_string(),
                outcome: Ok(pods),
            }],
            Duration::from_millis(10),
        );
        dashboard
    }

    #[test]
    fn key_presses_are_debounced_before_dispatch() {
        let mut dashboard = loaded_dashboard(3);
        let mut debouncer = KeyDebouncer::default();
        let start = Instant::now();
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);

        assert_eq!(
            dispatch_key(&mut dashboard, &mut debouncer, down, start),
            Some(AppCommand::None)
        );
        assert_eq!(
            dispatch_key(
                &mut dashboard,
                &mut debouncer,
                down,
                start + Duration::from_millis(2)
            ),
            None
        );
        assert_eq!(dashboard.tree().cursor(), Some(1));

        dispatch_key(
            &mut dashboard,
            &mut debouncer,
            down,
            start + Duration::from_millis(8),
        );
        assert_eq!(dashboard.tree().cursor(), Some(2));

        let unbound = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(
            dispatch_key(
                &mut dashboard,
                &mut debouncer,
                unbound,
                start + Duration::from_millis(20)
            ),
            None
        );
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(
            dispatch_key(
                &mut dashboard,
                &mut debouncer,
                quit,
                start + Duration::from_millis(30)
            ),
            Some(AppCommand::Quit)
        );
    }

    #[test]
    fn resize_sets_page_size_for_navigation() {
        let mut dashboard = loaded_dashboard(20);
        apply_resize(&mut dashboard, 14);
        assert_eq!(dashboard.tree().viewport_height(), 6);

        let mut debouncer = KeyDebouncer::default();
        let page_down = KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE);
        dispatch_key(&mut dashboard, &mut debouncer, page_down, Instant::now());
        assert_eq!(dashboard.tree().cursor(), Some(6));
    }
}
