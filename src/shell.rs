use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionKind {
    Exec,
    Logs,
    FollowLogs,
}

impl SessionKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Logs => "logs",
            Self::FollowLogs => "follow logs",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionTarget {
    pub context: String,
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
}

pub fn session_command(kind: SessionKind, target: &SessionTarget, exec_shell: &str) -> String {
    let mut parts = vec![
        "kubectl".to_string(),
        "--context".to_string(),
        target.context.clone(),
        "-n".to_string(),
        target.namespace.clone(),
    ];
    match kind {
        SessionKind::Exec => parts.extend(["exec".to_string(), "-it".to_string()]),
        SessionKind::Logs | SessionKind::FollowLogs => parts.push("logs".to_string()),
    }
    parts.push(target.pod.clone());
    if let Some(container) = target.container.as_ref() {
        parts.extend(["-c".to_string(), container.clone()]);
    }
    match kind {
        SessionKind::Exec => parts.extend(["--".to_string(), exec_shell.to_string()]),
        SessionKind::FollowLogs => parts.push("-f".to_string()),
        SessionKind::Logs => {}
    }

    parts.join(" ")
}

/// Starts one detached terminal per command via `<launcher...> sh -c <command>`.
/// Stops at the first spawn failure and reports how many sessions were opened.
pub fn open_sessions(launcher: &[String], commands: &[String]) -> Result<usize> {
    let Some((program, launcher_args)) = launcher.split_first() else {
        anyhow::bail!("no terminal launcher configured");
    };

    for (opened, command) in commands.iter().enumerate() {
        let mut child = TokioCommand::new(program)
            .args(launcher_args)
            .arg("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!("failed to launch {program} after opening {opened} session(s)")
            })?;
        debug!("session started: {command}");

        let command = command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!("session exited with {status}: {command}");
                }
                Ok(_) => {}
                Err(error) => warn!("session wait failed for {command}: {error}"),
            }
        });
    }

    Ok(commands.len())
}

const CLIPBOARD_CANDIDATES: &[&[&str]] = &[
    &["pbcopy"],
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
];

/// Pipes `value` into the configured clipboard command. Without one, writes through
/// the system clipboard and falls back to the first well-known command found.
pub async fn copy_to_clipboard(configured: Option<&[String]>, value: &str) -> Result<()> {
    if let Some(command) = configured {
        return pipe_into(command, value)
            .await?
            .context("configured clipboard command was not found");
    }

    let text = value.to_string();
    let native = tokio::task::spawn_blocking(move || {
        arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text))
    })
    .await
    .context("clipboard task failed")?;
    let native_error = match native {
        Ok(()) => return Ok(()),
        Err(error) => error,
    };
    debug!("system clipboard unavailable ({native_error}), trying clipboard commands");

    for candidate in CLIPBOARD_CANDIDATES {
        let command = candidate
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>();
        if pipe_into(&command, value).await?.is_some() {
            return Ok(());
        }
    }

    anyhow::bail!("clipboard error: {native_error} (no pbcopy, wl-copy, xclip or xsel either)")
}

/// `Ok(None)` when the program does not exist.
async fn pipe_into(command: &[String], value: &str) -> Result<Option<()>> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("empty clipboard command");
    };

    let spawned = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to start {program}"));
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(value.as_bytes())
            .await
            .with_context(|| format!("failed to write to {program}"))?;
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to wait for {program}"))?;
    if status.success() {
        Ok(Some(()))
    } else {
        Err(anyhow::anyhow!("{program} exited with {status}"))
    }
}
