use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::DashboardError;
use crate::model::{Group, ItemKind, NsGroup};
use crate::shortcuts::ShortcutTable;

const DEFAULT_TERMINAL: &[&str] = &["x-terminal-emulator", "-e"];
const DEFAULT_EXEC_SHELL: &str = "/bin/bash";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub source: Option<String>,
    pub groups: Vec<Group>,
    pub shortcuts: ShortcutTable,
    pub terminal: Vec<String>,
    pub clipboard: Option<Vec<String>>,
    pub exec_shell: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PodscopeConfigFile {
    #[serde(default)]
    groups: Vec<GroupSpec>,
    #[serde(default)]
    clipboard_shortcuts: Option<BTreeMap<String, serde_yaml::Mapping>>,
    #[serde(default)]
    terminal: Option<Vec<String>>,
    #[serde(default)]
    clipboard: Option<Vec<String>>,
    #[serde(default)]
    exec_shell: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupSpec {
    #[serde(default)]
    id: Option<u32>,
    name: String,
    #[serde(default)]
    ns_groups: Vec<NsGroup>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ShortcutSpec {
    #[serde(default)]
    name: String,
    #[serde(default)]
    template: String,
}

impl DashboardConfig {
    pub fn discover() -> Result<Self> {
        match discover_config_path() {
            Some(path) => Self::load(&path),
            None => {
                info!("no config file found, using defaults");
                Self::from_yaml("", None)
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            DashboardError::config(format!("failed to read {}: {error}", path.display()))
        })?;
        let config = Self::from_yaml(&raw, Some(path.display().to_string()))?;
        info!(
            "loaded config {} ({} group(s))",
            path.display(),
            config.groups.len()
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str, source: Option<String>) -> Result<Self> {
        let origin = source.clone().unwrap_or_else(|| "<defaults>".to_string());
        let parsed: PodscopeConfigFile = if raw.trim().is_empty() {
            PodscopeConfigFile::default()
        } else {
            serde_yaml::from_str(raw).map_err(|error| {
                DashboardError::config(format!("failed to parse {origin}: {error}"))
            })?
        };

        let groups = parsed
            .groups
            .into_iter()
            .enumerate()
            .map(|(position, spec)| Group {
                id: spec.id.unwrap_or(position as u32 + 1),
                name: spec.name,
                ns_groups: spec.ns_groups,
            })
            .collect::<Vec<_>>();

        let shortcuts = match parsed.clipboard_shortcuts {
            Some(specs) => shortcut_table(specs)?,
            None => ShortcutTable::defaults()?,
        };

        let terminal = parsed
            .terminal
            .filter(|command| !command.is_empty())
            .unwrap_or_else(|| DEFAULT_TERMINAL.iter().map(|part| part.to_string()).collect());
        let clipboard = parsed.clipboard.filter(|command| !command.is_empty());
        let exec_shell = parsed
            .exec_shell
            .filter(|shell| !shell.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXEC_SHELL.to_string());

        Ok(Self {
            source,
            groups,
            shortcuts,
            terminal,
            clipboard,
            exec_shell,
        })
    }

    /// Matches a profile by name, or by numeric id when the selector is a number.
    pub fn find_group(&self, selector: &str) -> Result<Group> {
        let by_id = selector.trim().parse::<u32>().ok();
        let group = self
            .groups
            .iter()
            .find(|group| group.name == selector)
            .or_else(|| by_id.and_then(|id| self.groups.iter().find(|group| group.id == id)))
            .ok_or_else(|| {
                DashboardError::config(format!(
                    "group '{selector}' not found in {}",
                    self.source.as_deref().unwrap_or("<no config file>")
                ))
            })?;

        if group.target_count() == 0 {
            return Err(
                DashboardError::config(format!("group '{}' has no namespaces", group.name)).into(),
            );
        }

        Ok(group.clone())
    }
}

fn shortcut_table(specs: BTreeMap<String, serde_yaml::Mapping>) -> Result<ShortcutTable> {
    let mut table = ShortcutTable::default();
    for (kind_name, bindings) in specs {
        let kind = ItemKind::from_token(&kind_name).ok_or_else(|| {
            DashboardError::config(format!("unknown clipboard shortcut item type '{kind_name}'"))
        })?;

        for (key, value) in bindings {
            let key = scalar_key(&key).ok_or_else(|| {
                DashboardError::config(format!("invalid shortcut key for {kind}: {key:?}"))
            })?;
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(DashboardError::config(format!(
                    "error in shortcut key value '{key}' for {kind}"
                ))
                .into());
            };

            let spec: ShortcutSpec = serde_yaml::from_value(value).map_err(|error| {
                DashboardError::config(format!("invalid clipboard shortcut '{key}' for {kind}: {error}"))
            })?;
            table.insert(kind, ch, &spec.name, &spec.template)?;
        }
    }

    Ok(table)
}

fn scalar_key(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PODSCOPE_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("podscope.yaml"),
        PathBuf::from("podscope.yml"),
        PathBuf::from(".podscope.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/podscope/config.yaml"),
            PathBuf::from(&home).join(".config/podscope/config.yml"),
            PathBuf::from(&home).join(".podscope.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
