use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::debug;

use crate::input::Action;
use crate::model::{Group, ItemKind, PodListResult};
use crate::shell::{SessionKind, SessionTarget, session_command};
use crate::shortcuts::ShortcutTable;
use crate::tree::{PodTree, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Quit,
    CopyToClipboard(String),
    OpenSessions {
        kind: SessionKind,
        commands: Vec<String>,
    },
    Notify(String),
}

/// Everything the renderer and both loops share: the tree, its chrome and key bindings.
#[derive(Debug)]
pub struct Dashboard {
    group: Group,
    tree: PodTree,
    shortcuts: ShortcutTable,
    exec_shell: String,
    show_help: bool,
    last_refresh: Option<DateTime<Local>>,
    last_elapsed: Option<Duration>,
}

impl Dashboard {
    pub fn new(group: Group, shortcuts: ShortcutTable, exec_shell: impl Into<String>) -> Self {
        let tree = PodTree::new(&group);
        Self {
            group,
            tree,
            shortcuts,
            exec_shell: exec_shell.into(),
            show_help: false,
            last_refresh: None,
            last_elapsed: None,
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn tree(&self) -> &PodTree {
        &self.tree
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn last_elapsed(&self) -> Option<Duration> {
        self.last_elapsed
    }

    pub fn merge(&mut self, results: Vec<PodListResult>, elapsed: Duration) {
        self.tree.merge(results);
        self.last_refresh = Some(Local::now());
        self.last_elapsed = Some(elapsed);
    }

    pub fn resize(&mut self, tree_rows: usize) {
        self.tree.set_viewport_height(tree_rows);
    }

    pub fn summary(&self) -> String {
        format!(
            "Namespaces: {}  Pods: {}  Failed: {}",
            self.tree.namespaces().len(),
            self.tree.pod_total(),
            self.tree.failed_namespaces()
        )
    }

    pub fn selected_kind(&self) -> Option<ItemKind> {
        self.tree.selected_row().map(|row| row.kind())
    }

    pub fn footer_lines(&self) -> [String; 2] {
        match self.selected_kind() {
            Some(kind) => self.shortcuts.display_lines(kind),
            None => [String::new(), String::new()],
        }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if self.show_help && !matches!(action, Action::ToggleHelp | Action::Quit) {
            self.show_help = false;
            if action == Action::Escape {
                return AppCommand::None;
            }
        }

        match action {
            Action::Quit | Action::Escape => return AppCommand::Quit,
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Down => self.tree.move_by(1),
            Action::Up => self.tree.move_by(-1),
            Action::PageDown => self.tree.page_down(),
            Action::PageUp => self.tree.page_up(),
            Action::Top => self.tree.home(),
            Action::Bottom => self.tree.end(),
            Action::Collapse => self.tree.collapse_selected(),
            Action::Expand => self.tree.expand_selected(),
            Action::Toggle => self.tree.toggle_selected(),
            Action::CollapseAll => self.tree.set_all_expanded(false),
            Action::ExpandAll => self.tree.set_all_expanded(true),
            Action::ExecSession => return self.session_command(SessionKind::Exec),
            Action::LogsSession => return self.session_command(SessionKind::Logs),
            Action::FollowLogsSession => return self.session_command(SessionKind::FollowLogs),
            Action::Shortcut(key) => return self.shortcut_command(key),
        }

        AppCommand::None
    }

    fn shortcut_command(&self, key: char) -> AppCommand {
        let Some(row) = self.tree.selected_row() else {
            return AppCommand::None;
        };
        let kind = row.kind();
        match self.shortcuts.render(kind, key, &row.identity()) {
            None => AppCommand::None,
            Some(Ok(rendered)) => {
                debug!("shortcut {key} on {kind} rendered: {rendered}");
                AppCommand::CopyToClipboard(rendered)
            }
            Some(Err(error)) => AppCommand::Notify(format!("Error: {error}")),
        }
    }

    fn session_command(&self, kind: SessionKind) -> AppCommand {
        let Some(row) = self.tree.selected_row() else {
            return AppCommand::None;
        };
        let targets = session_targets(&row);
        if targets.is_empty() {
            return AppCommand::Notify(format!(
                "Select a pod group, pod or container to open {} sessions",
                kind.title()
            ));
        }

        let commands = targets
            .iter()
            .map(|target| session_command(kind, target, &self.exec_shell))
            .collect();
        AppCommand::OpenSessions { kind, commands }
    }
}

/// Pods a session action fans out to for the selected row.
fn session_targets(row: &Row<'_>) -> Vec<SessionTarget> {
    let namespace = row.namespace();
    let target = |pod: &str, container: Option<&str>| SessionTarget {
        context: namespace.context.clone(),
        namespace: namespace.name.clone(),
        pod: pod.to_string(),
        container: container.map(str::to_string),
    };

    match row {
        Row::Namespace(_) => Vec::new(),
        Row::PodGroup { group, .. } => group
            .pods
            .iter()
            .map(|pod| target(&pod.name, None))
            .collect(),
        Row::Pod { pod, .. } => vec![target(&pod.name, None)],
        Row::Container {
            group, container, ..
        } => group
            .pods
            .iter()
            .map(|pod| target(&pod.name, Some(&container.name)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, Dashboard};
    use crate::input::Action;
    use crate::model::{ContainerRecord, Group, ItemKind, PodListResult, PodRecord};
    use crate::shell::SessionKind;
    use crate::shortcuts::ShortcutTable;
    use std::time::Duration;

    fn pod(name: &str) -> PodRecord {
        PodRecord {
            name: name.to_string(),
            ready: 1,
            total: 1,
            status: "Running".to_string(),
            restarts: 0,
            age: "1h".to_string(),
            containers: vec![ContainerRecord {
                name: "app".to_string(),
                status: "Running".to_string(),
                ready: true,
                restarts: 0,
            }],
        }
    }

    fn dashboard() -> Dashboard {
        let group = Group::single("shop", "dev", vec!["shop".to_string()]);
        let mut dashboard = Dashboard::new(
            group,
            ShortcutTable::defaults().expect("defaults parse"),
            "/bin/bash",
        );
        dashboard.merge(
            vec![PodListResult {
                context: "dev".to_string(),
                namespace: "shop".to_string(),
                outcome: Ok(vec![pod("web-1"), pod("web-2")]),
            }],
            Duration::from_millis(120),
        );
        dashboard
    }

    #[test]
    fn shortcut_on_pod_copies_rendered_command() {
        let mut dashboard = dashboard();
        dashboard.apply_action(Action::Down);
        dashboard.apply_action(Action::Down);
        assert_eq!(dashboard.selected_kind(), Some(ItemKind::Pod));

        assert_eq!(
            dashboard.apply_action(Action::Shortcut('1')),
            AppCommand::CopyToClipboard("kubectl --context dev -n shop logs web-1".to_string())
        );
        assert_eq!(dashboard.apply_action(Action::Shortcut('9')), AppCommand::None);
    }

    #[test]
    fn shortcut_missing_field_reports_error() {
        let mut shortcuts = ShortcutTable::default();
        shortcuts
            .insert(ItemKind::Namespace, 'x', "bad", "logs {{.Pod}}")
            .expect("template parses");
        let mut dashboard = Dashboard::new(
            Group::single("shop", "dev", vec!["shop".to_string()]),
            shortcuts,
            "/bin/bash",
        );
        dashboard.merge(
            vec![PodListResult {
                context: "dev".to_string(),
                namespace: "shop".to_string(),
                outcome: Ok(Vec::new()),
            }],
            Duration::ZERO,
        );

        let AppCommand::Notify(message) = dashboard.apply_action(Action::Shortcut('x')) else {
            panic!("expected a status message");
        };
        assert!(message.starts_with("Error: "));
    }

    #[test]
    fn group_session_fans_out_to_every_pod() {
        let mut dashboard = dashboard();
        dashboard.apply_action(Action::Down);
        assert_eq!(
            dashboard.apply_action(Action::ExecSession),
            AppCommand::OpenSessions {
                kind: SessionKind::Exec,
                commands: vec![
                    "kubectl --context dev -n shop exec -it web-1 -- /bin/bash".to_string(),
                    "kubectl --context dev -n shop exec -it web-2 -- /bin/bash".to_string(),
                ],
            }
        );
    }

    #[test]
    fn container_session_targets_sibling_pods() {
        let mut dashboard = dashboard();
        dashboard.apply_action(Action::Down);
        dashboard.apply_action(Action::Down);
        dashboard.apply_action(Action::Down);
        assert_eq!(dashboard.selected_kind(), Some(ItemKind::Container));

        assert_eq!(
            dashboard.apply_action(Action::FollowLogsSession),
            AppCommand::OpenSessions {
                kind: SessionKind::FollowLogs,
                commands: vec![
                    "kubectl --context dev -n shop logs web-1 -c app -f".to_string(),
                    "kubectl --context dev -n shop logs web-2 -c app -f".to_string(),
                ],
            }
        );
    }

    #[test]
    fn namespace_session_only_hints() {
        let mut dashboard = dashboard();
        assert!(matches!(
            dashboard.apply_action(Action::LogsSession),
            AppCommand::Notify(_)
        ));
    }

    #[test]
    fn escape_closes_help_before_quitting() {
        let mut dashboard = dashboard();
        dashboard.apply_action(Action::ToggleHelp);
        assert!(dashboard.show_help());

        assert_eq!(dashboard.apply_action(Action::Escape), AppCommand::None);
        assert!(!dashboard.show_help());
        assert_eq!(dashboard.apply_action(Action::Escape), AppCommand::Quit);
    }

    #[test]
    fn merge_records_timing_and_summary() {
        let dashboard = dashboard();
        assert_eq!(dashboard.last_elapsed(), Some(Duration::from_millis(120)));
        assert!(dashboard.last_refresh().is_some());
        assert_eq!(dashboard.summary(), "Namespaces: 1  Pods: 2  Failed: 0");
        assert_eq!(dashboard.footer_lines()[0], "1: get all  3: events    5: secrets");
    }
}
