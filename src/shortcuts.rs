use std::collections::BTreeMap;

use crate::error::DashboardError;
use crate::model::{ItemIdentity, ItemKind};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Field {
    Context,
    Namespace,
    Group,
    Pod,
    Container,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Context" => Some(Self::Context),
            "Namespace" => Some(Self::Namespace),
            "Group" => Some(Self::Group),
            "Pod" => Some(Self::Pod),
            "Container" => Some(Self::Container),
            _ => None,
        }
    }

    fn value(self, identity: &ItemIdentity) -> &str {
        match self {
            Self::Context => &identity.context,
            Self::Namespace => &identity.namespace,
            Self::Group => &identity.group,
            Self::Pod => &identity.pod,
            Self::Container => &identity.container,
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            Self::Context => "{{.Context}}",
            Self::Namespace => "{{.Namespace}}",
            Self::Group => "{{.Group}}",
            Self::Pod => "{{.Pod}}",
            Self::Container => "{{.Container}}",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Segment {
    Text(String),
    Field(Field),
}

/// Command text with `{{.Field}}` placeholders, parsed once at startup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(raw: &str) -> Result<Self, DashboardError> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find("{{") {
            let (text, tail) = rest.split_at(open);
            if text.contains("}}") {
                return Err(DashboardError::config(format!(
                    "unbalanced '}}}}' in template: {raw}"
                )));
            }
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }

            let tail = &tail[2..];
            let Some(close) = tail.find("}}") else {
                return Err(DashboardError::config(format!(
                    "unclosed '{{{{' in template: {raw}"
                )));
            };
            let inner = tail[..close].trim();
            let field = inner
                .strip_prefix('.')
                .and_then(Field::parse)
                .ok_or_else(|| {
                    DashboardError::config(format!("unknown field '{inner}' in template: {raw}"))
                })?;
            segments.push(Segment::Field(field));
            rest = &tail[close + 2..];
        }

        if rest.contains("}}") {
            return Err(DashboardError::config(format!(
                "unbalanced '}}}}' in template: {raw}"
            )));
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn render(&self, kind: ItemKind, identity: &ItemIdentity) -> Result<String, DashboardError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = field.value(identity);
                    if value.is_empty() {
                        return Err(DashboardError::action(format!(
                            "{} is not available on a {kind} row",
                            field.placeholder()
                        )));
                    }
                    out.push_str(value);
                }
            }
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClipboardShortcut {
    pub name: String,
    pub template: CommandTemplate,
}

/// Per-row-kind clipboard bindings keyed by a single character.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ShortcutTable {
    by_kind: BTreeMap<ItemKind, BTreeMap<char, ClipboardShortcut>>,
}

const DEFAULT_BINDINGS: &[(ItemKind, char, &str, &str)] = &[
    (
        ItemKind::Namespace,
        '1',
        "get all",
        "kubectl --context {{.Context}} -n {{.Namespace}} get all",
    ),
    (
        ItemKind::Namespace,
        '2',
        "ingress",
        "kubectl --context {{.Context}} -n {{.Namespace}} get ingress",
    ),
    (
        ItemKind::Namespace,
        '3',
        "events",
        "kubectl --context {{.Context}} -n {{.Namespace}} get events --sort-by=.lastTimestamp",
    ),
    (
        ItemKind::Namespace,
        '4',
        "describe",
        "kubectl --context {{.Context}} describe ns {{.Namespace}}",
    ),
    (
        ItemKind::Namespace,
        '5',
        "secrets",
        "kubectl --context {{.Context}} -n {{.Namespace}} get secrets",
    ),
    (
        ItemKind::Namespace,
        '6',
        "cm",
        "kubectl --context {{.Context}} -n {{.Namespace}} get cm",
    ),
    (
        ItemKind::PodGroup,
        '1',
        "describe",
        "kubectl --context {{.Context}} -n {{.Namespace}} describe deployment {{.Group}}",
    ),
    (
        ItemKind::PodGroup,
        '2',
        "delete",
        "kubectl --context {{.Context}} -n {{.Namespace}} delete deployment {{.Group}}",
    ),
    (
        ItemKind::PodGroup,
        '3',
        "scale",
        "kubectl --context {{.Context}} -n {{.Namespace}} scale deployment {{.Group}} --replicas=",
    ),
    (
        ItemKind::Pod,
        '1',
        "logs",
        "kubectl --context {{.Context}} -n {{.Namespace}} logs {{.Pod}}",
    ),
    (
        ItemKind::Pod,
        '2',
        "exec",
        "kubectl --context {{.Context}} -n {{.Namespace}} exec -it {{.Pod}} -- /bin/bash",
    ),
    (
        ItemKind::Pod,
        '3',
        "describe",
        "kubectl --context {{.Context}} -n {{.Namespace}} describe pod {{.Pod}}",
    ),
    (
        ItemKind::Pod,
        '4',
        "delete",
        "kubectl --context {{.Context}} -n {{.Namespace}} delete pod {{.Pod}}",
    ),
    (
        ItemKind::Container,
        '1',
        "logs",
        "kubectl --context {{.Context}} -n {{.Namespace}} logs {{.Pod}} -c {{.Container}}",
    ),
    (
        ItemKind::Container,
        '2',
        "exec",
        "kubectl --context {{.Context}} -n {{.Namespace}} exec -it {{.Pod}} -c {{.Container}} -- /bin/bash",
    ),
];

impl ShortcutTable {
    pub fn defaults() -> Result<Self, DashboardError> {
        let mut table = Self::default();
        for (kind, key, name, template) in DEFAULT_BINDINGS {
            table.insert(*kind, *key, name, template)?;
        }
        Ok(table)
    }

    pub fn insert(
        &mut self,
        kind: ItemKind,
        key: char,
        name: &str,
        template: &str,
    ) -> Result<(), DashboardError> {
        if name.trim().is_empty() {
            return Err(DashboardError::config(format!(
                "name not provided for clipboard shortcut '{key}' for {kind}"
            )));
        }
        if template.trim().is_empty() {
            return Err(DashboardError::config(format!(
                "template not provided for clipboard shortcut '{key}' for {kind}"
            )));
        }

        let template = CommandTemplate::parse(template)?;
        self.by_kind.entry(kind).or_default().insert(
            key,
            ClipboardShortcut {
                name: name.to_string(),
                template,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, kind: ItemKind, key: char) -> Option<&ClipboardShortcut> {
        self.by_kind.get(&kind).and_then(|bindings| bindings.get(&key))
    }

    /// `None` when the key has no binding for this row kind.
    pub fn render(
        &self,
        kind: ItemKind,
        key: char,
        identity: &ItemIdentity,
    ) -> Option<Result<String, DashboardError>> {
        self.lookup(kind, key)
            .map(|shortcut| shortcut.template.render(kind, identity))
    }

    /// Two footer lines, keys ascending and alternating between lines, columns aligned.
    pub fn display_lines(&self, kind: ItemKind) -> [String; 2] {
        let Some(bindings) = self.by_kind.get(&kind) else {
            return [String::new(), String::new()];
        };

        let cells = bindings
            .iter()
            .map(|(key, shortcut)| format!("{key}: {}", shortcut.name))
            .collect::<Vec<_>>();
        let mut lines = [String::new(), String::new()];
        for pair in cells.chunks(2) {
            let width = pair.iter().map(|cell| cell.chars().count()).max().unwrap_or(0) + 2;
            for (line, out) in lines.iter_mut().enumerate() {
                let cell = pair.get(line).map(String::as_str).unwrap_or("");
                out.push_str(&format!("{cell:<width$}"));
            }
        }

        lines.map(|line| line.trim_end().to_string())
    }
}
