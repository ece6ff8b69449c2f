use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A saved monitoring target set: one or more contexts, each with its namespaces.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub ns_groups: Vec<NsGroup>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsGroup {
    pub context: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl Group {
    pub fn single(name: impl Into<String>, context: &str, namespaces: Vec<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            ns_groups: vec![NsGroup {
                context: context.to_string(),
                namespaces,
            }],
        }
    }

    /// Every (context, namespace) pair in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.ns_groups.iter().flat_map(|ns_group| {
            ns_group.namespaces.iter().map(|namespace| Target {
                context: ns_group.context.clone(),
                namespace: namespace.clone(),
            })
        })
    }

    pub fn target_count(&self) -> usize {
        self.ns_groups
            .iter()
            .map(|ns_group| ns_group.namespaces.len())
            .sum()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Target {
    pub context: String,
    pub namespace: String,
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.context, self.namespace)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ContainerRecord {
    pub name: String,
    pub status: String,
    pub ready: bool,
    pub restarts: u32,
}

/// The slice of a pod the dashboard displays, captured at fetch time.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct PodRecord {
    pub name: String,
    pub ready: usize,
    pub total: usize,
    pub status: String,
    pub restarts: u32,
    pub age: String,
    pub containers: Vec<ContainerRecord>,
}

/// Outcome of listing pods for one target during one acquisition cycle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodListResult {
    pub context: String,
    pub namespace: String,
    pub outcome: Result<Vec<PodRecord>, String>,
}

impl PodListResult {
    pub fn target(&self) -> Target {
        Target {
            context: self.context.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(|error| {
            format!(
                "Context: {} Namespace: {}, Error: {}",
                self.context, self.namespace, error
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ItemKind {
    Namespace,
    PodGroup,
    Pod,
    Container,
}

impl ItemKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::PodGroup => "PodGroup",
            Self::Pod => "Pod",
            Self::Container => "Container",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "ns" | "namespace" | "namespaces" => Some(Self::Namespace),
            "podgroup" | "podgroups" | "pod-group" | "group" | "deployment" | "deploy" => {
                Some(Self::PodGroup)
            }
            "po" | "pod" | "pods" => Some(Self::Pod),
            "container" | "containers" => Some(Self::Container),
            _ => None,
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Ancestor identity of a selected row. Fields below the row's own tier are empty.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ItemIdentity {
    pub context: String,
    pub namespace: String,
    pub group: String,
    pub pod: String,
    pub container: String,
}
