use std::collections::{BTreeMap, HashMap};

use crate::model::{
    ContainerRecord, Group, ItemIdentity, ItemKind, PodListResult, PodRecord, Target,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerNode {
    pub name: String,
    pub status: String,
    pub ready: bool,
    pub restarts: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodNode {
    pub name: String,
    pub ready: usize,
    pub total: usize,
    pub status: String,
    pub restarts: u32,
    pub age: String,
    pub containers: Vec<ContainerNode>,
    pub expanded: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodGroupNode {
    pub name: String,
    pub pods: Vec<PodNode>,
    pub expanded: bool,
}

impl PodGroupNode {
    pub fn ready_pods(&self) -> usize {
        self.pods
            .iter()
            .filter(|pod| pod.total > 0 && pod.ready == pod.total)
            .count()
    }

    pub fn restarts(&self) -> u32 {
        self.pods.iter().map(|pod| pod.restarts).sum()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NamespaceNode {
    pub context: String,
    pub name: String,
    pub error: Option<String>,
    pub groups: Vec<PodGroupNode>,
    pub expanded: bool,
}

impl NamespaceNode {
    pub fn pod_count(&self) -> usize {
        self.groups.iter().map(|group| group.pods.len()).sum()
    }
}

/// Address of one visible row: indices into the namespace, group, pod and container lists.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RowPath {
    Namespace(usize),
    PodGroup(usize, usize),
    Pod(usize, usize, usize),
    Container(usize, usize, usize, usize),
}

impl RowPath {
    pub fn namespace_index(self) -> usize {
        match self {
            Self::Namespace(ns)
            | Self::PodGroup(ns, _)
            | Self::Pod(ns, _, _)
            | Self::Container(ns, _, _, _) => ns,
        }
    }

    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Namespace(_) => None,
            Self::PodGroup(ns, _) => Some(Self::Namespace(ns)),
            Self::Pod(ns, group, _) => Some(Self::PodGroup(ns, group)),
            Self::Container(ns, group, pod, _) => Some(Self::Pod(ns, group, pod)),
        }
    }
}

/// A visible row with its ancestors, borrowed from the tree.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Namespace(&'a NamespaceNode),
    PodGroup {
        namespace: &'a NamespaceNode,
        group: &'a PodGroupNode,
    },
    Pod {
        namespace: &'a NamespaceNode,
        group: &'a PodGroupNode,
        pod: &'a PodNode,
    },
    Container {
        namespace: &'a NamespaceNode,
        group: &'a PodGroupNode,
        pod: &'a PodNode,
        container: &'a ContainerNode,
    },
}

impl<'a> Row<'a> {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Namespace(_) => ItemKind::Namespace,
            Self::PodGroup { .. } => ItemKind::PodGroup,
            Self::Pod { .. } => ItemKind::Pod,
            Self::Container { .. } => ItemKind::Container,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Namespace(_) => 0,
            Self::PodGroup { .. } => 1,
            Self::Pod { .. } => 2,
            Self::Container { .. } => 3,
        }
    }

    pub fn namespace(&self) -> &'a NamespaceNode {
        match *self {
            Self::Namespace(namespace)
            | Self::PodGroup { namespace, .. }
            | Self::Pod { namespace, .. }
            | Self::Container { namespace, .. } => namespace,
        }
    }

    /// `None` for containers, which have nothing to fold.
    pub fn expanded(&self) -> Option<bool> {
        match self {
            Self::Namespace(namespace) => Some(namespace.expanded),
            Self::PodGroup { group, .. } => Some(group.expanded),
            Self::Pod { pod, .. } => Some(pod.expanded),
            Self::Container { .. } => None,
        }
    }

    pub fn identity(&self) -> ItemIdentity {
        let namespace = self.namespace();
        let mut identity = ItemIdentity {
            context: namespace.context.clone(),
            namespace: namespace.name.clone(),
            ..ItemIdentity::default()
        };
        match *self {
            Self::Namespace(_) => {}
            Self::PodGroup { group, .. } => {
                identity.group = group.name.clone();
            }
            Self::Pod { group, pod, .. } => {
                identity.group = group.name.clone();
                identity.pod = pod.name.clone();
            }
            Self::Container {
                group,
                pod,
                container,
                ..
            } => {
                identity.group = group.name.clone();
                identity.pod = pod.name.clone();
                identity.container = container.name.clone();
            }
        }
        identity
    }
}

/// Namespace tree plus the flattened, collapse-aware row index the cursor walks.
#[derive(Debug, Default)]
pub struct PodTree {
    namespaces: Vec<NamespaceNode>,
    rank: HashMap<Target, usize>,
    index: Vec<RowPath>,
    cursor: Option<usize>,
    offset: usize,
    viewport_height: usize,
}

impl PodTree {
    pub fn new(group: &Group) -> Self {
        let mut rank = HashMap::new();
        for (position, target) in group.targets().enumerate() {
            rank.entry(target).or_insert(position);
        }

        Self {
            rank,
            viewport_height: 1,
            ..Self::default()
        }
    }

    pub fn namespaces(&self) -> &[NamespaceNode] {
        &self.namespaces
    }

    #[cfg(test)]
    pub fn index(&self) -> &[RowPath] {
        &self.index
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[cfg(test)]
    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// Replaces the subtree of every reported namespace, keeping fold state by name.
    pub fn merge(&mut self, results: Vec<PodListResult>) {
        for result in results {
            let position = self.namespaces.iter().position(|namespace| {
                namespace.context == result.context && namespace.name == result.namespace
            });
            let previous = position.map(|position| &self.namespaces[position]);
            let node = build_namespace(result, previous);
            match position {
                Some(position) => self.namespaces[position] = node,
                None => self.namespaces.push(node),
            }
        }

        let rank = &self.rank;
        self.namespaces.sort_by(|left, right| {
            let left_target = Target {
                context: left.context.clone(),
                namespace: left.name.clone(),
            };
            let right_target = Target {
                context: right.context.clone(),
                namespace: right.name.clone(),
            };
            let left_rank = rank.get(&left_target).copied().unwrap_or(usize::MAX);
            let right_rank = rank.get(&right_target).copied().unwrap_or(usize::MAX);
            left_rank
                .cmp(&right_rank)
                .then_with(|| left_target.cmp(&right_target))
        });

        self.rebuild_index();
    }

    pub fn rebuild_index(&mut self) {
        let mut index = Vec::new();
        for (ns, namespace) in self.namespaces.iter().enumerate() {
            index.push(RowPath::Namespace(ns));
            if !namespace.expanded {
                continue;
            }
            for (group_index, group) in namespace.groups.iter().enumerate() {
                index.push(RowPath::PodGroup(ns, group_index));
                if !group.expanded {
                    continue;
                }
                for (pod_index, pod) in group.pods.iter().enumerate() {
                    index.push(RowPath::Pod(ns, group_index, pod_index));
                    if !pod.expanded {
                        continue;
                    }
                    for container_index in 0..pod.containers.len() {
                        index.push(RowPath::Container(
                            ns,
                            group_index,
                            pod_index,
                            container_index,
                        ));
                    }
                }
            }
        }

        self.index = index;
        self.reconcile_cursor();
    }

    fn reconcile_cursor(&mut self) {
        self.cursor = match (self.index.len(), self.cursor) {
            (0, _) => None,
            (_, None) => Some(0),
            (len, Some(cursor)) => Some(cursor.min(len - 1)),
        };
        self.scroll_to_cursor();
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
        self.scroll_to_cursor();
    }

    /// Scrolls the least amount that keeps the cursor inside the window.
    fn scroll_to_cursor(&mut self) {
        let height = self.viewport_height.max(1);
        let max_offset = self.index.len().saturating_sub(height);
        self.offset = self.offset.min(max_offset);

        let Some(cursor) = self.cursor else {
            self.offset = 0;
            return;
        };
        if cursor < self.offset {
            self.offset = cursor;
        } else if cursor >= self.offset + height {
            self.offset = cursor + 1 - height;
        }
    }

    pub fn move_by(&mut self, delta: isize) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let last = self.index.len().saturating_sub(1) as isize;
        let target = (cursor as isize).saturating_add(delta).clamp(0, last);
        self.cursor = Some(target as usize);
        self.scroll_to_cursor();
    }

    pub fn page_down(&mut self) {
        self.move_by(self.viewport_height.max(1) as isize);
    }

    pub fn page_up(&mut self) {
        self.move_by(-(self.viewport_height.max(1) as isize));
    }

    pub fn home(&mut self) {
        if self.cursor.is_some() {
            self.cursor = Some(0);
            self.scroll_to_cursor();
        }
    }

    pub fn end(&mut self) {
        if self.cursor.is_some() {
            self.cursor = Some(self.index.len().saturating_sub(1));
            self.scroll_to_cursor();
        }
    }

    pub fn selected_path(&self) -> Option<RowPath> {
        self.cursor.and_then(|cursor| self.index.get(cursor).copied())
    }

    pub fn selected_row(&self) -> Option<Row<'_>> {
        self.selected_path().and_then(|path| self.row(path))
    }

    pub fn row(&self, path: RowPath) -> Option<Row<'_>> {
        match path {
            RowPath::Namespace(ns) => self.namespaces.get(ns).map(Row::Namespace),
            RowPath::PodGroup(ns, group) => {
                let namespace = self.namespaces.get(ns)?;
                let group = namespace.groups.get(group)?;
                Some(Row::PodGroup { namespace, group })
            }
            RowPath::Pod(ns, group, pod) => {
                let namespace = self.namespaces.get(ns)?;
                let group = namespace.groups.get(group)?;
                let pod = group.pods.get(pod)?;
                Some(Row::Pod {
                    namespace,
                    group,
                    pod,
                })
            }
            RowPath::Container(ns, group, pod, container) => {
                let namespace = self.namespaces.get(ns)?;
                let group = namespace.groups.get(group)?;
                let pod = group.pods.get(pod)?;
                let container = pod.containers.get(container)?;
                Some(Row::Container {
                    namespace,
                    group,
                    pod,
                    container,
                })
            }
        }
    }

    /// Rows currently inside the viewport, paired with their index position.
    pub fn visible_rows(&self) -> Vec<(usize, Row<'_>)> {
        self.index
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.viewport_height.max(1))
            .filter_map(|(position, path)| self.row(*path).map(|row| (position, row)))
            .collect()
    }

    pub fn toggle_selected(&mut self) {
        if let Some(path) = self.selected_path() {
            if let Some(flag) = self.flag_mut(path) {
                *flag = !*flag;
                self.rebuild_index();
            }
        }
    }

    pub fn expand_selected(&mut self) {
        if let Some(path) = self.selected_path() {
            self.set_flag(path, true);
        }
    }

    /// On a container row the owning pod folds and takes the cursor.
    pub fn collapse_selected(&mut self) {
        let Some(path) = self.selected_path() else {
            return;
        };
        let path = match path {
            RowPath::Container(..) => match path.parent() {
                Some(parent) => parent,
                None => return,
            },
            other => other,
        };
        self.set_flag(path, false);
        self.select_path(path);
    }

    fn set_flag(&mut self, path: RowPath, expanded: bool) {
        let Some(flag) = self.flag_mut(path) else {
            return;
        };
        if *flag != expanded {
            *flag = expanded;
            self.rebuild_index();
        }
    }

    fn flag_mut(&mut self, path: RowPath) -> Option<&mut bool> {
        match path {
            RowPath::Namespace(ns) => self.namespaces.get_mut(ns).map(|node| &mut node.expanded),
            RowPath::PodGroup(ns, group) => self
                .namespaces
                .get_mut(ns)?
                .groups
                .get_mut(group)
                .map(|node| &mut node.expanded),
            RowPath::Pod(ns, group, pod) => self
                .namespaces
                .get_mut(ns)?
                .groups
                .get_mut(group)?
                .pods
                .get_mut(pod)
                .map(|node| &mut node.expanded),
            RowPath::Container(..) => None,
        }
    }

    fn select_path(&mut self, path: RowPath) {
        if let Some(position) = self.index.iter().position(|candidate| *candidate == path) {
            self.cursor = Some(position);
            self.scroll_to_cursor();
        }
    }

    /// Sets every fold flag in one pass. Collapsing re-anchors the cursor on the
    /// namespace that held the selection; expanding keeps the selected row.
    pub fn set_all_expanded(&mut self, expanded: bool) {
        let anchor = self.selected_path().map(|path| {
            if expanded {
                path
            } else {
                RowPath::Namespace(path.namespace_index())
            }
        });

        for namespace in &mut self.namespaces {
            namespace.expanded = expanded;
            for group in &mut namespace.groups {
                group.expanded = expanded;
                for pod in &mut group.pods {
                    pod.expanded = expanded;
                }
            }
        }

        self.rebuild_index();
        if let Some(anchor) = anchor {
            self.select_path(anchor);
        }
    }

    pub fn pod_total(&self) -> usize {
        self.namespaces.iter().map(NamespaceNode::pod_count).sum()
    }

    pub fn failed_namespaces(&self) -> usize {
        self.namespaces
            .iter()
            .filter(|namespace| namespace.error.is_some())
            .count()
    }
}

fn build_namespace(result: PodListResult, previous: Option<&NamespaceNode>) -> NamespaceNode {
    let expanded = previous.is_none_or(|node| node.expanded);
    let (error, groups) = match result.outcome {
        Ok(records) => (None, build_groups(records, previous)),
        Err(error) => (Some(error), Vec::new()),
    };

    NamespaceNode {
        context: result.context,
        name: result.namespace,
        error,
        groups,
        expanded,
    }
}

fn build_groups(records: Vec<PodRecord>, previous: Option<&NamespaceNode>) -> Vec<PodGroupNode> {
    let mut grouped: BTreeMap<String, Vec<PodRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(workload_key(&record.name))
            .or_default()
            .push(record);
    }

    grouped
        .into_iter()
        .map(|(name, mut records)| {
            records.sort_by(|left, right| left.name.cmp(&right.name));
            let previous_group = previous
                .and_then(|node| node.groups.iter().find(|group| group.name == name));
            let pods = records
                .into_iter()
                .map(|record| {
                    let expanded = previous_group
                        .and_then(|group| group.pods.iter().find(|pod| pod.name == record.name))
                        .is_none_or(|pod| pod.expanded);
                    build_pod(record, expanded)
                })
                .collect();

            PodGroupNode {
                name,
                pods,
                expanded: previous_group.is_none_or(|group| group.expanded),
            }
        })
        .collect()
}

fn build_pod(record: PodRecord, expanded: bool) -> PodNode {
    PodNode {
        name: record.name,
        ready: record.ready,
        total: record.total,
        status: record.status,
        restarts: record.restarts,
        age: record.age,
        containers: record.containers.into_iter().map(build_container).collect(),
        expanded,
    }
}

fn build_container(record: ContainerRecord) -> ContainerNode {
    ContainerNode {
        name: record.name,
        status: record.status,
        ready: record.ready,
        restarts: record.restarts,
    }
}

const GENERATED_ALPHABET: &str = "bcdfghjklmnpqrstvwxz2456789";

fn is_generated(segment: &str, lengths: std::ops::RangeInclusive<usize>) -> bool {
    lengths.contains(&segment.len()) && segment.chars().all(|ch| GENERATED_ALPHABET.contains(ch))
}

/// Best-effort workload name: drops a StatefulSet ordinal, or a generated pod suffix
/// together with the ReplicaSet hash in front of it.
pub fn workload_key(pod_name: &str) -> String {
    let segments = pod_name.split('-').collect::<Vec<_>>();
    if segments.len() < 2 {
        return pod_name.to_string();
    }

    let last = segments[segments.len() - 1];
    let mut keep = segments.len();
    if !last.is_empty() && last.chars().all(|ch| ch.is_ascii_digit()) {
        keep -= 1;
    } else if is_generated(last, 5..=5) {
        keep -= 1;
        if keep >= 2 && is_generated(segments[keep - 1], 6..=10) {
            keep -= 1;
        }
    }

    segments[..keep].join("-")
}
