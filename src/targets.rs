use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::info;

use crate::error::DashboardError;
use crate::k8s::ClusterClient;
use crate::model::Group;

/// What the operator asked to watch, before any cluster lookups.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TargetSpec {
    Namespace { context: String, namespace: String },
    Profile(Group),
}

impl TargetSpec {
    /// Every context that needs a client. Collected once so each gets exactly one.
    pub fn contexts(&self) -> BTreeSet<String> {
        match self {
            Self::Namespace { context, .. } => BTreeSet::from([context.clone()]),
            Self::Profile(group) => distinct_contexts(group),
        }
    }
}

pub fn distinct_contexts(group: &Group) -> BTreeSet<String> {
    group
        .ns_groups
        .iter()
        .map(|ns_group| ns_group.context.clone())
        .collect()
}

pub fn is_wildcard(namespace: &str) -> bool {
    namespace.contains('*')
}

/// Anchors the pattern so only full names match; `*` spans any run of characters.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
        .with_context(|| format!("invalid namespace pattern: {pattern}"))
}

pub async fn resolve<C: ClusterClient>(spec: TargetSpec, client: &C) -> Result<Group> {
    match spec {
        TargetSpec::Profile(group) => Ok(group),
        TargetSpec::Namespace { context, namespace } if is_wildcard(&namespace) => {
            let namespaces = expand_wildcard(client, &context, &namespace).await?;
            Ok(Group::single(format!("{context}/{namespace}"), &context, namespaces))
        }
        TargetSpec::Namespace { context, namespace } => Ok(Group::single(
            format!("{context}/{namespace}"),
            &context,
            vec![namespace],
        )),
    }
}

async fn expand_wildcard<C: ClusterClient>(
    client: &C,
    context: &str,
    pattern: &str,
) -> Result<Vec<String>> {
    let matcher = wildcard_regex(pattern)?;
    let matched = client
        .list_namespaces(context)
        .await?
        .into_iter()
        .filter(|name| matcher.is_match(name))
        .collect::<Vec<_>>();

    if matched.is_empty() {
        return Err(DashboardError::TargetResolution {
            context: context.to_string(),
            pattern: pattern.to_string(),
        }
        .into());
    }

    info!(
        "pattern {pattern} matched {} namespace(s) in context={context}",
        matched.len()
    );
    Ok(matched)
}
