use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{ContainerStatus, Namespace, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use tracing::debug;

use crate::model::{ContainerRecord, PodRecord};

/// Read side of the cluster the dashboard needs. Implementations hold one client per
/// context and must be shareable across the acquisition workers.
pub trait ClusterClient: Send + Sync + 'static {
    fn list_pods(
        &self,
        context: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<PodRecord>>> + Send;

    fn list_namespaces(&self, context: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Clone)]
pub struct KubeGateway {
    clients: HashMap<String, Client>,
}

impl KubeGateway {
    /// Builds exactly one client per distinct context. Any failure aborts.
    pub async fn connect(contexts: &BTreeSet<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().context("failed to read kubeconfig")?;

        let mut clients = HashMap::new();
        for context in contexts {
            let options = KubeConfigOptions {
                context: Some(context.clone()),
                cluster: None,
                user: None,
            };
            let config = Config::from_custom_kubeconfig(kubeconfig.clone(), &options)
                .await
                .with_context(|| format!("failed to create client config for context: {context}"))?;
            let client = Client::try_from(config)
                .with_context(|| format!("failed to create client for context: {context}"))?;
            debug!("client ready for context={context}");
            clients.insert(context.clone(), client);
        }

        Ok(Self { clients })
    }

    pub fn current_context() -> Result<String> {
        let kubeconfig = Kubeconfig::read().context("failed to read kubeconfig")?;
        kubeconfig
            .current_context
            .filter(|context| !context.trim().is_empty())
            .context("kubeconfig has no current-context; pass --context")
    }

    fn client(&self, context: &str) -> Result<Client> {
        self.clients
            .get(context)
            .cloned()
            .with_context(|| format!("no client configured for context: {context}"))
    }
}

impl ClusterClient for KubeGateway {
    async fn list_pods(&self, context: &str, namespace: &str) -> Result<Vec<PodRecord>> {
        let pods: Api<Pod> = Api::namespaced(self.client(context)?, namespace);
        let list = pods.list(&ListParams::default()).await?;
        Ok(list.into_iter().map(|pod| pod_record(&pod)).collect())
    }

    async fn list_namespaces(&self, context: &str) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client(context)?);
        let list = namespaces
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list namespaces for context: {context}"))?;
        Ok(list.into_iter().map(|namespace| namespace.name_any()).collect())
    }
}

pub fn pod_record(pod: &Pod) -> PodRecord {
    let (ready, total, restarts) = pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));
    let containers = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .map(container_record)
        .collect();

    PodRecord {
        name: pod.name_any(),
        ready,
        total,
        status: pod_status_label(pod),
        restarts: restarts.max(0) as u32,
        age: human_age(pod.metadata.creation_timestamp.as_ref()),
        containers,
    }
}

fn pod_readiness(status: &PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

fn pod_status_label(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }

    let Some(status) = pod.status.as_ref() else {
        return "Unknown".to_string();
    };

    for container in status.container_statuses.as_deref().unwrap_or(&[]) {
        let Some(state) = container.state.as_ref() else {
            continue;
        };
        if let Some(reason) = state
            .waiting
            .as_ref()
            .and_then(|waiting| waiting.reason.clone())
            .filter(|reason| !reason.is_empty())
        {
            return reason;
        }
        if let Some(reason) = state
            .terminated
            .as_ref()
            .and_then(|terminated| terminated.reason.clone())
            .filter(|reason| !reason.is_empty())
        {
            return reason;
        }
    }

    status
        .reason
        .clone()
        .filter(|reason| !reason.is_empty())
        .or_else(|| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn container_record(container: &ContainerStatus) -> ContainerRecord {
    ContainerRecord {
        name: container.name.clone(),
        status: container_state_label(container),
        ready: container.ready,
        restarts: container.restart_count.max(0) as u32,
    }
}

fn container_state_label(container: &ContainerStatus) -> String {
    if let Some(state) = container.state.as_ref() {
        if state.running.is_some() {
            return "Running".to_string();
        }
        if let Some(waiting) = state.waiting.as_ref() {
            return waiting
                .reason
                .clone()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "Waiting".to_string());
        }
        if let Some(terminated) = state.terminated.as_ref() {
            return terminated
                .reason
                .clone()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| format!("Exit({})", terminated.exit_code));
        }
    }

    "Unknown".to_string()
}

fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    let elapsed_seconds =
        (k8s_openapi::jiff::Timestamp::now().as_second() - timestamp.0.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

/// In-memory cluster with canned per-target outcomes and optional latency.
#[cfg(test)]
#[derive(Default)]
pub struct FakeCluster {
    pods: HashMap<(String, String), std::result::Result<Vec<PodRecord>, String>>,
    namespaces: HashMap<String, Vec<String>>,
    delays: HashMap<(String, String), std::time::Duration>,
    calls: std::sync::Mutex<Vec<(String, String)>>,
    in_flight: std::sync::atomic::AtomicUsize,
    peak_in_flight: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakeCluster {
    pub fn with_pods(mut self, context: &str, namespace: &str, pod_names: &[&str]) -> Self {
        let records = pod_names
            .iter()
            .map(|name| PodRecord {
                name: name.to_string(),
                ready: 1,
                total: 1,
                status: "Running".to_string(),
                restarts: 0,
                age: "1h".to_string(),
                containers: Vec::new(),
            })
            .collect();
        self.pods
            .insert((context.to_string(), namespace.to_string()), Ok(records));
        self
    }

    pub fn with_error(mut self, context: &str, namespace: &str, error: &str) -> Self {
        self.pods.insert(
            (context.to_string(), namespace.to_string()),
            Err(error.to_string()),
        );
        self
    }

    pub fn with_namespaces(mut self, context: &str, namespaces: &[&str]) -> Self {
        self.namespaces.insert(
            context.to_string(),
            namespaces.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn with_delay(mut self, context: &str, namespace: &str, millis: u64) -> Self {
        self.delays.insert(
            (context.to_string(), namespace.to_string()),
            std::time::Duration::from_millis(millis),
        );
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ClusterClient for FakeCluster {
    async fn list_pods(&self, context: &str, namespace: &str) -> Result<Vec<PodRecord>> {
        let key = (context.to_string(), namespace.to_string());
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }
        let running = self
            .in_flight
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        self.peak_in_flight
            .fetch_max(running, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight
            .fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        match self.pods.get(&key) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(error)) => Err(anyhow::anyhow!(error.clone())),
            None => Err(anyhow::anyhow!("namespaces \"{namespace}\" not found")),
        }
    }

    async fn list_namespaces(&self, context: &str) -> Result<Vec<String>> {
        self.namespaces
            .get(context)
            .cloned()
            .with_context(|| format!("context {context} is unreachable"))
    }
}
