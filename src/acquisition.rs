use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::compact_error;
use crate::k8s::ClusterClient;
use crate::model::{Group, PodListResult, Target};

pub const WORKER_COUNT: usize = 3;

const WORKER_LOST_MESSAGE: &str = "fetch worker stopped before reporting this target";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CycleVerdict {
    Usable { failed: usize },
    TotalFailure(Vec<String>),
}

/// Lists pods for every target of the group on a fixed pool of workers.
///
/// Returns exactly one result per target in arrival order. A target whose worker
/// died is reported as a failed result rather than dropped.
pub async fn fetch_pod_lists<C: ClusterClient>(
    client: Arc<C>,
    group: &Group,
) -> Vec<PodListResult> {
    let targets = group.targets().collect::<Vec<_>>();
    if targets.is_empty() {
        return Vec::new();
    }

    let (job_tx, job_rx) = mpsc::channel::<Target>(targets.len());
    for target in &targets {
        if job_tx.try_send(target.clone()).is_err() {
            warn!("job queue rejected target {target}");
        }
    }
    drop(job_tx);

    let jobs = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<PodListResult>(targets.len());
    let mut workers = JoinSet::new();
    for worker_id in 0..WORKER_COUNT.min(targets.len()) {
        let client = Arc::clone(&client);
        let jobs = Arc::clone(&jobs);
        let results = result_tx.clone();
        workers.spawn(async move {
            loop {
                let next = jobs.lock().await.recv().await;
                let Some(target) = next else {
                    break;
                };

                debug!("worker={worker_id} listing pods for {target}");
                let outcome = client
                    .list_pods(&target.context, &target.namespace)
                    .await
                    .map_err(|error| compact_error(&error));
                if let Err(error) = &outcome {
                    warn!("pod list failed for {target}: {error}");
                }

                let result = PodListResult {
                    context: target.context,
                    namespace: target.namespace,
                    outcome,
                };
                if results.send(result).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut results = Vec::with_capacity(targets.len());
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(error) = joined {
            warn!("fetch worker ended abnormally: {error}");
        }
    }

    fill_missing(&targets, results)
}

/// Appends a failed result for every target the workers never reported.
fn fill_missing(targets: &[Target], mut results: Vec<PodListResult>) -> Vec<PodListResult> {
    let mut outstanding: HashMap<Target, usize> = HashMap::new();
    for target in targets {
        *outstanding.entry(target.clone()).or_default() += 1;
    }
    for result in &results {
        if let Some(count) = outstanding.get_mut(&result.target()) {
            *count = count.saturating_sub(1);
        }
    }

    for target in targets {
        let Some(count) = outstanding.get_mut(target) else {
            continue;
        };
        if *count == 0 {
            continue;
        }
        *count -= 1;
        results.push(PodListResult {
            context: target.context.clone(),
            namespace: target.namespace.clone(),
            outcome: Err(WORKER_LOST_MESSAGE.to_string()),
        });
    }

    results
}

/// Total failure needs at least one target and no successes.
pub fn classify(results: &[PodListResult]) -> CycleVerdict {
    let messages = results
        .iter()
        .filter_map(PodListResult::error_message)
        .collect::<Vec<_>>();

    if !results.is_empty() && messages.len() == results.len() {
        CycleVerdict::TotalFailure(messages)
    } else {
        CycleVerdict::Usable {
            failed: messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CycleVerdict, WORKER_COUNT, classify, fetch_pod_lists, fill_missing};
    use crate::k8s::FakeCluster;
    use crate::model::{Group, NsGroup, PodListResult, Target};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn group(context: &str, namespaces: &[&str]) -> Group {
        Group::single(
            "test",
            context,
            namespaces.iter().map(|name| name.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn one_result_per_target_regardless_of_completion_order() {
        let cluster = FakeCluster::default()
            .with_pods("dev", "slow", &["a-1"])
            .with_pods("dev", "fast", &["b-1"])
            .with_error("dev", "broken", "Forbidden")
            .with_pods("dev", "medium", &["c-1"])
            .with_delay("dev", "slow", 60)
            .with_delay("dev", "medium", 20);
        let group = group("dev", &["slow", "fast", "broken", "medium"]);

        let results = fetch_pod_lists(Arc::new(cluster), &group).await;

        assert_eq!(results.len(), 4);
        let tagged = results
            .iter()
            .map(|result| result.namespace.clone())
            .collect::<BTreeSet<_>>();
        assert_eq!(tagged.len(), 4);
        let broken = results
            .iter()
            .find(|result| result.namespace == "broken")
            .expect("broken target reported");
        assert_eq!(broken.error(), Some("Forbidden"));
    }

    #[tokio::test]
    async fn pool_never_exceeds_worker_count() {
        let mut cluster = FakeCluster::default();
        let namespaces = ["n1", "n2", "n3", "n4", "n5", "n6", "n7"];
        for namespace in namespaces {
            cluster = cluster
                .with_pods("dev", namespace, &["p-1"])
                .with_delay("dev", namespace, 15);
        }
        let cluster = Arc::new(cluster);

        let results = fetch_pod_lists(Arc::clone(&cluster), &group("dev", &namespaces)).await;

        assert_eq!(results.len(), namespaces.len());
        assert!(cluster.peak_in_flight() <= WORKER_COUNT);
        assert_eq!(cluster.calls().len(), namespaces.len());
    }

    #[tokio::test]
    async fn targets_span_contexts() {
        let cluster = FakeCluster::default()
            .with_pods("dev", "api", &["api-1"])
            .with_pods("prod", "api", &["api-1", "api-2"]);
        let group = Group {
            id: 1,
            name: "api".to_string(),
            ns_groups: vec![
                NsGroup {
                    context: "dev".to_string(),
                    namespaces: vec!["api".to_string()],
                },
                NsGroup {
                    context: "prod".to_string(),
                    namespaces: vec!["api".to_string()],
                },
            ],
        };

        let results = fetch_pod_lists(Arc::new(cluster), &group).await;
        let prod = results
            .iter()
            .find(|result| result.context == "prod")
            .expect("prod reported");
        assert_eq!(prod.outcome.as_ref().map(Vec::len), Ok(2));
    }

    #[tokio::test]
    async fn empty_group_yields_no_results() {
        let results = fetch_pod_lists(Arc::new(FakeCluster::default()), &group("dev", &[])).await;
        assert!(results.is_empty());
        assert_eq!(classify(&results), CycleVerdict::Usable { failed: 0 });
    }

    #[test]
    fn missing_targets_get_synthesized_errors() {
        let targets = vec![
            Target {
                context: "dev".to_string(),
                namespace: "a".to_string(),
            },
            Target {
                context: "dev".to_string(),
                namespace: "b".to_string(),
            },
        ];
        let reported = vec![PodListResult {
            context: "dev".to_string(),
            namespace: "a".to_string(),
            outcome: Ok(Vec::new()),
        }];

        let results = fill_missing(&targets, reported);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].namespace, "b");
        assert!(results[1].error().is_some());
    }

    #[test]
    fn total_failure_only_when_every_target_fails() {
        let failed = |namespace: &str| PodListResult {
            context: "dev".to_string(),
            namespace: namespace.to_string(),
            outcome: Err("Unauthorized".to_string()),
        };
        let ok = PodListResult {
            context: "dev".to_string(),
            namespace: "ok".to_string(),
            outcome: Ok(Vec::new()),
        };

        assert_eq!(
            classify(&[failed("a"), ok.clone()]),
            CycleVerdict::Usable { failed: 1 }
        );
        assert_eq!(
            classify(&[failed("a"), failed("b")]),
            CycleVerdict::TotalFailure(vec![
                "Context: dev Namespace: a, Error: Unauthorized".to_string(),
                "Context: dev Namespace: b, Error: Unauthorized".to_string(),
            ])
        );
    }
}
