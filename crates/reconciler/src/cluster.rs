//! Cluster lifecycle controller.
//!
//! Unmanaged clusters are pruned first. Each declared cluster then gets its own
//! worker: find or create, edit on drift, wait until it settles, then converge
//! its libraries. Workers run concurrently, bounded by
//! [`ClusterControllerConfig::max_workers`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info, info_span, warn};
use ulid::Ulid;
use warden_core::{
    ClusterInfo, ClusterSpec, ClusterState, ClustersApi, LibrariesApi, Library, Result,
};

use crate::types::{Pass, PassReport, ReconcileAction};

/// Timing and concurrency knobs for the controller.
#[derive(Debug, Clone)]
pub struct ClusterControllerConfig {
    /// Delay between state polls.
    pub poll_interval: Duration,
    /// Delay after a create before the first poll.
    pub create_settle_delay: Duration,
    /// Upper bound on concurrent workers.
    pub max_workers: usize,
}

impl Default for ClusterControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            create_settle_delay: Duration::from_secs(30),
            max_workers: std::thread::available_parallelism().map_or(4, usize::from),
        }
    }
}

impl ClusterControllerConfig {
    /// Zero delays; for tests and dry environments.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            create_settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Pool size for `clusters` declared clusters.
    pub fn pool_size(&self, clusters: usize) -> usize {
        clusters.min(self.max_workers).max(1)
    }
}

/// Result of converging one declared cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    pub cluster_name: String,
    pub cluster_id: Option<String>,
    pub final_state: Option<ClusterState>,
    pub report: PassReport,
}

impl ClusterOutcome {
    fn new(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            cluster_id: None,
            final_state: None,
            report: PassReport::new(Pass::Cluster),
        }
    }

    /// The worker stopped before the cluster settled.
    pub const fn failed(&self) -> bool {
        self.report.is_aborted()
    }
}

/// Result of a full cluster run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRunReport {
    pub run_id: Ulid,
    pub pruned: PassReport,
    pub outcomes: Vec<ClusterOutcome>,
}

impl ClusterRunReport {
    pub fn has_failures(&self) -> bool {
        self.pruned.has_failures() || self.outcomes.iter().any(|o| o.report.has_failures())
    }
}

/// Drives declared clusters to a running state with the declared libraries.
pub struct ClusterController {
    worker: Worker,
    config: ClusterControllerConfig,
}

#[derive(Clone)]
struct Worker {
    clusters: Arc<dyn ClustersApi>,
    libraries: Arc<dyn LibrariesApi>,
    poll_interval: Duration,
    create_settle_delay: Duration,
}

impl ClusterController {
    pub fn new(
        clusters: Arc<dyn ClustersApi>,
        libraries: Arc<dyn LibrariesApi>,
        config: ClusterControllerConfig,
    ) -> Self {
        let worker = Worker {
            clusters,
            libraries,
            poll_interval: config.poll_interval,
            create_settle_delay: config.create_settle_delay,
        };
        Self { worker, config }
    }

    pub const fn config(&self) -> &ClusterControllerConfig {
        &self.config
    }

    /// Prune, then converge every declared cluster.
    pub async fn run(&self, specs: &[ClusterSpec], libraries: &[Library]) -> ClusterRunReport {
        let run_id = Ulid::new();
        let span = info_span!("cluster_run", %run_id, clusters = specs.len());
        async {
            let pruned = self
                .delete_unmanaged(specs)
                .instrument(info_span!("unmanaged_clusters"))
                .await;
            let outcomes = self.reconcile_all(specs, libraries).await;
            ClusterRunReport {
                run_id,
                pruned,
                outcomes,
            }
        }
        .instrument(span)
        .await
    }

    /// Permanently delete every cluster that is neither declared nor a job cluster.
    pub async fn delete_unmanaged(&self, specs: &[ClusterSpec]) -> PassReport {
        let mut report = PassReport::new(Pass::UnmanagedClusters);
        let live = match self.worker.clusters.list_clusters().await {
            Ok(live) => live,
            Err(e) => return report.abort(&e),
        };

        let declared: HashSet<&str> = specs.iter().map(|s| s.cluster_name.as_str()).collect();
        let unmanaged: Vec<&ClusterInfo> = live
            .iter()
            .filter(|c| !c.is_job_cluster() && !declared.contains(c.cluster_name.as_str()))
            .collect();
        if unmanaged.is_empty() {
            return report;
        }

        warn!(
            clusters = ?unmanaged.iter().map(|c| c.cluster_name.as_str()).collect::<Vec<_>>(),
            "Deleting unmanaged clusters"
        );
        for cluster in unmanaged {
            report.record(
                ReconcileAction::DeleteCluster {
                    cluster_name: cluster.cluster_name.clone(),
                    cluster_id: cluster.cluster_id.clone(),
                },
                self.worker
                    .clusters
                    .permanent_delete_cluster(&cluster.cluster_id)
                    .await,
            );
        }
        report
    }

    /// Converge every declared cluster on the worker pool.
    pub async fn reconcile_all(
        &self,
        specs: &[ClusterSpec],
        libraries: &[Library],
    ) -> Vec<ClusterOutcome> {
        let permits = Arc::new(Semaphore::new(self.config.pool_size(specs.len())));
        let libraries: Arc<[Library]> = libraries.into();

        let handles: Vec<_> = specs
            .iter()
            .cloned()
            .map(|spec| {
                let worker = self.worker.clone();
                let permits = Arc::clone(&permits);
                let libraries = Arc::clone(&libraries);
                let span = info_span!("cluster", cluster = %spec.cluster_name);
                tokio::spawn(
                    async move {
                        let _permit = permits.acquire_owned().await;
                        worker.reconcile(&spec, &libraries).await
                    }
                    .instrument(span),
                )
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(specs)
            .map(|(joined, spec)| {
                joined.unwrap_or_else(|e| {
                    error!(cluster = %spec.cluster_name, error = %e, "Cluster worker panicked");
                    let mut outcome = ClusterOutcome::new(&spec.cluster_name);
                    outcome.report.aborted = Some(e.to_string());
                    outcome
                })
            })
            .collect()
    }
}

impl Worker {
    async fn reconcile(&self, spec: &ClusterSpec, libraries: &[Library]) -> ClusterOutcome {
        let mut outcome = ClusterOutcome::new(&spec.cluster_name);
        let settled = match self.provision(spec, &mut outcome.report).await {
            Ok(cluster_id) => {
                outcome.cluster_id = Some(cluster_id.clone());
                self.wait_until_settled(spec, &cluster_id, &mut outcome.report)
                    .await
                    .map(|state| (cluster_id, state))
            }
            Err(e) => Err(e),
        };

        match settled {
            Ok((cluster_id, state)) => {
                outcome.final_state = Some(state);
                self.reconcile_libraries(spec, &cluster_id, libraries, &mut outcome.report)
                    .await;
            }
            Err(e) => outcome.report = outcome.report.abort(&e),
        }
        outcome
    }

    /// Find or create the cluster, editing it when the live settings drift.
    async fn provision(&self, spec: &ClusterSpec, report: &mut PassReport) -> Result<String> {
        let name = &spec.cluster_name;
        match self.clusters.find_cluster_by_name(name).await? {
            None => {
                info!(cluster = %name, "Cluster missing, creating it");
                let action = ReconcileAction::CreateCluster {
                    cluster_name: name.clone(),
                };
                let cluster_id = match self.clusters.create_cluster(spec).await {
                    Ok(cluster_id) => cluster_id,
                    Err(e) => {
                        report.failed(action, &e);
                        return Err(e);
                    }
                };
                report.taken(action);
                tokio::time::sleep(self.create_settle_delay).await;
                Ok(cluster_id)
            }
            Some(live) if spec.is_subset_of(&live) => {
                info!(cluster = %name, cluster_id = %live.cluster_id, "Cluster settings match");
                Ok(live.cluster_id)
            }
            Some(live) => {
                warn!(cluster = %name, cluster_id = %live.cluster_id, "Cluster settings drifted, editing");
                let action = ReconcileAction::EditCluster {
                    cluster_name: name.clone(),
                    cluster_id: live.cluster_id.clone(),
                };
                match self.clusters.edit_cluster(&live.cluster_id, spec).await {
                    Ok(()) => {
                        report.taken(action);
                        Ok(live.cluster_id)
                    }
                    Err(e) => {
                        report.failed(action, &e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Poll until the cluster leaves the transient and stopped states,
    /// starting it whenever it is terminated. Whatever state ends the wait is
    /// returned as is.
    async fn wait_until_settled(
        &self,
        spec: &ClusterSpec,
        cluster_id: &str,
        report: &mut PassReport,
    ) -> Result<ClusterState> {
        let mut state = self.clusters.get_cluster(cluster_id).await?.state;
        while state.keeps_polling() {
            if state == ClusterState::Terminated {
                info!(cluster_id, "Starting terminated cluster");
                let action = ReconcileAction::StartCluster {
                    cluster_name: spec.cluster_name.clone(),
                    cluster_id: cluster_id.to_string(),
                };
                if let Err(e) = self.clusters.start_cluster(cluster_id).await {
                    report.failed(action, &e);
                    return Err(e);
                }
                report.taken(action);
            } else {
                info!(cluster_id, %state, "Waiting for cluster");
            }
            tokio::time::sleep(self.poll_interval).await;
            state = self.clusters.get_cluster(cluster_id).await?.state;
        }

        info!(cluster_id, %state, "Cluster settled");
        Ok(state)
    }

    /// Install declared libraries that are missing and uninstall the rest.
    async fn reconcile_libraries(
        &self,
        spec: &ClusterSpec,
        cluster_id: &str,
        declared: &[Library],
        report: &mut PassReport,
    ) {
        let current = match self.libraries.cluster_libraries(cluster_id).await {
            Ok(current) => current,
            Err(e) => return report.skip(format!("libraries of {}", spec.cluster_name), &e),
        };

        let install: Vec<Library> = declared
            .iter()
            .filter(|l| !current.contains(l))
            .cloned()
            .collect();
        let uninstall: Vec<Library> = current
            .iter()
            .filter(|l| !declared.contains(l))
            .cloned()
            .collect();

        info!(cluster_id, count = install.len(), "Installing libraries");
        report.record(
            ReconcileAction::InstallLibraries {
                cluster_name: spec.cluster_name.clone(),
                count: install.len(),
            },
            self.libraries.install_libraries(cluster_id, &install).await,
        );

        if !uninstall.is_empty() {
            warn!(cluster_id, libraries = ?uninstall, "Uninstalling undeclared libraries");
        }
        report.record(
            ReconcileAction::UninstallLibraries {
                cluster_name: spec.cluster_name.clone(),
                count: uninstall.len(),
            },
            self.libraries
                .uninstall_libraries(cluster_id, &uninstall)
                .await,
        );
    }
}
