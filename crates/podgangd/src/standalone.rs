//! Standalone mode — replay a recorded event feed against an in-process
//! cluster simulation.
//!
//! Nodes offer a fixed number of pod slots. `SlotScheduler` places each pod
//! on the node with the most free slots and `SimulatedBinder` reports every
//! binding back as a "pod assigned" update, so groups drain and retire the
//! way they would against a live cluster.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use podgang_core::{
    ClusterEvent, EngineSettings, NodeSnapshot, PodGangConfig, PodSnapshot, WatchEvent,
    is_assigned_non_terminated,
};
use podgang_scheduler::{
    BindError, Binder, Binding, BoxFuture, GangScheduler, GenericScheduler, PodCondition,
    PodConditionUpdater, ScheduleError, SchedulingGroupEngine,
};

use crate::feed;

/// Options for a standalone run.
#[derive(Debug, Clone)]
pub struct StandaloneOptions {
    pub events: PathBuf,
    pub config: Option<PathBuf>,
    pub scheduler_name: Option<String>,
    /// Stop after this long; otherwise run until Ctrl-C.
    pub run_for: Option<Duration>,
}

/// What a standalone run did.
#[derive(Debug, Clone, Default)]
pub struct StandaloneReport {
    pub applied: usize,
    pub skipped: usize,
    pub bindings: Vec<Binding>,
    /// Groups still waiting when the run stopped.
    pub remaining_groups: Vec<String>,
}

/// Pods placed per node by the simulation.
#[derive(Debug, Default)]
pub struct SlotLedger {
    used: Mutex<HashMap<String, u32>>,
}

impl SlotLedger {
    pub async fn used(&self, node: &str) -> u32 {
        self.used.lock().await.get(node).copied().unwrap_or(0)
    }

    async fn claim(&self, node: &str) {
        *self.used.lock().await.entry(node.to_string()).or_insert(0) += 1;
    }

    async fn release(&self, node: &str) {
        if let Some(used) = self.used.lock().await.get_mut(node) {
            *used = used.saturating_sub(1);
        }
    }

    /// Account for pods the feed reports as already running on a node.
    pub async fn observe(&self, event: &ClusterEvent) {
        let ClusterEvent::Pod(watch) = event else {
            return;
        };
        let (before, after) = match watch {
            WatchEvent::Added { object } => (None, Some(object)),
            WatchEvent::Updated { old, new } => (Some(old), Some(new)),
            WatchEvent::Deleted { object } => (Some(object), None),
        };
        let holds = |pod: Option<&PodSnapshot>| {
            pod.filter(|p| is_assigned_non_terminated(p))
                .and_then(|p| p.node_name.clone())
        };

        let (was, now) = (holds(before), holds(after));
        if was == now {
            return;
        }
        if let Some(node) = was {
            self.release(&node).await;
        }
        if let Some(node) = now {
            self.claim(&node).await;
        }
    }
}

/// Generic scheduler stand-in: most free pod slots wins, ties by name.
pub struct SlotScheduler {
    ledger: Arc<SlotLedger>,
}

impl SlotScheduler {
    pub fn new(ledger: Arc<SlotLedger>) -> Self {
        Self { ledger }
    }
}

impl GenericScheduler for SlotScheduler {
    fn schedule<'a>(
        &'a self,
        pod: &'a PodSnapshot,
        nodes: &'a [NodeSnapshot],
    ) -> BoxFuture<'a, Result<String, ScheduleError>> {
        Box::pin(async move {
            if nodes.is_empty() {
                return Err(ScheduleError::NoNodesAvailable);
            }

            let mut best: Option<(&str, u32)> = None;
            for node in nodes {
                let free = node.pod_capacity.saturating_sub(self.ledger.used(&node.name).await);
                if free == 0 {
                    continue;
                }
                if best.is_none_or(|(_, most)| free > most) {
                    best = Some((node.name.as_str(), free));
                }
            }

            best.map(|(name, _)| name.to_string())
                .ok_or_else(|| ScheduleError::NoFit {
                    pod: pod.key(),
                    reason: format!("0/{} nodes have a free pod slot", nodes.len()),
                })
        })
    }
}

/// Binder stand-in: claims the slot and emits the assignment update.
pub struct SimulatedBinder {
    engine: Arc<SchedulingGroupEngine>,
    ledger: Arc<SlotLedger>,
    assigned: mpsc::UnboundedSender<ClusterEvent>,
    bindings: Mutex<Vec<Binding>>,
}

impl SimulatedBinder {
    pub fn new(
        engine: Arc<SchedulingGroupEngine>,
        ledger: Arc<SlotLedger>,
        assigned: mpsc::UnboundedSender<ClusterEvent>,
    ) -> Self {
        Self {
            engine,
            ledger,
            assigned,
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub async fn bindings(&self) -> Vec<Binding> {
        self.bindings.lock().await.clone()
    }
}

impl Binder for SimulatedBinder {
    fn bind<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, Result<(), BindError>> {
        Box::pin(async move {
            let key = binding.pod_key();
            let Some(pod) = self.engine.in_flight_pod(&key).await else {
                return Err(BindError {
                    pod: key,
                    node: binding.node_name.clone(),
                    reason: "pod is not awaiting a binding".to_string(),
                });
            };

            self.ledger.claim(&binding.node_name).await;
            self.bindings.lock().await.push(binding.clone());
            info!(pod = %key, node = %binding.node_name, "pod bound");

            let assigned = pod.assigned_to(&binding.node_name);
            if self
                .assigned
                .send(ClusterEvent::pod_updated(pod, assigned))
                .is_err()
            {
                debug!(pod = %key, "event sink closed, assignment not reported");
            }
            Ok(())
        })
    }
}

/// Logs unschedulable conditions instead of writing pod status.
pub struct LoggedConditions;

impl PodConditionUpdater for LoggedConditions {
    fn update<'a>(
        &'a self,
        pod: &'a PodSnapshot,
        condition: &'a PodCondition,
    ) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            warn!(
                pod = %pod.key(),
                condition = %condition.condition_type,
                reason = %condition.reason,
                message = %condition.message,
                "pod condition updated"
            );
            Ok(())
        })
    }
}

/// Resolve settings from the optional config file and CLI override.
pub fn resolve_settings(options: &StandaloneOptions) -> anyhow::Result<EngineSettings> {
    let mut settings = match &options.config {
        Some(path) => {
            let settings = PodGangConfig::from_file(path)?.settings();
            info!(path = ?path, "configuration loaded");
            settings
        }
        None => EngineSettings::default(),
    };
    if let Some(name) = &options.scheduler_name {
        settings.scheduler_name = name.clone();
    }
    Ok(settings)
}

/// Run the simulation until Ctrl-C or `run_for` elapses.
pub async fn run_standalone(options: StandaloneOptions) -> anyhow::Result<StandaloneReport> {
    let settings = resolve_settings(&options)?;
    info!(
        scheduler = %settings.scheduler_name,
        requeue_delay = ?settings.requeue_delay,
        retry_workers = settings.retry_workers,
        "PodGang daemon starting in standalone mode"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let engine = Arc::new(SchedulingGroupEngine::new(settings));
    let ledger = Arc::new(SlotLedger::default());
    let (assigned_tx, mut assigned_rx) = mpsc::unbounded_channel();
    let binder = Arc::new(SimulatedBinder::new(
        engine.clone(),
        ledger.clone(),
        assigned_tx,
    ));

    let scheduler = GangScheduler::new(
        engine.clone(),
        Arc::new(SlotScheduler::new(ledger.clone())),
        binder.clone(),
    )
    .with_condition_updater(Arc::new(LoggedConditions));

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut watch_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    // Assignment updates flow back in like watch notifications.
    let watch_handle = {
        let engine = engine.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = assigned_rx.recv() => match event {
                        Some(event) => engine.handle_event(event).await,
                        None => break,
                    },
                    _ = watch_shutdown.changed() => {
                        debug!("assignment watcher shutting down");
                        break;
                    }
                }
            }
        })
    };

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    let outcome = async {
        let stats = feed::replay(&options.events, &engine, &ledger).await?;

        // ── Wait for the stop condition ────────────────────────

        match options.run_for {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => info!(?limit, "run time elapsed"),
                    res = tokio::signal::ctrl_c() => {
                        res?;
                        info!("shutdown signal received");
                    }
                }
            }
            None => {
                tokio::signal::ctrl_c().await?;
                info!("shutdown signal received");
            }
        }
        Ok::<_, anyhow::Error>(stats)
    }
    .await;

    // Background tasks are stopped on every exit path, errors included.
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task failed");
    }
    if let Err(e) = watch_handle.await {
        error!(error = %e, "assignment watcher task failed");
    }

    let stats = outcome?;

    let report = StandaloneReport {
        applied: stats.applied,
        skipped: stats.skipped,
        bindings: binder.bindings().await,
        remaining_groups: engine.group_ids().await,
    };
    info!(
        bindings = report.bindings.len(),
        remaining_groups = report.remaining_groups.len(),
        "PodGang daemon stopped"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use podgang_core::GROUP_ANNOTATION;

    fn ledger_with(used: &[(&str, u32)]) -> Arc<SlotLedger> {
        let ledger = SlotLedger::default();
        {
            let mut map = ledger.used.try_lock().unwrap();
            for (node, n) in used {
                map.insert(node.to_string(), *n);
            }
        }
        Arc::new(ledger)
    }

    #[tokio::test]
    async fn slot_scheduler_prefers_most_free_slots() {
        let scheduler = SlotScheduler::new(ledger_with(&[("n1", 3)]));
        let nodes = vec![NodeSnapshot::new("n1", 4), NodeSnapshot::new("n2", 2)];
        let pod = PodSnapshot::new("ns", "a");
        assert_eq!(scheduler.schedule(&pod, &nodes).await.unwrap(), "n2");
    }

    #[tokio::test]
    async fn slot_scheduler_breaks_ties_by_name() {
        let scheduler = SlotScheduler::new(ledger_with(&[]));
        let nodes = vec![NodeSnapshot::new("a", 2), NodeSnapshot::new("b", 2)];
        let pod = PodSnapshot::new("ns", "a");
        assert_eq!(scheduler.schedule(&pod, &nodes).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn slot_scheduler_reports_why_nothing_fits() {
        let scheduler = SlotScheduler::new(ledger_with(&[("n1", 1)]));
        let pod = PodSnapshot::new("ns", "a");

        assert_eq!(
            scheduler.schedule(&pod, &[]).await.unwrap_err(),
            ScheduleError::NoNodesAvailable
        );
        let full = vec![NodeSnapshot::new("n1", 1)];
        assert!(matches!(
            scheduler.schedule(&pod, &full).await.unwrap_err(),
            ScheduleError::NoFit { .. }
        ));
    }

    #[tokio::test]
    async fn ledger_tracks_pods_already_running() {
        let ledger = SlotLedger::default();
        let running = PodSnapshot::new("ns", "a").assigned_to("n1");
        ledger.observe(&ClusterEvent::pod_added(running.clone())).await;
        ledger.observe(&ClusterEvent::pod_added(PodSnapshot::new("ns", "b"))).await;
        assert_eq!(ledger.used("n1").await, 1);

        let mut finished = running.clone();
        finished.phase = podgang_core::PodPhase::Succeeded;
        ledger.observe(&ClusterEvent::pod_updated(running, finished.clone())).await;
        assert_eq!(ledger.used("n1").await, 0);

        ledger.observe(&ClusterEvent::pod_deleted(finished)).await;
        assert_eq!(ledger.used("n1").await, 0);
    }

    #[tokio::test]
    async fn simulated_binder_reports_assignment() {
        let engine = Arc::new(SchedulingGroupEngine::new(EngineSettings::default()));
        engine
            .handle_event(ClusterEvent::pod_added(PodSnapshot::new("ns", "a")))
            .await;
        engine.mark_in_flight("ns/a", "ns/a").await.unwrap();

        let ledger = Arc::new(SlotLedger::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let binder = SimulatedBinder::new(engine.clone(), ledger.clone(), tx);

        let binding = Binding {
            pod_namespace: "ns".to_string(),
            pod_name: "a".to_string(),
            node_name: "n1".to_string(),
        };
        binder.bind(&binding).await.unwrap();
        assert_eq!(ledger.used("n1").await, 1);
        assert_eq!(binder.bindings().await, vec![binding]);

        let event = rx.recv().await.unwrap();
        engine.handle_event(event).await;
        assert_eq!(engine.group_count().await, 0);
    }

    #[tokio::test]
    async fn simulated_binder_rejects_unknown_pods() {
        let engine = Arc::new(SchedulingGroupEngine::new(EngineSettings::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let binder = SimulatedBinder::new(engine, Arc::new(SlotLedger::default()), tx);

        let binding = Binding {
            pod_namespace: "ns".to_string(),
            pod_name: "ghost".to_string(),
            node_name: "n1".to_string(),
        };
        assert!(binder.bind(&binding).await.is_err());
    }

    #[test]
    fn cli_name_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nname = \"from-file\"\nrequeue_delay = \"250ms\"").unwrap();

        let mut options = StandaloneOptions {
            events: PathBuf::from("unused.jsonl"),
            config: Some(file.path().to_path_buf()),
            scheduler_name: None,
            run_for: None,
        };
        let settings = resolve_settings(&options).unwrap();
        assert_eq!(settings.scheduler_name, "from-file");
        assert_eq!(settings.requeue_delay, Duration::from_millis(250));

        options.scheduler_name = Some("from-cli".to_string());
        assert_eq!(resolve_settings(&options).unwrap().scheduler_name, "from-cli");
    }

    #[tokio::test]
    async fn unreadable_feed_stops_background_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            run_standalone(StandaloneOptions {
                events: dir.path().join("missing.jsonl"),
                config: None,
                scheduler_name: None,
                run_for: Some(Duration::from_secs(60)),
            }),
        )
        .await
        .expect("run returned promptly");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn replayed_feed_is_scheduled_to_completion() {
        let gang = |name: &str, role: &str| {
            let annotation = format!(
                r#"{{"Group":"train","Role":"{role}","MinReplicas":1,"MaxReplicas":2,"Priority":1,"RoleCount":2}}"#
            );
            let pod = PodSnapshot::new("jobs", name).with_annotation(GROUP_ANNOTATION, &annotation);
            serde_json::to_string(&ClusterEvent::pod_added(pod)).unwrap()
        };

        let mut feed = tempfile::NamedTempFile::new().unwrap();
        writeln!(feed, r#"{{"kind":"node","type":"added","object":{{"name":"n1","pod_capacity":2}}}}"#).unwrap();
        writeln!(feed, r#"{{"kind":"node","type":"added","object":{{"name":"n2","pod_capacity":2}}}}"#).unwrap();
        writeln!(feed, "{}", gang("ps-0", "ps")).unwrap();
        writeln!(feed, "{}", gang("worker-0", "worker")).unwrap();
        writeln!(feed, "{}", gang("worker-1", "worker")).unwrap();
        writeln!(feed, "garbage").unwrap();

        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "[scheduler]\nrequeue_delay = \"10ms\"").unwrap();

        let report = run_standalone(StandaloneOptions {
            events: feed.path().to_path_buf(),
            config: Some(config.path().to_path_buf()),
            scheduler_name: None,
            run_for: Some(Duration::from_millis(300)),
        })
        .await
        .unwrap();

        assert_eq!(report.applied, 5);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.bindings.len(), 3);
        assert!(report.remaining_groups.is_empty());

        let mut per_node: HashMap<String, usize> = HashMap::new();
        for binding in &report.bindings {
            *per_node.entry(binding.node_name.clone()).or_default() += 1;
        }
        assert!(per_node.values().all(|&n| n <= 2));
    }
}
