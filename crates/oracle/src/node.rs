//! Orchestration: wires the sensor adapters, polling scheduler, peer
//! collector, aggregator, reputation table, stake gate, ledger client, and
//! metrics bus into one running [`OracleNode`].
//!
//! Grounded on `crates/racer/src/node.rs`'s `Node<M>`/`NodeInner<M>` shape:
//! collaborators are constructed once in `new` and held behind
//! `Arc<OracleNodeInner>`, a `running: Arc<AtomicBool>` flag gates every
//! background loop, and `start`/`stop` spawn and abort a fixed set of
//! tasks rather than anything keyed on a dynamic node count.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use oracle_core::reading::{Reading, SensorType};
use oracle_core::OracleError;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;

use crate::aggregator::Aggregator;
use crate::collector::{window_deadline, PeerCollector};
use crate::config::OracleConfig;
use crate::crypto::{EcdsaSigner, KeyPair, PublicKey};
use crate::ledger::LedgerClient;
use crate::metrics::MetricsBus;
use crate::network::{
    Heartbeat, HeartbeatStatus, OracleNetwork, PeerInfo, PeerMessage, PeerRegistry, HEARTBEAT_TOPIC,
};
use crate::reputation::{evaluate_slash, EventKind, ReputationTable, SlashDecision, SlashReason, StakeGate};
use crate::scheduler::{PollingScheduler, WindowedReading};
use crate::util::audit::AuditLogger;

const HEARTBEAT_INTERVAL_SECS: u64 = 60;
const STAKE_CHECK_INTERVAL_SECS: u64 = 300;
const DECAY_INTERVAL_SECS: u64 = 86_400;
const READING_CACHE_RETENTION_WINDOWS: u64 = 4;
const WINDOW_CHANNEL_BUFFER: usize = 64;
const ROUTER_PUBLISHER_PORT_OFFSET: u32 = 1_000;
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

struct OracleNodeInner {
    id: String,
    keys: KeyPair,
    config: OracleConfig,
    network: Arc<OracleNetwork>,
    peers: Arc<AsyncRwLock<PeerRegistry>>,
    reputation: Arc<ReputationTable>,
    stake_gate: Arc<StakeGate>,
    aggregator: Aggregator,
    ledger: Arc<dyn LedgerClient>,
    metrics: Arc<MetricsBus>,
    audit: Option<AuditLogger>,
    collector: PeerCollector,
    recent_readings: Arc<AsyncRwLock<HashMap<(String, u64), Reading>>>,
    sensor_intervals: HashMap<String, u64>,
    running: Arc<AtomicBool>,
    current_stake: AtomicU64,
    successful_submissions: AtomicU64,
    readings_processed: AtomicU64,
    submissions_blocked: AtomicBool,
}

/// A point-in-time snapshot of the node's running state, not wired to any
/// consensus-path logic — consulted by the CLI and whatever external
/// health probe a deployment wants to add.
#[derive(Debug, Clone, Serialize)]
pub struct NodeHealth {
    pub node_id: String,
    pub running: bool,
    pub submissions_blocked: bool,
    pub peers_known: usize,
    pub successful_submissions: u64,
    pub readings_processed: u64,
}

/// The oracle gateway node: one sensor-to-ledger pipeline per process.
pub struct OracleNode {
    inner: Arc<OracleNodeInner>,
    scheduler: AsyncMutex<Option<PollingScheduler>>,
    window_driver_handle: AsyncMutex<Option<JoinHandle<()>>>,
    router_handle: AsyncMutex<Option<JoinHandle<()>>>,
    subscriber_handle: AsyncMutex<Option<JoinHandle<()>>>,
    heartbeat_handle: AsyncMutex<Option<JoinHandle<()>>>,
    maintenance_handle: AsyncMutex<Option<JoinHandle<()>>>,
    window_tasks: Arc<AsyncMutex<Vec<JoinHandle<()>>>>,
}

impl OracleNode {
    /// Builds every collaborator from `config` but does not bind sockets or
    /// spawn any task — that is `start`'s job, so construction alone can be
    /// tested without touching the network.
    pub fn new(config: OracleConfig, ledger: Arc<dyn LedgerClient>) -> Result<Self, OracleError> {
        config.validate()?;

        let keys = KeyPair::generate();
        let id = config.node.id.clone().unwrap_or_else(|| node_id_from_key(&keys));

        let network =
            Arc::new(OracleNetwork::new(config.node.router_bind.clone(), config.node.publisher_bind.clone()));

        let mut registry = PeerRegistry::new();
        registry.set_self_id(id.clone());
        for peer_cfg in &config.peers.peer_nodes {
            let public_key = PublicKey::from_hex(&peer_cfg.public_key)
                .map_err(|e| OracleError::crypto(format!("peer {}: invalid public_key: {e}", peer_cfg.id)))?;
            let subscriber_address = peer_cfg
                .publisher_address
                .clone()
                .unwrap_or_else(|| derive_publisher_address(&peer_cfg.router_address));
            registry.add_peer(PeerInfo::new(
                peer_cfg.id.clone(),
                public_key,
                peer_cfg.router_address.clone(),
                subscriber_address,
            ));
        }
        let peers = Arc::new(AsyncRwLock::new(registry));

        let reputation = Arc::new(ReputationTable::new(config.reputation.clone()));
        let stake_gate = Arc::new(StakeGate::new(config.node.min_stake));
        let aggregator = Aggregator::new(config.consensus.clone());
        let metrics = Arc::new(MetricsBus::new());

        let audit = match AuditLogger::new(config.logging.log_dir.clone(), "audit.jsonl") {
            Ok(logger) => Some(logger),
            Err(e) => {
                tracing::warn!(error = %e, "audit logger unavailable, continuing without an append-only audit trail");
                None
            }
        };

        let max_concurrent_peers = config.peers.peer_nodes.len().max(1);
        let collector = PeerCollector::new(Arc::clone(&network), Arc::clone(&peers), max_concurrent_peers);

        let sensor_intervals: HashMap<String, u64> =
            config.sensors.iter().map(|(id, cfg)| (id.clone(), cfg.polling_interval_secs.max(1))).collect();

        let initial_stake = config.node.initial_stake.unwrap_or(config.node.min_stake);

        let inner = Arc::new(OracleNodeInner {
            id,
            keys,
            config,
            network,
            peers,
            reputation,
            stake_gate,
            aggregator,
            ledger,
            metrics,
            audit,
            collector,
            recent_readings: Arc::new(AsyncRwLock::new(HashMap::new())),
            sensor_intervals,
            running: Arc::new(AtomicBool::new(false)),
            current_stake: AtomicU64::new(initial_stake),
            successful_submissions: AtomicU64::new(0),
            readings_processed: AtomicU64::new(0),
            submissions_blocked: AtomicBool::new(false),
        });

        Ok(Self {
            inner,
            scheduler: AsyncMutex::new(None),
            window_driver_handle: AsyncMutex::new(None),
            router_handle: AsyncMutex::new(None),
            subscriber_handle: AsyncMutex::new(None),
            heartbeat_handle: AsyncMutex::new(None),
            maintenance_handle: AsyncMutex::new(None),
            window_tasks: Arc::new(AsyncMutex::new(Vec::new())),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn metrics_text(&self) -> String {
        self.inner.metrics.export_text()
    }

    pub async fn health(&self) -> NodeHealth {
        NodeHealth {
            node_id: self.inner.id.clone(),
            running: self.inner.running.load(Ordering::SeqCst),
            submissions_blocked: self.inner.submissions_blocked.load(Ordering::SeqCst),
            peers_known: self.inner.peers.read().await.len(),
            successful_submissions: self.inner.successful_submissions.load(Ordering::Relaxed),
            readings_processed: self.inner.readings_processed.load(Ordering::Relaxed),
        }
    }

    /// Binds the network, connects to every configured peer, and spawns the
    /// background task set: one task per sensor (the scheduler's own
    /// tasks), a window-driver task that fans each finished reading out to
    /// its own per-window pipeline, router/subscriber listeners, a
    /// heartbeat publisher, and a decay/stake-check maintenance loop.
    pub async fn start(&self) -> Result<(), OracleError> {
        self.inner.network.bind().await?;
        self.inner.running.store(true, Ordering::SeqCst);

        {
            let peers = self.inner.peers.read().await;
            for peer in peers.iter() {
                self.inner.network.connect_to_peer(&peer.id, &peer.router_address).await?;
                self.inner.network.subscribe_to_peer(&peer.subscriber_address).await?;
            }
        }
        self.inner.network.subscribe_topic(HEARTBEAT_TOPIC).await?;

        if let Err(e) = self.inner.stake_gate.check(self.inner.current_stake.load(Ordering::Relaxed)) {
            tracing::warn!(error = %e, "node starting below minimum stake, submissions blocked until stake recovers");
            self.inner.submissions_blocked.store(true, Ordering::SeqCst);
        }

        let (window_tx, window_rx) = mpsc::channel(WINDOW_CHANNEL_BUFFER);
        let scheduler =
            PollingScheduler::spawn(self.inner.id.clone(), self.inner.config.sensors.clone(), window_tx);
        *self.scheduler.lock().await = Some(scheduler);

        *self.window_driver_handle.lock().await =
            Some(spawn_window_driver(Arc::clone(&self.inner), window_rx, Arc::clone(&self.window_tasks)));
        *self.router_handle.lock().await = Some(spawn_router_listener(Arc::clone(&self.inner)));
        *self.subscriber_handle.lock().await = Some(spawn_subscriber_listener(Arc::clone(&self.inner)));
        *self.heartbeat_handle.lock().await = Some(spawn_heartbeat(Arc::clone(&self.inner)));
        *self.maintenance_handle.lock().await = Some(spawn_maintenance(Arc::clone(&self.inner)));

        tracing::info!(
            id = %self.inner.id,
            router = %self.inner.config.node.router_bind,
            peers = self.inner.peers.read().await.len(),
            "oracle node started"
        );
        Ok(())
    }

    /// Stops every background loop and gives in-flight windows up to
    /// [`STOP_GRACE_PERIOD`] to finish rather than aborting them outright —
    /// a window that already queried peers should still get to submit.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown();
        }
        for handle_slot in [
            &self.router_handle,
            &self.subscriber_handle,
            &self.heartbeat_handle,
            &self.maintenance_handle,
            &self.window_driver_handle,
        ] {
            if let Some(handle) = handle_slot.lock().await.take() {
                handle.abort();
            }
        }

        let tasks = std::mem::take(&mut *self.window_tasks.lock().await);
        let deadline = tokio::time::Instant::now() + STOP_GRACE_PERIOD;
        for task in tasks {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let _ = tokio::time::timeout(remaining, task).await;
        }

        if let Some(audit) = &self.inner.audit {
            audit.shutdown();
        }

        tracing::info!(id = %self.inner.id, "oracle node stopped");
    }
}

fn node_id_from_key(keys: &KeyPair) -> String {
    let hex = keys.public_key().to_hex();
    format!("node-{}", &hex[..8.min(hex.len())])
}

/// Applies the same `router_bind`/`publisher_bind` port-offset convention
/// `NodeConfig`'s own defaults use (30001/31001) to derive a peer's
/// publisher address from its router address when the peer descriptor
/// doesn't supply one explicitly.
fn derive_publisher_address(router_address: &str) -> String {
    match router_address.rsplit_once(':') {
        Some((prefix, port_str)) => match port_str.parse::<u32>() {
            Ok(port) => format!("{prefix}:{}", port + ROUTER_PUBLISHER_PORT_OFFSET),
            Err(_) => router_address.to_string(),
        },
        None => router_address.to_string(),
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn prune_reading_cache(cache: &mut HashMap<(String, u64), Reading>, current_window_ts: u64) {
    let floor = current_window_ts.saturating_sub(READING_CACHE_RETENTION_WINDOWS);
    cache.retain(|(_, window_ts), _| *window_ts >= floor);
}

/// Signs each reading as it comes off the scheduler (the scheduler itself
/// holds no key material), caches it for the router listener to answer
/// peer requests with, then spawns the per-window collect/aggregate/submit
/// pipeline so slow windows never block the next sensor tick.
fn spawn_window_driver(
    inner: Arc<OracleNodeInner>,
    mut rx: mpsc::Receiver<WindowedReading>,
    window_tasks: Arc<AsyncMutex<Vec<JoinHandle<()>>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signer = EcdsaSigner::new(inner.keys.signing_key().clone());

        while let Some(mut windowed) = rx.recv().await {
            windowed.reading.signature = signer.sign(&windowed.reading.signing_bytes()).to_der().to_vec();
            inner.readings_processed.fetch_add(1, Ordering::Relaxed);

            {
                let mut cache = inner.recent_readings.write().await;
                cache.insert((windowed.sensor_id.clone(), windowed.window_ts), windowed.reading.clone());
                prune_reading_cache(&mut cache, windowed.window_ts);
            }

            let mut tasks = window_tasks.lock().await;
            tasks.retain(|h| !h.is_finished());
            tasks.push(tokio::spawn(run_window(Arc::clone(&inner), windowed)));
        }
    })
}

/// One window's full pipeline: fan out to peers, aggregate, update
/// reputation from the outcome, submit to the ledger, and audit-log the
/// result. Independent per `(sensor_id, window_ts)`, so one slow or
/// deadlocked window never stalls another.
async fn run_window(inner: Arc<OracleNodeInner>, windowed: WindowedReading) {
    let sensor_id = windowed.sensor_id.clone();
    let sensor_type = windowed.reading.sensor_type;
    let now = now_secs();

    let interval = inner.sensor_intervals.get(&sensor_id).copied().unwrap_or(30);
    let deadline = window_deadline(interval);

    let (readings, stats) = inner.collector.collect(windowed, deadline).await;

    inner.metrics.increment("peer_windows_total", 1, &[("sensor", &sensor_id)]);
    inner.metrics.set_gauge(
        "peer_collection_peers_answered",
        stats.peers_answered as f64,
        now,
        &[("sensor", &sensor_id)],
    );
    if stats.late_arrivals_dropped > 0 {
        inner.metrics.increment("peer_late_arrivals_total", stats.late_arrivals_dropped, &[("sensor", &sensor_id)]);
    }
    for peer_id in &stats.unanswered_peer_ids {
        inner.reputation.update(peer_id, EventKind::UptimePoor, now, serde_json::json!({ "sensor_id": sensor_id }));
    }

    let weights = inner.reputation.weights_snapshot();
    let key_snapshot = {
        let registry = inner.peers.read().await;
        let mut snapshot: HashMap<String, PublicKey> =
            registry.iter().map(|p| (p.id.clone(), p.ecdsa_public.clone())).collect();
        snapshot.insert(inner.id.clone(), inner.keys.public_key());
        snapshot
    };
    let key_lookup = |node_id: &str| key_snapshot.get(node_id).cloned();

    match inner.aggregator.aggregate(&sensor_id, sensor_type, readings.clone(), key_lookup, Some(&weights)) {
        Ok(outcome) => {
            inner.metrics.increment("consensus_success_total", 1, &[("sensor", &sensor_id)]);
            inner.metrics.set_gauge("consensus_confidence", outcome.result.confidence, now, &[("sensor", &sensor_id)]);
            inner.metrics.set_gauge(
                "consensus_nodes_participated",
                outcome.result.nodes_participated as f64,
                now,
                &[("sensor", &sensor_id)],
            );
            if outcome.signature_drops > 0 {
                inner.metrics.increment("signature_drops_total", outcome.signature_drops as u64, &[("sensor", &sensor_id)]);
            }

            let flagged: std::collections::HashSet<&str> =
                outcome.flagged.iter().map(|f| f.node_id.as_str()).collect();

            for reading in &readings {
                if reading.node_id == inner.id || flagged.contains(reading.node_id.as_str()) {
                    continue;
                }
                inner.reputation.update(
                    &reading.node_id,
                    EventKind::ConsensusSuccess,
                    now,
                    serde_json::json!({ "sensor_id": sensor_id }),
                );
            }
            for flag in &outcome.flagged {
                inner.reputation.update(
                    &flag.node_id,
                    EventKind::DataQualityLow,
                    now,
                    serde_json::json!({ "sensor_id": sensor_id, "deviation": flag.deviation }),
                );
                evaluate_and_apply_slash(&inner, &flag.node_id, SlashReason::DataQualityLow, now).await;
            }

            if let Some(value) = outcome.result.value.as_scalar() {
                match inner.ledger.submit(&sensor_id, value, outcome.result.timestamp).await {
                    Ok(_tx_ref) => {
                        inner.successful_submissions.fetch_add(1, Ordering::Relaxed);
                        inner.metrics.increment("ledger_submissions_total", 1, &[("sensor", &sensor_id)]);
                    }
                    Err(e) => {
                        inner.metrics.increment("ledger_submission_failures_total", 1, &[("sensor", &sensor_id)]);
                        tracing::warn!(sensor_id = %sensor_id, error = %e, "ledger submit failed, window still recorded locally");
                    }
                }
            } else {
                // GPS consensus values are per-axis medians, not a single
                // scalar the ledger's `submit` can quantize; recorded
                // locally only until the ledger interface grows a
                // structured-value path.
                inner.metrics.increment("ledger_submissions_skipped_total", 1, &[("sensor", &sensor_id)]);
            }

            if let Some(audit) = &inner.audit {
                audit.log(&serde_json::json!({
                    "kind": "consensus_result",
                    "sensor_id": sensor_id,
                    "confidence": outcome.result.confidence,
                    "nodes_participated": outcome.result.nodes_participated,
                    "outliers_removed": outcome.result.outliers_removed,
                    "ts": now,
                }));
            }
        }
        Err(e) => {
            inner.metrics.increment("consensus_failures_total", 1, &[("sensor", &sensor_id)]);
            tracing::warn!(sensor_id = %sensor_id, error = %e, "window failed to reach consensus");
            for reading in &readings {
                if reading.node_id != inner.id {
                    inner.reputation.update(
                        &reading.node_id,
                        EventKind::ConsensusFailure,
                        now,
                        serde_json::json!({ "sensor_id": sensor_id }),
                    );
                }
            }
        }
    }
}

/// No peer-voting transport is defined, so vote-gated slash reasons always
/// see zero votes and are rejected here; only the auto-slash reasons (of
/// which the aggregator's malicious-deviation flag maps to
/// [`SlashReason::DataQualityLow`], which is *not* auto-slash) ever clear.
/// This still exercises the full evaluation path and leaves reputation
/// (not stake) as the operative penalty until a vote RPC exists.
async fn evaluate_and_apply_slash(inner: &Arc<OracleNodeInner>, target: &str, reason: SlashReason, now: u64) {
    let proposed_amount = (inner.config.node.min_stake / 10).max(1);
    let target_stake = inner.config.node.min_stake;

    if let SlashDecision::Approved { amount } = evaluate_slash(reason, proposed_amount, target_stake, 0, 0) {
        match inner.ledger.slash(target, amount, &format!("{reason:?}")).await {
            Ok(tx_ref) => {
                inner.stake_gate.record_slash();
                inner.reputation.update(
                    target,
                    EventKind::StakeSlash,
                    now,
                    serde_json::json!({ "tx_ref": tx_ref, "amount": amount }),
                );
                tracing::warn!(target, amount, tx_ref = %tx_ref, "peer slashed");
            }
            Err(e) => tracing::warn!(target, error = %e, "slash submission failed"),
        }
    }
}

/// Serves incoming window requests from peers: looks up whether we hold a
/// matching cached reading and answers either way, never blocking trying
/// to produce one.
fn spawn_router_listener(inner: Arc<OracleNodeInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while inner.running.load(Ordering::SeqCst) {
            match inner.network.recv_router().await {
                Ok((identity, bytes)) => {
                    if let Ok(PeerMessage::Request(request)) = PeerMessage::from_bytes(&bytes) {
                        let reading = inner
                            .recent_readings
                            .read()
                            .await
                            .get(&(request.sensor_id.clone(), request.window_ts))
                            .cloned();
                        inner.collector.answer(identity, request, reading).await;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "router recv failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    })
}

/// Tracks peer heartbeats: a received heartbeat's round-trip-ish delay
/// (now minus its own timestamp) feeds the peer registry's latency
/// tracking used by the collector's capacity decisions.
fn spawn_subscriber_listener(inner: Arc<OracleNodeInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while inner.running.load(Ordering::SeqCst) {
            match inner.network.recv_subscriber().await {
                Ok((topic, bytes)) => {
                    if topic != HEARTBEAT_TOPIC {
                        continue;
                    }
                    if let Ok(heartbeat) = serde_json::from_slice::<Heartbeat>(&bytes) {
                        let latency = now_secs().saturating_sub(heartbeat.ts) as f64;
                        inner.peers.write().await.update_latency(&heartbeat.node_id, latency);
                        if heartbeat.status == HeartbeatStatus::Degraded {
                            tracing::debug!(peer = %heartbeat.node_id, "peer reports degraded status");
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "subscriber recv failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    })
}

fn spawn_heartbeat(inner: Arc<OracleNodeInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while inner.running.load(Ordering::SeqCst) {
            tick.tick().await;
            let status =
                if inner.submissions_blocked.load(Ordering::SeqCst) { HeartbeatStatus::Degraded } else { HeartbeatStatus::Healthy };
            let heartbeat = Heartbeat {
                node_id: inner.id.clone(),
                ts: now_secs(),
                status,
                readings_count: inner.readings_processed.load(Ordering::Relaxed),
                successful_submissions: inner.successful_submissions.load(Ordering::Relaxed),
            };
            let Ok(bytes) = serde_json::to_vec(&heartbeat) else { continue };
            if let Err(e) = inner.network.publish(HEARTBEAT_TOPIC, bytes).await {
                tracing::debug!(error = %e, "heartbeat publish failed");
            }
        }
    })
}

/// Rolls the stake gate's 5-minute check and the reputation table's daily
/// decay into one background loop, feeding both into the metrics bus.
fn spawn_maintenance(inner: Arc<OracleNodeInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stake_tick = tokio::time::interval(Duration::from_secs(STAKE_CHECK_INTERVAL_SECS));
        let mut decay_tick = tokio::time::interval(Duration::from_secs(DECAY_INTERVAL_SECS));
        stake_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        decay_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while inner.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = stake_tick.tick() => {
                    let now = now_secs();
                    let stake = inner.current_stake.load(Ordering::Relaxed);
                    let blocked = inner.stake_gate.check(stake).is_err();
                    inner.submissions_blocked.store(blocked, Ordering::SeqCst);
                    if blocked {
                        tracing::warn!(stake, min_stake = inner.config.node.min_stake, "stake below minimum, submissions blocked");
                    }

                    let security = inner.stake_gate.security_metrics(&inner.reputation, stake);
                    inner.metrics.set_gauge("security_total_staked", security.total_staked as f64, now, &[]);
                    inner.metrics.set_gauge("security_avg_reputation", security.avg_reputation, now, &[]);
                    inner.metrics.set_gauge("security_slashes_last_24h", security.slashes_last_24h as f64, now, &[]);
                    inner.metrics.set_gauge("security_suspicious_count", security.suspicious_count as f64, now, &[]);
                }
                _ = decay_tick.tick() => {
                    inner.reputation.apply_decay(1.0);
                    inner.reputation.cleanup_events(now_secs());
                    inner.stake_gate.reset_daily_counter();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerReading;

    struct NullLedgerClient;

    #[async_trait::async_trait]
    impl LedgerClient for NullLedgerClient {
        async fn submit(&self, sensor_id: &str, _value: f64, _ts: u64) -> Result<String, OracleError> {
            Ok(format!("tx-{sensor_id}"))
        }

        async fn batch_submit(&self, _items: &[(String, f64, u64)]) -> Result<String, OracleError> {
            Ok("tx-batch".to_string())
        }

        async fn get_latest(&self, sensor_id: &str) -> Result<LedgerReading, OracleError> {
            Ok(LedgerReading { sensor_id: sensor_id.to_string(), value: 0.0, ts: 0, block: 0 })
        }

        async fn slash(&self, _target: &str, _amount: u64, _reason: &str) -> Result<String, OracleError> {
            Ok("tx-slash".to_string())
        }

        async fn update_stake(&self, _amount: i64) -> Result<String, OracleError> {
            Ok("tx-stake".to_string())
        }
    }

    fn test_config() -> OracleConfig {
        let mut config = OracleConfig::minimal();
        config.node.router_bind = "tcp://127.0.0.1:0".to_string();
        config.node.publisher_bind = "tcp://127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn test_node_creation() {
        let node = OracleNode::new(test_config(), Arc::new(NullLedgerClient)).unwrap();
        assert!(!node.id().is_empty());
        assert!(!node.health().await.running);
    }

    #[tokio::test]
    async fn test_node_start_stop() {
        let node = OracleNode::new(test_config(), Arc::new(NullLedgerClient)).unwrap();
        node.start().await.unwrap();
        assert!(node.health().await.running);

        node.stop().await;
        assert!(!node.health().await.running);
    }

    #[test]
    fn test_derive_publisher_address_applies_port_offset() {
        assert_eq!(derive_publisher_address("tcp://10.0.0.1:30001"), "tcp://10.0.0.1:31001");
    }

    #[test]
    fn test_derive_publisher_address_leaves_malformed_address_untouched() {
        assert_eq!(derive_publisher_address("not-an-address"), "not-an-address");
    }
}
