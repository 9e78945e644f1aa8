//! Ledger Client (C6): async submit, confirmation tracking, a TTL cache
//! of reads, and a batch path.
//!
//! Grounded on `original_source/src/blockchain/contract_handler.py`
//! (`submit_data_async`, `_wait_and_log_confirmation`,
//! `get_latest_data_async`, `batch_submit_data`, `_get_from_cache`/
//! `_set_cache`, `get_contract_stats`). The Python class talks to a
//! `Web3Client` collaborator; here that collaborator is the
//! [`LedgerTransport`] trait, so a test double can stand in for the real
//! RPC without this module knowing the wire format (the chain/contract
//! wire protocol itself is out of scope here).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use oracle_core::OracleError;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::config::LedgerConfig;

const DEFAULT_RETRY_BASE_DELAY_SECS: u64 = 2;
const DEFAULT_RETRY_CAP_SECS: u64 = 60;
const RETRY_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    Confirmed,
    Failed,
}

impl SubmissionState {
    /// Enforces the monotonic `pending -> {confirmed|failed}` transition;
    /// `confirmed`/`failed` never move back to `pending`.
    pub fn transition(self, next: SubmissionState) -> Result<SubmissionState, OracleError> {
        match (self, next) {
            (SubmissionState::Pending, _) => Ok(next),
            (a, b) if a == b => Ok(a),
            (a, b) => Err(OracleError::fatal(format!("illegal ledger state transition {a:?} -> {b:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSubmission {
    pub sensor_id: String,
    pub value_q: i64,
    pub ts: u64,
    pub gas_est: u64,
    pub tx_ref: String,
    pub state: SubmissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReading {
    pub sensor_id: String,
    pub value: f64,
    pub ts: u64,
    pub block: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: LedgerReading,
    inserted_at: Instant,
}

/// Quantizes a float reading to an integer using the configured fixed
/// scale (default 100 => 2 decimal places).
pub fn quantize(value: f64, scale: u64) -> i64 {
    (value * scale as f64).round() as i64
}

pub fn dequantize(value_q: i64, scale: u64) -> f64 {
    value_q as f64 / scale.max(1) as f64
}

/// The raw RPC collaborator a real deployment would implement against a
/// chain client. Everything above this trait (caching, retries,
/// confirmation polling) is this module's own responsibility and does
/// not change based on the transport.
#[async_trait::async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn send_transaction(&self, sensor_id: &str, value_q: i64, ts: u64, gas: u64) -> Result<String, OracleError>;
    async fn estimate_gas(&self, sensor_id: &str, item_count: usize) -> Result<u64, OracleError>;
    async fn wait_for_confirmation(&self, tx_ref: &str) -> Result<bool, OracleError>;
    async fn read_latest(&self, sensor_id: &str) -> Result<LedgerReading, OracleError>;
    async fn latest_block(&self) -> Result<u64, OracleError>;
}

/// The client-facing contract (§6): submit/batch_submit/get_latest plus
/// the security-adjacent slash/update_stake operations the Aggregator's
/// slashing protocol and the stake gate drive.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, sensor_id: &str, value: f64, ts: u64) -> Result<String, OracleError>;
    async fn batch_submit(&self, items: &[(String, f64, u64)]) -> Result<String, OracleError>;
    async fn get_latest(&self, sensor_id: &str) -> Result<LedgerReading, OracleError>;
    async fn slash(&self, target: &str, amount: u64, reason: &str) -> Result<String, OracleError>;
    async fn update_stake(&self, amount: i64) -> Result<String, OracleError>;
}

#[derive(Debug, Default)]
struct LedgerStats {
    submissions_total: AtomicU64,
    confirmed: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractStats {
    pub submissions_total: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub cache_hit_rate: f64,
}

/// The submission ledger plus TTL read cache, driving any
/// [`LedgerTransport`]. Owns the background retry queue; `confirm_async`
/// spawns one watcher task per submission rather than a single shared
/// loop, matching the Python handler's `asyncio.create_task` per submit.
pub struct RpcLedgerClient<T: LedgerTransport + 'static> {
    transport: std::sync::Arc<T>,
    config: LedgerConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
    submissions: std::sync::Arc<Mutex<HashMap<String, LedgerSubmission>>>,
    retry_tx: mpsc::Sender<String>,
    stats: std::sync::Arc<LedgerStats>,
    tx_counter: AtomicU64,
    /// Bounds in-flight submissions at `config.submit_queue_capacity`
    /// (default 128); a caller that can't acquire a permit gets
    /// `Overloaded` immediately rather than queueing.
    inflight: Semaphore,
}

impl<T: LedgerTransport + 'static> RpcLedgerClient<T> {
    pub fn new(transport: T, config: LedgerConfig) -> Self {
        let transport = std::sync::Arc::new(transport);
        let submissions = std::sync::Arc::new(Mutex::new(HashMap::new()));
        let stats = std::sync::Arc::new(LedgerStats::default());

        let (retry_tx, retry_rx) = mpsc::channel(RETRY_CHANNEL_BUFFER);
        tokio::spawn(retry_worker(
            retry_rx,
            std::sync::Arc::clone(&transport),
            std::sync::Arc::clone(&submissions),
            std::sync::Arc::clone(&stats),
            config.retry_attempts,
        ));

        let inflight = Semaphore::new(config.submit_queue_capacity.max(1));

        Self {
            transport,
            config,
            cache: Mutex::new(HashMap::new()),
            submissions,
            retry_tx,
            stats,
            tx_counter: AtomicU64::new(0),
            inflight,
        }
    }

    fn next_tx_ref(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::Relaxed);
        format!("tx-{n:x}")
    }

    async fn record_submission(&self, submission: LedgerSubmission) {
        self.submissions.lock().await.insert(submission.tx_ref.clone(), submission);
        self.stats.submissions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Spawns the confirmation watcher: waits up to
    /// `confirm_timeout_secs` for the transport to confirm, then moves
    /// the submission to `Confirmed` or `Failed`. A timed-out wait counts
    /// as failed rather than hanging forever.
    pub fn confirm_async(&self, tx_ref: String) {
        let transport = std::sync::Arc::clone(&self.transport);
        let submissions = std::sync::Arc::clone(&self.submissions);
        let stats = std::sync::Arc::clone(&self.stats);
        let timeout = Duration::from_secs(self.config.confirm_timeout_secs);

        tokio::spawn(async move {
            let confirmed = match tokio::time::timeout(timeout, transport.wait_for_confirmation(&tx_ref)).await {
                Ok(Ok(true)) => true,
                Ok(Ok(false)) | Ok(Err(_)) | Err(_) => false,
            };

            let next_state = if confirmed { SubmissionState::Confirmed } else { SubmissionState::Failed };
            let mut table = submissions.lock().await;
            if let Some(submission) = table.get_mut(&tx_ref) {
                if let Ok(state) = submission.state.transition(next_state) {
                    submission.state = state;
                }
            }
            drop(table);

            if confirmed {
                stats.confirmed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(tx_ref = %tx_ref, "ledger submission confirmed");
            } else {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tx_ref = %tx_ref, "ledger submission failed or timed out");
            }
        });
    }

    pub async fn submission_state(&self, tx_ref: &str) -> Option<SubmissionState> {
        self.submissions.lock().await.get(tx_ref).map(|s| s.state)
    }

    pub fn contract_stats(&self) -> ContractStats {
        let hits = self.stats.cache_hits.load(Ordering::Relaxed);
        let misses = self.stats.cache_misses.load(Ordering::Relaxed);
        let total_reads = hits + misses;
        ContractStats {
            submissions_total: self.stats.submissions_total.load(Ordering::Relaxed),
            confirmed: self.stats.confirmed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            cache_hit_rate: if total_reads == 0 { 0.0 } else { hits as f64 / total_reads as f64 },
        }
    }
}

#[async_trait::async_trait]
impl<T: LedgerTransport + 'static> LedgerClient for RpcLedgerClient<T> {
    async fn submit(&self, sensor_id: &str, value: f64, ts: u64) -> Result<String, OracleError> {
        let Ok(_permit) = self.inflight.try_acquire() else {
            return Err(OracleError::overloaded(format!(
                "submit queue full ({} in flight), rejecting {sensor_id}",
                self.config.submit_queue_capacity
            )));
        };

        let value_q = quantize(value, self.config.scale);
        let gas = self.transport.estimate_gas(sensor_id, 1).await.unwrap_or(self.config.gas_default);
        let tx_ref = self.next_tx_ref();

        match self.transport.send_transaction(sensor_id, value_q, ts, gas).await {
            Ok(confirmed_tx_ref) => {
                self.record_submission(LedgerSubmission {
                    sensor_id: sensor_id.to_string(),
                    value_q,
                    ts,
                    gas_est: gas,
                    tx_ref: confirmed_tx_ref.clone(),
                    state: SubmissionState::Pending,
                })
                .await;
                self.confirm_async(confirmed_tx_ref.clone());
                Ok(confirmed_tx_ref)
            }
            Err(e) => {
                self.record_submission(LedgerSubmission {
                    sensor_id: sensor_id.to_string(),
                    value_q,
                    ts,
                    gas_est: gas,
                    tx_ref: tx_ref.clone(),
                    state: SubmissionState::Pending,
                })
                .await;
                if self.retry_tx.try_send(tx_ref.clone()).is_err() {
                    tracing::warn!(tx_ref = %tx_ref, "retry queue full, submission dropped from retry path");
                }
                Err(OracleError::transient_ledger(format!("submit failed for {sensor_id}: {e}")))
            }
        }
    }

    async fn batch_submit(&self, items: &[(String, f64, u64)]) -> Result<String, OracleError> {
        if items.is_empty() {
            return Ok(String::new());
        }

        let Ok(_permit) = self.inflight.try_acquire() else {
            return Err(OracleError::overloaded(format!(
                "submit queue full ({} in flight), rejecting batch of {}",
                self.config.submit_queue_capacity,
                items.len()
            )));
        };

        let gas = self
            .transport
            .estimate_gas(&items[0].0, items.len())
            .await
            .unwrap_or(self.config.gas_default * items.len() as u64);

        let tx_ref = self.next_tx_ref();
        let first_ts = items.iter().map(|(_, _, ts)| *ts).max().unwrap_or(0);

        match self.transport.send_transaction("batch", 0, first_ts, gas).await {
            Ok(confirmed_tx_ref) => {
                for (sensor_id, value, ts) in items {
                    self.record_submission(LedgerSubmission {
                        sensor_id: sensor_id.clone(),
                        value_q: quantize(*value, self.config.scale),
                        ts: *ts,
                        gas_est: gas / items.len() as u64,
                        tx_ref: confirmed_tx_ref.clone(),
                        state: SubmissionState::Pending,
                    })
                    .await;
                }
                self.confirm_async(confirmed_tx_ref.clone());
                Ok(confirmed_tx_ref)
            }
            Err(e) => Err(OracleError::transient_ledger(format!("batch submit failed: {e}; tx_ref={tx_ref}"))),
        }
    }

    async fn get_latest(&self, sensor_id: &str) -> Result<LedgerReading, OracleError> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(sensor_id) {
                if entry.inserted_at.elapsed() < Duration::from_secs(self.config.cache_ttl_secs) {
                    self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
                cache.remove(sensor_id);
            }
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let reading = self.transport.read_latest(sensor_id).await?;

        self.cache
            .lock()
            .await
            .insert(sensor_id.to_string(), CacheEntry { value: reading.clone(), inserted_at: Instant::now() });

        Ok(reading)
    }

    async fn slash(&self, target: &str, amount: u64, reason: &str) -> Result<String, OracleError> {
        self.transport
            .send_transaction(&format!("slash:{target}:{reason}"), amount as i64, 0, self.config.gas_default)
            .await
    }

    async fn update_stake(&self, amount: i64) -> Result<String, OracleError> {
        self.transport.send_transaction("stake", amount, 0, self.config.gas_default).await
    }
}

/// Reissues failed submissions with bounded exponential backoff (default
/// 5 attempts, 2x growth capped at 60s), matching the scheduler's own
/// backoff shape.
async fn retry_worker<T: LedgerTransport + 'static>(
    mut queue: mpsc::Receiver<String>,
    transport: std::sync::Arc<T>,
    submissions: std::sync::Arc<Mutex<HashMap<String, LedgerSubmission>>>,
    stats: std::sync::Arc<LedgerStats>,
    max_attempts: u32,
) {
    while let Some(tx_ref) = queue.recv().await {
        let submission = submissions.lock().await.get(&tx_ref).cloned();
        let Some(submission) = submission else { continue };

        let mut delay = Duration::from_secs(DEFAULT_RETRY_BASE_DELAY_SECS);
        let mut succeeded = false;

        for attempt in 1..=max_attempts {
            tokio::time::sleep(delay).await;
            match transport
                .send_transaction(&submission.sensor_id, submission.value_q, submission.ts, submission.gas_est)
                .await
            {
                Ok(new_tx_ref) => {
                    let mut table = submissions.lock().await;
                    table.remove(&tx_ref);
                    table.insert(
                        new_tx_ref.clone(),
                        LedgerSubmission { tx_ref: new_tx_ref, ..submission.clone() },
                    );
                    succeeded = true;
                    tracing::info!(sensor_id = %submission.sensor_id, attempt, "ledger retry succeeded");
                    break;
                }
                Err(e) => {
                    tracing::warn!(sensor_id = %submission.sensor_id, attempt, error = %e, "ledger retry failed");
                    delay = (delay * 2).min(Duration::from_secs(DEFAULT_RETRY_CAP_SECS));
                }
            }
        }

        if !succeeded {
            let mut table = submissions.lock().await;
            if let Some(s) = table.get_mut(&tx_ref) {
                if let Ok(state) = s.state.transition(SubmissionState::Failed) {
                    s.state = state;
                }
            }
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
