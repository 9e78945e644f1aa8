//! At-most-one-in-flight, drift-bounded polling of each configured sensor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oracle_core::reading::Reading;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::adapter::{Adapter, SampleSource};
use crate::config::SensorConfig;

const BACKOFF_CAP_SECS: u64 = 60;

/// A successful reading tagged with the window it belongs to
/// (`timestamp / polling_interval_secs`, integer division).
#[derive(Debug, Clone)]
pub struct WindowedReading {
    pub sensor_id: String,
    pub window_ts: u64,
    pub reading: Reading,
}

#[derive(Default)]
pub struct SensorTaskStats {
    pub dropped_ticks: AtomicU64,
    pub transient_failures: AtomicU64,
}

pub struct SensorTaskHandle {
    pub sensor_id: String,
    pub stats: Arc<SensorTaskStats>,
    join: JoinHandle<()>,
}

impl SensorTaskHandle {
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Spawns one polling task per sensor. Each task ticks on its own
/// interval, skips a tick outright if the previous read/validate/transform
/// is still in flight (rather than queueing it), and backs off
/// exponentially (capped at 60s) after a transient adapter failure.
pub struct PollingScheduler {
    handles: Vec<SensorTaskHandle>,
}

impl PollingScheduler {
    pub fn spawn(
        node_id: String,
        sensors: impl IntoIterator<Item = (String, SensorConfig)>,
        output: mpsc::Sender<WindowedReading>,
    ) -> Self {
        let mut handles = Vec::new();

        for (sensor_id, config) in sensors {
            let stats = Arc::new(SensorTaskStats::default());
            let source = crate::adapter::SimulatedSampleSource::new(config.adapter, &config);
            let adapter = Adapter::from_config(&sensor_id, &config);

            let join = spawn_sensor_task(
                sensor_id.clone(),
                node_id.clone(),
                adapter,
                source,
                output.clone(),
                Arc::clone(&stats),
            );

            handles.push(SensorTaskHandle { sensor_id, stats, join });
        }

        Self { handles }
    }

    pub fn handles(&self) -> &[SensorTaskHandle] {
        &self.handles
    }

    pub fn shutdown(&self) {
        for h in &self.handles {
            h.abort();
        }
    }
}

fn spawn_sensor_task(
    sensor_id: String,
    node_id: String,
    mut adapter: Adapter,
    source: impl SampleSource + 'static,
    output: mpsc::Sender<WindowedReading>,
    stats: Arc<SensorTaskStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval_secs = adapter.polling_interval_secs().max(1);
        let permit = Arc::new(Semaphore::new(1));
        let mut backoff_secs = 0u64;
        let mut tick = tokio::time::interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            if backoff_secs > 0 {
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let Ok(_guard) = permit.clone().try_acquire_owned() else {
                stats.dropped_ticks.fetch_add(1, Ordering::Relaxed);
                continue;
            };

            let sample = source.sample();
            match adapter.build_reading(&sensor_id, &node_id, &sample) {
                Ok(reading) => {
                    backoff_secs = 0;
                    let window_ts = reading.timestamp / interval_secs;
                    let windowed = WindowedReading { sensor_id: sensor_id.clone(), window_ts, reading };
                    if output.send(windowed).await.is_err() {
                        tracing::debug!(sensor_id = %sensor_id, "collector channel closed, stopping poll task");
                        break;
                    }
                }
                Err(e) => {
                    stats.transient_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(sensor_id = %sensor_id, error = %e, "sensor read failed");
                    backoff_secs = if backoff_secs == 0 { 2 } else { (backoff_secs * 2).min(BACKOFF_CAP_SECS) };
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;

    #[tokio::test]
    async fn test_scheduler_produces_readings() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut sensors = Vec::new();
        let mut cfg = SensorConfig::default();
        cfg.polling_interval_secs = 1;
        sensors.push(("roof-temp".to_string(), cfg));

        let scheduler = PollingScheduler::spawn("node-a".to_string(), sensors, tx);

        let received = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        assert!(received.is_ok());
        let windowed = received.unwrap().unwrap();
        assert_eq!(windowed.sensor_id, "roof-temp");

        scheduler.shutdown();
    }
}
