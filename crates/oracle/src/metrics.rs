//! Metrics Bus (C7): counters, gauges, and histograms with a Prometheus
//! text exposition, plus the rate/summary helpers the health surface and
//! dashboards consult.
//!
//! Grounded on `original_source/src/monitoring/metrics.py`
//! (`MetricsCollector`): counters, per-metric point deques, histograms,
//! `export_prometheus_metrics`, `get_rate_metric`, `get_metric_summary`.
//! One deliberate departure: `get_percentile` there indexes into a sorted
//! vec (`values[int(p/100 * len)]`); this bus instead interpolates
//! linearly between the two bracketing samples.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

const GAUGE_RETENTION_SECS: u64 = 24 * 3600;
const HISTOGRAM_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct GaugePoint {
    timestamp: u64,
    value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Sorts and joins a label map into a stable `key=value,...` suffix, the
/// same scheme the Python collector uses for its counter dictionary
/// keys, so two calls with the same labels in different orders collide
/// into one series.
fn label_suffix(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&(&str, &str)> = labels.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
    format!("{{{joined}}}")
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    format!("{name}{}", label_suffix(labels))
}

/// Counters, gauges, and histograms, all keyed by `name{labels}`.
/// Counters are monotonic; gauges keep their last 24h of points;
/// histograms keep a fixed-size reservoir of the most recent samples.
pub struct MetricsBus {
    counters: RwLock<HashMap<String, u64>>,
    gauges: RwLock<HashMap<String, Vec<GaugePoint>>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
}

impl MetricsBus {
    pub fn new() -> Self {
        Self { counters: RwLock::new(HashMap::new()), gauges: RwLock::new(HashMap::new()), histograms: RwLock::new(HashMap::new()) }
    }

    pub fn increment(&self, name: &str, by: u64, labels: &[(&str, &str)]) {
        let key = series_key(name, labels);
        *self.counters.write().unwrap().entry(key).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters.read().unwrap().get(&series_key(name, labels)).copied().unwrap_or(0)
    }

    /// Records a gauge point and drops anything older than 24h (relative
    /// to `now`), so the series never grows unbounded even if nobody
    /// calls a dedicated cleanup pass.
    pub fn set_gauge(&self, name: &str, value: f64, now: u64, labels: &[(&str, &str)]) {
        let key = series_key(name, labels);
        let mut gauges = self.gauges.write().unwrap();
        let series = gauges.entry(key).or_default();
        series.push(GaugePoint { timestamp: now, value });
        let cutoff = now.saturating_sub(GAUGE_RETENTION_SECS);
        series.retain(|p| p.timestamp >= cutoff);
    }

    pub fn latest_gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.gauges.read().unwrap().get(&series_key(name, labels)).and_then(|s| s.last()).map(|p| p.value)
    }

    /// Records a histogram sample, keeping only the most recent
    /// `HISTOGRAM_CAPACITY` (1000) values.
    pub fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = series_key(name, labels);
        let mut histograms = self.histograms.write().unwrap();
        let series = histograms.entry(key).or_default();
        series.push(value);
        if series.len() > HISTOGRAM_CAPACITY {
            let drop = series.len() - HISTOGRAM_CAPACITY;
            series.drain(0..drop);
        }
    }

    /// Linear-interpolation percentile: the same shape as numpy's
    /// default, rather than the Python collector's index-truncating
    /// version.
    pub fn percentile(&self, name: &str, p: f64, labels: &[(&str, &str)]) -> f64 {
        let histograms = self.histograms.read().unwrap();
        let Some(series) = histograms.get(&series_key(name, labels)) else { return 0.0 };
        percentile_of(series, p)
    }

    /// Events-per-minute rate over the last `window_secs` of gauge
    /// activity for `name`, based on point count rather than value sum
    /// (mirrors `get_rate_metric`).
    pub fn rate(&self, name: &str, window_secs: u64, now: u64, labels: &[(&str, &str)]) -> f64 {
        let gauges = self.gauges.read().unwrap();
        let Some(series) = gauges.get(&series_key(name, labels)) else { return 0.0 };
        let cutoff = now.saturating_sub(window_secs);
        let recent: Vec<&GaugePoint> = series.iter().filter(|p| p.timestamp >= cutoff).collect();
        if recent.len() < 2 {
            return 0.0;
        }
        let span = recent.last().unwrap().timestamp.saturating_sub(recent.first().unwrap().timestamp);
        if span == 0 {
            return 0.0;
        }
        let per_second = recent.len() as f64 / span as f64;
        (per_second * 60.0 * 100.0).round() / 100.0
    }

    /// Summary over a gauge series restricted to `since_secs` ago.
    pub fn summary(&self, name: &str, since_secs: u64, now: u64, labels: &[(&str, &str)]) -> Option<MetricSummary> {
        let gauges = self.gauges.read().unwrap();
        let series = gauges.get(&series_key(name, labels))?;
        let cutoff = now.saturating_sub(since_secs);
        let values: Vec<f64> = series.iter().filter(|p| p.timestamp >= cutoff).map(|p| p.value).collect();
        if values.is_empty() {
            return None;
        }
        Some(summarize(&values))
    }

    /// Histogram-backed summary (p50/p95/p99 via interpolation).
    pub fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> Option<MetricSummary> {
        let histograms = self.histograms.read().unwrap();
        let series = histograms.get(&series_key(name, labels))?;
        if series.is_empty() {
            return None;
        }
        Some(summarize(series))
    }

    /// Prometheus text exposition: one `# TYPE` + sample line per
    /// counter, the latest value per gauge, and p50/p95/p99 per
    /// histogram.
    pub fn export_text(&self) -> String {
        let mut lines = Vec::new();

        for (key, value) in self.counters.read().unwrap().iter() {
            lines.push(format!("# TYPE {} counter", base_name(key)));
            lines.push(format!("{key} {value}"));
        }

        for (key, series) in self.gauges.read().unwrap().iter() {
            if let Some(latest) = series.last() {
                lines.push(format!("# TYPE {} gauge", base_name(key)));
                lines.push(format!("{key} {}", latest.value));
            }
        }

        for (key, series) in self.histograms.read().unwrap().iter() {
            if series.is_empty() {
                continue;
            }
            let base = base_name(key);
            lines.push(format!("# TYPE {base} histogram"));
            lines.push(format!("{key}_p50 {}", percentile_of(series, 50.0)));
            lines.push(format!("{key}_p95 {}", percentile_of(series, 95.0)));
            lines.push(format!("{key}_p99 {}", percentile_of(series, 99.0)));
        }

        lines.sort();
        lines.join("\n")
    }
}

impl Default for MetricsBus {
    fn default() -> Self {
        Self::new()
    }
}

fn base_name(key: &str) -> &str {
    key.split('{').next().unwrap_or(key)
}

fn percentile_of(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn summarize(values: &[f64]) -> MetricSummary {
    let count = values.len();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / count as f64;
    MetricSummary {
        count,
        min,
        max,
        mean,
        p50: percentile_of(values, 50.0),
        p95: percentile_of(values, 95.0),
        p99: percentile_of(values, 99.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments_and_labels_collide_regardless_of_order() {
        let bus = MetricsBus::new();
        bus.increment("readings_total", 1, &[("sensor", "a"), ("unit", "c")]);
        bus.increment("readings_total", 2, &[("unit", "c"), ("sensor", "a")]);
        assert_eq!(bus.counter("readings_total", &[("sensor", "a"), ("unit", "c")]), 3);
    }

    #[test]
    fn test_gauge_keeps_latest_and_drops_old_points() {
        let bus = MetricsBus::new();
        bus.set_gauge("cpu", 10.0, 0, &[]);
        bus.set_gauge("cpu", 20.0, 100, &[]);
        assert_eq!(bus.latest_gauge("cpu", &[]), Some(20.0));

        bus.set_gauge("cpu", 30.0, 3 * 24 * 3600, &[]);
        let summary = bus.summary("cpu", 999_999_999, 3 * 24 * 3600, &[]).unwrap();
        assert_eq!(summary.count, 1);
    }

    #[test]
    fn test_histogram_reservoir_caps_at_1000() {
        let bus = MetricsBus::new();
        for i in 0..1500 {
            bus.record_histogram("latency_ms", i as f64, &[]);
        }
        let summary = bus.histogram_summary("latency_ms", &[]).unwrap();
        assert_eq!(summary.count, 1000);
        assert_eq!(summary.min, 500.0);
        assert_eq!(summary.max, 1499.0);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let bus = MetricsBus::new();
        for v in [10.0, 20.0, 30.0, 40.0] {
            bus.record_histogram("latency_ms", v, &[]);
        }
        // rank = 0.5 * 3 = 1.5 -> interpolate between index 1 (20) and 2 (30)
        assert!((bus.percentile("latency_ms", 50.0, &[]) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_events_per_minute() {
        let bus = MetricsBus::new();
        for (i, ts) in [0u64, 10, 20, 30, 40].into_iter().enumerate() {
            bus.set_gauge("reading_seen", i as f64, ts, &[]);
        }
        let rate = bus.rate("reading_seen", 60, 40, &[]);
        assert!(rate > 0.0);
    }

    #[test]
    fn test_export_text_contains_expected_type_lines() {
        let bus = MetricsBus::new();
        bus.increment("consensus_attempts_total", 1, &[]);
        bus.set_gauge("consensus_confidence", 0.9, 0, &[]);
        bus.record_histogram("blockchain_latency_ms", 120.0, &[]);

        let text = bus.export_text();
        assert!(text.contains("# TYPE consensus_attempts_total counter"));
        assert!(text.contains("# TYPE consensus_confidence gauge"));
        assert!(text.contains("# TYPE blockchain_latency_ms histogram"));
        assert!(text.contains("blockchain_latency_ms_p50"));
    }

    #[test]
    fn test_summary_empty_series_returns_none() {
        let bus = MetricsBus::new();
        assert!(bus.summary("missing", 60, 0, &[]).is_none());
        assert!(bus.histogram_summary("missing", &[]).is_none());
    }
}
