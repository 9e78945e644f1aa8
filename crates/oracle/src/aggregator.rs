//! Aggregator (C4): the consensus core. Signature check, IQR outlier
//! filter, consensus check, (weighted) median, and confidence scoring.
//!
//! Grounded formula-for-formula on `original_source/src/core/aggregator.py`
//! (`aggregate_readings`, `remove_outliers`, `check_consensus`,
//! `calculate_confidence`, `detect_malicious_nodes`): index-based quartiles
//! (not interpolated), and `statistics.variance`'s sample (n-1) convention
//! for the coefficient of variation.

use oracle_core::reading::{AggregationMethod, ConsensusResult, Reading, ReadingValue, SensorType};
use oracle_core::OracleError;

use crate::config::ConsensusConfig;
use crate::crypto::{EcdsaSignature, EcdsaVerifier, PublicKey};

const MALICIOUS_DEVIATION_RATIO: f64 = 0.1;

/// A peer flagged by the malicious-deviation check. The aggregator itself
/// never mutates reputation; it only reports this back to the caller,
/// which (the node orchestration) forwards it to the Reputation component
/// as a `data_quality_low` event.
#[derive(Debug, Clone)]
pub struct MaliciousFlag {
    pub node_id: String,
    pub deviation: f64,
}

pub struct AggregationOutcome {
    pub result: ConsensusResult,
    pub flagged: Vec<MaliciousFlag>,
    pub signature_drops: usize,
}

pub struct Aggregator {
    config: ConsensusConfig,
}

impl Aggregator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// `key_lookup` resolves a claimed `node_id` to its known public key;
    /// readings whose key can't be resolved or whose signature doesn't
    /// verify are dropped before the size gate. `weights` is an optional
    /// reputation-tier weight per `node_id`; when absent, unweighted
    /// median is used.
    pub fn aggregate(
        &self,
        sensor_id: &str,
        sensor_type: SensorType,
        readings: Vec<Reading>,
        key_lookup: impl Fn(&str) -> Option<PublicKey>,
        weights: Option<&std::collections::HashMap<String, f64>>,
    ) -> Result<AggregationOutcome, OracleError> {
        let mut valid: Vec<Reading> = Vec::new();
        let mut signature_drops = 0usize;

        for reading in readings {
            match verify_signature(&reading, &key_lookup) {
                true => valid.push(reading),
                false => signature_drops += 1,
            }
        }

        if valid.len() < self.config.min_nodes {
            return Err(OracleError::InsufficientContributors {
                participants: valid.len(),
                min_nodes: self.config.min_nodes,
            });
        }

        valid.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id).then(a.node_id.cmp(&b.node_id)));

        let outcome = match sensor_type {
            SensorType::Gps => self.aggregate_gps(sensor_id, &valid, weights)?,
            _ => self.aggregate_scalar(sensor_id, &valid, weights)?,
        };

        Ok(AggregationOutcome { signature_drops, ..outcome })
    }

    fn aggregate_scalar(
        &self,
        sensor_id: &str,
        valid: &[Reading],
        weights: Option<&std::collections::HashMap<String, f64>>,
    ) -> Result<AggregationOutcome, OracleError> {
        let values: Vec<f64> = valid.iter().filter_map(|r| r.value.as_scalar()).collect();
        let filtered = remove_outliers(&values);
        let outliers_removed = values.len() - filtered.len();

        if filtered.len() < self.config.min_nodes {
            return Err(OracleError::InsufficientContributors {
                participants: filtered.len(),
                min_nodes: self.config.min_nodes,
            });
        }

        let median = median(&filtered);
        let tau = (median.abs() * self.config.outlier_tolerance).max(self.config.absolute_floor);

        // When weights are available, the consensus ratio is gated on the
        // sum of tier-weights of agreeing readings over the sum of
        // tier-weights of all filtered readings, not a plain count — a
        // `WeightedMedian` result must pass or fail on a weighted ratio.
        let (ratio, final_value, method) = match weights {
            Some(w) => {
                let weighted: Vec<(f64, f64)> = valid
                    .iter()
                    .filter(|r| filtered.contains(&r.value.as_scalar().unwrap_or(f64::NAN)))
                    .map(|r| (r.value.as_scalar().unwrap_or(0.0), tier_weight(*w.get(&r.node_id).unwrap_or(&0.1))))
                    .collect();
                let total_weight: f64 = weighted.iter().map(|(_, wt)| wt).sum();
                let agree_weight: f64 =
                    weighted.iter().filter(|(v, _)| (*v - median).abs() <= tau).map(|(_, wt)| wt).sum();
                let ratio = if total_weight > 0.0 { agree_weight / total_weight } else { 0.0 };
                (ratio, weighted_median(&weighted), AggregationMethod::WeightedMedian)
            }
            None => {
                let agree = filtered.iter().filter(|v| (*v - median).abs() <= tau).count();
                (agree as f64 / filtered.len() as f64, median, AggregationMethod::Median)
            }
        };

        if ratio < self.config.threshold {
            return Err(OracleError::NoConsensus { ratio, threshold: self.config.threshold });
        }

        let confidence = confidence(&filtered);
        let timestamp = valid.iter().map(|r| r.timestamp).max().unwrap_or(0);
        let flagged = detect_malicious(valid, median);

        Ok(AggregationOutcome {
            result: ConsensusResult {
                sensor_id: sensor_id.to_string(),
                value: ReadingValue::Scalar(final_value),
                timestamp,
                confidence,
                nodes_participated: valid.len(),
                outliers_removed,
                method,
            },
            flagged,
            signature_drops: 0,
        })
    }

    fn aggregate_gps(
        &self,
        sensor_id: &str,
        valid: &[Reading],
        weights: Option<&std::collections::HashMap<String, f64>>,
    ) -> Result<AggregationOutcome, OracleError> {
        let lats: Vec<f64> = valid
            .iter()
            .filter_map(|r| match r.value {
                ReadingValue::Gps { lat, .. } => Some(lat),
                _ => None,
            })
            .collect();
        let lons: Vec<f64> = valid
            .iter()
            .filter_map(|r| match r.value {
                ReadingValue::Gps { lon, .. } => Some(lon),
                _ => None,
            })
            .collect();
        let alts: Vec<f64> = valid
            .iter()
            .filter_map(|r| match r.value {
                ReadingValue::Gps { alt, .. } => Some(alt),
                _ => None,
            })
            .collect();
        let accuracies: Vec<f64> = valid
            .iter()
            .filter_map(|r| match r.value {
                ReadingValue::Gps { accuracy, .. } => Some(accuracy),
                _ => None,
            })
            .collect();

        let lat_filtered = remove_outliers(&lats);
        let lon_filtered = remove_outliers(&lons);
        let outliers_removed = (lats.len() - lat_filtered.len()).max(lons.len() - lon_filtered.len());

        if lat_filtered.len() < self.config.min_nodes || lon_filtered.len() < self.config.min_nodes {
            return Err(OracleError::InsufficientContributors {
                participants: lat_filtered.len().min(lon_filtered.len()),
                min_nodes: self.config.min_nodes,
            });
        }

        let lat_median = median(&lat_filtered);
        let lon_median = median(&lon_filtered);
        let tau_lat = (lat_median.abs() * self.config.outlier_tolerance).max(self.config.absolute_floor);
        let tau_lon = (lon_median.abs() * self.config.outlier_tolerance).max(self.config.absolute_floor);

        let agree = lat_filtered
            .iter()
            .zip(lon_filtered.iter())
            .filter(|(la, lo)| (*la - lat_median).abs() <= tau_lat && (*lo - lon_median).abs() <= tau_lon)
            .count();
        let ratio = agree as f64 / lat_filtered.len().min(lon_filtered.len()).max(1) as f64;

        if ratio < self.config.threshold {
            return Err(OracleError::NoConsensus { ratio, threshold: self.config.threshold });
        }

        let _ = weights;
        let confidence = confidence(&lat_filtered).min(confidence(&lon_filtered));
        let timestamp = valid.iter().map(|r| r.timestamp).max().unwrap_or(0);

        Ok(AggregationOutcome {
            result: ConsensusResult {
                sensor_id: sensor_id.to_string(),
                value: ReadingValue::Gps {
                    lat: lat_median,
                    lon: lon_median,
                    alt: median(&alts),
                    accuracy: median(&accuracies),
                },
                timestamp,
                confidence,
                nodes_participated: valid.len(),
                outliers_removed,
                method: AggregationMethod::Median,
            },
            flagged: Vec::new(),
            signature_drops: 0,
        })
    }
}

fn verify_signature(reading: &Reading, key_lookup: &impl Fn(&str) -> Option<PublicKey>) -> bool {
    let Some(public_key) = key_lookup(&reading.node_id) else { return false };
    let Ok(verifier) = EcdsaVerifier::from_public_key(&public_key) else { return false };
    let Ok(signature) = EcdsaSignature::from_der(&reading.signature) else { return false };
    verifier.verify(&reading.signing_bytes(), &signature).is_ok()
}

fn tier_weight(reputation: f64) -> f64 {
    if reputation >= 0.8 {
        1.0
    } else if reputation >= 0.6 {
        0.8
    } else if reputation >= 0.4 {
        0.5
    } else if reputation >= 0.2 {
        0.2
    } else {
        0.1
    }
}

/// IQR outlier filter: index-based quartiles (`Q1 = v[n/4]`, `Q3 = v[3n/4]`),
/// skipped under 4 samples, falling back to the unfiltered set if the
/// filter would empty it.
fn remove_outliers(values: &[f64]) -> Vec<f64> {
    if values.len() < 4 {
        return values.to_vec();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    let filtered: Vec<f64> = values.iter().copied().filter(|v| *v >= lower && *v <= upper).collect();

    if filtered.is_empty() {
        values.to_vec()
    } else {
        filtered
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Weighted median: sorts `(value, weight)` pairs by value, then returns
/// the first value whose cumulative weight share crosses 0.5.
fn weighted_median(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let total: f64 = sorted.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return median(&sorted.iter().map(|(v, _)| *v).collect::<Vec<_>>());
    }

    let mut cumulative = 0.0;
    for (value, weight) in &sorted {
        cumulative += weight;
        if cumulative / total >= 0.5 {
            return *value;
        }
    }
    sorted.last().map(|(v, _)| *v).unwrap_or(0.0)
}

/// `confidence = clamp(1 - cv, 0, 1)` where `cv = sqrt(sample_variance) /
/// |mean|`, matching `statistics.variance`'s n-1 denominator. Single
/// sample: confidence 1.
fn confidence(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 1.0;
    }
    let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    let cv = if mean == 0.0 { 0.0 } else { variance.sqrt() / mean.abs() };
    (1.0 - cv).clamp(0.0, 1.0)
}

/// Flags contributors whose value strays more than 10% of the median from
/// it — stricter than the IQR filter, and a side effect rather than a
/// rejection: it does not change this window's result.
fn detect_malicious(readings: &[Reading], median_value: f64) -> Vec<MaliciousFlag> {
    if readings.len() < 3 {
        return Vec::new();
    }
    let threshold = median_value.abs() * MALICIOUS_DEVIATION_RATIO;
    readings
        .iter()
        .filter_map(|r| {
            let value = r.value.as_scalar()?;
            let deviation = (value - median_value).abs();
            (deviation > threshold).then_some(MaliciousFlag { node_id: r.node_id.clone(), deviation })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EcdsaSigner, KeyPair};
    use oracle_core::reading::Unit;
    use std::collections::HashMap;

    fn signed_reading(sensor_id: &str, node_id: &str, value: f64, ts: u64, signer: &EcdsaSigner) -> Reading {
        let mut r = Reading {
            sensor_id: sensor_id.into(),
            sensor_type: SensorType::Temperature,
            value: ReadingValue::Scalar(value),
            unit: Unit::Celsius,
            timestamp: ts,
            node_id: node_id.into(),
            signature: Vec::new(),
            quality_score: 0.9,
        };
        r.signature = signer.sign(&r.signing_bytes()).to_der().to_vec();
        r
    }

    fn fixture(values: &[f64]) -> (Vec<Reading>, HashMap<String, PublicKey>) {
        let mut readings = Vec::new();
        let mut keys = HashMap::new();
        for (i, v) in values.iter().enumerate() {
            let kp = KeyPair::generate();
            let node_id = format!("node-{i}");
            let signer = EcdsaSigner::new(kp.signing_key().clone());
            readings.push(signed_reading("roof-temp", &node_id, *v, 1_000, &signer));
            keys.insert(node_id, kp.public_key());
        }
        (readings, keys)
    }

    #[test]
    fn test_s1_tight_cluster_reaches_consensus() {
        let (readings, keys) = fixture(&[22.8, 23.0, 23.1, 22.9, 23.2]);
        let agg = Aggregator::new(ConsensusConfig::default());
        let outcome = agg
            .aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None)
            .unwrap();
        assert!((outcome.result.value.as_scalar().unwrap() - 23.0).abs() < 0.2);
        assert_eq!(outcome.result.outliers_removed, 0);
        assert!(outcome.result.confidence > 0.8);
    }

    #[test]
    fn test_s2_outlier_removed_and_flagged() {
        let (readings, keys) = fixture(&[23.0, 23.1, 45.0, 22.9, 23.2]);
        let agg = Aggregator::new(ConsensusConfig::default());
        let outcome = agg
            .aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None)
            .unwrap();
        let value = outcome.result.value.as_scalar().unwrap();
        assert!((22.5..=23.5).contains(&value));
        assert_eq!(outcome.result.outliers_removed, 1);
        assert!(outcome.flagged.iter().any(|f| f.node_id == "node-2"));
    }

    #[test]
    fn test_s3_min_nodes_exact() {
        let (readings, keys) = fixture(&[23.0, 23.1, 22.9]);
        let agg = Aggregator::new(ConsensusConfig::default());
        let outcome = agg
            .aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None)
            .unwrap();
        assert_eq!(outcome.result.nodes_participated, 3);
    }

    #[test]
    fn test_s4_insufficient_contributors() {
        let (readings, keys) = fixture(&[23.0, 23.1]);
        let agg = Aggregator::new(ConsensusConfig::default());
        let result = agg.aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None);
        assert!(matches!(result, Err(OracleError::InsufficientContributors { .. })));
    }

    #[test]
    fn test_s5_no_consensus() {
        let (readings, keys) = fixture(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let agg = Aggregator::new(ConsensusConfig::default());
        let result = agg.aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None);
        assert!(matches!(result, Err(OracleError::NoConsensus { .. })));
    }

    #[test]
    fn test_unresolvable_signature_dropped() {
        let (mut readings, keys) = fixture(&[23.0, 23.1, 22.9]);
        readings.push(signed_reading(
            "roof-temp",
            "unknown-node",
            23.05,
            1_000,
            &EcdsaSigner::new(KeyPair::generate().signing_key().clone()),
        ));
        let agg = Aggregator::new(ConsensusConfig::default());
        let outcome = agg
            .aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), None)
            .unwrap();
        assert_eq!(outcome.signature_drops, 1);
        assert_eq!(outcome.result.nodes_participated, 3);
    }

    #[test]
    fn test_iqr_filter_idempotent() {
        let values = vec![22.8, 23.0, 23.1, 22.9, 23.2, 45.0];
        let once = remove_outliers(&values);
        let twice = remove_outliers(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_weighted_median_favors_higher_weight() {
        let pairs = vec![(10.0, 0.1), (20.0, 1.0), (30.0, 0.1)];
        assert_eq!(weighted_median(&pairs), 20.0);
    }

    #[test]
    fn test_weighted_ratio_uses_weight_sum_not_count() {
        let (readings, keys) = fixture(&[100.0, 100.0, 150.0]);

        // unweighted: 2 of 3 agree (0.667) which is below the 0.8 threshold.
        let agg = Aggregator::new(ConsensusConfig::default());
        let unweighted = agg.aggregate(
            "roof-temp",
            SensorType::Temperature,
            readings.clone(),
            |id| keys.get(id).cloned(),
            None,
        );
        assert!(matches!(unweighted, Err(OracleError::NoConsensus { .. })));

        // weighted: the two agreeing nodes hold nearly all the reputation
        // weight, so the sum-of-weights ratio clears the threshold even
        // though the unweighted count does not.
        let mut weights = HashMap::new();
        weights.insert("node-0".to_string(), 0.9);
        weights.insert("node-1".to_string(), 0.9);
        weights.insert("node-2".to_string(), 0.1);
        let outcome = agg
            .aggregate("roof-temp", SensorType::Temperature, readings, |id| keys.get(id).cloned(), Some(&weights))
            .unwrap();
        assert_eq!(outcome.result.method, AggregationMethod::WeightedMedian);
    }
}
