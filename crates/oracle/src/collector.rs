//! Peer Collector (C3): fans a window's request out to every known peer,
//! collects signed `Reading`s until a deadline, and hands the whole batch
//! (including our own reading) to the Aggregator.

use std::sync::Arc;
use std::time::Duration;

use oracle_core::reading::Reading;
use tokio::sync::Semaphore;

use crate::network::{OracleNetwork, PeerInfo, PeerMessage, PeerRegistry, WindowRequest, WindowResponse};
use crate::scheduler::WindowedReading;

const DEFAULT_WINDOW_DEADLINE_SECS: u64 = 30;
const DEADLINE_EPSILON_SECS: u64 = 1;

/// `T_w = min(interval - epsilon, 30s)`.
pub fn window_deadline(polling_interval_secs: u64) -> Duration {
    let bounded = polling_interval_secs.saturating_sub(DEADLINE_EPSILON_SECS);
    Duration::from_secs(bounded.min(DEFAULT_WINDOW_DEADLINE_SECS).max(1))
}

#[derive(Debug, Default)]
pub struct CollectionStats {
    pub peers_queried: usize,
    pub peers_answered: usize,
    pub late_arrivals_dropped: u64,
    /// Peers that were queried but never answered before the deadline —
    /// fed to Reputation as an `uptime_poor` signal.
    pub unanswered_peer_ids: Vec<String>,
}

pub struct PeerCollector {
    network: Arc<OracleNetwork>,
    registry: Arc<tokio::sync::RwLock<PeerRegistry>>,
    outbound_limit: Arc<Semaphore>,
}

impl PeerCollector {
    pub fn new(
        network: Arc<OracleNetwork>,
        registry: Arc<tokio::sync::RwLock<PeerRegistry>>,
        max_concurrent_peers: usize,
    ) -> Self {
        Self { network, registry, outbound_limit: Arc::new(Semaphore::new(max_concurrent_peers.max(1))) }
    }

    /// Sends the window request to every known peer, then reads from the
    /// dealer socket's inbound channel until either the deadline elapses
    /// or every queried peer has answered. Readings that arrive after the
    /// deadline has already returned are the caller's problem to drop and
    /// count; this method does not keep listening past its own return.
    pub async fn collect(
        &self,
        own_reading: WindowedReading,
        deadline: Duration,
    ) -> (Vec<Reading>, CollectionStats) {
        let peers: Vec<PeerInfo> = {
            let registry = self.registry.read().await;
            registry.iter().cloned().collect()
        };

        let mut stats = CollectionStats { peers_queried: peers.len(), ..Default::default() };
        let mut readings = vec![own_reading.reading];

        if peers.is_empty() {
            return (readings, stats);
        }

        let request = WindowRequest {
            sensor_id: own_reading.sensor_id.clone(),
            window_ts: own_reading.window_ts,
            requester_id: self.registry.read().await.self_id().unwrap_or("").to_string(),
        };

        for peer in &peers {
            let _permit = self.outbound_limit.acquire().await.ok();
            let bytes = match (PeerMessage::Request(request.clone())).to_bytes() {
                Ok(b) => b,
                Err(_) => continue,
            };
            if let Err(e) = self.network.send_to_peer(&peer.id, bytes).await {
                tracing::debug!(peer_id = %peer.id, error = %e, "window request send failed, peer unreachable");
            }
        }

        let deadline_instant = tokio::time::Instant::now() + deadline;
        let expected_sensor = own_reading.sensor_id.clone();
        let mut answered: std::collections::HashSet<String> = std::collections::HashSet::new();

        loop {
            if answered.len() >= peers.len() {
                break;
            }
            let remaining = deadline_instant.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, self.network.recv_dealer()).await {
                Ok(Ok((peer_id, bytes))) => match PeerMessage::from_bytes(&bytes) {
                    Ok(PeerMessage::Response(WindowResponse::Reading(reading))) => {
                        answered.insert(peer_id);
                        stats.peers_answered += 1;
                        if reading.sensor_id == expected_sensor {
                            readings.push(reading);
                        } else {
                            stats.late_arrivals_dropped += 1;
                        }
                    }
                    Ok(PeerMessage::Response(WindowResponse::NotAvailable { .. })) => {
                        answered.insert(peer_id);
                        stats.peers_answered += 1;
                    }
                    _ => {}
                },
                Ok(Err(_)) => break,
                Err(_) => break,
            }
        }

        stats.unanswered_peer_ids =
            peers.iter().map(|p| p.id.clone()).filter(|id| !answered.contains(id)).collect();

        (readings, stats)
    }

    /// Serves an incoming window request from the router socket: looks up
    /// whether we have a matching reading and answers immediately either
    /// way (never blocks trying to produce one).
    pub async fn answer(&self, identity: Vec<u8>, request: WindowRequest, reading: Option<Reading>) {
        let response = match reading {
            Some(r) => WindowResponse::Reading(r),
            None => WindowResponse::NotAvailable { sensor_id: request.sensor_id, window_ts: request.window_ts },
        };
        let msg = PeerMessage::Response(response);
        let Ok(bytes) = msg.to_bytes() else { return };
        if let Err(e) = self.network.send_router_reply(identity, bytes).await {
            tracing::debug!(error = %e, "failed to answer window request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_deadline_caps_at_30s() {
        assert_eq!(window_deadline(120), Duration::from_secs(30));
    }

    #[test]
    fn test_window_deadline_bounded_by_interval() {
        assert_eq!(window_deadline(10), Duration::from_secs(9));
    }

    #[test]
    fn test_window_deadline_never_zero() {
        assert_eq!(window_deadline(1), Duration::from_secs(1));
    }
}
