//! Wire messages carried over the router/dealer and pub/sub socket pairs.

use oracle_core::reading::Reading;
use serde::{Deserialize, Serialize};

/// `GET /window?sensor_id=..&window_ts=..`, sent dealer-to-router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRequest {
    pub sensor_id: String,
    pub window_ts: u64,
    pub requester_id: String,
}

/// The peer's signed contribution for that window, or an explicit refusal
/// (no reading for that sensor/window yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WindowResponse {
    Reading(Reading),
    NotAvailable { sensor_id: String, window_ts: u64 },
}

/// Published every 60s on the node's heartbeat topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub node_id: String,
    pub ts: u64,
    pub status: HeartbeatStatus,
    pub readings_count: u64,
    pub successful_submissions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Healthy,
    Degraded,
}

pub const HEARTBEAT_TOPIC: &str = "heartbeat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeerMessage {
    Request(WindowRequest),
    Response(WindowResponse),
}

impl PeerMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::reading::{ReadingValue, SensorType, Unit};

    #[test]
    fn test_request_roundtrip() {
        let req = WindowRequest { sensor_id: "roof-temp".into(), window_ts: 42, requester_id: "node-a".into() };
        let msg = PeerMessage::Request(req);
        let bytes = msg.to_bytes().unwrap();
        let parsed = PeerMessage::from_bytes(&bytes).unwrap();
        match parsed {
            PeerMessage::Request(r) => assert_eq!(r.window_ts, 42),
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_response_roundtrip() {
        let reading = Reading {
            sensor_id: "roof-temp".into(),
            sensor_type: SensorType::Temperature,
            value: ReadingValue::Scalar(21.5),
            unit: Unit::Celsius,
            timestamp: 1_000,
            node_id: "node-b".into(),
            signature: vec![9, 9],
            quality_score: 0.9,
        };
        let msg = PeerMessage::Response(WindowResponse::Reading(reading));
        let bytes = msg.to_bytes().unwrap();
        let parsed = PeerMessage::from_bytes(&bytes).unwrap();
        match parsed {
            PeerMessage::Response(WindowResponse::Reading(r)) => assert_eq!(r.sensor_id, "roof-temp"),
            _ => panic!("expected response"),
        }
    }
}
