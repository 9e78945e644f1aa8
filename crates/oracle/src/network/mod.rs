mod messages;
mod peer;
mod sockets;

pub use messages::{Heartbeat, HeartbeatStatus, PeerMessage, WindowRequest, WindowResponse, HEARTBEAT_TOPIC};
pub use peer::{PeerInfo, PeerRegistry};
pub use sockets::{NetworkError, OracleNetwork};
