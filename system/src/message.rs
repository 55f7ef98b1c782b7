use crate::error::ProtocolError;
use crate::Snapshot;
use serde::{Deserialize, Serialize};

/// Participant → relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Full-surface update; becomes the shared state if nothing newer arrives.
    Snapshot(Snapshot),
    /// Take over clear-authority from whoever holds it.
    RegisterAuthority,
    /// Clear every participant's surface. Dropped unless the sender holds authority.
    ClearRequest,
}

/// Relay → participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once, right after connecting. `None` means the shared surface is empty.
    Init(Option<Snapshot>),
    Snapshot(Snapshot),
    ClearApplied,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        bincode::deserialize(bytes).map_err(ProtocolError::Decode)
    }
}

impl ServerMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        bincode::deserialize(bytes).map_err(ProtocolError::Decode)
    }
}
