//! Socket frames and correlation ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{BridgeError, BridgeResult};

/// A JSON frame exchanged with an upstream socket and with the collector.
///
/// Only `id` is ever rewritten; `data` is passed through byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> BridgeResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| BridgeError::Protocol(format!("invalid message envelope: {e}")))
    }

    pub fn encode(&self) -> BridgeResult<String> {
        serde_json::to_string(self)
            .map_err(|e| BridgeError::Protocol(format!("unable to encode message envelope: {e}")))
    }
}

/// Upstream message id qualified with the connection it arrived on.
///
/// Rendered as `"<connection>-<id>"` towards the collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    connection: usize,
    id: String,
}

impl CorrelationId {
    pub fn new(connection: usize, id: impl Into<String>) -> Self {
        Self {
            connection,
            id: id.into(),
        }
    }

    pub fn connection(&self) -> usize {
        self.connection
    }

    /// The id as the upstream sent it.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.connection, self.id)
    }
}

impl FromStr for CorrelationId {
    type Err = BridgeError;

    /// Splits on the first `-`; everything after it is the upstream id.
    fn from_str(tagged: &str) -> Result<Self, Self::Err> {
        let (index, id) = tagged.split_once('-').ok_or_else(|| {
            BridgeError::Protocol(format!("message id {tagged:?} has no connection prefix"))
        })?;
        let connection = index.parse::<usize>().map_err(|_| {
            BridgeError::Protocol(format!("message id {tagged:?} has an invalid connection index"))
        })?;
        Ok(Self::new(connection, id))
    }
}

/// An envelope paired with its qualified id.
#[derive(Debug, Clone)]
pub struct CorrelatedMessage {
    pub id: CorrelationId,
    pub envelope: Envelope,
}

impl CorrelatedMessage {
    /// Qualify a frame received on `connection`.
    pub fn inbound(connection: usize, envelope: Envelope) -> Self {
        Self {
            id: CorrelationId::new(connection, envelope.id.clone()),
            envelope,
        }
    }

    /// Parse a collector answer carrying a qualified id.
    pub fn from_collector(bytes: &[u8]) -> BridgeResult<Self> {
        let envelope = Envelope::decode(bytes)?;
        let id = envelope.id.parse::<CorrelationId>()?;
        Ok(Self { id, envelope })
    }

    /// Frame for the collector: id replaced by its qualified form.
    pub fn to_collector_frame(&self) -> BridgeResult<String> {
        let mut envelope = self.envelope.clone();
        envelope.id = self.id.to_string();
        envelope.encode()
    }

    /// Frame for the upstream: id restored to the original form.
    pub fn to_upstream_frame(&self) -> BridgeResult<String> {
        let mut envelope = self.envelope.clone();
        envelope.id = self.id.id().to_string();
        envelope.encode()
    }
}
