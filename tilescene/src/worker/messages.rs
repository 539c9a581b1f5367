//! Messages exchanged between the main loop and workers.
//!
//! Requests go to one worker over its own inbox. Replies from every worker
//! share a single outbox and are tagged with the sender's [`WorkerId`]; they
//! are correlated by tile key or request id, never by arrival order.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::WorkerError;
use crate::coord::TileKey;
use crate::source::TileSource;
use crate::tile::{BuiltTile, TileDescriptor};

/// Ordinal of a worker within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u8);

impl WorkerId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A feature record as held in a worker's selection map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Stable identity of the feature within its source.
    pub id: u64,

    /// Layer the feature was read from.
    pub layer: String,

    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(id: u64, layer: impl Into<String>) -> Self {
        Self {
            id,
            layer: layer.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Severity of a forwarded worker log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Request sent from the main loop to one worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Handshake carrying the worker's ordinal.
    Init {
        ordinal: WorkerId,
        ack: oneshot::Sender<Result<WorkerId, WorkerError>>,
    },

    /// Serialized scene config and source. Resets the selection map.
    UpdateConfig {
        config: Arc<str>,
        source: TileSource,
    },

    /// Build the described tile.
    BuildTile(TileDescriptor),

    /// Look up a feature by its selection id.
    GetFeatureSelection { request_id: u64, feature_id: u32 },

    /// Start a named timer.
    Profile(String),

    /// Stop a named timer and report its duration.
    ProfileEnd(String),
}

/// Reply or diagnostic sent from a worker to the main loop.
#[derive(Debug)]
pub enum WorkerEvent {
    TileBuilt {
        worker_id: WorkerId,
        tile: BuiltTile,
        /// Entries in the worker's selection map after this build.
        selection_map_size: usize,
    },

    TileFailed {
        worker_id: WorkerId,
        key: TileKey,
        error: String,
    },

    FeatureSelection {
        worker_id: WorkerId,
        request_id: u64,
        feature: Option<Feature>,
    },

    Log {
        worker_id: WorkerId,
        level: LogLevel,
        parts: Vec<String>,
    },
}

impl WorkerEvent {
    /// Worker that sent this event.
    pub fn worker_id(&self) -> WorkerId {
        match self {
            WorkerEvent::TileBuilt { worker_id, .. }
            | WorkerEvent::TileFailed { worker_id, .. }
            | WorkerEvent::FeatureSelection { worker_id, .. }
            | WorkerEvent::Log { worker_id, .. } => *worker_id,
        }
    }
}
