//! Worker-side runtime.
//!
//! Each worker is a tokio task running [`WorkerRuntime::run`]. It owns its
//! copy of the scene config and a selection map from pick ids to feature
//! records; nothing is shared with the main loop except the channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{BuildError, Feature, LogLevel, WorkerEvent, WorkerId, WorkerRequest};
use crate::config::SceneConfig;
use crate::pick::{SelectionColor, MAX_FEATURE_ID};
use crate::source::TileSource;
use crate::tile::{BuiltTile, TileDebug, TileDescriptor, TileGeometry};

/// Geometry construction, run inside a worker.
///
/// Implementations turn one tile into per-style geometry. They register
/// every selectable feature with the [`BuildContext`] and draw it with the
/// returned color in the pick pass.
pub trait TileBuilder: Send + Sync + 'static {
    /// Called once during the worker's handshake.
    fn init(&self, _worker_id: WorkerId) -> Result<(), String> {
        Ok(())
    }

    fn build(
        &self,
        tile: &TileDescriptor,
        config: &SceneConfig,
        source: &TileSource,
        ctx: &mut BuildContext<'_>,
    ) -> Result<TileGeometry, BuildError>;
}

/// Map from pick ids to feature records, local to one worker.
#[derive(Debug, Default)]
pub struct SelectionMap {
    entries: HashMap<u32, Feature>,
    next_id: u32,
}

impl SelectionMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Stores a feature under the next free 24-bit id.
    pub fn insert(&mut self, feature: Feature) -> u32 {
        let id = self.next_id;
        self.next_id = if self.next_id >= MAX_FEATURE_ID {
            1
        } else {
            self.next_id + 1
        };
        self.entries.insert(id, feature);
        id
    }

    pub fn get(&self, id: u32) -> Option<&Feature> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
    }
}

/// Per-build handle given to a [`TileBuilder`].
pub struct BuildContext<'a> {
    worker_id: WorkerId,
    selection: &'a mut SelectionMap,
    outbox: &'a mpsc::UnboundedSender<WorkerEvent>,
    features: usize,
}

impl<'a> BuildContext<'a> {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Registers a selectable feature and returns the color to draw it with.
    pub fn register_feature(&mut self, feature: Feature) -> SelectionColor {
        self.features += 1;
        let id = self.selection.insert(feature);
        SelectionColor::new(id, self.worker_id)
    }

    /// Counts a feature that takes no part in selection.
    pub fn count_feature(&mut self) {
        self.features += 1;
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// Forwards a log message to the main loop.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.outbox.send(WorkerEvent::Log {
            worker_id: self.worker_id,
            level,
            parts: vec![message.into()],
        });
    }
}

/// State owned by one worker task.
pub struct WorkerRuntime {
    id: WorkerId,
    builder: Arc<dyn TileBuilder>,
    initialized: bool,
    config: Option<(SceneConfig, TileSource)>,
    selection: SelectionMap,
    profiles: HashMap<String, Instant>,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerRuntime {
    pub fn new(
        id: WorkerId,
        builder: Arc<dyn TileBuilder>,
        outbox: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            builder,
            initialized: false,
            config: None,
            selection: SelectionMap::new(),
            profiles: HashMap::new(),
            outbox,
        }
    }

    /// Processes requests until the inbox closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<WorkerRequest>,
        shutdown: CancellationToken,
    ) {
        debug!(worker_id = %self.id, "Worker started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!(worker_id = %self.id, "Worker shutting down");
                    break;
                }

                request = inbox.recv() => {
                    match request {
                        Some(request) => self.handle(request),
                        None => {
                            debug!(worker_id = %self.id, "Worker inbox closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle(&mut self, request: WorkerRequest) {
        match request {
            WorkerRequest::Init { ordinal, ack } => {
                let result = if ordinal != self.id {
                    Err(format!("expected ordinal {}, got {}", self.id, ordinal))
                } else {
                    self.builder.init(self.id)
                };
                let reply = match result {
                    Ok(()) => {
                        self.initialized = true;
                        Ok(self.id)
                    }
                    Err(reason) => Err(super::WorkerError::HandshakeFailed {
                        worker_id: self.id.get(),
                        reason,
                    }),
                };
                let _ = ack.send(reply);
            }

            WorkerRequest::UpdateConfig { config, source } => {
                match SceneConfig::from_json_str(&config) {
                    Ok(parsed) => {
                        self.config = Some((parsed, source));
                    }
                    Err(e) => {
                        self.log(LogLevel::Error, vec![format!("invalid scene config: {}", e)]);
                    }
                }
                self.selection.clear();
                trace!(worker_id = %self.id, "Worker config updated");
            }

            WorkerRequest::BuildTile(tile) => {
                let key = tile.key.clone();
                let event = match self.build(&tile) {
                    Ok(built) => WorkerEvent::TileBuilt {
                        worker_id: self.id,
                        tile: built,
                        selection_map_size: self.selection.len(),
                    },
                    Err(e) => WorkerEvent::TileFailed {
                        worker_id: self.id,
                        key,
                        error: e.to_string(),
                    },
                };
                let _ = self.outbox.send(event);
            }

            WorkerRequest::GetFeatureSelection {
                request_id,
                feature_id,
            } => {
                let _ = self.outbox.send(WorkerEvent::FeatureSelection {
                    worker_id: self.id,
                    request_id,
                    feature: self.selection.get(feature_id).cloned(),
                });
            }

            WorkerRequest::Profile(name) => {
                self.profiles.insert(name, Instant::now());
            }

            WorkerRequest::ProfileEnd(name) => {
                if let Some(start) = self.profiles.remove(&name) {
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    self.log(
                        LogLevel::Info,
                        vec![
                            "profile".to_string(),
                            name,
                            format!("{:.2}ms", elapsed_ms),
                        ],
                    );
                }
            }
        }
    }

    fn build(&mut self, tile: &TileDescriptor) -> Result<BuiltTile, BuildError> {
        if !self.initialized {
            return Err(BuildError::NotInitialized);
        }
        let (config, source) = self.config.as_ref().ok_or(BuildError::NoConfig)?;

        let start = Instant::now();
        let mut ctx = BuildContext {
            worker_id: self.id,
            selection: &mut self.selection,
            outbox: &self.outbox,
            features: 0,
        };
        let geometry = self.builder.build(tile, config, source, &mut ctx)?;
        let features = ctx.features;

        let debug = TileDebug {
            features,
            geometry_bytes: geometry.styles.values().map(|g| g.byte_len()).sum(),
            build_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        Ok(BuiltTile {
            key: tile.key.clone(),
            geometry,
            debug,
        })
    }

    fn log(&self, level: LogLevel, parts: Vec<String>) {
        let _ = self.outbox.send(WorkerEvent::Log {
            worker_id: self.id,
            level,
            parts,
        });
    }
}
