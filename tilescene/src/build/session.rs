//! Rebuild coalescing state machine.
//!
//! # State Machine
//!
//! ```text
//!                request_rebuild() / tile_build_started()
//!   ┌──────┐ ───────────────────────────────────────────► ┌──────────┐
//!   │ Idle │                                              │ Building │ ◄─┐ request_rebuild():
//!   └──────┘ ◄─────────────────────────────────────────── └──────────┘ ──┘ replace queued,
//!                outstanding set empty (resolve handle,                    reject old one
//!                hand back queued follow-up)
//! ```
//!
//! At most one generation is building and at most one follow-up is queued.

use std::collections::HashSet;

use tracing::debug;

use super::{RebuildCompletion, RebuildError};
use crate::coord::TileKey;

/// Outcome of [`BuildSession::request_rebuild`].
#[derive(Debug, PartialEq, Eq)]
pub enum RebuildStart {
    /// A new generation began; the caller syncs config and dispatches tiles,
    /// then calls [`BuildSession::finish_dispatch`].
    Started,
    /// A generation is already building; the request waits as the follow-up.
    Queued,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Building {
        outstanding: HashSet<TileKey>,
        /// Absent for generations started implicitly by tile loads.
        completion: Option<RebuildCompletion>,
        queued: Option<RebuildCompletion>,
    },
}

/// Tracks in-flight tile builds and coalesces rebuild requests.
#[derive(Debug)]
pub struct BuildSession {
    state: SessionState,
    generation: u64,
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(self.state, SessionState::Building { .. })
    }

    /// Number of generations started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn outstanding_len(&self) -> usize {
        match &self.state {
            SessionState::Building { outstanding, .. } => outstanding.len(),
            SessionState::Idle => 0,
        }
    }

    pub fn is_outstanding(&self, key: &TileKey) -> bool {
        match &self.state {
            SessionState::Building { outstanding, .. } => outstanding.contains(key),
            SessionState::Idle => false,
        }
    }

    /// Whether the building generation was requested through
    /// [`request_rebuild`](Self::request_rebuild) rather than opened by tile loads.
    pub fn is_rebuild(&self) -> bool {
        matches!(
            self.state,
            SessionState::Building {
                completion: Some(_),
                ..
            }
        )
    }

    pub fn has_queued(&self) -> bool {
        matches!(
            self.state,
            SessionState::Building {
                queued: Some(_),
                ..
            }
        )
    }

    /// Requests a new rebuild generation.
    pub fn request_rebuild(&mut self, completion: RebuildCompletion) -> RebuildStart {
        match &mut self.state {
            SessionState::Idle => {
                self.generation += 1;
                debug!(generation = self.generation, "Idle -> Building");
                self.state = SessionState::Building {
                    outstanding: HashSet::new(),
                    completion: Some(completion),
                    queued: None,
                };
                RebuildStart::Started
            }
            SessionState::Building { queued, .. } => {
                if let Some(superseded) = queued.replace(completion) {
                    debug!("Queued rebuild superseded");
                    let _ = superseded.send(Err(RebuildError::Superseded));
                } else {
                    debug!("Rebuild queued behind active generation");
                }
                RebuildStart::Queued
            }
        }
    }

    /// Records that a build for `key` was dispatched.
    pub fn tile_build_started(&mut self, key: TileKey) {
        match &mut self.state {
            SessionState::Idle => {
                self.generation += 1;
                debug!(generation = self.generation, tile = %key, "Idle -> Building (tile load)");
                let mut outstanding = HashSet::new();
                outstanding.insert(key);
                self.state = SessionState::Building {
                    outstanding,
                    completion: None,
                    queued: None,
                };
            }
            SessionState::Building { outstanding, .. } => {
                outstanding.insert(key);
            }
        }
    }

    /// Records that the build for `key` replied, successfully or not.
    ///
    /// When this empties the outstanding set the generation completes and any
    /// queued follow-up is returned; the caller starts it with
    /// [`request_rebuild`](Self::request_rebuild). Keys that are not
    /// outstanding are ignored.
    pub fn tile_build_finished(&mut self, key: &TileKey) -> Option<RebuildCompletion> {
        match &mut self.state {
            SessionState::Building { outstanding, .. } => {
                if !outstanding.remove(key) {
                    return None;
                }
                if outstanding.is_empty() {
                    self.complete()
                } else {
                    None
                }
            }
            SessionState::Idle => None,
        }
    }

    /// Called after a generation's dispatch loop.
    ///
    /// If nothing was dispatched the generation completes immediately and any
    /// queued follow-up is returned.
    pub fn finish_dispatch(&mut self) -> Option<RebuildCompletion> {
        let drained = matches!(
            &self.state,
            SessionState::Building { outstanding, .. } if outstanding.is_empty()
        );
        if drained {
            self.complete()
        } else {
            None
        }
    }

    /// Rejects every pending handle and returns to idle.
    pub fn shutdown(&mut self) {
        if let SessionState::Building {
            completion, queued, ..
        } = std::mem::replace(&mut self.state, SessionState::Idle)
        {
            for tx in completion.into_iter().chain(queued) {
                let _ = tx.send(Err(RebuildError::Shutdown));
            }
        }
    }

    fn complete(&mut self) -> Option<RebuildCompletion> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Building {
                completion, queued, ..
            } => {
                debug!(generation = self.generation, "Building -> Idle");
                if let Some(tx) = completion {
                    let _ = tx.send(Ok(()));
                }
                queued
            }
            SessionState::Idle => None,
        }
    }
}
