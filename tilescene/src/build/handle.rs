//! Completion handles for rebuild generations.

use thiserror::Error;
use tokio::sync::oneshot;

/// Why a rebuild did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RebuildError {
    /// A newer rebuild request replaced this one while it was queued.
    ///
    /// The current state is not in error; the newer request will run instead.
    #[error("Rebuild request superseded by a newer request")]
    Superseded,

    /// The scene shut down before the rebuild finished.
    #[error("Scene shut down before the rebuild finished")]
    Shutdown,
}

/// Sending half of a rebuild completion, held by the session.
pub type RebuildCompletion = oneshot::Sender<Result<(), RebuildError>>;

/// Creates a linked completion and handle.
pub fn rebuild_channel() -> (RebuildCompletion, RebuildHandle) {
    let (tx, rx) = oneshot::channel();
    (tx, RebuildHandle { rx })
}

/// Caller's side of a rebuild request.
///
/// Resolves `Ok` when every tile of the generation has reported back.
#[derive(Debug)]
pub struct RebuildHandle {
    rx: oneshot::Receiver<Result<(), RebuildError>>,
}

impl RebuildHandle {
    /// Waits for the generation to finish.
    pub async fn wait(self) -> Result<(), RebuildError> {
        self.rx.await.unwrap_or(Err(RebuildError::Shutdown))
    }

    /// Returns the outcome if it is already known.
    pub fn try_result(&mut self) -> Option<Result<(), RebuildError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RebuildError::Shutdown)),
        }
    }
}
