//! Fixed-size pool of worker tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::runtime::{TileBuilder, WorkerRuntime};
use super::{WorkerError, WorkerEvent, WorkerId, WorkerRequest};
use crate::config::MAX_WORKERS;

/// Strict round-robin cursor over `len` slots.
#[derive(Debug, Clone)]
pub struct RoundRobin {
    len: usize,
    cursor: usize,
}

impl RoundRobin {
    pub fn new(len: usize) -> Self {
        Self { len, cursor: 0 }
    }

    /// Returns the next slot and advances the cursor.
    pub fn next_slot(&mut self) -> usize {
        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % self.len.max(1);
        slot
    }
}

/// Liveness of a worker as seen by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, handshake not yet acknowledged.
    Starting,
    /// Handshake acknowledged.
    Ready,
    /// Inbox closed or task finished.
    Stopped,
}

struct WorkerHandle {
    id: WorkerId,
    state: WorkerState,
    inbox: mpsc::UnboundedSender<WorkerRequest>,
    task: JoinHandle<()>,
}

/// Owns the worker tasks and the channels to them.
///
/// Other components only ever see [`WorkerId`]s.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    round_robin: RoundRobin,
    shutdown: CancellationToken,
    init_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `num_workers` worker tasks on the current tokio runtime.
    ///
    /// Returns the pool and the receiving end of the shared outbox. Workers
    /// are not usable until [`init_all`](Self::init_all) succeeds.
    pub fn spawn(
        num_workers: usize,
        builder: Arc<dyn TileBuilder>,
        init_timeout: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>), WorkerError> {
        if num_workers == 0 || num_workers > MAX_WORKERS {
            return Err(WorkerError::InvalidPoolSize(num_workers));
        }

        let shutdown = CancellationToken::new();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        let workers = (0..num_workers)
            .map(|ordinal| {
                let id = WorkerId::new(ordinal as u8);
                let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
                let runtime = WorkerRuntime::new(id, Arc::clone(&builder), outbox_tx.clone());
                let task = tokio::spawn(runtime.run(inbox_rx, shutdown.child_token()));
                WorkerHandle {
                    id,
                    state: WorkerState::Starting,
                    inbox: inbox_tx,
                    task,
                }
            })
            .collect();

        debug!(num_workers, "Spawned worker tasks");

        Ok((
            Self {
                workers,
                round_robin: RoundRobin::new(num_workers),
                shutdown,
                init_timeout,
            },
            outbox_rx,
        ))
    }

    /// Sends every worker its ordinal and waits for all acknowledgements.
    ///
    /// Any failure or timeout fails the whole pool; nothing is retried.
    pub async fn init_all(&mut self) -> Result<(), WorkerError> {
        let timeout = self.init_timeout;

        let handshakes = self.workers.iter().map(|worker| {
            let id = worker.id;
            let (ack_tx, ack_rx) = oneshot::channel();
            let sent = worker.inbox.send(WorkerRequest::Init {
                ordinal: id,
                ack: ack_tx,
            });

            async move {
                sent.map_err(|_| WorkerError::Disconnected(id.get()))?;
                match tokio::time::timeout(timeout, ack_rx).await {
                    Ok(Ok(Ok(acked))) if acked == id => Ok(id),
                    Ok(Ok(Ok(acked))) => Err(WorkerError::HandshakeFailed {
                        worker_id: id.get(),
                        reason: format!("acknowledged as worker {}", acked),
                    }),
                    Ok(Ok(Err(e))) => Err(e),
                    Ok(Err(_)) => Err(WorkerError::Disconnected(id.get())),
                    Err(_) => Err(WorkerError::HandshakeTimeout {
                        worker_id: id.get(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        });

        let ready = try_join_all(handshakes).await?;
        for id in ready {
            self.workers[id.index()].state = WorkerState::Ready;
        }

        info!(num_workers = self.workers.len(), "All workers initialized");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn state(&self, id: WorkerId) -> Option<WorkerState> {
        self.workers.get(id.index()).map(|w| w.state)
    }

    /// Picks the next worker in round-robin order without sending anything.
    pub fn next_worker(&mut self) -> WorkerId {
        self.workers[self.round_robin.next_slot()].id
    }

    /// Sends a job to the next worker in round-robin order.
    pub fn dispatch(&mut self, job: WorkerRequest) -> Result<WorkerId, WorkerError> {
        let id = self.next_worker();
        self.send_to(id, job)?;
        Ok(id)
    }

    /// Sends a request to a specific worker.
    pub fn send_to(&mut self, id: WorkerId, request: WorkerRequest) -> Result<(), WorkerError> {
        let worker = self
            .workers
            .get_mut(id.index())
            .ok_or(WorkerError::UnknownWorker(id.get()))?;

        if worker.inbox.send(request).is_err() {
            warn!(worker_id = %id, "Worker inbox closed");
            worker.state = WorkerState::Stopped;
            return Err(WorkerError::Disconnected(id.get()));
        }
        Ok(())
    }

    /// Sends a request built by `make` to every worker.
    pub fn broadcast<F>(&mut self, make: F) -> Result<(), WorkerError>
    where
        F: Fn() -> WorkerRequest,
    {
        let ids: Vec<WorkerId> = self.workers.iter().map(|w| w.id).collect();
        for id in ids {
            self.send_to(id, make())?;
        }
        Ok(())
    }

    /// Stops all workers and waits for their tasks to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for worker in std::mem::take(&mut self.workers) {
            drop(worker.inbox);
            if let Err(e) = worker.task.await {
                warn!(worker_id = %worker.id, error = %e, "Worker task ended abnormally");
            }
        }
        debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::source::TileSource;
    use crate::tile::{TileDescriptor, TileGeometry};
    use crate::worker::{BuildContext, BuildError};
    use proptest::prelude::*;

    struct NoopBuilder;

    impl TileBuilder for NoopBuilder {
        fn build(
            &self,
            _tile: &TileDescriptor,
            _config: &SceneConfig,
            _source: &TileSource,
            _ctx: &mut BuildContext<'_>,
        ) -> Result<TileGeometry, BuildError> {
            Ok(TileGeometry::default())
        }
    }

    struct FailingInit(u8);

    impl TileBuilder for FailingInit {
        fn init(&self, worker_id: WorkerId) -> Result<(), String> {
            if worker_id.get() == self.0 {
                Err("no gpu".to_string())
            } else {
                Ok(())
            }
        }

        fn build(
            &self,
            _tile: &TileDescriptor,
            _config: &SceneConfig,
            _source: &TileSource,
            _ctx: &mut BuildContext<'_>,
        ) -> Result<TileGeometry, BuildError> {
            Ok(TileGeometry::default())
        }
    }

    fn profile() -> WorkerRequest {
        WorkerRequest::Profile("p".to_string())
    }

    #[test]
    fn test_round_robin_sequence() {
        let mut rr = RoundRobin::new(2);
        let seq: Vec<usize> = (0..5).map(|_| rr.next_slot()).collect();
        assert_eq!(seq, vec![0, 1, 0, 1, 0]);
    }

    proptest! {
        #[test]
        fn prop_round_robin_is_even(n in 1usize..16, m in 0usize..200) {
            let mut rr = RoundRobin::new(n);
            let mut counts = vec![0usize; n];
            for i in 0..m {
                let slot = rr.next_slot();
                prop_assert_eq!(slot, i % n);
                counts[slot] += 1;
            }
            for count in counts {
                prop_assert!(count == m / n || count == m.div_ceil(n));
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_pool_size() {
        let builder: Arc<dyn TileBuilder> = Arc::new(NoopBuilder);
        assert!(matches!(
            WorkerPool::spawn(0, Arc::clone(&builder), Duration::from_secs(1)),
            Err(WorkerError::InvalidPoolSize(0))
        ));
        assert!(matches!(
            WorkerPool::spawn(255, builder, Duration::from_secs(1)),
            Err(WorkerError::InvalidPoolSize(255))
        ));
    }

    #[tokio::test]
    async fn test_init_and_dispatch_round_robin() {
        let (mut pool, _events) =
            WorkerPool::spawn(2, Arc::new(NoopBuilder), Duration::from_secs(5)).unwrap();
        pool.init_all().await.unwrap();
        assert_eq!(pool.state(WorkerId::new(1)), Some(WorkerState::Ready));

        let ids: Vec<u8> = (0..5)
            .map(|_| pool.dispatch(profile()).unwrap().get())
            .collect();
        assert_eq!(ids, vec![0, 1, 0, 1, 0]);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_handshake_fails_pool() {
        let (mut pool, _events) =
            WorkerPool::spawn(3, Arc::new(FailingInit(1)), Duration::from_secs(5)).unwrap();
        let err = pool.init_all().await.unwrap_err();
        assert!(matches!(err, WorkerError::HandshakeFailed { worker_id: 1, .. }));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_to_unknown_worker() {
        let (mut pool, _events) =
            WorkerPool::spawn(1, Arc::new(NoopBuilder), Duration::from_secs(5)).unwrap();
        let err = pool.send_to(WorkerId::new(4), profile()).unwrap_err();
        assert_eq!(err, WorkerError::UnknownWorker(4));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_worker() {
        let (mut pool, mut events) =
            WorkerPool::spawn(3, Arc::new(NoopBuilder), Duration::from_secs(5)).unwrap();
        pool.init_all().await.unwrap();

        pool.broadcast(profile).unwrap();
        pool.broadcast(|| WorkerRequest::ProfileEnd("p".to_string()))
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(event.worker_id().get());
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);

        pool.shutdown().await;
    }
}
