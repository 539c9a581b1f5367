//! Background workers that build tile geometry.
//!
//! The main loop never builds geometry itself. A fixed [`WorkerPool`] of
//! tokio tasks does, each running a [`TileBuilder`] against its own copy of
//! the scene config. Communication is by message only:
//!
//! ```text
//!                  ┌──────── inbox 0 ────────► worker 0 ─┐
//!   main loop ─────┤                                      ├──► shared outbox ──► main loop
//!  (dispatch)      └──────── inbox N-1 ──────► worker N-1 ┘   (WorkerEvent)
//! ```
//!
//! Each inbox preserves send order; across workers there is no ordering.
//! Replies are matched by tile key or request id.
//!
//! # Example
//!
//! ```ignore
//! use tilescene::worker::{WorkerPool, WorkerRequest};
//!
//! let (mut pool, mut events) = WorkerPool::spawn(2, builder, timeout)?;
//! pool.init_all().await?;
//!
//! let worker = pool.dispatch(WorkerRequest::BuildTile(descriptor))?;
//! while let Ok(event) = events.try_recv() {
//!     // merge results
//! }
//! ```

mod error;
mod messages;
mod pool;
mod runtime;

pub use error::{BuildError, WorkerError};
pub use messages::{Feature, LogLevel, WorkerEvent, WorkerId, WorkerRequest};
pub use pool::{RoundRobin, WorkerPool, WorkerState};
pub use runtime::{BuildContext, SelectionMap, TileBuilder, WorkerRuntime};
