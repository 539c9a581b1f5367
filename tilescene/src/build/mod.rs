//! Rebuild generations.
//!
//! A rebuild re-sends the current config to every worker and rebuilds every
//! cached tile. [`BuildSession`] makes sure only one such generation runs at a
//! time and that bursts of requests collapse into a single follow-up.
//!
//! # Example
//!
//! ```ignore
//! use tilescene::build::{rebuild_channel, BuildSession, RebuildStart};
//!
//! let mut session = BuildSession::new();
//! let (completion, handle) = rebuild_channel();
//! if session.request_rebuild(completion) == RebuildStart::Started {
//!     // sync config, dispatch tiles, calling tile_build_started() for each
//!     session.finish_dispatch();
//! }
//! handle.wait().await?;
//! ```

mod handle;
mod session;

pub use handle::{rebuild_channel, RebuildCompletion, RebuildError, RebuildHandle};
pub use session::{BuildSession, RebuildStart};
