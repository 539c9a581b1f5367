//! GPU feature picking.
//!
//! Features are drawn into an offscreen buffer with their identity encoded
//! in the pixel color (see [`codec`]). Reading that buffer right after the
//! pass would stall on the GPU, so the read-back is deferred by a few ticks;
//! only the most recently scheduled read-back survives.
//!
//! ```text
//!   request() ──► pick pass ──► schedule_readback(tick)
//!                                     │ (+ frame delay)
//!                                     ▼
//!               decode pixel ──► A == 255 ──► resolve(None)
//!                    │
//!                    └──► GetFeatureSelection to worker A ──► resolve(feature)
//! ```

pub mod codec;
mod picker;

pub use codec::{decode, Picked, SelectionColor, EMPTY_ALPHA, EMPTY_PIXEL, MAX_FEATURE_ID};
pub use picker::{DevicePoint, PickError, PickHandle, PickResult, SelectionPicker};
