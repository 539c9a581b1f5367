//! Configuration for the scene.
//!
//! Two kinds of configuration live here:
//!
//! - [`SceneConfig`]: the scene description (styles, layer rules, camera,
//!   lighting). It is loaded through a [`SceneConfigLoader`], pre-processed,
//!   and shipped to workers in serialized form before every build generation.
//! - [`SceneOptions`]: runtime knobs of the tile lifecycle core (worker count,
//!   zoom hysteresis, pick buffer, ...). Defaults are named constants and can
//!   be overridden from an INI file.
//!
//! # Example
//!
//! ```ignore
//! use tilescene::config::{JsonFileLoader, SceneConfigLoader, SceneOptions};
//!
//! let config = JsonFileLoader::new("scene.json").load()?;
//! let options = SceneOptions::default().with_num_workers(4);
//! ```

mod error;
mod options;
mod scene;

pub use error::ConfigError;
pub use options::{
    load_ini, SceneOptions, DEFAULT_INIT_TIMEOUT_MS, DEFAULT_NUM_WORKERS,
    DEFAULT_PRESERVE_TILES_WITHIN_ZOOM, DEFAULT_SELECTION_BUFFER_SIZE,
    DEFAULT_SELECTION_FRAME_DELAY, DEFAULT_VIEW_BUFFER_PX, MAX_WORKERS,
};
pub use scene::{
    InlineConfig, JsonFileLoader, LayerRule, RuleStyle, SceneConfig, SceneConfigLoader,
    StyleConfig, DEFAULT_STYLE_NAME,
};
