//! Runtime options for the tile lifecycle core.
//!
//! # INI Format
//!
//! ```ini
//! [workers]
//! count = 4
//! init_timeout_ms = 10000
//!
//! [tiles]
//! preserve_within_zoom = 2
//! tile_scale = 4096
//! view_buffer_px = 200
//! auto_load = true
//!
//! [selection]
//! buffer_width = 256
//! buffer_height = 256
//! frame_delay = 5
//!
//! [display]
//! device_pixel_ratio = 2.0
//!
//! [debug]
//! profile_geometry_build = false
//! ```
//!
//! Missing sections and keys keep their defaults.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::ConfigError;
use crate::coord::TileScale;

/// Default number of background workers.
pub const DEFAULT_NUM_WORKERS: usize = 2;

/// Upper bound on workers.
///
/// Worker ids are encoded in the alpha channel of the pick buffer, where 255
/// is reserved for "no feature".
pub const MAX_WORKERS: usize = 254;

/// Default time allowed for a single worker handshake.
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 10_000;

/// Default zoom hysteresis: tiles within this many levels survive a small zoom change.
pub const DEFAULT_PRESERVE_TILES_WITHIN_ZOOM: f64 = 2.0;

/// Default buffer around the viewport, in pixels, used for tile visibility.
pub const DEFAULT_VIEW_BUFFER_PX: f64 = 200.0;

/// Default edge length of the offscreen selection buffer.
pub const DEFAULT_SELECTION_BUFFER_SIZE: u32 = 256;

/// Default delay, in main-loop ticks, between the pick pass and its read-back.
pub const DEFAULT_SELECTION_FRAME_DELAY: u64 = 5;

/// Runtime options for a scene.
#[derive(Clone, Debug)]
pub struct SceneOptions {
    /// Number of background workers (1..=254).
    pub num_workers: usize,

    /// Maximum time to wait for each worker's init handshake.
    pub init_timeout: Duration,

    /// Zoom hysteresis used by eviction.
    pub preserve_tiles_within_zoom: f64,

    /// Range of tile-local coordinates.
    pub tile_scale: TileScale,

    /// Buffer around the viewport for visibility tests, in pixels.
    pub view_buffer_px: f64,

    /// Offscreen selection buffer width.
    pub selection_buffer_width: u32,

    /// Offscreen selection buffer height.
    pub selection_buffer_height: u32,

    /// Ticks between the pick pass and reading its pixel back.
    pub selection_frame_delay: u64,

    /// Ratio of device pixels to CSS pixels.
    pub device_pixel_ratio: f64,

    /// Queue loads for tiles covering the view whenever the bounds change.
    pub auto_load_tiles: bool,

    /// Profile each geometry rebuild on the main thread and all workers.
    pub profile_geometry_build: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            init_timeout: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
            preserve_tiles_within_zoom: DEFAULT_PRESERVE_TILES_WITHIN_ZOOM,
            tile_scale: TileScale::default(),
            view_buffer_px: DEFAULT_VIEW_BUFFER_PX,
            selection_buffer_width: DEFAULT_SELECTION_BUFFER_SIZE,
            selection_buffer_height: DEFAULT_SELECTION_BUFFER_SIZE,
            selection_frame_delay: DEFAULT_SELECTION_FRAME_DELAY,
            device_pixel_ratio: 1.0,
            auto_load_tiles: true,
            profile_geometry_build: false,
        }
    }
}

impl SceneOptions {
    /// Set the number of workers.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the handshake timeout.
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Set the zoom hysteresis.
    pub fn with_preserve_tiles_within_zoom(mut self, levels: f64) -> Self {
        self.preserve_tiles_within_zoom = levels;
        self
    }

    /// Set the pick read-back delay.
    pub fn with_selection_frame_delay(mut self, ticks: u64) -> Self {
        self.selection_frame_delay = ticks;
        self
    }

    /// Set the device pixel ratio.
    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Enable or disable automatic loading of tiles covering the view.
    pub fn with_auto_load_tiles(mut self, enabled: bool) -> Self {
        self.auto_load_tiles = enabled;
        self
    }

    /// Enable or disable rebuild profiling.
    pub fn with_profile_geometry_build(mut self, enabled: bool) -> Self {
        self.profile_geometry_build = enabled;
        self
    }

    /// Checks that the options are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 || self.num_workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "worker count must be between 1 and {}, got {}",
                MAX_WORKERS, self.num_workers
            )));
        }
        if self.preserve_tiles_within_zoom < 0.0 {
            return Err(ConfigError::Invalid(
                "zoom hysteresis must not be negative".to_string(),
            ));
        }
        if self.selection_buffer_width == 0 || self.selection_buffer_height == 0 {
            return Err(ConfigError::Invalid(
                "selection buffer must not be empty".to_string(),
            ));
        }
        if self.device_pixel_ratio <= 0.0 {
            return Err(ConfigError::Invalid(
                "device pixel ratio must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads options from a parsed INI document, starting from defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut options = Self::default();

        if let Some(count) = parse_key::<usize>(ini, "workers", "count")? {
            options.num_workers = count;
        }
        if let Some(ms) = parse_key::<u64>(ini, "workers", "init_timeout_ms")? {
            options.init_timeout = Duration::from_millis(ms);
        }
        if let Some(levels) = parse_key::<f64>(ini, "tiles", "preserve_within_zoom")? {
            options.preserve_tiles_within_zoom = levels;
        }
        if let Some(scale) = parse_key::<u32>(ini, "tiles", "tile_scale")? {
            options.tile_scale = TileScale::new(scale);
        }
        if let Some(px) = parse_key::<f64>(ini, "tiles", "view_buffer_px")? {
            options.view_buffer_px = px;
        }
        if let Some(enabled) = parse_key::<bool>(ini, "tiles", "auto_load")? {
            options.auto_load_tiles = enabled;
        }
        if let Some(width) = parse_key::<u32>(ini, "selection", "buffer_width")? {
            options.selection_buffer_width = width;
        }
        if let Some(height) = parse_key::<u32>(ini, "selection", "buffer_height")? {
            options.selection_buffer_height = height;
        }
        if let Some(ticks) = parse_key::<u64>(ini, "selection", "frame_delay")? {
            options.selection_frame_delay = ticks;
        }
        if let Some(ratio) = parse_key::<f64>(ini, "display", "device_pixel_ratio")? {
            options.device_pixel_ratio = ratio;
        }
        if let Some(enabled) = parse_key::<bool>(ini, "debug", "profile_geometry_build")? {
            options.profile_geometry_build = enabled;
        }

        options.validate()?;
        Ok(options)
    }

    /// Loads options from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_ini(&load_ini(path)?)
    }
}

/// Loads an INI document from disk.
pub fn load_ini(path: impl AsRef<Path>) -> Result<Ini, ConfigError> {
    let path = path.as_ref();
    Ini::load_from_file(path).map_err(|e| ConfigError::Ini {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn parse_key<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = ini.section(Some(section)).and_then(|props| props.get(key)) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
        })
}
