//! Scene orchestrator.
//!
//! [`Scene`] wires the tile cache, worker pool, build session, picker and
//! render scheduler together, and owns the camera. It is driven by a single
//! main loop calling [`Scene::render`] once per tick; nothing in it blocks on
//! a worker.
//!
//! # Data Flow
//!
//! ```text
//! camera change ──► ViewState bounds ──► TileCache visibility / eviction
//!                                              │
//!                         load queue ◄─────────┘
//!                              │ (flushed at frame start)
//!                              ▼
//!                         WorkerPool ──► workers ──► WorkerEvent
//!                                                        │
//!                TileCache merge + BuildSession ◄────────┘
//!                              │
//!                              ▼
//!                  RenderScheduler (dirty) ──► main pass ──► pick pass
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilescene::scene::Scene;
//!
//! let mut scene = Scene::create(source, loader, options, builder, backend).await?;
//! scene.resize_map(800.0, 600.0);
//! scene.set_center(-74.0, 40.7)?;
//! scene.set_zoom(14.0)?;
//!
//! loop {
//!     scene.render()?;
//!     tokio::time::sleep(frame_interval).await;
//! }
//! ```

mod error;
mod view;

pub use error::SceneError;
pub use view::ViewState;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::build::{rebuild_channel, BuildSession, RebuildCompletion, RebuildHandle, RebuildStart};
use crate::config::{SceneConfig, SceneConfigLoader, SceneOptions};
use crate::coord::{tiles_covering, TileCoord, TileKey};
use crate::pick::{decode, DevicePoint, PickHandle, Picked, SelectionPicker};
use crate::render::{
    FrameHook, FrameStats, FrameUniforms, PassTarget, ProgramKind, RenderBackend,
    RenderScheduler, StyleRegistry,
};
use crate::source::TileSource;
use crate::telemetry::{SceneMetrics, TileSetTimer};
use crate::tile::{Tile, TileCache, ZoomTracker};
use crate::worker::{
    Feature, LogLevel, TileBuilder, WorkerEvent, WorkerId, WorkerPool, WorkerRequest,
};

/// Name of the profile spanning one rebuild generation.
const REBUILD_PROFILE: &str = "rebuild_geometry";

/// A tiled vector map scene.
pub struct Scene<B: RenderBackend> {
    options: SceneOptions,
    source: TileSource,
    source_id: Arc<str>,
    loader: Box<dyn SceneConfigLoader>,
    config: SceneConfig,
    styles: StyleRegistry,
    backend: B,

    pool: WorkerPool,
    events: mpsc::UnboundedReceiver<WorkerEvent>,

    cache: TileCache,
    session: BuildSession,
    picker: SelectionPicker,
    scheduler: RenderScheduler,
    zoom: ZoomTracker,
    view: ViewState,

    load_queue: Vec<TileCoord>,
    panning: bool,
    tick: u64,

    selection_map_sizes: BTreeMap<WorkerId, usize>,
    tile_set_timer: TileSetTimer,
    metrics: Arc<SceneMetrics>,
}

impl<B: RenderBackend> Scene<B> {
    /// Loads the config, starts the workers and compiles styles.
    ///
    /// Fails if any worker's handshake fails; the pool is shut down first.
    pub async fn create(
        source: TileSource,
        loader: Box<dyn SceneConfigLoader>,
        options: SceneOptions,
        builder: Arc<dyn TileBuilder>,
        mut backend: B,
    ) -> Result<Self, SceneError> {
        options.validate()?;

        let mut config = loader.load()?;
        config.preprocess();
        info!(config = %loader.describe(), source = %source.name, "Creating scene");

        let (mut pool, events) =
            WorkerPool::spawn(options.num_workers, builder, options.init_timeout)?;
        if let Err(e) = pool.init_all().await {
            error!(error = %e, "Worker initialization failed");
            pool.shutdown().await;
            return Err(e.into());
        }

        let styles = StyleRegistry::compile(&config, &mut backend);
        let mut scheduler = RenderScheduler::new();
        scheduler.set_animated(styles.is_animated());

        let mut scene = Self {
            source_id: source.id(),
            source,
            loader,
            config,
            styles,
            backend,
            pool,
            events,
            cache: TileCache::new(),
            session: BuildSession::new(),
            picker: SelectionPicker::new(options.selection_frame_delay),
            scheduler,
            zoom: ZoomTracker::new(options.preserve_tiles_within_zoom),
            view: ViewState::new(options.device_pixel_ratio, options.view_buffer_px),
            load_queue: Vec::new(),
            panning: false,
            tick: 0,
            selection_map_sizes: BTreeMap::new(),
            tile_set_timer: TileSetTimer::new(),
            metrics: Arc::new(SceneMetrics::new()),
            options,
        };

        scene.sync_config_to_workers()?;
        info!(workers = scene.pool.len(), "Scene initialized");
        Ok(scene)
    }

    // =========================================================================
    // Camera and viewport
    // =========================================================================

    /// Moves the camera. Bounds, visibility and desired tiles update at once.
    pub fn set_center(&mut self, lng: f64, lat: f64) -> Result<(), SceneError> {
        self.view.set_center(lng, lat)?;
        self.bounds_changed();
        Ok(())
    }

    /// Marks the start of a continuous zoom gesture.
    ///
    /// Until the next [`set_zoom`](Self::set_zoom), tile removals are ignored.
    pub fn start_zoom(&mut self) {
        self.zoom.start_zoom(self.view.tile_zoom().map(f64::from));
        debug!("Zoom gesture started");
    }

    pub fn is_zooming(&self) -> bool {
        self.zoom.is_zooming()
    }

    /// Sets the zoom, ending any gesture, and evicts tiles outside the
    /// retained zoom band in one sweep.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), SceneError> {
        let previous = self.view.tile_zoom().map(f64::from);
        self.view.set_zoom(zoom)?;

        let tile_zoom = zoom.floor();
        let band = self
            .zoom
            .finish_zoom(previous, tile_zoom)
            .capped(self.source.max_zoom);

        let evicted = self.cache.evict_outside(&band);
        if !evicted.is_empty() {
            debug!(
                count = evicted.len(),
                below = band.below,
                above = band.above,
                "Evicting tiles outside zoom band"
            );
            self.metrics.tiles_evicted(evicted.len());
        }
        for mut tile in evicted {
            self.release_tile(&mut tile);
        }

        self.bounds_changed();
        Ok(())
    }

    /// While panning the pick pass is skipped.
    pub fn set_panning(&mut self, panning: bool) {
        self.panning = panning;
        if !panning {
            self.scheduler.mark_dirty();
        }
    }

    /// Resizes the viewport, in CSS pixels.
    pub fn resize_map(&mut self, width: f64, height: f64) {
        self.view.resize(width, height);
        let (w, h) = self.view.device_size();
        self.backend.resize(w, h);
        self.bounds_changed();
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    fn bounds_changed(&mut self) {
        self.scheduler.mark_dirty();

        let Some(buffered) = self.view.buffered_bounds() else {
            return;
        };
        self.cache
            .update_visibility(&buffered, &self.view.center_meters());

        if self.options.auto_load_tiles {
            self.update_tile_requests();
        }
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// Tile key for a coordinate of this scene's source.
    pub fn tile_key(&self, coord: TileCoord) -> TileKey {
        TileKey::new(Arc::clone(&self.source_id), coord)
    }

    /// Queues a tile load. The queue is flushed at the start of the next frame.
    ///
    /// Coordinates off the grid of their zoom level are rejected.
    pub fn load_tile(&mut self, coord: TileCoord) -> Result<(), SceneError> {
        coord.validate()?;
        self.load_queue.push(coord);
        self.scheduler.mark_dirty();
        Ok(())
    }

    /// Queues every missing tile covering the buffered view at the capped zoom.
    pub fn update_tile_requests(&mut self) {
        let (Some(buffered), Some(zoom)) = (
            self.view.buffered_bounds(),
            self.view.capped_zoom(self.source.max_zoom),
        ) else {
            return;
        };

        let queued: HashSet<TileCoord> = self.load_queue.iter().copied().collect();
        let missing: Vec<TileCoord> = tiles_covering(&buffered, zoom)
            .into_iter()
            .filter(|coord| !queued.contains(coord))
            .filter(|coord| !self.cache.contains(&self.tile_key(*coord)))
            .collect();

        if !missing.is_empty() {
            trace!(count = missing.len(), zoom, "Queueing desired tiles");
            self.load_queue.extend(missing);
            self.scheduler.mark_dirty();
        }
    }

    /// Removes a tile and releases its geometry.
    ///
    /// Ignored while a zoom gesture is in progress; returns whether the tile
    /// was removed. An outstanding build is not cancelled, its reply is
    /// discarded when it arrives.
    pub fn remove_tile(&mut self, key: &TileKey) -> bool {
        if self.zoom.is_zooming() {
            trace!(tile = %key, "Skipping tile removal during zoom gesture");
            return false;
        }
        match self.cache.remove(key) {
            Some(mut tile) => {
                self.release_tile(&mut tile);
                self.scheduler.mark_dirty();
                true
            }
            None => false,
        }
    }

    pub fn tile(&self, key: &TileKey) -> Option<&Tile> {
        self.cache.get(key)
    }

    pub fn tiles(&self) -> &TileCache {
        &self.cache
    }

    /// Number of coordinates waiting for the next flush.
    pub fn queued_tiles(&self) -> usize {
        self.load_queue.len()
    }

    fn flush_load_queue(&mut self) -> Result<usize, SceneError> {
        if self.load_queue.is_empty() {
            return Ok(0);
        }

        let mut loaded = 0;
        for coord in std::mem::take(&mut self.load_queue) {
            let key = self.tile_key(coord);
            if self.cache.contains(&key) {
                continue;
            }

            let worker = self.pool.next_worker();
            let mut tile = Tile::new(key.clone(), worker);
            if let Some(buffered) = self.view.buffered_bounds() {
                tile.update_visibility(&buffered, &self.view.center_meters());
            }
            self.cache.insert(tile);
            self.dispatch_build(&key)?;
            loaded += 1;
        }

        if loaded > 0 {
            debug!(count = loaded, "Flushed tile load queue");
        }
        Ok(loaded)
    }

    /// Sends a build for a cached tile to the worker that owns it.
    fn dispatch_build(&mut self, key: &TileKey) -> Result<(), SceneError> {
        let Some(tile) = self.cache.get_mut(key) else {
            return Ok(());
        };
        tile.mark_loading();
        let worker = tile.worker;
        let descriptor = tile.descriptor(self.options.tile_scale);

        self.pool
            .send_to(worker, WorkerRequest::BuildTile(descriptor))?;
        self.session.tile_build_started(key.clone());
        self.metrics.tile_dispatched();

        if self.tile_set_timer.start() {
            debug!("Tile set load started");
        }
        trace!(tile = %key, worker_id = %worker, "Dispatched tile build");
        Ok(())
    }

    fn release_tile(&mut self, tile: &mut Tile) {
        for handle in tile.take_geometry() {
            self.backend.release_geometry(handle);
        }
        trace!(tile = %tile.key, "Released tile");
    }

    // =========================================================================
    // Rebuilds and config
    // =========================================================================

    /// Requests a rebuild of every tile with the current config.
    ///
    /// If a rebuild is already running the request is queued; a request
    /// queued earlier is rejected with `Superseded`.
    pub fn rebuild(&mut self) -> Result<RebuildHandle, SceneError> {
        let (completion, handle) = rebuild_channel();
        self.start_rebuild(completion)?;
        Ok(handle)
    }

    /// Reloads the config through the loader and rebuilds.
    pub fn reload(&mut self) -> Result<RebuildHandle, SceneError> {
        let config = self.loader.load()?;
        info!(config = %self.loader.describe(), "Reloading scene config");
        self.update_config(config)
    }

    /// Replaces the config, recompiles styles and rebuilds.
    pub fn update_config(&mut self, mut config: SceneConfig) -> Result<RebuildHandle, SceneError> {
        config.preprocess();
        self.config = config;
        self.styles = StyleRegistry::compile(&self.config, &mut self.backend);
        self.scheduler.set_animated(self.styles.is_animated());
        self.scheduler.mark_dirty();
        self.rebuild()
    }

    /// Serializes the config and sends it to every worker.
    ///
    /// Workers reset their selection maps on receipt.
    pub fn sync_config_to_workers(&mut self) -> Result<(), SceneError> {
        let config: Arc<str> = Arc::from(self.config.to_json()?);
        let source = self.source.clone();

        self.pool.broadcast(|| WorkerRequest::UpdateConfig {
            config: Arc::clone(&config),
            source: source.clone(),
        })?;

        self.selection_map_sizes.clear();
        self.metrics.set_selection_map_size(0);
        debug!(bytes = config.len(), "Synced config to workers");
        Ok(())
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn is_building(&self) -> bool {
        self.session.is_building()
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    fn start_rebuild(&mut self, completion: RebuildCompletion) -> Result<(), SceneError> {
        let had_queued = self.session.has_queued();
        if self.session.request_rebuild(completion) == RebuildStart::Queued {
            if had_queued {
                self.metrics.rebuild_superseded();
            }
            return Ok(());
        }
        self.metrics.rebuild_started();

        let profile_start = if self.options.profile_geometry_build {
            self.pool
                .broadcast(|| WorkerRequest::Profile(REBUILD_PROFILE.to_string()))?;
            Some(Instant::now())
        } else {
            None
        };

        self.sync_config_to_workers()?;

        let capped = self.view.capped_zoom(self.source.max_zoom);
        let mut visible: Vec<(f64, TileKey)> = Vec::new();
        let mut hidden: Vec<TileKey> = Vec::new();
        let mut out_of_zoom: Vec<TileKey> = Vec::new();

        for tile in self.cache.iter() {
            if tile.visible {
                visible.push((tile.center_dist, tile.key.clone()));
            } else if capped.map_or(true, |z| tile.is_in_zoom(z, self.source.max_zoom)) {
                hidden.push(tile.key.clone());
            } else {
                out_of_zoom.push(tile.key.clone());
            }
        }
        visible.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        hidden.sort();

        // Mid-gesture they stay cached, unbuilt, until set_zoom sweeps them
        let evicted = if self.zoom.is_zooming() {
            0
        } else {
            for key in &out_of_zoom {
                if let Some(mut tile) = self.cache.remove(key) {
                    self.release_tile(&mut tile);
                }
            }
            out_of_zoom.len()
        };
        if evicted > 0 {
            self.metrics.tiles_evicted(evicted);
        }

        let keys: Vec<TileKey> = visible
            .into_iter()
            .map(|(_, key)| key)
            .chain(hidden)
            .collect();
        info!(
            generation = self.session.generation(),
            tiles = keys.len(),
            evicted,
            "Rebuilding tile geometry"
        );
        for key in &keys {
            self.dispatch_build(key)?;
        }

        if let Some(start) = profile_start {
            self.pool
                .broadcast(|| WorkerRequest::ProfileEnd(REBUILD_PROFILE.to_string()))?;
            info!(
                elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Rebuild dispatch profiled"
            );
        }

        if let Some(follow_up) = self.session.finish_dispatch() {
            self.metrics.rebuild_completed();
            self.start_rebuild(follow_up)?;
        } else if !self.session.is_building() {
            self.metrics.rebuild_completed();
        }
        Ok(())
    }

    // =========================================================================
    // Worker replies
    // =========================================================================

    fn pump_worker_events(&mut self) -> Result<(), SceneError> {
        while let Ok(event) = self.events.try_recv() {
            self.handle_worker_event(event)?;
        }

        if self.tile_set_timer.is_running() && !self.cache.any_loading() {
            if let Some(elapsed) = self.tile_set_timer.stop() {
                info!(
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    tiles = self.cache.len(),
                    "Tile set loaded"
                );
            }
        }
        Ok(())
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) -> Result<(), SceneError> {
        match event {
            WorkerEvent::TileBuilt {
                worker_id,
                tile: built,
                selection_map_size,
            } => {
                self.selection_map_sizes
                    .insert(worker_id, selection_map_size);
                self.metrics
                    .set_selection_map_size(self.selection_map_size());

                let key = built.key.clone();
                match self.cache.get_mut(&key) {
                    Some(tile) => {
                        let (released, pending) = tile.merge_built(built);
                        for handle in released {
                            self.backend.release_geometry(handle);
                        }
                        for (style, geometry) in pending {
                            match self.backend.upload_geometry(&style, &geometry) {
                                Ok(handle) => tile.attach_geometry(style, handle),
                                Err(e) => {
                                    warn!(tile = %key, style = %style, error = %e, "Geometry upload failed")
                                }
                            }
                        }
                        self.metrics.tile_built();
                        trace!(tile = %key, worker_id = %worker_id, "Tile built");
                    }
                    None => {
                        self.metrics.late_reply();
                        debug!(tile = %key, "Discarding build for removed tile");
                    }
                }

                self.scheduler.mark_dirty();
                self.tile_build_finished(&key)?;
            }

            WorkerEvent::TileFailed {
                worker_id,
                key,
                error,
            } => {
                warn!(tile = %key, worker_id = %worker_id, error = %error, "Tile build failed");
                if let Some(tile) = self.cache.get_mut(&key) {
                    for handle in tile.merge_failed(error) {
                        self.backend.release_geometry(handle);
                    }
                }
                self.metrics.tile_failed();
                self.scheduler.mark_dirty();
                self.tile_build_finished(&key)?;
            }

            WorkerEvent::FeatureSelection {
                worker_id,
                request_id,
                feature,
            } => {
                trace!(request_id, worker_id = %worker_id, "Feature selection reply");
                self.resolve_pick(request_id, feature)?;
            }

            WorkerEvent::Log {
                worker_id,
                level,
                parts,
            } => {
                let message = parts.join(" ");
                match level {
                    LogLevel::Trace => trace!(worker_id = %worker_id, "{}", message),
                    LogLevel::Debug => debug!(worker_id = %worker_id, "{}", message),
                    LogLevel::Info => info!(worker_id = %worker_id, "{}", message),
                    LogLevel::Warn => warn!(worker_id = %worker_id, "{}", message),
                    LogLevel::Error => error!(worker_id = %worker_id, "{}", message),
                }
            }
        }
        Ok(())
    }

    fn tile_build_finished(&mut self, key: &TileKey) -> Result<(), SceneError> {
        let was_building = self.session.is_building();
        let was_rebuild = self.session.is_rebuild();
        let follow_up = self.session.tile_build_finished(key);

        if was_building && !self.session.is_building() {
            if was_rebuild {
                self.metrics.rebuild_completed();
            }
            debug!(generation = self.session.generation(), "Build generation complete");
        }
        if let Some(completion) = follow_up {
            self.start_rebuild(completion)?;
        }
        Ok(())
    }

    /// Entries across every worker's selection map.
    pub fn selection_map_size(&self) -> usize {
        self.selection_map_sizes.values().sum()
    }

    // =========================================================================
    // Picking
    // =========================================================================

    /// Requests the feature under a CSS pixel (origin top left).
    ///
    /// The request is resolved over the next frames; it never blocks.
    pub fn request_pick(&mut self, x: f64, y: f64) -> PickHandle {
        let device_height = self.view.device_size().1 as f64;
        let point =
            DevicePoint::from_css(x, y, self.view.device_pixel_ratio(), device_height);
        self.metrics.pick_requested();
        self.scheduler.mark_dirty();
        self.picker.request(point)
    }

    pub fn selected_feature(&self) -> Option<&Feature> {
        self.picker.selected()
    }

    pub fn pending_picks(&self) -> usize {
        self.picker.pending_len()
    }

    fn read_selection(&mut self) -> Result<(), SceneError> {
        let device = self.view.device_size();
        let buffer = (
            self.options.selection_buffer_width,
            self.options.selection_buffer_height,
        );

        for (request_id, point) in self.picker.unsent_requests() {
            let (x, y) = point.to_buffer(device, buffer);
            let pixel = self.backend.read_pick_pixel(x, y);
            self.picker.mark_sent(request_id);

            match decode(pixel) {
                Picked::Empty => self.resolve_pick(request_id, None)?,
                Picked::Feature(color) => {
                    if self.pool.state(color.worker_id).is_none() {
                        return Err(SceneError::ProtocolViolation(format!(
                            "pick pixel names worker {} but the pool has {} workers",
                            color.worker_id,
                            self.pool.len()
                        )));
                    }
                    self.pool.send_to(
                        color.worker_id,
                        WorkerRequest::GetFeatureSelection {
                            request_id,
                            feature_id: color.feature_id,
                        },
                    )?;
                    trace!(
                        request_id,
                        worker_id = %color.worker_id,
                        feature_id = color.feature_id,
                        "Forwarded pick to worker"
                    );
                }
            }
        }
        Ok(())
    }

    fn resolve_pick(&mut self, request_id: u64, feature: Option<Feature>) -> Result<(), SceneError> {
        self.picker
            .resolve(request_id, feature)
            .map_err(|e| SceneError::ProtocolViolation(e.to_string()))?;
        self.metrics.pick_resolved();
        Ok(())
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Runs one main-loop tick and draws a frame if needed.
    ///
    /// Returns whether a frame was drawn.
    pub fn render(&mut self) -> Result<bool, SceneError> {
        self.pump_worker_events()?;
        self.flush_load_queue()?;

        self.tick += 1;
        if self.picker.take_due_readback(self.tick) {
            self.read_selection()?;
        }

        if !self.scheduler.begin_frame(self.view.is_ready()) {
            return Ok(false);
        }

        let renderable = self.cache.renderable();
        let (order_min, order_range) = RenderScheduler::order_range(&renderable);
        let (w, h) = self.view.device_size();
        let uniforms = FrameUniforms {
            resolution: (w as f64, h as f64),
            aspect: self.view.aspect(),
            time: self.scheduler.elapsed_secs(),
            zoom: self.view.zoom().unwrap_or_default(),
            center: self.view.center_meters(),
            meters_per_pixel: self.view.meters_per_pixel(),
            order_min,
            order_range,
        };
        let tile_scale = self.options.tile_scale;

        self.backend.begin_pass(PassTarget::Screen);
        let render_count = self.scheduler.draw_pass(
            &mut self.backend,
            &self.styles,
            &renderable,
            &uniforms,
            ProgramKind::Main,
            tile_scale,
        );
        self.backend.end_pass();

        let pick_pass = self.picker.needs_pick_pass() && !self.panning;
        if pick_pass {
            self.backend.begin_pass(PassTarget::PickBuffer {
                width: self.options.selection_buffer_width,
                height: self.options.selection_buffer_height,
            });
            self.scheduler.draw_pass(
                &mut self.backend,
                &self.styles,
                &renderable,
                &uniforms,
                ProgramKind::Selection,
                tile_scale,
            );
            self.backend.end_pass();
            self.picker.schedule_readback(self.tick);
            self.metrics.pick_pass();
        }

        let stats = FrameStats {
            frame: self.scheduler.frame(),
            render_count,
            tiles: renderable.len(),
            order_min,
            order_range,
            pick_pass,
        };
        self.scheduler.end_frame(&stats);
        self.metrics.frame_rendered();
        Ok(true)
    }

    /// Marks the scene dirty so the next tick draws.
    pub fn request_redraw(&mut self) {
        self.scheduler.mark_dirty();
    }

    /// Marks the scene dirty and runs a tick immediately.
    pub fn immediate_redraw(&mut self) -> Result<bool, SceneError> {
        self.scheduler.mark_dirty();
        self.render()
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_dirty()
    }

    /// Main-loop ticks so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn set_pre_render_hook(&mut self, hook: FrameHook) {
        self.scheduler.set_pre_hook(hook);
    }

    pub fn set_post_render_hook(&mut self, hook: FrameHook) {
        self.scheduler.set_post_hook(hook);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn metrics(&self) -> Arc<SceneMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Sum of a per-tile statistic over tiles accepted by `filter`.
    pub fn debug_sum<V, F>(&self, value: V, filter: F) -> f64
    where
        V: Fn(&Tile) -> f64,
        F: Fn(&Tile) -> bool,
    {
        self.cache.debug_sum(value, filter)
    }

    /// Average of a per-tile statistic over all cached tiles.
    pub fn debug_average<V, F>(&self, value: V, filter: F) -> f64
    where
        V: Fn(&Tile) -> f64,
        F: Fn(&Tile) -> bool,
    {
        self.cache.debug_average(value, filter)
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    pub fn num_workers(&self) -> usize {
        self.pool.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops the workers, releases all tile geometry and rejects every
    /// outstanding rebuild and pick handle. Returns the backend.
    pub async fn shutdown(mut self) -> B {
        self.session.shutdown();
        self.picker.cancel_all();
        self.load_queue.clear();

        for mut tile in self.cache.drain() {
            for handle in tile.take_geometry() {
                self.backend.release_geometry(handle);
            }
        }

        self.pool.shutdown().await;
        info!("Scene shut down");
        self.backend
    }
}
