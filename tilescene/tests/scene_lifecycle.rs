//! Integration tests for the scene lifecycle.
//!
//! These drive a [`Scene`] with real worker tasks and the headless backend:
//! - tile loads and round-robin worker assignment
//! - rebuild generations and request coalescing
//! - zoom-band eviction and zoom gestures
//! - the pick protocol through the selection buffer
//! - shutdown of pending handles
//!
//! Run with: `cargo test --test scene_lifecycle`

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tilescene::build::RebuildError;
use tilescene::config::{InlineConfig, SceneConfig, SceneOptions};
use tilescene::coord::TileCoord;
use tilescene::pick::{PickError, SelectionColor};
use tilescene::render::{HeadlessBackend, PassTarget};
use tilescene::scene::{Scene, SceneError};
use tilescene::source::TileSource;
use tilescene::tile::{OrderRange, StyleGeometry, TileDescriptor, TileGeometry};
use tilescene::worker::{BuildContext, BuildError, Feature, TileBuilder, WorkerError, WorkerId};

// ============================================================================
// Helper Functions
// ============================================================================

const SCENE: &str = r#"{
    "styles": { "polygons": {} },
    "layers": { "water": { "style": { "order": 1 } } }
}"#;

const ANIMATED_SCENE: &str = r#"{
    "styles": { "polygons": { "animated": true } },
    "layers": { "water": { "style": { "order": 1 } } }
}"#;

/// Builds one selectable feature per tile, with the tile's column as its id.
#[derive(Default)]
struct TestBuilder {
    refuse_init: bool,
    /// Column whose tiles fail to build.
    fail_column: Option<u32>,
    builds: AtomicUsize,
}

impl TestBuilder {
    fn refusing() -> Self {
        Self {
            refuse_init: true,
            ..Default::default()
        }
    }

    fn failing_column(x: u32) -> Self {
        Self {
            fail_column: Some(x),
            ..Default::default()
        }
    }
}

impl TileBuilder for TestBuilder {
    fn init(&self, worker_id: WorkerId) -> Result<(), String> {
        if self.refuse_init {
            Err(format!("worker {} refused", worker_id))
        } else {
            Ok(())
        }
    }

    fn build(
        &self,
        tile: &TileDescriptor,
        _config: &SceneConfig,
        _source: &TileSource,
        ctx: &mut BuildContext<'_>,
    ) -> Result<TileGeometry, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_column == Some(tile.coord.x) {
            return Err(BuildError::Geometry("bad column".to_string()));
        }
        ctx.register_feature(Feature::new(u64::from(tile.coord.x), "water"));

        let mut geometry = TileGeometry::default();
        geometry
            .styles
            .insert("polygons".to_string(), StyleGeometry::new(vec![0; 12], 3));
        geometry.order = OrderRange::new(1, 1);
        Ok(geometry)
    }
}

fn options(num_workers: usize) -> SceneOptions {
    SceneOptions::default()
        .with_num_workers(num_workers)
        .with_auto_load_tiles(false)
        .with_selection_frame_delay(1)
}

async fn try_create(
    options: SceneOptions,
    builder: Arc<dyn TileBuilder>,
) -> Result<Scene<HeadlessBackend>, SceneError> {
    try_create_from(SCENE, options, builder).await
}

async fn try_create_from(
    scene: &str,
    options: SceneOptions,
    builder: Arc<dyn TileBuilder>,
) -> Result<Scene<HeadlessBackend>, SceneError> {
    let config = SceneConfig::from_json_str(scene).unwrap();
    Scene::create(
        TileSource::new("test", ""),
        Box::new(InlineConfig(config)),
        options,
        builder,
        HeadlessBackend::new(),
    )
    .await
}

/// Creates a scene looking at (0, 0) at zoom 4.
async fn create_scene(num_workers: usize) -> Scene<HeadlessBackend> {
    create_scene_with(SCENE, num_workers, TestBuilder::default()).await
}

async fn create_scene_with(
    json: &str,
    num_workers: usize,
    builder: TestBuilder,
) -> Scene<HeadlessBackend> {
    let mut scene = match try_create_from(json, options(num_workers), Arc::new(builder)).await {
        Ok(scene) => scene,
        Err(e) => panic!("scene creation failed: {}", e),
    };
    scene.resize_map(512.0, 512.0);
    scene.set_center(0.0, 0.0).unwrap();
    scene.set_zoom(4.0).unwrap();
    scene
}

/// Ticks the scene until `done` holds, yielding to the workers in between.
async fn drive_until<F>(scene: &mut Scene<HeadlessBackend>, mut done: F)
where
    F: FnMut(&mut Scene<HeadlessBackend>) -> bool,
{
    for _ in 0..500 {
        scene.render().unwrap();
        if done(scene) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("scene did not reach the expected state");
}

fn settled(scene: &mut Scene<HeadlessBackend>) -> bool {
    scene.queued_tiles() == 0 && !scene.tiles().any_loading() && !scene.is_building()
}

fn coord(x: u32, y: u32) -> TileCoord {
    TileCoord::new(x, y, 4)
}

// ============================================================================
// Tile Loading
// ============================================================================

#[tokio::test]
async fn test_tiles_assigned_round_robin() {
    let mut scene = create_scene(2).await;
    let coords: Vec<TileCoord> = (0..5).map(|x| coord(x, 8)).collect();
    for c in &coords {
        scene.load_tile(*c).unwrap();
    }
    scene.render().unwrap();

    let workers: Vec<u8> = coords
        .iter()
        .map(|c| scene.tile(&scene.tile_key(*c)).unwrap().worker.get())
        .collect();
    assert_eq!(workers, vec![0, 1, 0, 1, 0]);

    drive_until(&mut scene, settled).await;
    assert!(scene.tiles().iter().all(|t| t.loaded && t.error.is_none()));
    assert_eq!(scene.selection_map_size(), 5);
    assert_eq!(scene.metrics().snapshot().tiles_built, 5);
}

#[tokio::test]
async fn test_duplicate_loads_dispatch_once() {
    let builder = Arc::new(TestBuilder::default());
    let mut scene = try_create(options(1), builder.clone()).await.ok().unwrap();
    scene.resize_map(512.0, 512.0);
    scene.set_center(0.0, 0.0).unwrap();
    scene.set_zoom(4.0).unwrap();

    scene.load_tile(coord(8, 8)).unwrap();
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    assert_eq!(scene.tiles().len(), 1);
    assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_loaded_visible_tiles_are_drawn() {
    let mut scene = create_scene(1).await;
    scene.load_tile(coord(7, 7)).unwrap();
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    let frames = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&frames);
    scene.set_post_render_hook(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    scene.backend_mut().clear_log();
    assert!(scene.immediate_redraw().unwrap());

    let screen_draws = scene
        .backend()
        .draws()
        .iter()
        .filter(|d| d.pass == PassTarget::Screen)
        .count();
    assert_eq!(screen_draws, 2);
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    // Nothing changed, so the next tick draws nothing.
    assert!(!scene.render().unwrap());
}

#[tokio::test]
async fn test_late_reply_for_removed_tile_is_discarded() {
    let mut scene = create_scene(1).await;
    let key = scene.tile_key(coord(8, 8));
    scene.load_tile(coord(8, 8)).unwrap();
    scene.render().unwrap();

    assert!(scene.remove_tile(&key));
    drive_until(&mut scene, |s| s.metrics().snapshot().late_replies == 1).await;

    assert!(scene.tile(&key).is_none());
    assert!(!scene.is_building());
    assert_eq!(scene.backend().live_geometry(), 0);
}

// ============================================================================
// Rebuilds
// ============================================================================

#[tokio::test]
async fn test_rebuild_with_no_tiles_completes_immediately() {
    let mut scene = create_scene(2).await;
    let mut handle = scene.rebuild().unwrap();
    assert_eq!(handle.try_result(), Some(Ok(())));
    assert!(!scene.is_building());
}

#[tokio::test]
async fn test_rebuild_requests_coalesce() {
    let mut scene = create_scene(2).await;
    for x in 6..10 {
        scene.load_tile(coord(x, 8)).unwrap();
    }
    drive_until(&mut scene, settled).await;

    let mut first = scene.rebuild().unwrap();
    assert!(scene.is_building());
    let mut second = scene.rebuild().unwrap();
    let mut third = scene.rebuild().unwrap();

    assert_eq!(second.try_result(), Some(Err(RebuildError::Superseded)));
    assert!(first.try_result().is_none());
    assert!(third.try_result().is_none());

    drive_until(&mut scene, |s| !s.is_building()).await;
    assert_eq!(first.try_result(), Some(Ok(())));
    assert_eq!(third.try_result(), Some(Ok(())));

    let snapshot = scene.metrics().snapshot();
    assert_eq!(snapshot.rebuilds_started, 2);
    assert_eq!(snapshot.rebuilds_completed, 2);
    assert_eq!(snapshot.rebuilds_superseded, 1);
    assert_eq!(snapshot.tiles_built, 12);
}

#[tokio::test]
async fn test_failed_tile_build_still_completes_generation() {
    let mut scene = create_scene_with(SCENE, 2, TestBuilder::failing_column(9)).await;
    scene.load_tile(coord(8, 8)).unwrap();
    scene.load_tile(coord(9, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    let failed = scene.tile(&scene.tile_key(coord(9, 8))).unwrap();
    assert!(failed.error.is_some());
    assert!(!failed.loaded);
    assert!(!failed.is_renderable());
    assert_eq!(scene.tiles().renderable().len(), 1);

    let handle = scene.rebuild().unwrap();
    drive_until(&mut scene, settled).await;
    assert_eq!(handle.wait().await, Ok(()));

    let snapshot = scene.metrics().snapshot();
    assert_eq!(snapshot.tiles_failed, 2);
    assert_eq!(snapshot.tiles_built, 2);
    assert_eq!(snapshot.rebuilds_completed, 1);
    assert_eq!(scene.backend().live_geometry(), 1);
}

#[tokio::test]
async fn test_rebuild_resets_selection_maps() {
    let mut scene = create_scene(1).await;
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;
    assert_eq!(scene.selection_map_size(), 1);

    let handle = scene.rebuild().unwrap();
    assert_eq!(scene.selection_map_size(), 0);
    drive_until(&mut scene, settled).await;
    assert_eq!(handle.wait().await, Ok(()));
    assert_eq!(scene.selection_map_size(), 1);
}

// ============================================================================
// Zoom Eviction
// ============================================================================

#[tokio::test]
async fn test_zoom_band_eviction() {
    let mut scene = create_scene(1).await;
    scene.load_tile(coord(7, 7)).unwrap();
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;
    assert_eq!(scene.backend().live_geometry(), 2);

    // Within hysteresis: zoom 4 tiles stay.
    scene.set_zoom(6.0).unwrap();
    assert_eq!(scene.tiles().len(), 2);

    // Too far: everything outside [9, 9] goes.
    scene.set_zoom(9.0).unwrap();
    assert!(scene.tiles().is_empty());
    assert_eq!(scene.backend().released().len(), 2);
    assert_eq!(scene.backend().live_geometry(), 0);
    assert_eq!(scene.metrics().snapshot().tiles_evicted, 2);
}

#[tokio::test]
async fn test_removal_suppressed_during_zoom_gesture() {
    let mut scene = create_scene(1).await;
    let key = scene.tile_key(coord(8, 8));
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    scene.start_zoom();
    assert!(scene.is_zooming());
    assert!(!scene.remove_tile(&key));
    assert!(scene.tile(&key).is_some());

    scene.set_zoom(5.0).unwrap();
    assert!(!scene.is_zooming());
    assert!(scene.tile(&key).is_some());
    assert!(scene.remove_tile(&key));
}

#[tokio::test]
async fn test_rebuild_during_zoom_gesture_keeps_out_of_band_tiles() {
    let mut scene = create_scene(1).await;
    let key = scene.tile_key(TileCoord::new(0, 0, 5));
    scene.load_tile(TileCoord::new(0, 0, 5)).unwrap();
    drive_until(&mut scene, settled).await;
    assert!(!scene.tile(&key).unwrap().visible);

    scene.start_zoom();
    let mut handle = scene.rebuild().unwrap();
    assert_eq!(handle.try_result(), Some(Ok(())));
    assert!(scene.tile(&key).is_some());
    assert_eq!(scene.metrics().snapshot().tiles_evicted, 0);

    // The gesture's end sweeps it
    scene.set_zoom(4.0).unwrap();
    assert!(scene.tile(&key).is_none());
    assert_eq!(scene.backend().live_geometry(), 0);
}

// ============================================================================
// Picking
// ============================================================================

#[tokio::test]
async fn test_pick_on_empty_pixel_resolves_without_worker() {
    let mut scene = create_scene(1).await;
    let mut handle = scene.request_pick(10.0, 10.0);

    let mut result = None;
    drive_until(&mut scene, |_| {
        result = handle.try_result();
        result.is_some()
    })
    .await;

    let result = result.unwrap().unwrap();
    assert!(result.feature.is_none());
    assert!(!result.changed);
    assert_eq!(scene.backend().reads().len(), 1);

    let snapshot = scene.metrics().snapshot();
    assert_eq!(snapshot.pick_passes, 1);
    assert_eq!(snapshot.picks_resolved, 1);
}

#[tokio::test]
async fn test_pick_feature_through_worker() {
    let mut scene = create_scene(1).await;
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    let pixel = SelectionColor::new(1, WorkerId::new(0)).encode();
    scene.backend_mut().set_default_pick_pixel(pixel);

    let mut handle = scene.request_pick(256.0, 256.0);
    let mut result = None;
    drive_until(&mut scene, |_| {
        result = handle.try_result();
        result.is_some()
    })
    .await;
    let first = result.unwrap().unwrap();
    assert_eq!(first.feature.as_ref().map(|f| f.id), Some(8));
    assert!(first.changed);

    let mut handle = scene.request_pick(256.0, 256.0);
    let mut result = None;
    drive_until(&mut scene, |_| {
        result = handle.try_result();
        result.is_some()
    })
    .await;
    let second = result.unwrap().unwrap();
    assert_eq!(second.feature.as_ref().map(|f| f.id), Some(8));
    assert!(!second.changed);

    assert_eq!(scene.selected_feature().map(|f| f.layer.as_str()), Some("water"));
    assert_eq!(scene.pending_picks(), 0);
}

#[tokio::test]
async fn test_pick_skipped_while_panning() {
    let mut scene = create_scene(1).await;
    scene.set_panning(true);
    let mut handle = scene.request_pick(10.0, 10.0);

    for _ in 0..5 {
        scene.render().unwrap();
    }
    assert!(handle.try_result().is_none());
    assert_eq!(scene.metrics().snapshot().pick_passes, 0);

    scene.set_panning(false);
    drive_until(&mut scene, |_| matches!(handle.try_result(), Some(Ok(_)))).await;
}

#[tokio::test]
async fn test_pick_resolves_while_animating() {
    let mut scene = create_scene_with(ANIMATED_SCENE, 1, TestBuilder::default()).await;
    assert!(scene.styles().is_animated());
    let mut handle = scene.request_pick(10.0, 10.0);

    let mut result = None;
    drive_until(&mut scene, |_| {
        result = handle.try_result();
        result.is_some()
    })
    .await;

    assert!(result.unwrap().unwrap().feature.is_none());
    assert_eq!(scene.metrics().snapshot().pick_passes, 1);
    assert!(scene.is_dirty());
}

#[tokio::test]
async fn test_pick_pixel_naming_unknown_worker_is_fatal() {
    let mut scene = create_scene(1).await;
    let pixel = SelectionColor::new(1, WorkerId::new(5)).encode();
    scene.backend_mut().set_default_pick_pixel(pixel);
    let _handle = scene.request_pick(10.0, 10.0);

    let mut failure = None;
    for _ in 0..20 {
        match scene.render() {
            Ok(_) => {}
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    assert!(matches!(failure, Some(SceneError::ProtocolViolation(_))));
}

// ============================================================================
// Startup and Shutdown
// ============================================================================

#[tokio::test]
async fn test_failed_handshake_fails_creation() {
    let result = try_create(options(3), Arc::new(TestBuilder::refusing())).await;
    assert!(matches!(
        result,
        Err(SceneError::Worker(WorkerError::HandshakeFailed { .. }))
    ));
}

#[tokio::test]
async fn test_invalid_worker_count_rejected() {
    let result = try_create(options(0), Arc::new(TestBuilder::default())).await;
    assert!(matches!(result, Err(SceneError::Config(_))));
}

#[tokio::test]
async fn test_shutdown_rejects_pending_handles() {
    let mut scene = create_scene(1).await;
    scene.load_tile(coord(8, 8)).unwrap();
    drive_until(&mut scene, settled).await;

    let rebuild = scene.rebuild().unwrap();
    let pick = scene.request_pick(10.0, 10.0);

    let backend = scene.shutdown().await;
    assert_eq!(rebuild.wait().await, Err(RebuildError::Shutdown));
    assert_eq!(pick.wait().await, Err(PickError::Cancelled));
    assert_eq!(backend.live_geometry(), 0);
}
