//! Run command - drive a headless scene along a zoom path.
//!
//! The scene is created with the [`GridBuilder`] and a
//! [`HeadlessBackend`], the camera is moved through the zoom steps, and
//! after each step the main loop ticks until every dispatched tile has
//! reported back. A full rebuild and an optional pick follow, then the
//! telemetry snapshot is printed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tilescene::config::{JsonFileLoader, SceneOptions};
use tilescene::render::HeadlessBackend;
use tilescene::scene::Scene;
use tilescene::source::TileSource;
use tilescene::telemetry::SceneSnapshot;
use tracing::{info, warn};

use crate::builder::GridBuilder;
use crate::error::CliError;

type HeadlessScene = Scene<HeadlessBackend>;

/// Arguments for the run command.
pub struct RunArgs {
    pub scene: PathBuf,
    pub source: String,
    pub url: String,
    pub max_zoom: Option<u8>,
    pub workers: Option<usize>,
    pub center: (f64, f64),
    pub zoom_from: f64,
    pub zoom_to: f64,
    pub steps: u32,
    pub size: (f64, f64),
    pub pick: Option<(f64, f64)>,
    pub cells: u32,
    pub frame_interval: Duration,
    pub timeout: Duration,
}

/// Run the run command.
pub async fn run(args: RunArgs, options: SceneOptions) -> Result<(), CliError> {
    let options = match args.workers {
        Some(n) => options.with_num_workers(n),
        None => options,
    };

    let mut source = TileSource::new(&args.source, &args.url);
    if let Some(max_zoom) = args.max_zoom {
        source = source.with_max_zoom(max_zoom);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    }
    let driver = Driver {
        frame_interval: args.frame_interval,
        timeout: args.timeout,
        interrupted,
    };

    let mut scene = Scene::create(
        source,
        Box::new(JsonFileLoader::new(&args.scene)),
        options,
        Arc::new(GridBuilder::new(args.cells)),
        HeadlessBackend::new(),
    )
    .await?;

    println!("TileScene Headless Run v{}", tilescene::VERSION);
    println!("==========================");
    println!();
    println!("Scene:    {}", args.scene.display());
    println!("Source:   {}", scene.source().name);
    println!("Workers:  {}", scene.num_workers());
    println!("Styles:   {}", scene.styles().len());
    println!("Viewport: {}x{}", args.size.0, args.size.1);
    println!();

    scene.resize_map(args.size.0, args.size.1);
    scene.set_center(args.center.0, args.center.1)?;
    scene.set_zoom(args.zoom_from)?;

    let steps = args.steps.max(1);
    for step in 0..=steps {
        if step > 0 {
            let t = step as f64 / steps as f64;
            scene.start_zoom();
            scene.set_zoom(args.zoom_from + (args.zoom_to - args.zoom_from) * t)?;
        }

        let started = Instant::now();
        driver
            .drive(&mut scene, "tile loads", |scene| {
                scene.queued_tiles() == 0 && !scene.tiles().any_loading()
            })
            .await?;

        print_step(&scene, started.elapsed());
    }

    println!();
    let started = Instant::now();
    let mut rebuild = scene.rebuild()?;
    let mut rebuilt = None;
    driver
        .drive(&mut scene, "rebuild", |_| {
            rebuilt = rebuild.try_result();
            rebuilt.is_some()
        })
        .await?;
    match rebuilt {
        Some(Ok(())) => println!(
            "Rebuild:  {} tiles in {:.1}ms",
            scene.tiles().len(),
            started.elapsed().as_secs_f64() * 1000.0
        ),
        Some(Err(e)) => println!("Rebuild:  {}", e),
        None => {}
    }

    if let Some((x, y)) = args.pick {
        let mut handle = scene.request_pick(x, y);
        let mut picked = None;
        driver
            .drive(&mut scene, "pick", |_| {
                picked = handle.try_result();
                picked.is_some()
            })
            .await?;
        match picked {
            Some(Ok(result)) => match result.feature {
                Some(feature) => println!(
                    "Pick:     ({}, {}) -> feature {} in '{}'",
                    x, y, feature.id, feature.layer
                ),
                None => println!("Pick:     ({}, {}) -> nothing", x, y),
            },
            Some(Err(e)) => println!("Pick:     {}", e),
            None => {}
        }
    }

    print_snapshot(&scene.metrics().snapshot());

    let backend = scene.shutdown().await;
    info!(live_geometry = backend.live_geometry(), "Run finished");
    Ok(())
}

/// Ticks a scene until a condition holds.
struct Driver {
    frame_interval: Duration,
    timeout: Duration,
    interrupted: Arc<AtomicBool>,
}

impl Driver {
    async fn drive<F>(
        &self,
        scene: &mut HeadlessScene,
        waiting_for: &str,
        mut done: F,
    ) -> Result<(), CliError>
    where
        F: FnMut(&HeadlessScene) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            scene.render()?;
            if done(scene) {
                return Ok(());
            }
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(CliError::Interrupted);
            }
            if Instant::now() >= deadline {
                return Err(CliError::Timeout {
                    waiting_for: waiting_for.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.frame_interval).await;
        }
    }
}

fn print_step(scene: &HeadlessScene, elapsed: Duration) {
    let zoom = scene.view().zoom().unwrap_or_default();
    let visible = scene.tiles().iter().filter(|t| t.visible).count();
    let features = scene.debug_sum(|t| t.debug.features as f64, |t| t.loaded);
    let avg_build = scene.debug_average(|t| t.debug.build_ms, |t| t.loaded);
    println!(
        "zoom {:>5.2}  tiles {:>4} ({:>3} visible)  features {:>7}  avg build {:>6.2}ms  settled in {:>7.1}ms",
        zoom,
        scene.tiles().len(),
        visible,
        features,
        avg_build,
        elapsed.as_secs_f64() * 1000.0
    );
}

fn print_snapshot(snapshot: &SceneSnapshot) {
    println!();
    println!("Telemetry");
    println!("---------");
    println!("Tiles dispatched:   {}", snapshot.tiles_dispatched);
    println!("Tiles built:        {}", snapshot.tiles_built);
    println!("Tiles failed:       {}", snapshot.tiles_failed);
    println!("Tiles evicted:      {}", snapshot.tiles_evicted);
    println!("Late replies:       {}", snapshot.late_replies);
    println!(
        "Rebuilds:           {} started, {} completed, {} superseded",
        snapshot.rebuilds_started, snapshot.rebuilds_completed, snapshot.rebuilds_superseded
    );
    println!(
        "Frames:             {} ({:.1}/s)",
        snapshot.frames_rendered,
        snapshot.frames_per_second()
    );
    println!(
        "Picks:              {} requested, {} resolved, {} passes",
        snapshot.picks_requested, snapshot.picks_resolved, snapshot.pick_passes
    );
    println!("Selection map size: {}", snapshot.selection_map_size);
}
