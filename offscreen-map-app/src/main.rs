use anyhow::{Context, Result};
use fxhash::FxHashMap;
use offscreen_map::core::config::WorkerConfig;
use offscreen_map::prelude::*;
use std::env;

/// Headless driver: pans across OpenStreetMap for a few seconds and logs what
/// the worker draws and how the display layer is corrected.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = load_options()?;
    log::info!(
        "using {:?} strategy with {} fetch slots",
        options.channel.strategy,
        options.tile_fetch.max_concurrent
    );

    let size = Size::new(800, 600);
    let grid = XyzTileGrid::web_mercator();
    let start_view = ViewState::new(Point::new(-13_627_000.0, 4_548_000.0), grid.resolution(12), 0.0);

    let mut coordinator = CoordinatorBuilder::new()
        .with_options(options)
        .with_view_state(start_view)
        .with_tile_source(Box::new(XyzSource::openstreetmap()))
        .spawn(
            Box::new(LoggingBackend::default()),
            SurfaceSet::single(Surface::new(1, size)),
        )
        .context("failed to start the render worker")?;

    let mut ticks = tokio::time::interval(Duration::from_millis(16));
    let mut skipped = 0u64;
    for tick in 0..300u32 {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
        }

        coordinator.pan_by_pixels(4.0, 1.0);
        if tick % 100 == 50 {
            coordinator.zoom_by(0.5);
        }

        let mut frame_state = coordinator.frame_state(size);
        let display = coordinator.render(&mut frame_state)?;
        if frame_state.animate {
            skipped += 1;
        }
        if tick % 30 == 0 {
            log::info!(
                "tick {}: {} presented, display transform {}",
                tick,
                display.frames_presented(),
                display.css_transform()
            );
        }
    }

    log::info!(
        "{} requests submitted, {} ticks skipped while a render was outstanding, {} tiles still queued",
        coordinator.requests_submitted(),
        skipped,
        coordinator.tracker().queue().len()
    );
    coordinator.shutdown().context("render worker failed")?;
    Ok(())
}

fn load_options() -> Result<RenderOptions> {
    match env::args().nth(1).as_deref() {
        None | Some("balanced") => Ok(RenderProfile::Balanced.resolve()),
        Some("low-latency") => Ok(RenderProfile::LowLatency.resolve()),
        Some("high-throughput") => Ok(RenderProfile::HighThroughput.resolve()),
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("could not read options from {}", path))?;
            Ok(RenderOptions::from_json_str(&json)?)
        }
    }
}

/// Backend that draws nothing and logs what it is asked to do
#[derive(Default)]
struct LoggingBackend {
    tiles_per_zoom: FxHashMap<u8, usize>,
    bytes_ingested: usize,
    frames: u64,
}

impl RenderBackend for LoggingBackend {
    fn start(&mut self, surfaces: &dyn SurfaceProvider, config: &WorkerConfig) -> offscreen_map::Result<()> {
        for surface in surfaces.list_surfaces() {
            log::info!("surface {} at {:?}", surface.id(), surface.size());
        }
        log::info!("backend up with {} pool threads", config.thread_pool_size);
        Ok(())
    }

    fn ingest_tile_data(&mut self, bytes: Vec<u8>, tile_coord: TileKey, extent: Extent) -> offscreen_map::Result<()> {
        *self.tiles_per_zoom.entry(tile_coord.z).or_default() += 1;
        self.bytes_ingested += bytes.len();
        log::debug!("tile {} covering {:?}", tile_coord, extent.to_array());
        Ok(())
    }

    fn resize(&mut self, size: Size) -> offscreen_map::Result<()> {
        log::info!("resized to {}x{}", size.width, size.height);
        Ok(())
    }

    fn render(&mut self, snapshot: &RenderSnapshot) -> offscreen_map::Result<()> {
        self.frames += 1;
        if self.frames % 60 == 0 {
            let matrix = snapshot.view_matrix();
            log::info!(
                "frame {}: center ({:.0}, {:.0}), scale {:.3e}, {} KiB of tiles over {:?}",
                self.frames,
                snapshot.view_state.center.x,
                snapshot.view_state.center.y,
                matrix[0][0],
                self.bytes_ingested / 1024,
                self.tiles_per_zoom
            );
        }
        Ok(())
    }
}
