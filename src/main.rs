//! Overworld tracker binary
//!
//! Usage: `overworld-tracker [config.toml]` (defaults to `tracker.toml`; a
//! missing file means built-in defaults).

use std::path::PathBuf;
use std::sync::Arc;

use overworld_tracker::pipeline::{
    ExportWorker, FrameAnalyzer, FrameDirectoryResolver, MapExporter, TrackingWorker,
};
use overworld_tracker::samples::LogWriter;
use overworld_tracker::vision::{regions, EventQueue, TemplateStore};
use overworld_tracker::{Result, TrackerConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tracker.toml"));

    let config = if config_path.exists() {
        log::info!("Loading config from {}", config_path.display());
        TrackerConfig::load(&config_path)?
    } else {
        log::warn!("{} not found, using defaults", config_path.display());
        TrackerConfig::default()
    };

    let templates = Arc::new(TemplateStore::load(&config.paths.templates)?);
    let map = Arc::new(image::open(&config.paths.map)?.to_rgb8());
    let gray_map = Arc::new(regions::to_grayscale(&map));
    log::info!(
        "Loaded {} time glyphs and a {}x{} map",
        templates.time_glyphs().len(),
        map.width(),
        map.height()
    );

    let events = EventQueue::new();
    let writer = LogWriter::open(&config.paths, &config.log)?;
    let analyzer = FrameAnalyzer::new(&config, templates, gray_map, writer, events.clone());

    let mut export = None;
    if config.export.enabled {
        let exporter = MapExporter::new(map, &config.paths, &config.export, events);
        export = Some(ExportWorker::start(exporter, &config.export)?);
    }

    let resolver = FrameDirectoryResolver::new(&config.source.frames);
    let tracking = TrackingWorker::start(analyzer, Box::new(resolver), &config.source)?;
    let stats = tracking.join()?;
    log::info!(
        "Stream finished: {} frames, {} samples logged, {} events",
        stats.frames,
        stats.logged,
        stats.events
    );

    if let Some(mut export) = export {
        export.stop();
    }
    Ok(())
}
