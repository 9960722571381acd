//! Map export worker
//!
//! Renders the logged trail onto the world map at a coarse interval. It only
//! reads the position log, so it never needs to coordinate with the tracking
//! worker beyond the append-only file itself.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{ExportConfig, PathsConfig};
use crate::samples::LogSnapshot;
use crate::tracking::Position;
use crate::vision::{EventQueue, EventSignature};
use crate::Result;

const TRAIL_FILL: Rgb<u8> = Rgb([59, 255, 129]);
const TRAIL_OUTLINE: Rgb<u8> = Rgb([0, 0, 0]);
const MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Files written by one export pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub center: Position,
    pub samples: usize,
    pub events: usize,
}

/// Draws the trail and writes the export files
pub struct MapExporter {
    map: Arc<RgbImage>,
    log_path: PathBuf,
    out_dir: PathBuf,
    config: ExportConfig,
    queue: EventQueue,
    /// Newest drained events, at most `config.max_events`
    events: Vec<EventSignature>,
}

impl MapExporter {
    pub fn new(map: Arc<RgbImage>, paths: &PathsConfig, config: &ExportConfig, queue: EventQueue) -> Self {
        Self {
            map,
            log_path: paths.position_log.clone(),
            out_dir: paths.export_dir.clone(),
            config: config.clone(),
            queue,
            events: Vec::new(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run one pass. `None` when the log holds no complete sample yet.
    pub fn export(&mut self) -> Result<Option<ExportReport>> {
        let snapshot = LogSnapshot::read(&self.log_path)?;
        let Some(last) = snapshot.last() else {
            log::debug!("Nothing logged yet, export skipped");
            return Ok(None);
        };
        let center = last.position;

        let trail = self.blend_trail(snapshot.samples().iter().map(|s| s.position));
        let cropped = self.crop_around(&trail, center);

        let mut full = trail;
        draw_filled_circle_mut(
            &mut full,
            (center.x, center.y),
            self.config.marker_radius,
            MARKER,
        );

        fs::create_dir_all(&self.out_dir)?;
        full.save(self.out_dir.join("map.png"))?;
        cropped.save(self.out_dir.join("mapcrop.png"))?;
        fs::write(self.out_dir.join("conversionCenter"), format!("{} {}", center.x, center.y))?;

        self.events.extend(self.queue.drain());
        if self.events.len() > self.config.max_events {
            let excess = self.events.len() - self.config.max_events;
            self.events.drain(..excess);
            log::debug!("Dropped {} oldest events", excess);
        }
        let json = serde_json::to_string_pretty(&self.events)?;
        fs::write(self.out_dir.join("events.json"), json)?;

        let report = ExportReport {
            center,
            samples: snapshot.len(),
            events: self.events.len(),
        };
        log::info!(
            "Exported {} samples and {} events, centred on {}",
            report.samples,
            report.events,
            center
        );
        Ok(Some(report))
    }

    /// Dots at every position, blended over a clean copy of the map
    fn blend_trail(&self, positions: impl Iterator<Item = Position>) -> RgbImage {
        let radius = self.config.trail_radius;
        let mut dots = (*self.map).clone();
        for p in positions {
            draw_filled_circle_mut(&mut dots, (p.x, p.y), radius, TRAIL_FILL);
            draw_hollow_circle_mut(&mut dots, (p.x, p.y), radius, TRAIL_OUTLINE);
        }

        let alpha = self.config.trail_alpha.clamp(0.0, 1.0);
        let mut blended = (*self.map).clone();
        for (out, dot) in blended.pixels_mut().zip(dots.pixels()) {
            for c in 0..3 {
                let mixed = alpha * dot[c] as f32 + (1.0 - alpha) * out[c] as f32;
                out[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
        blended
    }

    /// Region of the configured half extents around `center`, clamped to the map
    fn crop_around(&self, image: &RgbImage, center: Position) -> RgbImage {
        let (half_w, half_h) = self.config.crop_half_extent;
        let (w, h) = (image.width() as i64, image.height() as i64);

        let left = (center.x as i64 - half_w as i64).clamp(0, w);
        let top = (center.y as i64 - half_h as i64).clamp(0, h);
        let right = (center.x as i64 + half_w as i64).clamp(left, w);
        let bottom = (center.y as i64 + half_h as i64).clamp(top, h);

        image::imageops::crop_imm(
            image,
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
        .to_image()
    }
}

/// Periodic export on its own thread
pub struct ExportWorker {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ExportWorker {
    pub fn start(exporter: MapExporter, config: &ExportConfig) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let initial_delay = Duration::from_secs(config.initial_delay_secs);
        let interval = Duration::from_secs(config.interval_secs);

        let handle = thread::Builder::new()
            .name("map-export".to_string())
            .spawn(move || run_export_loop(thread_running, exporter, initial_delay, interval))?;

        log::info!("Export worker started");
        Ok(Self {
            running,
            worker: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop after the current pass
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        log::info!("Export worker stopped");
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Sleep for `duration` unless asked to stop; `false` if stopped
fn wait(running: &AtomicBool, duration: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < duration {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        thread::sleep(Duration::from_millis(100));
    }
    running.load(Ordering::SeqCst)
}

fn run_export_loop(running: Arc<AtomicBool>, mut exporter: MapExporter, initial_delay: Duration, interval: Duration) {
    if !wait(&running, initial_delay) {
        return;
    }

    loop {
        let pause = match exporter.export() {
            Ok(Some(_)) => interval,
            Ok(None) => initial_delay,
            Err(e) => {
                log::error!("Export to {} failed: {}", exporter.out_dir().display(), e);
                interval
            }
        };
        if !wait(&running, pause) {
            break;
        }
    }
}
