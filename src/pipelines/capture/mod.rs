// SPDX-License-Identifier: MPL-2.0

//! Asynchronous frame capture pipeline
//!
//! Moves rendered frames to disk without blocking the thread that drives
//! rendering:
//!
//! ```text
//! capture() ──▶ RenderRequestQueue ──▶ pump() ──▶ worker ──▶ InFlightEncodeQueue
//!   enqueue_copy     GPU pending       head ready?   encode      retired by pump()
//!                                      copy out      + write
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Capture**: issue an asynchronous GPU copy and assign the frame its
//!    sequence number and output path
//! 2. **Readback**: once per tick, poll only the oldest copy. When it is
//!    ready, copy the mapped pixels out and unlock
//! 3. **Encode + write**: a blocking-pool job owns the pixel copy
//! 4. **Retire**: the oldest in-flight job is dropped once its flag is set
//!
//! Neither `capture()` nor `pump()` ever waits on the GPU or a worker.

pub mod encoding;
pub mod request;
pub mod task;

pub use encoding::{Compression, ImageFormat, encode};
pub use request::{CaptureRequest, InFlightEncode, InFlightEncodeQueue, RenderRequestQueue};
pub use task::{CompletionFlag, EncodeJob, TaskOutcome, TaskState, Workers};

use crate::backends::{GpuReadback, RenderSource, TargetInfo, read_pixels};
use crate::config::CaptureConfig;
use crate::constants::timing::DRAIN_POLL_INTERVAL;
use crate::errors::{CaptureError, CaptureResult};
use crate::storage::FrameNamer;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Counters describing everything a pipeline has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Captures accepted (equals sequence numbers consumed)
    pub requested: u64,
    /// Readbacks handed to a worker
    pub dispatched: u64,
    /// Files written successfully
    pub written: u64,
    /// Requests that produced no file, for any reason
    pub failed: u64,
    /// Subset of `failed` whose readback could not be mapped
    pub readback_failures: u64,
    /// Sequence numbers wider than the configured digit count
    pub counter_overflows: u64,
}

/// What a single `pump()` tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Sequence whose readback was consumed this tick
    pub dispatched: Option<u64>,
    /// Sequence whose background task was retired this tick
    pub retired: Option<u64>,
}

impl PumpReport {
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_none() && self.retired.is_none()
    }
}

/// Current depth of both queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    /// Copies issued to the GPU and not yet consumed
    pub render: usize,
    /// Jobs dispatched and not yet retired
    pub in_flight: usize,
}

/// Orchestrates GPU readback, background encoding and retirement
///
/// Driven from a single producer thread: call [`capture`](Self::capture)
/// for every frame that should be saved and [`pump`](Self::pump) once per
/// tick.
pub struct CapturePipeline<S: RenderSource> {
    config: CaptureConfig,
    source: S,
    workers: Workers,
    namer: FrameNamer,
    render_queue: RenderRequestQueue<S::Readback>,
    in_flight: InFlightEncodeQueue,
    next_sequence: u64,
    stats: CaptureStats,
}

impl<S: RenderSource> CapturePipeline<S> {
    /// Create a pipeline over `source`, dispatching jobs to `workers`
    pub fn new(config: CaptureConfig, source: S, workers: Workers) -> CaptureResult<Self> {
        config.validate()?;
        let namer = FrameNamer::new(
            &config.output_dir,
            &config.sub_directory,
            &config.file_prefix,
            config.num_digits,
            config.image_format,
        );

        info!(
            directory = %namer.directory().display(),
            format = %config.image_format,
            width = config.frame_width,
            height = config.frame_height,
            float = config.float_capture,
            "Capture pipeline created"
        );

        Ok(Self {
            config,
            source,
            workers,
            namer,
            render_queue: RenderRequestQueue::new(),
            in_flight: InFlightEncodeQueue::new(),
            next_sequence: 0,
            stats: CaptureStats::default(),
        })
    }

    /// Create a pipeline with its own worker runtime sized from the config
    pub fn with_dedicated_workers(config: CaptureConfig, source: S) -> CaptureResult<Self> {
        let workers = Workers::dedicated(config.worker_threads)?;
        Self::new(config, source, workers)
    }

    /// Request a capture of the current render target contents
    ///
    /// Returns the sequence number assigned to the frame. On a configuration
    /// error nothing is enqueued and no sequence number is consumed.
    pub fn capture(&mut self) -> CaptureResult<u64> {
        let result = self.enqueue();
        if let Err(e) = &result {
            warn!(kind = e.kind(), error = %e, "Capture rejected");
        }
        result
    }

    fn enqueue(&mut self) -> CaptureResult<u64> {
        let info = self.source.target_info()?;
        self.check_target(&info)?;

        if let Some(gamma) = self.config.target_gamma {
            self.source.set_target_gamma(gamma);
        }
        let readback = self.source.enqueue_copy()?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.stats.requested += 1;

        let (target_path, overflowed) = self.namer.path_for(sequence);
        if overflowed {
            self.stats.counter_overflows += 1;
        }

        debug!(sequence, path = %target_path.display(), "Capture enqueued");
        self.render_queue.push(CaptureRequest {
            sequence,
            image_size: (info.width, info.height),
            pixel_format: info.format,
            target_path,
            readback,
        });
        Ok(sequence)
    }

    fn check_target(&self, info: &TargetInfo) -> CaptureResult<()> {
        let expected = (self.config.frame_width, self.config.frame_height);
        if (info.width, info.height) != expected {
            return Err(CaptureError::Configuration(format!(
                "Render target is {}x{}, pipeline expects {}x{}",
                info.width, info.height, expected.0, expected.1
            )));
        }
        if info.format.depth != self.config.capture_depth() {
            return Err(CaptureError::Configuration(format!(
                "Render target format {} does not match {}-bit capture mode",
                info.format,
                self.config.capture_depth().bits()
            )));
        }
        Ok(())
    }

    /// Advance the pipeline by one tick
    ///
    /// Polls only the oldest GPU copy. A copy that is not ready yet is left
    /// for the next tick. Also retires the oldest in-flight job if it has
    /// completed.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();

        let head_ready = self
            .render_queue
            .head_mut()
            .is_some_and(|head| head.readback.is_ready());
        if head_ready && let Some(request) = self.render_queue.pop() {
            report.dispatched = Some(self.dispatch(request));
        }

        if let Some(entry) = self.in_flight.pop_completed() {
            self.retire(&entry);
            report.retired = Some(entry.sequence);
        }

        report
    }

    fn dispatch(&mut self, mut request: CaptureRequest<S::Readback>) -> u64 {
        let sequence = request.sequence;
        let (width, height) = request.image_size;

        // The view is unlocked before read_pixels returns
        match read_pixels(&mut request.readback, width, height, request.pixel_format) {
            Ok(pixels) => {
                let completion = self.workers.spawn(EncodeJob {
                    sequence,
                    pixels,
                    format: self.config.image_format,
                    compression: self.config.compression,
                    target_path: request.target_path.clone(),
                });
                self.in_flight.push(InFlightEncode {
                    sequence,
                    target_path: request.target_path,
                    completion,
                });
                self.stats.dispatched += 1;
            }
            Err(e) => {
                let e = CaptureError::from(e);
                error!(sequence, kind = e.kind(), error = %e, "Readback failed, frame dropped");
                self.stats.readback_failures += 1;
                self.stats.failed += 1;
            }
        }
        sequence
    }

    fn retire(&mut self, entry: &InFlightEncode) {
        match entry.completion.outcome() {
            Some(TaskOutcome::Written { path, bytes }) => {
                self.stats.written += 1;
                if self.config.verbose {
                    info!(sequence = entry.sequence, path = %path.display(), bytes, "Frame saved");
                } else {
                    debug!(sequence = entry.sequence, path = %path.display(), bytes, "Frame saved");
                }
            }
            Some(TaskOutcome::Failed(e)) => {
                self.stats.failed += 1;
                debug!(
                    sequence = entry.sequence,
                    path = %entry.target_path.display(),
                    kind = e.kind(),
                    "Frame retired without output"
                );
            }
            None => {}
        }
    }

    /// Pump until both queues are empty or `timeout` elapses
    ///
    /// Sleeps between idle ticks. For teardown only, never call this from
    /// the per-frame path. Returns whether the pipeline became idle.
    pub fn drain(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            if Instant::now() >= deadline {
                let depths = self.queue_depths();
                warn!(
                    render = depths.render,
                    in_flight = depths.in_flight,
                    "Drain timed out with frames outstanding"
                );
                return false;
            }
            if self.pump().is_empty() {
                std::thread::sleep(DRAIN_POLL_INTERVAL);
            }
        }
        true
    }

    pub fn queue_depths(&self) -> QueueDepths {
        QueueDepths {
            render: self.render_queue.len(),
            in_flight: self.in_flight.len(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Sequence number the next accepted capture will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Whether no request is pending on the GPU or in a worker
    pub fn is_idle(&self) -> bool {
        self.render_queue.is_empty() && self.in_flight.is_empty()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Directory the frames are written into
    pub fn output_directory(&self) -> &std::path::Path {
        self.namer.directory()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the render source, e.g. to resize or release it
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{PixelFormat, VirtualRenderTarget};

    fn config(dir: &std::path::Path) -> CaptureConfig {
        CaptureConfig {
            output_dir: dir.to_path_buf(),
            frame_width: 8,
            frame_height: 4,
            worker_threads: 2,
            ..Default::default()
        }
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("frame-capture-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_pump_waits_for_gpu() {
        let dir = temp_dir("pump-waits");
        let target = VirtualRenderTarget::new(8, 4, PixelFormat::RGBA8).with_latency(3);
        let mut pipeline = CapturePipeline::with_dedicated_workers(config(&dir), target).unwrap();

        assert_eq!(pipeline.capture().unwrap(), 0);
        for _ in 0..3 {
            assert_eq!(pipeline.pump().dispatched, None);
        }
        assert_eq!(pipeline.pump().dispatched, Some(0));
        assert_eq!(pipeline.queue_depths().render, 0);

        assert!(pipeline.drain(Duration::from_secs(10)));
        assert_eq!(pipeline.stats().written, 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_size_mismatch_consumes_no_sequence() {
        let dir = temp_dir("mismatch");
        let target = VirtualRenderTarget::new(16, 16, PixelFormat::RGBA8);
        let mut pipeline = CapturePipeline::with_dedicated_workers(config(&dir), target).unwrap();

        assert!(matches!(
            pipeline.capture(),
            Err(CaptureError::Configuration(_))
        ));
        assert_eq!(pipeline.next_sequence(), 0);
        assert!(pipeline.is_idle());

        pipeline.source_mut().initialize(8, 4, PixelFormat::RGBA8);
        assert_eq!(pipeline.capture().unwrap(), 0);
    }

    #[test]
    fn test_float_target_rejected_in_8bit_mode() {
        let dir = temp_dir("float-mode");
        let target = VirtualRenderTarget::new(8, 4, PixelFormat::RGBA16F);
        let mut pipeline = CapturePipeline::with_dedicated_workers(config(&dir), target).unwrap();
        assert!(matches!(
            pipeline.capture(),
            Err(CaptureError::Configuration(_))
        ));
    }

    #[test]
    fn test_gamma_is_pushed_to_source() {
        let dir = temp_dir("gamma");
        let mut cfg = config(&dir);
        cfg.target_gamma = Some(2.2);
        let target = VirtualRenderTarget::new(8, 4, PixelFormat::RGBA8);
        let mut pipeline = CapturePipeline::with_dedicated_workers(cfg, target).unwrap();

        pipeline.capture().unwrap();
        assert!((pipeline.source().gamma() - 2.2).abs() < f32::EPSILON);
        assert!(pipeline.drain(Duration::from_secs(10)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = config(&temp_dir("invalid"));
        cfg.image_format = ImageFormat::Exr;
        let target = VirtualRenderTarget::new(8, 4, PixelFormat::RGBA8);
        assert!(matches!(
            CapturePipeline::with_dedicated_workers(cfg, target),
            Err(CaptureError::Configuration(_))
        ));
    }
}
