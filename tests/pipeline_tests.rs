// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests: virtual render target → pipeline → files on disk

use frame_capture::backends::virtual_target::{VirtualReadback, pattern_frame};
use frame_capture::backends::{
    BackendError, BackendResult, GpuReadback, MappedView, PixelFormat, RenderSource, TargetInfo,
    VirtualRenderTarget, fnv1a,
};
use frame_capture::{CaptureConfig, CaptureError, CapturePipeline, Compression, ImageFormat};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DRAIN: Duration = Duration::from_secs(30);

/// Unique directory removed when the test ends
struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("frame-capture-test-{}", uuid::Uuid::new_v4())))
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn config(dir: &Path, width: u32, height: u32, format: ImageFormat) -> CaptureConfig {
    CaptureConfig {
        output_dir: dir.to_path_buf(),
        frame_width: width,
        frame_height: height,
        image_format: format,
        float_capture: format == ImageFormat::Exr,
        worker_threads: 3,
        ..Default::default()
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_one_file_per_format_with_input_dimensions() {
    let cases = [
        (ImageFormat::Png, PixelFormat::RGBA8, "img_000000.png"),
        (ImageFormat::Jpeg, PixelFormat::BGRA8, "img_000000.jpeg"),
        (ImageFormat::Exr, PixelFormat::RGBA16F, "img_000000.exr"),
    ];

    for (format, pixel_format, expected_name) in cases {
        let dir = TempDir::new();
        let target = VirtualRenderTarget::new(17, 9, pixel_format).with_latency(2);
        let mut pipeline =
            CapturePipeline::with_dedicated_workers(config(&dir.0, 17, 9, format), target)
                .unwrap();

        pipeline.capture().unwrap();
        assert!(pipeline.drain(DRAIN));

        let out = dir.0.join("color");
        assert_eq!(file_names(&out), vec![expected_name.to_string()]);

        let decoded = image::open(out.join(expected_name)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 9), "{}", format);
        assert_eq!(pipeline.stats().written, 1);
    }
}

#[test]
fn test_back_to_back_captures_match_frame_patterns() {
    const FRAMES: u64 = 12;
    let (width, height) = (23, 11);

    for source_format in [PixelFormat::RGBA8, PixelFormat::BGRA8] {
        let dir = TempDir::new();
        let mut cfg = config(&dir.0, width, height, ImageFormat::Png);
        cfg.compression = Compression::Uncompressed;

        // Padded rows and a slow GPU
        let target = VirtualRenderTarget::new(width, height, source_format)
            .with_latency(3)
            .with_row_padding(40);
        let mut pipeline = CapturePipeline::with_dedicated_workers(cfg, target).unwrap();

        for expected in 0..FRAMES {
            assert_eq!(pipeline.capture().unwrap(), expected);
        }
        assert_eq!(pipeline.queue_depths().render, FRAMES as usize);
        assert!(pipeline.drain(DRAIN));

        let out = dir.0.join("color");
        assert_eq!(file_names(&out).len(), FRAMES as usize);
        for frame in 0..FRAMES {
            let path = out.join(format!("img_{:06}.png", frame));
            let decoded = image::open(&path).unwrap().to_rgba8();
            let expected = pattern_frame(frame, width, height, PixelFormat::RGBA8, 1.0);
            assert_eq!(
                fnv1a(decoded.as_raw()),
                fnv1a(&expected),
                "frame {} from {} source",
                frame,
                source_format
            );
        }
        assert_eq!(pipeline.source().outstanding_locks(), 0);
    }
}

#[test]
fn test_readiness_is_observed_in_fifo_order() {
    let dir = TempDir::new();
    let target = VirtualRenderTarget::new(4, 4, PixelFormat::RGBA8).with_latency(2);
    let mut pipeline =
        CapturePipeline::with_dedicated_workers(config(&dir.0, 4, 4, ImageFormat::Png), target)
            .unwrap();

    for _ in 0..5 {
        pipeline.capture().unwrap();
    }

    let mut dispatched = Vec::new();
    for _ in 0..1000 {
        if let Some(sequence) = pipeline.pump().dispatched {
            dispatched.push(sequence);
        }
        if dispatched.len() == 5 {
            break;
        }
    }
    assert_eq!(dispatched, vec![0, 1, 2, 3, 4]);
    assert!(pipeline.drain(DRAIN));
}

#[test]
fn test_counter_overflow_widens_names() {
    let dir = TempDir::new();
    let mut cfg = config(&dir.0, 2, 2, ImageFormat::Png);
    cfg.num_digits = 1;
    cfg.sub_directory = String::new();
    let target = VirtualRenderTarget::new(2, 2, PixelFormat::RGBA8);
    let mut pipeline = CapturePipeline::with_dedicated_workers(cfg, target).unwrap();

    for _ in 0..12 {
        pipeline.capture().unwrap();
        pipeline.pump();
    }
    assert!(pipeline.drain(DRAIN));

    let names = file_names(&dir.0);
    assert_eq!(names.len(), 12);
    assert!(names.contains(&"img_9.png".to_string()));
    assert!(names.contains(&"img_10.png".to_string()));
    assert!(names.contains(&"img_11.png".to_string()));
    assert_eq!(pipeline.stats().counter_overflows, 2);
}

#[test]
fn test_dropping_pipeline_writes_dispatched_frames() {
    const FRAMES: usize = 8;
    let dir = TempDir::new();
    let mut cfg = config(&dir.0, 512, 512, ImageFormat::Png);
    cfg.worker_threads = 1;
    let target = VirtualRenderTarget::new(512, 512, PixelFormat::RGBA8);
    let mut pipeline = CapturePipeline::with_dedicated_workers(cfg, target).unwrap();

    for _ in 0..FRAMES {
        pipeline.capture().unwrap();
    }
    // Hand every frame to the single worker, then drop without draining
    while pipeline.queue_depths().render > 0 {
        pipeline.pump();
    }
    assert_eq!(pipeline.stats().dispatched, FRAMES as u64);
    drop(pipeline);

    let names = file_names(&dir.0.join("color"));
    assert_eq!(names.len(), FRAMES, "{:?}", names);
    assert_eq!(names.last().map(String::as_str), Some("img_000007.png"));
}

#[test]
fn test_write_failures_still_consume_sequence_numbers() {
    let dir = TempDir::new();
    std::fs::create_dir_all(&dir.0).unwrap();
    // A regular file where the output directory should be
    let blocker = dir.0.join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let target = VirtualRenderTarget::new(4, 4, PixelFormat::RGBA8);
    let mut pipeline =
        CapturePipeline::with_dedicated_workers(config(&blocker, 4, 4, ImageFormat::Png), target)
            .unwrap();

    for expected in 0..3 {
        assert_eq!(pipeline.capture().unwrap(), expected);
    }
    assert!(pipeline.drain(DRAIN));

    let stats = pipeline.stats();
    assert_eq!(stats.requested, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.written, 0);

    // The pipeline keeps numbering after failures
    assert_eq!(pipeline.capture().unwrap(), 3);
    assert_eq!(pipeline.next_sequence(), 4);
}

#[test]
fn test_uninitialized_target_is_a_configuration_error() {
    let dir = TempDir::new();
    let mut pipeline = CapturePipeline::with_dedicated_workers(
        config(&dir.0, 8, 8, ImageFormat::Png),
        VirtualRenderTarget::uninitialized(),
    )
    .unwrap();

    assert!(matches!(
        pipeline.capture(),
        Err(CaptureError::Configuration(_))
    ));
    assert!(pipeline.is_idle());
    assert_eq!(pipeline.next_sequence(), 0);

    // Still usable once the target exists
    pipeline
        .source_mut()
        .initialize(8, 8, PixelFormat::RGBA8);
    assert_eq!(pipeline.capture().unwrap(), 0);
    assert!(pipeline.drain(DRAIN));
    assert!(dir.0.join("color").join("img_000000.png").exists());
}

/// Render source whose readback for one sequence fails to map
struct FlakySource {
    inner: VirtualRenderTarget,
    fail_at: u64,
    issued: u64,
}

struct FlakyReadback {
    inner: VirtualReadback,
    fail: bool,
}

impl RenderSource for FlakySource {
    type Readback = FlakyReadback;

    fn target_info(&self) -> BackendResult<TargetInfo> {
        self.inner.target_info()
    }

    fn enqueue_copy(&mut self) -> BackendResult<FlakyReadback> {
        let fail = self.issued == self.fail_at;
        self.issued += 1;
        Ok(FlakyReadback {
            inner: self.inner.enqueue_copy()?,
            fail,
        })
    }
}

impl GpuReadback for FlakyReadback {
    fn is_ready(&mut self) -> bool {
        self.inner.is_ready()
    }

    fn lock(&mut self) -> BackendResult<MappedView<'_>> {
        if self.fail {
            return Err(BackendError::MapFailed("device lost".into()));
        }
        self.inner.lock()
    }

    fn unlock(&mut self) {
        self.inner.unlock();
    }
}

#[test]
fn test_readback_failure_is_isolated() {
    let dir = TempDir::new();
    let inner = VirtualRenderTarget::new(6, 6, PixelFormat::RGBA8).with_latency(1);
    let locks = inner.lock_counter();
    let source = FlakySource {
        inner,
        fail_at: 1,
        issued: 0,
    };
    let mut pipeline =
        CapturePipeline::with_dedicated_workers(config(&dir.0, 6, 6, ImageFormat::Png), source)
            .unwrap();

    for _ in 0..3 {
        pipeline.capture().unwrap();
    }
    assert!(pipeline.drain(DRAIN));

    assert_eq!(
        file_names(&dir.0.join("color")),
        vec!["img_000000.png".to_string(), "img_000002.png".to_string()]
    );
    let stats = pipeline.stats();
    assert_eq!(stats.readback_failures, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 2);
    assert_eq!(locks.load(std::sync::atomic::Ordering::Acquire), 0);
}

#[test]
fn test_float_capture_preserves_values() {
    let dir = TempDir::new();
    let mut cfg = config(&dir.0, 5, 5, ImageFormat::Exr);
    cfg.compression = Compression::Uncompressed;
    let target = VirtualRenderTarget::new(5, 5, PixelFormat::RGBA16F);
    let mut pipeline = CapturePipeline::with_dedicated_workers(cfg, target).unwrap();

    pipeline.capture().unwrap();
    assert!(pipeline.drain(DRAIN));

    let decoded = image::open(dir.0.join("color").join("img_000000.exr"))
        .unwrap()
        .to_rgba32f();
    for (x, y, pixel) in decoded.enumerate_pixels() {
        let expected = frame_capture::backends::virtual_target::pattern_pixel(0, x, y);
        for channel in 0..4 {
            let want = expected[channel] as f32 / 255.0;
            assert!(
                (pixel.0[channel] - want).abs() < 1e-3,
                "pixel ({}, {}) channel {}",
                x,
                y,
                channel
            );
        }
    }
}
