// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for frame capture
//!
//! This module provides command-line functionality for:
//! - Capturing a synthetic render loop (no GPU needed)
//! - Capturing from a headless wgpu render target
//! - Printing or saving the default configuration

use chrono::Local;
use frame_capture::backends::{PixelFormat, RenderSource, VirtualRenderTarget};
use frame_capture::config::default_config_path;
use frame_capture::constants::{gpu, timing};
use frame_capture::{CaptureConfig, CapturePipeline, Compression, ImageFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Output format selectable on the command line
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum FormatArg {
    Png,
    Jpeg,
    Exr,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Exr => ImageFormat::Exr,
        }
    }
}

/// Options shared by every capture command
#[derive(Debug, Clone, clap::Args)]
pub struct CaptureOptions {
    /// Number of frames to capture (0 = until Ctrl+C)
    #[arg(short = 'n', long, default_value = "100")]
    pub frames: u64,

    /// Frame width (default from config)
    #[arg(long)]
    pub width: Option<u32>,

    /// Frame height (default from config)
    #[arg(long)]
    pub height: Option<u32>,

    /// Output format (EXR captures 16-bit float)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Write frames without compression (PNG level 0, JPEG quality 100, raw EXR)
    #[arg(long)]
    pub uncompressed: bool,

    /// Output directory (default: ~/Pictures/FrameCapture/capture_TIMESTAMP)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log every written file
    #[arg(short, long)]
    pub verbose: bool,
}

impl CaptureOptions {
    /// Resolve the configuration: file (or defaults), then command line overrides
    pub fn to_config(&self) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => CaptureConfig::load(path)?,
            None => CaptureConfig::default(),
        };

        if let Some(width) = self.width {
            config.frame_width = width;
        }
        if let Some(height) = self.height {
            config.frame_height = height;
        }
        if let Some(format) = self.format {
            config.image_format = format.into();
            config.float_capture = config.image_format == ImageFormat::Exr;
            config.compression = Compression::Default;
        }
        if self.uncompressed {
            config.compression = Compression::Uncompressed;
        }
        config.verbose |= self.verbose;

        config.output_dir = match &self.output {
            Some(dir) => dir.clone(),
            None => {
                let timestamp = Local::now().format("%Y%m%d_%H%M%S");
                config.output_dir.join(format!("capture_{}", timestamp))
            }
        };

        config.validate()?;
        Ok(config)
    }
}

/// Pixel format of the render target for a configuration
fn target_format(config: &CaptureConfig, bgra: bool) -> PixelFormat {
    if config.float_capture {
        PixelFormat::RGBA16F
    } else if bgra {
        PixelFormat::BGRA8
    } else {
        PixelFormat::RGBA8
    }
}

/// Capture frames from the simulated GPU
pub fn capture_synthetic(
    config: CaptureConfig,
    frames: u64,
    latency: u32,
    bgra: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = target_format(&config, bgra);

    let target = VirtualRenderTarget::new(config.frame_width, config.frame_height, format)
        .with_latency(latency)
        .with_row_padding(gpu::SYNTHETIC_ROW_PADDING);

    println!(
        "Synthetic target: {}x{} {}, GPU latency {} polls",
        config.frame_width, config.frame_height, format, latency
    );

    let mut pipeline = CapturePipeline::with_dedicated_workers(config, target)?;
    run_capture_loop(&mut pipeline, frames, |_, _| Ok(()))
}

/// Capture frames from a headless wgpu render target
#[cfg(feature = "wgpu")]
pub fn capture_gpu(
    config: CaptureConfig,
    frames: u64,
    allow_software: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use frame_capture::backends::virtual_target::pattern_frame;
    use frame_capture::gpu::{HeadlessGpu, wgpu};

    let format = target_format(&config, true);
    let (width, height) = (config.frame_width, config.frame_height);

    let gpu = pollster::block_on(HeadlessGpu::open("frame-capture", allow_software))?;
    println!("Using GPU: {} ({:?})", gpu.adapter_name(), gpu.backend());
    gpu.check_frame_size(width, height)?;

    let mut target = gpu.render_target();
    target.initialize(width, height, format);

    let mut pipeline = CapturePipeline::with_dedicated_workers(config, target)?;

    // Stand-in renderer: upload the test pattern into the render target
    run_capture_loop(&mut pipeline, frames, |target, frame| {
        let Some(texture) = target.texture() else {
            return Err("render target has no texture".into());
        };
        let pixels = pattern_frame(frame, width, height, format, 1.0);
        target.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * format.bytes_per_pixel() as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    })
}

#[cfg(not(feature = "wgpu"))]
pub fn capture_gpu(
    _config: CaptureConfig,
    _frames: u64,
    _allow_software: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `wgpu` feature".into())
}

/// Drive render → capture → pump once per tick, then drain
fn run_capture_loop<S, F>(
    pipeline: &mut CapturePipeline<S>,
    frames: u64,
    mut render: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: RenderSource,
    F: FnMut(&mut S, u64) -> Result<(), Box<dyn std::error::Error>>,
{
    println!("Output: {}", pipeline.output_directory().display());
    if frames == 0 {
        println!("Capturing... (press Ctrl+C to stop)");
    } else {
        println!("Capturing {} frames... (press Ctrl+C to stop early)", frames);
    }

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let mut tick: u64 = 0;
    while frames == 0 || tick < frames {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        render(pipeline.source_mut(), tick)?;
        // Rejected captures are logged by the pipeline; keep ticking
        let _ = pipeline.capture();
        pipeline.pump();

        if tick % timing::STATS_LOG_INTERVAL == 0 {
            let depths = pipeline.queue_depths();
            print!(
                "\rFrames: {}  GPU queue: {}  Encoding: {}  Written: {}",
                tick,
                depths.render,
                depths.in_flight,
                pipeline.stats().written
            );
            std::io::Write::flush(&mut std::io::stdout())?;
        }

        tick += 1;
        std::thread::sleep(timing::SYNTHETIC_TICK);
    }
    println!();

    println!("Waiting for outstanding frames...");
    let drained = pipeline.drain(timing::DRAIN_TIMEOUT);

    let stats = pipeline.stats();
    println!(
        "Captured {} frames in {:.1}s: {} written, {} failed",
        stats.requested,
        start.elapsed().as_secs_f32(),
        stats.written,
        stats.failed
    );
    if stats.counter_overflows > 0 {
        println!(
            "Warning: {} frame numbers exceeded the configured digit count",
            stats.counter_overflows
        );
    }
    if !drained {
        return Err("timed out waiting for frames to be written".into());
    }
    Ok(())
}

/// Print the default configuration, or save it to a file
pub fn write_default_config(
    output: Option<PathBuf>,
    user: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CaptureConfig::default();
    let target = if user {
        Some(default_config_path().ok_or("no user config directory")?)
    } else {
        output
    };

    match target {
        Some(path) => {
            config.save(&path)?;
            println!("Configuration written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
