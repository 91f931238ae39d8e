// SPDX-License-Identifier: MPL-2.0

//! Frame Capture - non-blocking render target capture to image sequences
//!
//! Captures rendered frames from a live rendering loop and writes them to
//! disk as PNG, JPEG or EXR files, without ever blocking the thread that
//! produces frames.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Render target abstraction (virtual and wgpu)
//! - [`pipelines`]: Capture pipeline, encoding and background workers
//! - [`config`]: Capture configuration
//! - [`storage`]: File naming and disk writes
//! - [`gpu`]: Headless GPU device creation
//!
//! # Example
//!
//! ```no_run
//! use frame_capture::backends::{PixelFormat, VirtualRenderTarget};
//! use frame_capture::{CaptureConfig, CapturePipeline};
//!
//! let config = CaptureConfig::default();
//! let target = VirtualRenderTarget::new(640, 480, PixelFormat::BGRA8);
//! let mut pipeline = CapturePipeline::with_dedicated_workers(config, target)?;
//!
//! for _ in 0..10 {
//!     pipeline.capture()?;
//!     pipeline.pump();
//! }
//! pipeline.drain(std::time::Duration::from_secs(5));
//! # Ok::<(), frame_capture::CaptureError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use config::CaptureConfig;
pub use errors::{CaptureError, CaptureResult};
pub use pipelines::capture::{CapturePipeline, CaptureStats, Compression, ImageFormat};
