// SPDX-License-Identifier: GPL-3.0-only

//! Headless GPU for capture
//!
//! Opens a device without a presentation surface. A hardware adapter is
//! preferred; when allowed, a software adapter (llvmpipe, WARP) is used if
//! none is present so capture also runs on machines without a GPU.

use crate::backends::WgpuRenderTarget;
use crate::errors::{CaptureError, CaptureResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use wgpu;

/// Device and queue that render targets are created on
pub struct HeadlessGpu {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    backend: wgpu::Backend,
    max_texture_dimension: u32,
}

impl HeadlessGpu {
    /// Open the first usable adapter
    pub async fn open(label: &str, allow_software: bool) -> CaptureResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match request_adapter(&instance, false).await {
            Ok(adapter) => adapter,
            Err(e) if allow_software => {
                warn!(error = %e, "No hardware adapter, trying a software adapter");
                request_adapter(&instance, true).await?
            }
            Err(e) => return Err(e),
        };

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "GPU adapter selected for capture"
        );

        // Downlevel baseline, raised to the adapter's texture size limits
        let required_limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                CaptureError::Configuration(format!("Failed to create GPU device: {}", e))
            })?;

        let max_texture_dimension = device.limits().max_texture_dimension_2d;
        debug!(max_texture_dimension, "Headless device created");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: adapter_info.name,
            backend: adapter_info.backend,
            max_texture_dimension,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.backend
    }

    /// Reject frame sizes the device cannot create a texture for
    pub fn check_frame_size(&self, width: u32, height: u32) -> CaptureResult<()> {
        check_texture_size(self.max_texture_dimension, width, height)
    }

    /// Render target sharing this device, with no texture yet
    pub fn render_target(&self) -> WgpuRenderTarget {
        WgpuRenderTarget::new(self.device.clone(), self.queue.clone())
    }
}

async fn request_adapter(
    instance: &wgpu::Instance,
    software: bool,
) -> CaptureResult<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: software,
        })
        .await
        .map_err(|e| CaptureError::Configuration(format!("No GPU adapter: {}", e)))
}

fn check_texture_size(max: u32, width: u32, height: u32) -> CaptureResult<()> {
    if width > max || height > max {
        return Err(CaptureError::Configuration(format!(
            "Frame {}x{} exceeds the device texture limit of {}",
            width, height, max
        )));
    }
    Ok(())
}
