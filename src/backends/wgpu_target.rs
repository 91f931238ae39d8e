// SPDX-License-Identifier: GPL-3.0-only

//! wgpu render target readback
//!
//! Every `enqueue_copy()` records a texture → staging buffer copy, submits it
//! and requests an asynchronous map of the staging buffer. The map callback
//! reports through a oneshot channel that `is_ready()` checks without
//! waiting, after a non-blocking `device.poll`.
//!
//! Staging rows are padded to `COPY_BYTES_PER_ROW_ALIGNMENT` (256 bytes), so
//! the mapped view usually has a row pitch larger than the packed row.

use super::types::{BackendError, BackendResult, MappedView, PixelFormat, TargetInfo};
use super::{GpuReadback, RenderSource};
use futures::channel::oneshot;
use std::sync::Arc;
use tracing::{debug, warn};

/// Map a wgpu texture format to a readable pixel format
pub fn pixel_format(format: wgpu::TextureFormat) -> BackendResult<PixelFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {
            Ok(PixelFormat::RGBA8)
        }
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
            Ok(PixelFormat::BGRA8)
        }
        wgpu::TextureFormat::Rgba16Float => Ok(PixelFormat::RGBA16F),
        other => Err(BackendError::FormatNotSupported(format!("{:?}", other))),
    }
}

/// Texture format created for a pixel format
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::BGRA8 => wgpu::TextureFormat::Bgra8Unorm,
        f if f.is_float() => wgpu::TextureFormat::Rgba16Float,
        _ => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Bytes per staging row for a packed row of `row_bytes`
pub fn padded_row_bytes(row_bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    row_bytes.div_ceil(align) * align
}

/// Render target backed by a wgpu texture
pub struct WgpuRenderTarget {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    texture: Option<wgpu::Texture>,
    info: Option<TargetInfo>,
}

impl WgpuRenderTarget {
    /// Create a target with no texture yet
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            texture: None,
            info: None,
        }
    }

    /// (Re)create the backing texture
    pub fn initialize(&mut self, width: u32, height: u32, format: PixelFormat) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture render target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.texture = Some(texture);
        self.info = Some(TargetInfo {
            width,
            height,
            format,
        });
    }

    /// Drop the backing texture
    pub fn release(&mut self) {
        self.texture = None;
        self.info = None;
    }

    /// Texture the renderer draws into
    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl RenderSource for WgpuRenderTarget {
    type Readback = WgpuReadback;

    fn target_info(&self) -> BackendResult<TargetInfo> {
        self.info
            .ok_or_else(|| BackendError::NotInitialized("no texture created".into()))
    }

    fn enqueue_copy(&mut self) -> BackendResult<WgpuReadback> {
        let info = self.target_info()?;
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| BackendError::NotInitialized("no texture created".into()))?;

        let row_bytes = info.width * info.format.bytes_per_pixel() as u32;
        let row_pitch = padded_row_bytes(row_bytes);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture staging buffer"),
            size: row_pitch as u64 * info.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row_pitch),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: info.width,
                height: info.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (sender, receiver) = oneshot::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });

        debug!(width = info.width, height = info.height, row_pitch, "Readback submitted");

        Ok(WgpuReadback {
            device: self.device.clone(),
            staging,
            row_pitch: row_pitch as usize,
            receiver: Some(receiver),
            state: MapState::Pending,
            bytes: Vec::new(),
            locked: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MapState {
    Pending,
    Mapped,
    Failed(String),
}

/// Readback handle produced by [`WgpuRenderTarget`]
pub struct WgpuReadback {
    device: Arc<wgpu::Device>,
    staging: wgpu::Buffer,
    row_pitch: usize,
    receiver: Option<oneshot::Receiver<Result<(), wgpu::BufferAsyncError>>>,
    state: MapState,
    bytes: Vec<u8>,
    locked: bool,
}

impl GpuReadback for WgpuReadback {
    fn is_ready(&mut self) -> bool {
        if self.state != MapState::Pending {
            return true;
        }

        // Runs completed map callbacks without waiting
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            warn!(error = %e, "Device poll failed");
        }

        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(None) => return false,
            Ok(Some(Ok(()))) => self.state = MapState::Mapped,
            Ok(Some(Err(e))) => self.state = MapState::Failed(e.to_string()),
            Err(_) => self.state = MapState::Failed("map callback was dropped".into()),
        }
        self.receiver = None;
        true
    }

    fn lock(&mut self) -> BackendResult<MappedView<'_>> {
        match &self.state {
            MapState::Pending => return Err(BackendError::NotReady),
            MapState::Failed(msg) => return Err(BackendError::MapFailed(msg.clone())),
            MapState::Mapped => {}
        }
        if !self.locked {
            // The mapped range borrows the buffer, so copy it out while mapped
            let view = self.staging.slice(..).get_mapped_range();
            self.bytes = view.to_vec();
            drop(view);
            self.locked = true;
        }
        Ok(MappedView {
            bytes: &self.bytes,
            row_pitch: self.row_pitch,
        })
    }

    fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.bytes = Vec::new();
            self.staging.unmap();
        }
    }
}
