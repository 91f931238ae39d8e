// SPDX-License-Identifier: MPL-2.0

//! Render-target backend abstraction
//!
//! The capture pipeline only needs a narrow capability from the host
//! renderer: "a render target I can request pixels from". Any backend
//! implements two traits and the pipeline never touches backend-specific
//! command objects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  CapturePipeline    │  ← capture() / pump()
//! └──────────┬──────────┘
//!            │ enqueue_copy()
//!            ▼
//! ┌─────────────────────┐
//! │ RenderSource trait  │  ← target state, copy submission
//! └──────────┬──────────┘
//!            │ returns
//!            ▼
//! ┌─────────────────────┐
//! │ GpuReadback trait   │  ← is_ready() / lock() / unlock()
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌───────┐   ┌─────────┐
//!  │ wgpu  │   │ virtual │
//!  └───────┘   └─────────┘
//! ```

pub mod types;
pub mod virtual_target;
#[cfg(feature = "wgpu")]
pub mod wgpu_target;

pub use types::*;
pub use virtual_target::VirtualRenderTarget;
#[cfg(feature = "wgpu")]
pub use wgpu_target::WgpuRenderTarget;

/// A render target that can be copied back to host memory
pub trait RenderSource {
    /// Readback handle produced by [`RenderSource::enqueue_copy`]
    type Readback: GpuReadback;

    /// Current size and pixel format of the target
    ///
    /// Returns [`BackendError::NotInitialized`] when the target has not been
    /// created yet or was released.
    fn target_info(&self) -> BackendResult<TargetInfo>;

    /// Set the display gamma the target is rendered with
    ///
    /// Backends that cannot apply a gamma ignore it.
    fn set_target_gamma(&mut self, _gamma: f32) {}

    /// Issue an asynchronous device-to-host copy of the target
    ///
    /// Must return immediately. Copies complete in submission order.
    fn enqueue_copy(&mut self) -> BackendResult<Self::Readback>;
}

/// A pending or completed device-to-host copy
///
/// Contract with the pipeline: `lock()` is never called before
/// `is_ready()` returned true, every `lock()` is paired with `unlock()`,
/// and the view is never held past the copy-out step.
pub trait GpuReadback {
    /// Non-blocking completion poll. Once true, stays true.
    fn is_ready(&mut self) -> bool;

    /// Map the copied bytes for reading
    fn lock(&mut self) -> BackendResult<MappedView<'_>>;

    /// Release the mapped view. Must be harmless after a failed `lock()`.
    fn unlock(&mut self);
}

/// Lock a ready readback, copy its pixels into an owned buffer and unlock it
///
/// The readback is unlocked on every path, including a failed copy-out.
pub fn read_pixels<R: GpuReadback + ?Sized>(
    readback: &mut R,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> BackendResult<PixelBuffer> {
    if !readback.is_ready() {
        return Err(BackendError::NotReady);
    }

    let copied = readback
        .lock()
        .and_then(|view| PixelBuffer::from_mapped(view, width, height, format));
    readback.unlock();
    copied
}
