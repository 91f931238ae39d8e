// SPDX-License-Identifier: GPL-3.0-only

//! Virtual render target with a simulated GPU timeline
//!
//! Stands in for a real renderer in tests and in the `synthetic` CLI mode.
//! Every `enqueue_copy()` snapshots a deterministic per-frame test pattern
//! and assigns it a fence on a shared timeline. Fences retire strictly in
//! submission order, each one after a configurable number of polls, which
//! mirrors how a GPU command stream completes copies.

use super::types::{
    BackendError, BackendResult, ChannelOrder, MappedView, PixelFormat, SampleDepth, TargetInfo,
};
use super::{GpuReadback, RenderSource};
use half::f16;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Filler written into row padding so tests notice if it leaks into output
const PADDING_BYTE: u8 = 0xCD;

/// RGBA8 value of pixel (x, y) in frame `frame`
///
/// The pattern differs per frame, so content checksums identify which
/// frame ended up in which file.
pub fn pattern_pixel(frame: u64, x: u32, y: u32) -> [u8; 4] {
    let f = frame as u32;
    [
        (x.wrapping_add(f)) as u8,
        (y.wrapping_add(f.wrapping_mul(2))) as u8,
        ((f.wrapping_mul(37)) ^ (x ^ y)) as u8,
        255,
    ]
}

/// Tightly packed test pattern for one frame in the requested format
pub fn pattern_frame(frame: u64, width: u32, height: u32, format: PixelFormat, gamma: f32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * format.bytes_per_pixel());
    for y in 0..height {
        for x in 0..width {
            let mut rgba = pattern_pixel(frame, x, y);
            if gamma != 1.0 {
                // Alpha is never gamma corrected
                for v in &mut rgba[..3] {
                    *v = ((*v as f32 / 255.0).powf(1.0 / gamma) * 255.0).round() as u8;
                }
            }
            if format.order == ChannelOrder::Bgra {
                rgba.swap(0, 2);
            }
            match format.depth {
                SampleDepth::U8 => data.extend_from_slice(&rgba),
                SampleDepth::F16 => {
                    for v in rgba {
                        data.extend_from_slice(&f16::from_f32(v as f32 / 255.0).to_le_bytes());
                    }
                }
            }
        }
    }
    data
}

/// Shared in-order completion timeline
#[derive(Debug, Default)]
struct Timeline {
    /// Next fence value to hand out
    submitted: AtomicU64,
    /// All fences below this value have completed
    retired: AtomicU64,
}

/// CPU-side render target that behaves like an asynchronously read GPU texture
pub struct VirtualRenderTarget {
    info: Option<TargetInfo>,
    row_padding: usize,
    latency_polls: u32,
    gamma: f32,
    frame_index: u64,
    timeline: Arc<Timeline>,
    outstanding_locks: Arc<AtomicUsize>,
}

impl VirtualRenderTarget {
    /// Create an initialized target
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let mut target = Self::uninitialized();
        target.initialize(width, height, format);
        target
    }

    /// Create a target that has no backing texture yet
    pub fn uninitialized() -> Self {
        Self {
            info: None,
            row_padding: 0,
            latency_polls: 0,
            gamma: 1.0,
            frame_index: 0,
            timeline: Arc::new(Timeline::default()),
            outstanding_locks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `is_ready()` polls the oldest pending copy needs to complete
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency_polls = polls;
        self
    }

    /// Extra bytes at the end of every row of mapped memory
    pub fn with_row_padding(mut self, bytes: usize) -> Self {
        self.row_padding = bytes;
        self
    }

    /// (Re)create the backing texture
    pub fn initialize(&mut self, width: u32, height: u32, format: PixelFormat) {
        self.info = Some(TargetInfo {
            width,
            height,
            format,
        });
    }

    /// Drop the backing texture
    pub fn release(&mut self) {
        self.info = None;
    }

    /// Gamma the pattern is currently rendered with
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Index of the frame the next copy will snapshot
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Complete every copy submitted so far, like waiting for device idle
    pub fn flush_gpu(&self) {
        let submitted = self.timeline.submitted.load(Ordering::Acquire);
        self.timeline.retired.store(submitted, Ordering::Release);
    }

    /// Readback views currently locked and not yet unlocked
    pub fn outstanding_locks(&self) -> usize {
        self.outstanding_locks.load(Ordering::Acquire)
    }

    /// Shared counter for outstanding locks, observable after the target moved
    pub fn lock_counter(&self) -> Arc<AtomicUsize> {
        self.outstanding_locks.clone()
    }
}

impl RenderSource for VirtualRenderTarget {
    type Readback = VirtualReadback;

    fn target_info(&self) -> BackendResult<TargetInfo> {
        self.info
            .ok_or_else(|| BackendError::NotInitialized("virtual target has no texture".into()))
    }

    fn set_target_gamma(&mut self, gamma: f32) {
        self.gamma = gamma;
    }

    fn enqueue_copy(&mut self) -> BackendResult<VirtualReadback> {
        let info = self.target_info()?;
        let frame = self.frame_index;
        self.frame_index += 1;

        let packed = pattern_frame(frame, info.width, info.height, info.format, self.gamma);
        let row_bytes = info.width as usize * info.format.bytes_per_pixel();
        let row_pitch = row_bytes + self.row_padding;

        let data = if self.row_padding == 0 {
            packed
        } else {
            let mut padded = Vec::with_capacity(row_pitch * info.height as usize);
            for row in packed.chunks(row_bytes.max(1)) {
                padded.extend_from_slice(row);
                padded.resize(padded.len() + self.row_padding, PADDING_BYTE);
            }
            padded
        };

        let fence = self.timeline.submitted.fetch_add(1, Ordering::AcqRel);
        debug!(frame, fence, "Virtual copy enqueued");

        Ok(VirtualReadback {
            fence,
            polls_left: self.latency_polls,
            ready: false,
            locked: false,
            row_pitch,
            data,
            timeline: self.timeline.clone(),
            outstanding_locks: self.outstanding_locks.clone(),
        })
    }
}

/// Readback handle produced by [`VirtualRenderTarget`]
pub struct VirtualReadback {
    fence: u64,
    polls_left: u32,
    ready: bool,
    locked: bool,
    row_pitch: usize,
    data: Vec<u8>,
    timeline: Arc<Timeline>,
    outstanding_locks: Arc<AtomicUsize>,
}

impl GpuReadback for VirtualReadback {
    fn is_ready(&mut self) -> bool {
        if self.ready {
            return true;
        }

        let retired = self.timeline.retired.load(Ordering::Acquire);
        if self.fence < retired {
            self.ready = true;
        } else if self.fence == retired {
            // Only the oldest pending copy makes progress
            if self.polls_left == 0 {
                self.timeline.retired.store(self.fence + 1, Ordering::Release);
                self.ready = true;
            } else {
                self.polls_left -= 1;
            }
        }
        self.ready
    }

    fn lock(&mut self) -> BackendResult<MappedView<'_>> {
        if !self.ready {
            return Err(BackendError::NotReady);
        }
        if !self.locked {
            self.locked = true;
            self.outstanding_locks.fetch_add(1, Ordering::AcqRel);
        }
        Ok(MappedView {
            bytes: &self.data,
            row_pitch: self.row_pitch,
        })
    }

    fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.outstanding_locks.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for VirtualReadback {
    fn drop(&mut self) {
        // A handle dropped while locked leaks its view; keep the counter
        // raised so tests can detect it.
        if self.locked {
            tracing::error!(fence = self.fence, "Virtual readback dropped while locked");
        }
    }
}
