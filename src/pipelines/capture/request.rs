// SPDX-License-Identifier: MPL-2.0

//! Capture requests and the two FIFO queues they move through

use super::task::CompletionFlag;
use crate::backends::PixelFormat;
use std::collections::VecDeque;
use std::path::PathBuf;

/// A single frame capture from enqueue until its readback is consumed
///
/// Owns the readback handle exclusively. The mapped view is only reachable
/// through the handle between `lock()` and `unlock()`.
pub struct CaptureRequest<R> {
    pub sequence: u64,
    /// Fixed at enqueue time
    pub image_size: (u32, u32),
    /// Format of the render target when the copy was issued
    pub pixel_format: PixelFormat,
    pub target_path: PathBuf,
    pub readback: R,
}

/// A request whose pixels were handed to a worker
#[derive(Debug)]
pub struct InFlightEncode {
    pub sequence: u64,
    pub target_path: PathBuf,
    pub completion: CompletionFlag,
}

/// Requests issued to the GPU and not yet retired, oldest first
pub struct RenderRequestQueue<R> {
    requests: VecDeque<CaptureRequest<R>>,
}

impl<R> RenderRequestQueue<R> {
    pub fn new() -> Self {
        Self {
            requests: VecDeque::new(),
        }
    }

    pub fn push(&mut self, request: CaptureRequest<R>) {
        self.requests.push_back(request);
    }

    /// The only request that is polled for readiness
    pub fn head_mut(&mut self) -> Option<&mut CaptureRequest<R>> {
        self.requests.front_mut()
    }

    pub fn pop(&mut self) -> Option<CaptureRequest<R>> {
        self.requests.pop_front()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl<R> Default for RenderRequestQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests being encoded and written in the background, in dispatch order
#[derive(Debug, Default)]
pub struct InFlightEncodeQueue {
    entries: VecDeque<InFlightEncode>,
}

impl InFlightEncodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: InFlightEncode) {
        self.entries.push_back(entry);
    }

    pub fn head(&self) -> Option<&InFlightEncode> {
        self.entries.front()
    }

    /// Pop the head only if its task has completed
    pub fn pop_completed(&mut self) -> Option<InFlightEncode> {
        if self.head()?.completion.is_complete() {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
