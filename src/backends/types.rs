// SPDX-License-Identifier: GPL-3.0-only
// Shared types for render-target backends

//! Shared types for render-target backends

use serde::{Deserialize, Serialize};

/// Byte order of the four color channels in a pixel
///
/// Rendering hosts commonly hand out BGRA. The order is never inferred: a
/// buffer always carries its order explicitly and the encoder swizzles from
/// it. Mislabeling BGRA as RGBA silently swaps red and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// R G B A
    Rgba,
    /// B G R A
    Bgra,
}

/// Storage type of a single channel sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleDepth {
    /// 8-bit unsigned normalized (LDR)
    U8,
    /// 16-bit IEEE half float, little endian (HDR)
    F16,
}

impl SampleDepth {
    /// Bytes per channel sample
    pub fn bytes(&self) -> usize {
        match self {
            SampleDepth::U8 => 1,
            SampleDepth::F16 => 2,
        }
    }

    /// Bit depth as reported to the encoder
    pub fn bits(&self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// Pixel format of a render target or pixel buffer (always four channels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub order: ChannelOrder,
    pub depth: SampleDepth,
}

impl PixelFormat {
    pub const RGBA8: PixelFormat = PixelFormat {
        order: ChannelOrder::Rgba,
        depth: SampleDepth::U8,
    };
    pub const BGRA8: PixelFormat = PixelFormat {
        order: ChannelOrder::Bgra,
        depth: SampleDepth::U8,
    };
    pub const RGBA16F: PixelFormat = PixelFormat {
        order: ChannelOrder::Rgba,
        depth: SampleDepth::F16,
    };

    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        4 * self.depth.bytes()
    }

    /// Whether this is a float (HDR) format
    pub fn is_float(&self) -> bool {
        self.depth == SampleDepth::F16
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order = match self.order {
            ChannelOrder::Rgba => "RGBA",
            ChannelOrder::Bgra => "BGRA",
        };
        match self.depth {
            SampleDepth::U8 => write!(f, "{}8", order),
            SampleDepth::F16 => write!(f, "{}16F", order),
        }
    }
}

/// Current state of a render target as seen from the game thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Read-only view of mapped readback memory
///
/// Only valid between `lock()` and `unlock()`. Rows are `row_pitch` bytes
/// apart, which may exceed `width * bytes_per_pixel`.
#[derive(Debug, Clone, Copy)]
pub struct MappedView<'a> {
    pub bytes: &'a [u8],
    pub row_pitch: usize,
}

/// Owned, tightly packed pixel data plus its format metadata
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap tightly packed pixel data, validating its length
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> BackendResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(BackendError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Copy pixels out of a mapped view, dropping any per-row padding
    pub fn from_mapped(
        view: MappedView<'_>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> BackendResult<Self> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if view.row_pitch < row_bytes {
            return Err(BackendError::InvalidPitch {
                row_pitch: view.row_pitch,
                row_bytes,
            });
        }

        // The last row does not need to carry its padding
        let required = match height as usize {
            0 => 0,
            rows => view.row_pitch * (rows - 1) + row_bytes,
        };
        if view.bytes.len() < required {
            return Err(BackendError::SizeMismatch {
                expected: required,
                actual: view.bytes.len(),
            });
        }

        let mut data = Vec::with_capacity(row_bytes * height as usize);
        if view.row_pitch == row_bytes {
            data.extend_from_slice(&view.bytes[..row_bytes * height as usize]);
        } else {
            for row in view.bytes.chunks(view.row_pitch).take(height as usize) {
                data.extend_from_slice(&row[..row_bytes]);
            }
        }

        Self::new(width, height, format, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// FNV-1a checksum of the pixel bytes
    pub fn checksum(&self) -> u64 {
        fnv1a(&self.data)
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// 64-bit FNV-1a hash
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Render target has not been created or was released
    NotInitialized(String),
    /// Render target format cannot be read back
    FormatNotSupported(String),
    /// `lock()` was called before `is_ready()` reported true
    NotReady,
    /// The device failed to map the staging memory
    MapFailed(String),
    /// Buffer length does not match the declared dimensions
    SizeMismatch { expected: usize, actual: usize },
    /// Row pitch is smaller than one packed row
    InvalidPitch { row_pitch: usize, row_bytes: usize },
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotInitialized(msg) => write!(f, "Render target not initialized: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NotReady => write!(f, "Readback locked before it was ready"),
            BackendError::MapFailed(msg) => write!(f, "Failed to map readback: {}", msg),
            BackendError::SizeMismatch { expected, actual } => write!(
                f,
                "Pixel data size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            BackendError::InvalidPitch {
                row_pitch,
                row_bytes,
            } => write!(
                f,
                "Row pitch {} is smaller than a packed row of {} bytes",
                row_pitch, row_bytes
            ),
        }
    }
}

impl std::error::Error for BackendError {}
