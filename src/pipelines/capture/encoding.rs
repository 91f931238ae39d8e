// SPDX-License-Identifier: GPL-3.0-only

//! Frame encoding
//!
//! Pure mapping from a pixel buffer to compressed file bytes:
//! - JPEG (lossy, 8-bit, quality 1-100)
//! - PNG (lossless, 8-bit, zlib level 0-9)
//! - EXR (half float, uncompressed or ZIP)
//!
//! The encoder holds no state, so any number of workers can call it at once.

use crate::backends::{ChannelOrder, PixelBuffer, SampleDepth};
use crate::constants::encoding::{DEFAULT_JPEG_QUALITY, MAX_PNG_LEVEL};
use crate::errors::{CaptureError, CaptureResult};
use half::f16;
use image::ImageEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Supported output file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless compression)
    #[default]
    Png,
    /// JPEG format (lossy compression)
    Jpeg,
    /// OpenEXR with half-float channels
    Exr,
}

impl ImageFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Exr => "exr",
        }
    }

    /// Sample depth the encoder expects for this format
    pub fn sample_depth(&self) -> SampleDepth {
        match self {
            ImageFormat::Png | ImageFormat::Jpeg => SampleDepth::U8,
            ImageFormat::Exr => SampleDepth::F16,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "PNG"),
            ImageFormat::Jpeg => write!(f, "JPEG"),
            ImageFormat::Exr => write!(f, "EXR"),
        }
    }
}

/// Encoder-specific compression knob
///
/// `Uncompressed` is the setting for label/segmentation captures where
/// compression must not alter pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Format default: JPEG quality 85, PNG default level, EXR ZIP
    #[default]
    Default,
    /// JPEG quality 100, PNG level 0, EXR without compression
    Uncompressed,
    /// JPEG quality (1-100)
    Quality(u8),
    /// PNG zlib level (0-9)
    Level(u8),
}

impl Compression {
    /// Check that this setting means something for `format`
    pub fn validate_for(&self, format: ImageFormat) -> Result<(), String> {
        match (format, *self) {
            (_, Compression::Default | Compression::Uncompressed) => Ok(()),
            (ImageFormat::Jpeg, Compression::Quality(q)) if (1..=100).contains(&q) => Ok(()),
            (ImageFormat::Jpeg, Compression::Quality(q)) => {
                Err(format!("JPEG quality must be 1-100, got {}", q))
            }
            (ImageFormat::Png, Compression::Level(level)) if level <= MAX_PNG_LEVEL => Ok(()),
            (ImageFormat::Png, Compression::Level(level)) => Err(format!(
                "PNG compression level must be 0-{}, got {}",
                MAX_PNG_LEVEL, level
            )),
            (format, other) => Err(format!("{:?} does not apply to {}", other, format)),
        }
    }

    /// Get JPEG quality value (1-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            Compression::Uncompressed => 100,
            Compression::Quality(q) => (*q).clamp(1, 100),
            _ => DEFAULT_JPEG_QUALITY,
        }
    }

    fn png_compression(&self) -> (CompressionType, FilterType) {
        match self {
            Compression::Uncompressed | Compression::Level(0) => {
                (CompressionType::Uncompressed, FilterType::NoFilter)
            }
            Compression::Level(level) => (
                CompressionType::Level((*level).min(MAX_PNG_LEVEL)),
                FilterType::Adaptive,
            ),
            _ => (CompressionType::Default, FilterType::Adaptive),
        }
    }
}

/// Encode a pixel buffer into the bytes of an image file
pub fn encode(
    pixels: &PixelBuffer,
    format: ImageFormat,
    compression: Compression,
) -> CaptureResult<Vec<u8>> {
    compression.validate_for(format).map_err(CaptureError::Encode)?;

    let depth = pixels.format().depth;
    if depth != format.sample_depth() {
        return Err(CaptureError::Encode(format!(
            "{} needs {}-bit samples, buffer has {}-bit ({})",
            format,
            format.sample_depth().bits(),
            depth.bits(),
            pixels.format()
        )));
    }

    let data = match format {
        ImageFormat::Jpeg => encode_jpeg(pixels, compression.jpeg_quality())?,
        ImageFormat::Png => encode_png(pixels, compression)?,
        ImageFormat::Exr => encode_exr(pixels, compression)?,
    };

    debug!(
        width = pixels.width(),
        height = pixels.height(),
        %format,
        size = data.len(),
        "Encoding complete"
    );
    Ok(data)
}

/// Reorder 8-bit samples to RGBA
fn to_rgba8(pixels: &PixelBuffer) -> Vec<u8> {
    let mut rgba = pixels.data().to_vec();
    if pixels.format().order == ChannelOrder::Bgra {
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    rgba
}

/// Encode image as JPEG (alpha is dropped)
fn encode_jpeg(pixels: &PixelBuffer, quality: u8) -> CaptureResult<Vec<u8>> {
    let rgb: Vec<u8> = to_rgba8(pixels)
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    let mut buffer = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality).encode(
        &rgb,
        pixels.width(),
        pixels.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(buffer)
}

/// Encode image as PNG
fn encode_png(pixels: &PixelBuffer, compression: Compression) -> CaptureResult<Vec<u8>> {
    let rgba = to_rgba8(pixels);
    let (compression, filter) = compression.png_compression();

    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, compression, filter).write_image(
        &rgba,
        pixels.width(),
        pixels.height(),
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(buffer)
}

/// Encode image as a single-layer RGBA half-float EXR
fn encode_exr(pixels: &PixelBuffer, compression: Compression) -> CaptureResult<Vec<u8>> {
    use exr::prelude::{Encoding, Image, Layer, LayerAttributes, SpecificChannels, Vec2, WritableImage};

    let mut samples: Vec<f16> = pixels
        .data()
        .chunks_exact(2)
        .map(|b| f16::from_le_bytes([b[0], b[1]]))
        .collect();
    if pixels.format().order == ChannelOrder::Bgra {
        for px in samples.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    let encoding = match compression {
        Compression::Uncompressed => Encoding::UNCOMPRESSED,
        _ => Encoding {
            compression: exr::prelude::Compression::ZIP16,
            ..Encoding::UNCOMPRESSED
        },
    };

    let width = pixels.width() as usize;
    let height = pixels.height() as usize;
    let channels = SpecificChannels::rgba(|Vec2(x, y): Vec2<usize>| {
        let i = (y * width + x) * 4;
        (samples[i], samples[i + 1], samples[i + 2], samples[i + 3])
    });
    let layer = Layer::new(
        (width, height),
        LayerAttributes::default(),
        encoding,
        channels,
    );

    let mut buffer = Vec::new();
    Image::from_layer(layer)
        .write()
        .to_buffered(std::io::Cursor::new(&mut buffer))?;

    Ok(buffer)
}
