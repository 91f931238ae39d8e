// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for captured frame files
//!
//! File names are `<prefix>_<counter>.<ext>` inside
//! `<output_dir>/<sub_directory>`, with the counter zero padded to a fixed
//! digit count so a directory listing sorts in capture order.

use crate::errors::CaptureResult;
use crate::pipelines::capture::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A zero-padded frame number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedNumber {
    pub text: String,
    /// The number needed more digits than configured
    pub overflowed: bool,
}

/// Format `value` with leading zeros to `digits` characters
///
/// When the value needs more digits than configured it is written at its
/// natural width and `overflowed` is set.
pub fn zero_padded(value: u64, digits: usize) -> PaddedNumber {
    let text = format!("{:0width$}", value, width = digits);
    let overflowed = text.len() > digits;
    PaddedNumber { text, overflowed }
}

/// Generates output paths for frame sequence numbers
#[derive(Debug, Clone)]
pub struct FrameNamer {
    directory: PathBuf,
    prefix: String,
    digits: usize,
    format: ImageFormat,
}

impl FrameNamer {
    pub fn new(
        output_dir: &Path,
        sub_directory: &str,
        prefix: &str,
        digits: usize,
        format: ImageFormat,
    ) -> Self {
        // Leading/trailing separators in the sub directory are tolerated
        let sub = sub_directory.trim_matches(|c| c == '/' || c == '\\');
        let directory = if sub.is_empty() {
            output_dir.to_path_buf()
        } else {
            output_dir.join(sub)
        };
        Self {
            directory,
            prefix: prefix.to_string(),
            digits,
            format,
        }
    }

    /// Directory every frame is written into
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Output path for `sequence`, and whether its number overflowed
    pub fn path_for(&self, sequence: u64) -> (PathBuf, bool) {
        let number = zero_padded(sequence, self.digits);
        if number.overflowed {
            warn!(
                sequence,
                digits = self.digits,
                "Frame counter exceeds configured digit count, file names widen"
            );
        }
        let file_name = format!("{}_{}.{}", self.prefix, number.text, self.format.extension());
        (self.directory.join(file_name), number.overflowed)
    }
}

/// Write `bytes` to `path`, creating parent directories as needed
///
/// Existing files are overwritten.
pub fn write_bytes(bytes: &[u8], path: &Path) -> CaptureResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    debug!(path = %path.display(), size = bytes.len(), "Frame written");
    Ok(())
}
