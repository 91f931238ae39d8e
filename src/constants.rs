// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Default tracing filters, used when RUST_LOG is unset
pub mod logging {
    pub const DEFAULT_FILTER: &str = "warn";

    /// Shows the per-frame "Frame saved" echo
    pub const VERBOSE_FILTER: &str = "warn,frame_capture=info";
}

/// Default configuration values
pub mod defaults {
    /// Sub directory below the output directory that receives the frames
    pub const SUB_DIRECTORY: &str = "color";

    /// File name prefix before the frame number
    pub const FILE_PREFIX: &str = "img";

    /// Zero-padded width of the frame number
    pub const NUM_DIGITS: usize = 6;

    pub const FRAME_WIDTH: u32 = 640;
    pub const FRAME_HEIGHT: u32 = 480;

    /// Blocking threads available for encode+write jobs
    pub const WORKER_THREADS: usize = 4;

    /// Folder created in the user's pictures directory when no output
    /// directory is configured
    pub const OUTPUT_FOLDER: &str = "FrameCapture";

    /// Config file name inside the user config directory
    pub const CONFIG_FILE: &str = "frame-capture.json";
}

/// Encoder settings
pub mod encoding {
    /// JPEG quality used when no explicit quality is configured
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;

    /// Highest zlib level accepted for PNG
    pub const MAX_PNG_LEVEL: u8 = 9;
}

/// Validation limits
pub mod limits {
    /// A u64 frame counter never needs more digits than this
    pub const MAX_DIGITS: usize = 20;

    /// Largest accepted frame edge in pixels
    pub const MAX_FRAME_DIMENSION: u32 = 16_384;

    pub const MAX_WORKER_THREADS: usize = 256;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Sleep between pumps while draining at teardown
    pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(2);

    /// How long the CLI waits for outstanding frames on exit
    pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Frame interval of the synthetic renderer (about 60 fps)
    pub const SYNTHETIC_TICK: Duration = Duration::from_millis(16);

    /// Log queue depths every N ticks
    pub const STATS_LOG_INTERVAL: u64 = 60;
}

/// GPU readback constants
pub mod gpu {
    /// Polls the synthetic GPU needs before a copy completes
    pub const SYNTHETIC_LATENCY_POLLS: u32 = 2;

    /// Row padding of the synthetic GPU's mapped memory, in bytes
    pub const SYNTHETIC_ROW_PADDING: usize = 64;
}
