// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured frames
//!
//! All heavy work (encoding, disk I/O) runs in background tasks so the
//! thread that drives rendering never stalls.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Render       │ ──▶ │  Capture Pipeline │ ──▶ │ PNG/JPEG/EXR │
//! │ Target       │     │  - GPU readback   │     │ files        │
//! │              │     │  - Encoding       │     │              │
//! │              │     │  - Disk write     │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`capture`]: readback queueing, background encode+write

pub mod capture;
