// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use frame_capture::constants::gpu::SYNTHETIC_LATENCY_POLLS;
use frame_capture::constants::logging;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "frame-capture")]
#[command(about = "Capture rendered frames to image sequences without stalling the render loop")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a synthetic render loop through a simulated GPU
    Synthetic {
        #[command(flatten)]
        options: cli::CaptureOptions,

        /// Polls each simulated GPU copy needs before it completes
        #[arg(long, default_value_t = SYNTHETIC_LATENCY_POLLS)]
        latency: u32,

        /// Render target hands out BGRA instead of RGBA
        #[arg(long)]
        bgra: bool,
    },

    /// Capture from a headless wgpu render target
    Gpu {
        #[command(flatten)]
        options: cli::CaptureOptions,

        /// Fall back to a software adapter when no GPU is found
        #[arg(long)]
        software: bool,
    },

    /// Print the default configuration as JSON
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write to the user config directory
        #[arg(long, conflicts_with = "output")]
        user: bool,
    },
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=frame_capture=debug, RUST_LOG=info
fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Capture commands resolve their config first, so a config file with
    // "verbose": true raises the default filter just like --verbose
    match cli.command {
        Commands::Synthetic {
            options,
            latency,
            bgra,
        } => {
            let config = options.to_config()?;
            init_logging(config.log_filter());
            cli::capture_synthetic(config, options.frames, latency, bgra)
        }
        Commands::Gpu { options, software } => {
            let config = options.to_config()?;
            init_logging(config.log_filter());
            cli::capture_gpu(config, options.frames, software)
        }
        Commands::Config { output, user } => {
            init_logging(logging::DEFAULT_FILTER);
            cli::write_default_config(output, user)
        }
    }
}
