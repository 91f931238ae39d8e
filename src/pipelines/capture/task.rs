// SPDX-License-Identifier: GPL-3.0-only

//! Background encode+write tasks
//!
//! Each dispatched frame becomes one job on the tokio blocking pool. The job
//! owns its pixel buffer and destination path, so running jobs share
//! nothing. The only thing a job touches outside itself is its
//! [`CompletionFlag`], which the pipeline polls from the producer thread.
//!
//! ```text
//! Dispatched ──▶ Running ──▶ Complete
//!  (pump)        (worker)    (flag set once)
//! ```

use super::encoding::{Compression, ImageFormat, encode};
use crate::backends::PixelBuffer;
use crate::errors::{CaptureError, CaptureResult};
use crate::storage::write_bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

/// Lifecycle of a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Dispatched = 0,
    Running = 1,
    Complete = 2,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Dispatched,
            1 => TaskState::Running,
            _ => TaskState::Complete,
        }
    }
}

/// Result of one encode+write task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Written { path: PathBuf, bytes: usize },
    Failed(CaptureError),
}

#[derive(Debug)]
struct Completion {
    state: AtomicU8,
    outcome: OnceLock<TaskOutcome>,
}

/// Shared completion slot of one task
///
/// Written by the worker, read by the pipeline. The outcome is set exactly
/// once; later attempts are ignored.
#[derive(Debug, Clone)]
pub struct CompletionFlag(Arc<Completion>);

impl CompletionFlag {
    pub fn new() -> Self {
        Self(Arc::new(Completion {
            state: AtomicU8::new(TaskState::Dispatched as u8),
            outcome: OnceLock::new(),
        }))
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    fn mark_running(&self) {
        let _ = self.0.state.compare_exchange(
            TaskState::Dispatched as u8,
            TaskState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Publish the outcome. Returns false if one was already published.
    pub fn complete(&self, outcome: TaskOutcome) -> bool {
        let first = self.0.outcome.set(outcome).is_ok();
        if first {
            self.0
                .state
                .store(TaskState::Complete as u8, Ordering::Release);
        }
        first
    }

    pub fn is_complete(&self) -> bool {
        self.state() == TaskState::Complete
    }

    /// Outcome, once the task has completed
    pub fn outcome(&self) -> Option<&TaskOutcome> {
        if self.is_complete() {
            self.0.outcome.get()
        } else {
            None
        }
    }
}

impl Default for CompletionFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes the flag with a failure if the worker unwinds
struct CompleteOnDrop(CompletionFlag);

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if !self.0.is_complete() {
            self.0.complete(TaskOutcome::Failed(CaptureError::Task(
                "worker exited without reporting an outcome".into(),
            )));
        }
    }
}

/// Everything a worker needs to produce one file
#[derive(Debug)]
pub struct EncodeJob {
    pub sequence: u64,
    pub pixels: PixelBuffer,
    pub format: ImageFormat,
    pub compression: Compression,
    pub target_path: PathBuf,
}

impl EncodeJob {
    /// Encode then write. Runs on a worker thread.
    pub fn run(self) -> TaskOutcome {
        let sequence = self.sequence;
        match self.encode_and_write() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(sequence, kind = e.kind(), error = %e, "Frame not written");
                TaskOutcome::Failed(e)
            }
        }
    }

    fn encode_and_write(self) -> CaptureResult<TaskOutcome> {
        let bytes = encode(&self.pixels, self.format, self.compression)?;
        // Pixel memory is released before the disk write
        drop(self.pixels);
        write_bytes(&bytes, &self.target_path)?;
        Ok(TaskOutcome::Written {
            path: self.target_path,
            bytes: bytes.len(),
        })
    }
}

/// Number of jobs dispatched but not yet finished
#[derive(Debug, Default)]
struct JobCount {
    running: Mutex<usize>,
    idle: Condvar,
}

impl JobCount {
    fn increment(&self) {
        if let Ok(mut running) = self.running.lock() {
            *running += 1;
        }
    }

    fn decrement(&self) {
        if let Ok(mut running) = self.running.lock() {
            *running = running.saturating_sub(1);
            if *running == 0 {
                self.idle.notify_all();
            }
        }
    }

    fn get(&self) -> usize {
        self.running.lock().map(|running| *running).unwrap_or(0)
    }

    /// Block until every job has finished
    fn wait_idle(&self) {
        let Ok(mut running) = self.running.lock() else {
            return;
        };
        while *running > 0 {
            running = match self.idle.wait(running) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

/// Decrements the job count when the job ends, unwinding included
struct FinishOnDrop(Arc<JobCount>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Pool that runs encode+write jobs
///
/// Either borrows the ambient tokio runtime or owns a dedicated one. An owned
/// runtime is only shut down after every dispatched job has finished, so
/// dropping the pool never discards a queued frame.
pub struct Workers {
    handle: Handle,
    runtime: Option<Runtime>,
    jobs: Arc<JobCount>,
}

impl Workers {
    /// Use the tokio runtime the caller is running in
    pub fn current() -> CaptureResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| CaptureError::Configuration(format!("No tokio runtime: {}", e)))?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
            jobs: Arc::default(),
        }
    }

    /// Own a runtime whose blocking pool holds at most `threads` workers
    pub fn dedicated(threads: usize) -> CaptureResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads.max(1))
            .thread_name("frame-encode")
            .enable_all()
            .build()
            .map_err(|e| CaptureError::Configuration(format!("Failed to start workers: {}", e)))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            jobs: Arc::default(),
        })
    }

    /// Dispatch a job and return its completion flag
    pub fn spawn(&self, job: EncodeJob) -> CompletionFlag {
        let flag = CompletionFlag::new();
        let guard = CompleteOnDrop(flag.clone());
        self.jobs.increment();
        let finished = FinishOnDrop(self.jobs.clone());
        debug!(sequence = job.sequence, "Encode task dispatched");

        // The join handle is dropped; the flag is the only completion signal
        drop(self.handle.spawn_blocking(move || {
            // The flag is completed before the job count drops
            let _finished = finished;
            let guard = guard;
            guard.0.mark_running();
            let outcome = job.run();
            guard.0.complete(outcome);
        }));
        flag
    }

    /// Jobs dispatched that have not finished yet
    pub fn outstanding(&self) -> usize {
        self.jobs.get()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let outstanding = self.jobs.get();
            if outstanding > 0 {
                debug!(outstanding, "Waiting for encode tasks before shutdown");
                self.jobs.wait_idle();
            }
            // Safe to call from inside an async context, unlike dropping the runtime
            runtime.shutdown_background();
        }
    }
}
