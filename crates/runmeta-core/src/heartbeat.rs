//! Periodic persistence of the metadata document.
//!
//! The loop is a three-state machine driven by [`HeartbeatClock`]:
//!
//! ```text
//! RUNNING --(elapsed > interval || shutdown)--> FLUSHING
//! FLUSHING --write, reset elapsed--> RUNNING | STOPPED (if shutdown)
//! ```
//!
//! Each RUNNING iteration waits one tick. Shutdown interrupts the wait but
//! never a write, and the task always performs a final write before it exits.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::{fields, iso_timestamp, MetadataDocument};
use crate::error::{MetaError, MetaResult};

/// Serializes the shared document to its well-known path.
///
/// Clones share the document and its lock, so every writer of the same run
/// observes the same working copy.
#[derive(Debug, Clone)]
pub struct MetadataWriter {
    path: PathBuf,
    document: Arc<Mutex<MetadataDocument>>,
}

impl MetadataWriter {
    pub fn new(path: impl Into<PathBuf>, document: MetadataDocument) -> Self {
        Self {
            path: path.into(),
            document: Arc::new(Mutex::new(document)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the working copy.
    ///
    /// A writer that panicked mid-update leaves the document usable, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, MetadataDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the working copy under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut MetadataDocument) -> R) -> R {
        f(&mut self.lock())
    }

    /// Clone of the working copy.
    pub fn snapshot(&self) -> MetadataDocument {
        self.lock().clone()
    }

    /// Stamp `heartbeatAt` and write the whole document.
    ///
    /// The lock is held for the stamp and the write and released on every
    /// path, including I/O failure.
    pub fn write(&self) -> MetaResult<()> {
        let mut doc = self.lock();
        doc.set(fields::HEARTBEAT_AT, iso_timestamp(Utc::now()));
        write_atomic(&self.path, &doc.to_file_contents())
    }
}

fn write_atomic(path: &Path, content: &str) -> MetaResult<()> {
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, content).map_err(|e| MetaError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MetaError::io(path, e)
    })
}

/// State of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Running,
    Flushing,
    Stopped,
}

/// Elapsed-time bookkeeping for the heartbeat loop.
#[derive(Debug, Clone)]
pub struct HeartbeatClock {
    interval: Duration,
    tick: Duration,
    elapsed: Duration,
}

impl HeartbeatClock {
    pub fn new(interval: Duration, tick: Duration) -> Self {
        Self {
            interval,
            tick,
            elapsed: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Next state from RUNNING.
    pub fn poll(&self, shutdown: bool) -> HeartbeatState {
        if shutdown || self.elapsed > self.interval {
            HeartbeatState::Flushing
        } else {
            HeartbeatState::Running
        }
    }

    /// Record one completed tick.
    pub fn advance(&mut self) {
        self.elapsed += self.tick;
    }

    /// Leave FLUSHING: elapsed resets to zero.
    pub fn flushed(&mut self, shutdown: bool) -> HeartbeatState {
        self.elapsed = Duration::ZERO;
        if shutdown {
            HeartbeatState::Stopped
        } else {
            HeartbeatState::Running
        }
    }
}

/// Background task re-writing the document every interval.
#[derive(Debug)]
pub struct Heartbeat {
    writer: MetadataWriter,
    interval: Duration,
    tick: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn new(writer: MetadataWriter, interval: Duration, tick: Duration) -> Self {
        Self {
            writer,
            interval,
            tick,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// Starting twice is a no-op.
    pub fn start(&mut self) -> MetaResult<()> {
        if self.task.is_some() {
            debug!("heartbeat already started");
            return Ok(());
        }
        if self.tick.is_zero() {
            return Err(MetaError::Config {
                message: "heartbeat tick must be greater than zero".into(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| MetaError::Task {
            message: format!("no tokio runtime: {}", e),
        })?;

        let clock = HeartbeatClock::new(self.interval, self.tick);
        let writer = self.writer.clone();
        let cancel = self.cancel.clone();
        self.task = Some(runtime.spawn(run_loop(writer, clock, cancel)));

        info!(
            path = %self.writer.path().display(),
            interval = ?self.interval,
            "heartbeat started"
        );
        Ok(())
    }

    /// Request shutdown and wait for the final write.
    ///
    /// Returns immediately when the task was never started.
    pub async fn shutdown(&mut self) -> MetaResult<()> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await.map_err(|e| MetaError::Task {
            message: e.to_string(),
        })
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        // A dropped handle still gets its final write.
        self.cancel.cancel();
    }
}

async fn run_loop(writer: MetadataWriter, mut clock: HeartbeatClock, cancel: CancellationToken) {
    let first = tokio::time::Instant::now() + clock.tick();
    let mut ticker = tokio::time::interval_at(first, clock.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let shutdown = cancel.is_cancelled();
        if clock.poll(shutdown) == HeartbeatState::Flushing {
            flush(&writer).await;
            if clock.flushed(shutdown) == HeartbeatState::Stopped {
                break;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = ticker.tick() => clock.advance(),
        }
    }

    info!(path = %writer.path().display(), "heartbeat stopped");
}

/// Write on the blocking pool; the document lock and file I/O are synchronous.
async fn flush(writer: &MetadataWriter) {
    let writer = writer.clone();
    match tokio::task::spawn_blocking(move || writer.write()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "heartbeat write failed"),
        Err(e) => warn!(error = %e, "heartbeat write task failed"),
    }
}
