//! Per-run metadata lifecycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::Api;
use crate::collector::{Collector, Environment};
use crate::config::MetaConfig;
use crate::document::{fields, MetadataDocument, RunState, METADATA_FILE_NAME};
use crate::error::MetaResult;
use crate::heartbeat::{Heartbeat, MetadataWriter};
use crate::probe::ProbeReport;

/// Metadata for one run directory.
///
/// Construction loads any existing document from `<out_dir>/wandb-metadata.json`
/// and runs every probe against it. [`start`](Self::start) launches the
/// heartbeat; [`shutdown`](Self::shutdown) stops it after a final write.
///
/// ```no_run
/// use runmeta_core::{Api, Meta, MetaConfig};
///
/// # async fn example() -> runmeta_core::MetaResult<()> {
/// let config = MetaConfig::from_env().with_out_dir("runs/latest");
/// let mut meta = Meta::new(&Api::from_current_dir(), config, chrono::Utc::now());
/// meta.start()?;
/// // ... the tracked program runs ...
/// meta.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Meta {
    out_dir: PathBuf,
    writer: MetadataWriter,
    heartbeat: Heartbeat,
    reports: Vec<ProbeReport>,
}

impl Meta {
    /// Collect metadata for the current process on this machine.
    pub fn new(api: &Api, config: MetaConfig, started_at: DateTime<Utc>) -> Self {
        Self::with_environment(api, config, started_at, Environment::local())
    }

    /// Collect metadata using explicit OS services and program identity.
    pub fn with_environment(
        api: &Api,
        config: MetaConfig,
        started_at: DateTime<Utc>,
        env: Environment,
    ) -> Self {
        let path = config.out_dir.join(METADATA_FILE_NAME);
        let mut document = MetadataDocument::load(&path);

        let reports = Collector::new(&config, api.git(), &env, started_at).collect(&mut document);
        let recorded = reports.iter().filter(|r| r.outcome.is_recorded()).count();
        debug!(recorded, total = reports.len(), "metadata collected");

        let writer = MetadataWriter::new(path, document);
        let heartbeat = Heartbeat::new(
            writer.clone(),
            config.heartbeat_interval(),
            config.heartbeat_tick(),
        );

        Self {
            out_dir: config.out_dir,
            writer,
            heartbeat,
            reports,
        }
    }

    /// Start the heartbeat on the current tokio runtime.
    pub fn start(&mut self) -> MetaResult<()> {
        self.heartbeat.start()
    }

    /// Stamp the heartbeat and write the document now.
    pub fn write(&self) -> MetaResult<()> {
        self.writer.write()
    }

    /// Stop the heartbeat, waiting for its final write.
    pub async fn shutdown(&mut self) -> MetaResult<()> {
        self.heartbeat.shutdown().await
    }

    pub fn set_state(&self, state: RunState) {
        self.writer.update(|doc| doc.set(fields::STATE, state.as_str()));
    }

    pub fn set_exit_code(&self, code: i32) {
        self.writer.update(|doc| doc.set(fields::EXIT_CODE, code));
    }

    /// Outcome of every probe run at construction.
    pub fn probe_reports(&self) -> &[ProbeReport] {
        &self.reports
    }

    /// Copy of the current working document.
    pub fn snapshot(&self) -> MetadataDocument {
        self.writer.snapshot()
    }

    /// Writer sharing this run's document and lock.
    pub fn writer(&self) -> MetadataWriter {
        self.writer.clone()
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}
