//! Best-effort environment probes.
//!
//! Each probe fills one or more document fields and reports what happened.
//! A probe never fails collection: when its source is unavailable it reports
//! [`ProbeOutcome::Omitted`] and leaves the affected fields untouched.

use std::fmt;

use serde::Serialize;

pub mod notebook;
pub mod system;
pub mod vcs;

pub use notebook::{colab_url, EnvNotebook, NoNotebook, NotebookMeta, NotebookResolver};
pub use system::{GpuInfo, HostSystem, LocalSystem, ProbeError};
pub use vcs::{GitRepo, NoVcs, VcsInfo};

/// The probes run by the collector, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Program,
    Code,
    StartedAt,
    Host,
    Username,
    Platform,
    Gpu,
    CpuCount,
    Cuda,
    Args,
}

impl Probe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Code => "code",
            Self::StartedAt => "started_at",
            Self::Host => "host",
            Self::Username => "username",
            Self::Platform => "platform",
            Self::Gpu => "gpu",
            Self::CpuCount => "cpu_count",
            Self::Cuda => "cuda",
            Self::Args => "args",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The probe wrote its field(s).
    Recorded,
    /// The probe left its field(s) unset.
    Omitted { reason: String },
}

impl ProbeOutcome {
    pub fn omitted(reason: impl Into<String>) -> Self {
        Self::Omitted {
            reason: reason.into(),
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recorded => f.write_str("recorded"),
            Self::Omitted { reason } => write!(f, "omitted ({})", reason),
        }
    }
}

/// One line of the collector's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub probe: Probe,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl ProbeReport {
    pub fn new(probe: Probe, outcome: ProbeOutcome) -> Self {
        Self { probe, outcome }
    }
}
