//! Run metadata for experiment tracking.
//!
//! This crate collects a point-in-time description of a run (program, VCS
//! state, host, user, platform, hardware, arguments) and keeps it on disk,
//! re-stamping a heartbeat timestamp from a background task:
//!
//! - Best-effort probes: an unavailable source omits its field and is
//!   reported, never fatal
//! - A single lock around the working document, shared by every writer
//! - Periodic heartbeat writes with a final flush on shutdown
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `RUNMETA_DIR` | Output directory (default `.`) |
//! | `RUNMETA_DISABLE_CODE` | Disable code capture and VCS recording |
//! | `RUNMETA_HOST` | Host name override |
//! | `RUNMETA_USERNAME` | Username override |
//! | `RUNMETA_DOCKER` | Container identifier |
//! | `RUNMETA_HEARTBEAT_SECS` | Heartbeat interval in seconds (default: 15) |

pub mod api;
pub mod collector;
pub mod config;
pub mod document;
pub mod error;
pub mod heartbeat;
pub mod meta;
pub mod probe;
pub mod safe_json;

// Re-export main types
pub use api::Api;
pub use collector::{Collector, Environment, ProgramInfo, CODE_DIR, NO_MAIN_FILE};
pub use config::MetaConfig;
pub use document::{fields, iso_timestamp, MetadataDocument, RunState, METADATA_FILE_NAME};
pub use error::{MetaError, MetaResult};
pub use heartbeat::{Heartbeat, HeartbeatClock, HeartbeatState, MetadataWriter};
pub use meta::Meta;
pub use probe::{
    GitRepo, GpuInfo, HostSystem, LocalSystem, NoNotebook, NoVcs, NotebookMeta,
    NotebookResolver, Probe, ProbeError, ProbeOutcome, ProbeReport, VcsInfo,
};
