//! One-shot metadata collection.
//!
//! [`Collector::collect`] runs every probe in a fixed order against a
//! [`MetadataDocument`]. Probes are independent: each one either records its
//! fields or reports why it left them alone, and collection always completes.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::MetaConfig;
use crate::document::{fields, iso_timestamp, MetadataDocument, RunState};
use crate::probe::{
    colab_url, HostSystem, LocalSystem, NoNotebook, NotebookResolver, Probe, ProbeOutcome,
    ProbeReport, VcsInfo,
};

/// Program value recorded when there is no entry-point file.
pub const NO_MAIN_FILE: &str = "<program with no main file>";

/// Subdirectory of the output directory receiving captured code.
pub const CODE_DIR: &str = "code";

/// Identity of the tracked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    /// Entry-point file, relative to the working directory or absolute.
    pub program: Option<PathBuf>,

    /// Runtime or interpreter version.
    pub runtime_version: Option<String>,

    /// Path of the executable running the program.
    pub executable: Option<PathBuf>,

    /// Command-line arguments, program name excluded.
    pub args: Vec<String>,
}

impl ProgramInfo {
    /// The current process: `argv[0]` as program, the running binary as
    /// executable.
    ///
    /// `runtime_version` stays unset: a native binary has no interpreter, so
    /// the `python` field is only recorded when the caller supplies one with
    /// [`with_runtime_version`](Self::with_runtime_version).
    pub fn current() -> Self {
        let mut argv = std::env::args();
        let program = argv.next().map(PathBuf::from);
        Self {
            program,
            runtime_version: None,
            executable: std::env::current_exe().ok(),
            args: argv.collect(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// OS services and program identity the probes read from.
#[derive(Clone)]
pub struct Environment {
    pub system: Arc<dyn HostSystem>,
    pub notebook: Arc<dyn NotebookResolver>,
    pub program: ProgramInfo,
}

impl Environment {
    /// The running machine and process.
    pub fn local() -> Self {
        Self {
            system: Arc::new(LocalSystem),
            notebook: Arc::new(NoNotebook),
            program: ProgramInfo::current(),
        }
    }

    pub fn with_system(mut self, system: impl HostSystem + 'static) -> Self {
        self.system = Arc::new(system);
        self
    }

    pub fn with_notebook(mut self, notebook: impl NotebookResolver + 'static) -> Self {
        self.notebook = Arc::new(notebook);
        self
    }

    pub fn with_program(mut self, program: ProgramInfo) -> Self {
        self.program = program;
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

/// Runs the probes.
pub struct Collector<'a> {
    config: &'a MetaConfig,
    vcs: &'a dyn VcsInfo,
    env: &'a Environment,
    started_at: DateTime<Utc>,
}

impl<'a> Collector<'a> {
    pub fn new(
        config: &'a MetaConfig,
        vcs: &'a dyn VcsInfo,
        env: &'a Environment,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            vcs,
            env,
            started_at,
        }
    }

    /// Populate `doc`, returning one report per probe in execution order.
    pub fn collect(&self, doc: &mut MetadataDocument) -> Vec<ProbeReport> {
        let steps: [(Probe, fn(&Self, &mut MetadataDocument) -> ProbeOutcome); 10] = [
            (Probe::Program, Self::probe_program),
            (Probe::Code, Self::probe_code),
            (Probe::StartedAt, Self::probe_started_at),
            (Probe::Host, Self::probe_host),
            (Probe::Username, Self::probe_username),
            (Probe::Platform, Self::probe_platform),
            (Probe::Gpu, Self::probe_gpu),
            (Probe::CpuCount, Self::probe_cpu_count),
            (Probe::Cuda, Self::probe_cuda),
            (Probe::Args, Self::probe_args),
        ];

        steps
            .into_iter()
            .map(|(probe, run)| {
                let outcome = run(self, doc);
                match &outcome {
                    ProbeOutcome::Recorded => debug!(probe = %probe, "probe recorded"),
                    ProbeOutcome::Omitted { reason } => {
                        debug!(probe = %probe, reason = %reason, "probe omitted")
                    }
                }
                ProbeReport::new(probe, outcome)
            })
            .collect()
    }

    fn probe_program(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        if let Some(cwd) = self.env.system.current_dir() {
            doc.set(fields::ROOT, path_string(&cwd));
        }

        if let Some(program) = &self.env.program.program {
            doc.set(fields::PROGRAM, path_string(program));
            return ProbeOutcome::Recorded;
        }

        doc.set(fields::PROGRAM, NO_MAIN_FILE);
        let Some(meta) = self.env.notebook.notebook_metadata() else {
            return ProbeOutcome::omitted("no entry-point file");
        };
        let Some(path) = meta.path else {
            return ProbeOutcome::omitted("no entry-point file and no notebook path");
        };

        if let Some(url) = colab_url(&path) {
            doc.set(fields::COLAB, url);
            if let Some(name) = meta.name {
                doc.set(fields::PROGRAM, name);
            }
        } else {
            doc.set(fields::PROGRAM, path);
            if let Some(root) = meta.root {
                doc.set(fields::ROOT, root);
            }
        }
        ProbeOutcome::Recorded
    }

    fn probe_code(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        if self.config.disable_code {
            return ProbeOutcome::omitted("code capture disabled");
        }

        if self.vcs.enabled() {
            let mut git = Map::new();
            git.insert("remote".into(), self.vcs.remote_url().into());
            git.insert("commit".into(), self.vcs.last_commit().into());
            doc.set(fields::GIT, Value::Object(git));
            doc.set(fields::EMAIL, self.vcs.email());
            if let Some(root) = self.vcs.root() {
                doc.set(fields::ROOT, path_string(&root));
            }
            return ProbeOutcome::Recorded;
        }

        let Some(program) = doc.get_str(fields::PROGRAM).map(PathBuf::from) else {
            return ProbeOutcome::omitted("no program recorded");
        };
        let root = doc.get_str(fields::ROOT).map(PathBuf::from).unwrap_or_default();
        let source = root.join(&program);
        if let Some(executable) = &self.env.program.executable {
            if *executable == program || *executable == source {
                return ProbeOutcome::omitted("program is the executable, not a source file");
            }
        }
        if !source.is_file() {
            return ProbeOutcome::omitted(format!("program not found: {}", source.display()));
        }

        let saved = self.config.out_dir.join(CODE_DIR).join(capture_name(&program));
        if saved.exists() {
            return ProbeOutcome::omitted("program already captured");
        }
        if let Some(parent) = saved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ProbeOutcome::omitted(format!("cannot create code dir: {}", e));
            }
        }
        match std::fs::copy(&source, &saved) {
            Ok(_) => {
                doc.set(fields::CODE_SAVED, true);
                ProbeOutcome::Recorded
            }
            Err(e) => ProbeOutcome::omitted(format!("copy failed: {}", e)),
        }
    }

    fn probe_started_at(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        doc.set(fields::STARTED_AT, iso_timestamp(self.started_at));
        ProbeOutcome::Recorded
    }

    fn probe_host(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        match self.config.host.clone().or_else(|| self.env.system.hostname()) {
            Some(host) => {
                doc.set(fields::HOST, host);
                ProbeOutcome::Recorded
            }
            None => ProbeOutcome::omitted("host name lookup failed"),
        }
    }

    fn probe_username(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        if let Some(name) = &self.config.username {
            doc.set(fields::USERNAME, name.as_str());
            return ProbeOutcome::Recorded;
        }
        match self.env.system.os_user() {
            Ok(name) => {
                doc.set(fields::USERNAME, name);
                ProbeOutcome::Recorded
            }
            Err(e) => match self.env.system.uid() {
                Some(uid) => {
                    debug!(error = %e, uid, "falling back to numeric uid");
                    doc.set(fields::USERNAME, uid.to_string());
                    ProbeOutcome::Recorded
                }
                None => ProbeOutcome::omitted(e.to_string()),
            },
        }
    }

    fn probe_platform(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        let program = &self.env.program;
        doc.set(fields::OS, self.env.system.platform());
        if let Some(version) = &program.runtime_version {
            doc.set(fields::RUNTIME, version.as_str());
        }
        if let Some(executable) = &program.executable {
            doc.set(fields::EXECUTABLE, path_string(executable));
        }
        if let Some(docker) = &self.config.docker {
            doc.set(fields::DOCKER, docker.as_str());
        }
        ProbeOutcome::Recorded
    }

    fn probe_gpu(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        match self.env.system.gpu() {
            Ok(gpu) => {
                doc.set(fields::GPU, gpu.name);
                doc.set(fields::GPU_COUNT, gpu.count);
                ProbeOutcome::Recorded
            }
            Err(e) => ProbeOutcome::omitted(e.to_string()),
        }
    }

    fn probe_cpu_count(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        match self.env.system.cpu_count() {
            Some(n) => {
                doc.set(fields::CPU_COUNT, n);
                ProbeOutcome::Recorded
            }
            None => ProbeOutcome::omitted("cpu count unavailable"),
        }
    }

    fn probe_cuda(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        let path = &self.config.cuda_version_file;
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::omitted(format!("{}: {}", path.display(), e)),
        };
        match parse_cuda_version(&content) {
            Some(version) => {
                doc.set(fields::CUDA, version);
                ProbeOutcome::Recorded
            }
            None => ProbeOutcome::omitted(format!("{} is empty", path.display())),
        }
    }

    fn probe_args(&self, doc: &mut MetadataDocument) -> ProbeOutcome {
        doc.set(fields::ARGS, self.env.program.args.clone());
        doc.set(fields::STATE, RunState::Running.as_str());
        ProbeOutcome::Recorded
    }
}

/// Last whitespace-delimited token of a toolkit version file
/// (`CUDA Version 10.0.130` -> `10.0.130`).
pub fn parse_cuda_version(content: &str) -> Option<String> {
    content.split_whitespace().last().map(str::to_string)
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

/// Location of a captured program below the code directory. Relative paths
/// are kept; anything that could escape the directory collapses to the file name.
fn capture_name(program: &Path) -> PathBuf {
    let escapes = program
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        program
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("program"))
    } else {
        program.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cuda_version() {
        assert_eq!(
            parse_cuda_version("CUDA Version 10.0.130\n").as_deref(),
            Some("10.0.130")
        );
        assert_eq!(parse_cuda_version("  \n"), None);
    }

    #[test]
    fn test_capture_name() {
        assert_eq!(capture_name(Path::new("src/train.py")), PathBuf::from("src/train.py"));
        assert_eq!(capture_name(Path::new("/abs/train.py")), PathBuf::from("train.py"));
        assert_eq!(capture_name(Path::new("../up/train.py")), PathBuf::from("train.py"));
    }

    #[test]
    fn test_program_info_builder() {
        let info = ProgramInfo::default()
            .with_program("train.py")
            .with_runtime_version("3.11.4")
            .with_args(["--lr", "0.1"]);
        assert_eq!(info.program, Some(PathBuf::from("train.py")));
        assert_eq!(info.args, vec!["--lr".to_string(), "0.1".to_string()]);
        assert!(info.executable.is_none());
    }

    #[test]
    fn test_current_program_leaves_runtime_version_unset() {
        let info = ProgramInfo::current();
        assert!(info.runtime_version.is_none());
        assert!(info.executable.is_some());
    }
}
