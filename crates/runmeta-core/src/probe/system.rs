//! OS-facing lookups used by the probes.
//!
//! [`HostSystem`] is the seam: [`LocalSystem`] queries the real machine,
//! tests substitute their own implementation to simulate restricted
//! environments (no user entry, no GPU library, ...).

use std::path::PathBuf;

use sysinfo::System;

/// Environment variables consulted for the login name before the user
/// database, in order.
const LOGIN_VARS: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];

/// Why a system lookup produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The facility does not exist on this platform or build.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The user database has no entry for the current uid.
    #[error("no user database entry for uid {uid}")]
    NoUserEntry { uid: u32 },

    /// The GPU management library failed to initialize or answer.
    #[error("gpu library error: {0}")]
    Gpu(String),
}

/// First GPU's name and the number of devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuInfo {
    pub name: String,
    pub count: u32,
}

/// OS lookups consulted by the collector.
pub trait HostSystem: Send + Sync {
    /// Working directory of the process.
    fn current_dir(&self) -> Option<PathBuf>;

    /// System host name.
    fn hostname(&self) -> Option<String>;

    /// Login name of the current user.
    fn os_user(&self) -> Result<String, ProbeError>;

    /// Numeric user id, where the platform has one.
    fn uid(&self) -> Option<u32>;

    /// Human-readable platform string (`Linux-6.1.0-x86_64`).
    fn platform(&self) -> String;

    /// GPU name and count.
    fn gpu(&self) -> Result<GpuInfo, ProbeError>;

    /// Logical CPU count.
    fn cpu_count(&self) -> Option<usize>;
}

/// [`HostSystem`] backed by the running machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSystem;

impl HostSystem for LocalSystem {
    fn current_dir(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }

    fn hostname(&self) -> Option<String> {
        System::host_name().filter(|h| !h.is_empty())
    }

    fn os_user(&self) -> Result<String, ProbeError> {
        for var in LOGIN_VARS {
            if let Ok(name) = std::env::var(var) {
                if !name.is_empty() {
                    return Ok(name);
                }
            }
        }
        lookup_user_entry()
    }

    fn uid(&self) -> Option<u32> {
        current_uid()
    }

    fn platform(&self) -> String {
        let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
        match System::kernel_version() {
            Some(kernel) => format!("{}-{}-{}", name, kernel, std::env::consts::ARCH),
            None => format!("{}-{}", name, std::env::consts::ARCH),
        }
    }

    fn gpu(&self) -> Result<GpuInfo, ProbeError> {
        query_gpu()
    }

    fn cpu_count(&self) -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }
}

#[cfg(unix)]
fn current_uid() -> Option<u32> {
    Some(nix::unistd::getuid().as_raw())
}

#[cfg(not(unix))]
fn current_uid() -> Option<u32> {
    None
}

#[cfg(unix)]
fn lookup_user_entry() -> Result<String, ProbeError> {
    let uid = nix::unistd::getuid();
    match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(ProbeError::NoUserEntry { uid: uid.as_raw() }),
        Err(e) => Err(ProbeError::Unavailable(format!("user lookup failed: {}", e))),
    }
}

#[cfg(not(unix))]
fn lookup_user_entry() -> Result<String, ProbeError> {
    Err(ProbeError::Unavailable("no user database on this platform".into()))
}

#[cfg(feature = "nvidia")]
fn query_gpu() -> Result<GpuInfo, ProbeError> {
    use nvml_wrapper::Nvml;

    let nvml = Nvml::init().map_err(|e| ProbeError::Gpu(e.to_string()))?;
    let device = nvml
        .device_by_index(0)
        .map_err(|e| ProbeError::Gpu(e.to_string()))?;
    let name = device.name().map_err(|e| ProbeError::Gpu(e.to_string()))?;
    let count = nvml.device_count().map_err(|e| ProbeError::Gpu(e.to_string()))?;
    Ok(GpuInfo { name, count })
}

#[cfg(not(feature = "nvidia"))]
fn query_gpu() -> Result<GpuInfo, ProbeError> {
    Err(ProbeError::Unavailable("built without the `nvidia` feature".into()))
}
