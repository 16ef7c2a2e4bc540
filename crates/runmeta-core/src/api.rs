//! Tracking API handle.
//!
//! The metadata subsystem only uses the API's version-control view.

use std::fmt;
use std::sync::Arc;

use crate::probe::{GitRepo, NoVcs, VcsInfo};

/// Handle to the tracking API, passed to [`Meta`](crate::Meta) at construction.
#[derive(Clone)]
pub struct Api {
    git: Arc<dyn VcsInfo>,
}

impl Api {
    pub fn new(git: impl VcsInfo + 'static) -> Self {
        Self { git: Arc::new(git) }
    }

    /// API whose VCS view is the git repository around the working directory.
    pub fn from_current_dir() -> Self {
        Self::new(GitRepo::from_current_dir())
    }

    /// API with no version control.
    pub fn without_vcs() -> Self {
        Self::new(NoVcs)
    }

    pub fn git(&self) -> &dyn VcsInfo {
        self.git.as_ref()
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}
