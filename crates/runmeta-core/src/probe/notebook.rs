//! Notebook path resolution for runs without an entry-point file.

use serde::{Deserialize, Serialize};

/// Marker identifying a hosted-notebook session in a notebook path.
pub const COLAB_FILE_MARKER: &str = "fileId=";

/// Base URL of hosted notebooks.
pub const COLAB_DRIVE_URL: &str = "https://colab.research.google.com/drive/";

/// What a notebook resolver knows about the running notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookMeta {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
}

/// Source of notebook metadata in interactive contexts.
pub trait NotebookResolver: Send + Sync {
    /// `None` when not running in a notebook.
    fn notebook_metadata(&self) -> Option<NotebookMeta>;
}

/// Never a notebook.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotebook;

impl NotebookResolver for NoNotebook {
    fn notebook_metadata(&self) -> Option<NotebookMeta> {
        None
    }
}

/// Notebook metadata handed over by the launching kernel through
/// `RUNMETA_NOTEBOOK_PATH`, `RUNMETA_NOTEBOOK_NAME` and `RUNMETA_NOTEBOOK_ROOT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvNotebook;

impl NotebookResolver for EnvNotebook {
    fn notebook_metadata(&self) -> Option<NotebookMeta> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let meta = NotebookMeta {
            path: var("RUNMETA_NOTEBOOK_PATH"),
            name: var("RUNMETA_NOTEBOOK_NAME"),
            root: var("RUNMETA_NOTEBOOK_ROOT"),
        };
        if meta == NotebookMeta::default() {
            None
        } else {
            Some(meta)
        }
    }
}

/// Hosted-notebook URL for a notebook path carrying a session marker.
pub fn colab_url(path: &str) -> Option<String> {
    path.split(COLAB_FILE_MARKER)
        .nth(1)
        .map(|id| format!("{}{}", COLAB_DRIVE_URL, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_colab_url() {
        assert_eq!(
            colab_url("/v2/external/notebooks/intro.ipynb?fileId=1AbC").as_deref(),
            Some("https://colab.research.google.com/drive/1AbC")
        );
        assert_eq!(colab_url("/home/me/analysis.ipynb"), None);
    }

    #[test]
    #[serial]
    fn test_env_notebook() {
        for v in [
            "RUNMETA_NOTEBOOK_PATH",
            "RUNMETA_NOTEBOOK_NAME",
            "RUNMETA_NOTEBOOK_ROOT",
        ] {
            std::env::remove_var(v);
        }
        assert!(EnvNotebook.notebook_metadata().is_none());

        std::env::set_var("RUNMETA_NOTEBOOK_PATH", "nb/analysis.ipynb");
        std::env::set_var("RUNMETA_NOTEBOOK_ROOT", "/srv/work");
        let meta = EnvNotebook.notebook_metadata();
        std::env::remove_var("RUNMETA_NOTEBOOK_PATH");
        std::env::remove_var("RUNMETA_NOTEBOOK_ROOT");

        let meta = meta.expect("metadata from env");
        assert_eq!(meta.path.as_deref(), Some("nb/analysis.ipynb"));
        assert_eq!(meta.root.as_deref(), Some("/srv/work"));
        assert!(meta.name.is_none());
    }
}
