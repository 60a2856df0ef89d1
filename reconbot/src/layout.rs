//! Folder layout under the requests root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{InitError, TaskError};

pub const CONFIG_FILE: &str = "config.json";
const SUBDIRECTORIES: [&str; 5] = ["input", "error", "output", "logs", "temp"];
/// Sub folders of every request folder, for acts sent through electronic
/// document exchange and for the rest.
pub const REQUEST_SUBFOLDERS: [&str; 2] = ["ЭДО", "НЕ ЭДО"];

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    requests: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let requests = root.join("data").join("requests");
        Self { root, requests }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn input(&self) -> PathBuf {
        self.requests.join("input")
    }
    pub fn error(&self) -> PathBuf {
        self.requests.join("error")
    }
    pub fn output(&self) -> PathBuf {
        self.requests.join("output")
    }
    pub fn logs(&self) -> PathBuf {
        self.requests.join("logs")
    }
    pub fn temp(&self) -> PathBuf {
        self.requests.join("temp")
    }

    /// Creates every folder and empties `temp`.
    pub fn prepare(&self) -> Result<(), InitError> {
        for name in SUBDIRECTORIES {
            let path = self.requests.join(name);
            fs::create_dir_all(&path).map_err(|source| InitError::Layout {
                path: path.clone(),
                source,
            })?;
        }
        self.clear_temp();
        debug!("folder layout ready under {}", self.requests.display());
        Ok(())
    }

    /// Removes leftover files from `temp`. Failures are logged only.
    pub fn clear_temp(&self) {
        let temp = self.temp();
        let entries = match fs::read_dir(&temp) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {e}", temp.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("cannot delete {}: {e}", path.display());
                }
            }
        }
    }

    /// Request files waiting in `input`: `SD*.txt` with a `+` in the name,
    /// in name order.
    pub fn pending_requests(&self) -> Result<Vec<PathBuf>, InitError> {
        let input = self.input();
        let entries = fs::read_dir(&input).map_err(|source| InitError::Layout {
            path: input.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(is_request_file_name)
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        info!("{} request file(s) pending in {}", files.len(), input.display());
        Ok(files)
    }

    /// `<output>/<id>/{ЭДО,НЕ ЭДО}`, created if missing.
    pub fn create_request_folder(&self, id: &str) -> Result<PathBuf, TaskError> {
        let folder = self.output().join(id);
        for sub in REQUEST_SUBFOLDERS {
            let path = folder.join(sub);
            fs::create_dir_all(&path).map_err(|e| TaskError::io(&path, e))?;
        }
        Ok(folder)
    }
}

fn is_request_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("sd") && lower.ends_with(".txt") && name.contains('+')
}
