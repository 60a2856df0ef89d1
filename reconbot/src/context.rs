use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::Config;
use crate::layout::Layout;
use crate::lookup::LookupTable;
use crate::platforms::{DesktopEngine, Engines, ScriptingEngine};
use crate::window::RetryPolicy;

/// Everything a batch run loads once and shares read-only with each task.
pub struct RunContext {
    pub run_id: Uuid,
    pub config: Config,
    pub layout: Layout,
    pub lookup: LookupTable,
    pub scripting: Box<dyn ScriptingEngine>,
    pub desktop: Box<dyn DesktopEngine>,
}

impl RunContext {
    pub fn new(config: Config, layout: Layout, lookup: LookupTable, engines: Engines) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            layout,
            lookup,
            scripting: engines.scripting,
            desktop: engines.desktop,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.timings.window_attempts,
            timeout: self.config.timings.window_timeout,
        }
    }

    /// Where generated acts are saved: the configured folder, or the
    /// request's own folder.
    pub fn documents_folder(&self, request_folder: &Path) -> PathBuf {
        self.config
            .documents_folder
            .clone()
            .unwrap_or_else(|| request_folder.to_path_buf())
    }
}
