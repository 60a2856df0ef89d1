//! Drives every pending request file through the workflow.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::context::RunContext;
use crate::document::JsonDocument;
use crate::errors::{InitError, TaskError};
use crate::launcher::Launcher;
use crate::layout::Layout;
use crate::lookup::LookupTable;
use crate::matcher::{match_company, Task};
use crate::platforms::{self, Engines};
use crate::request::{record_outcome, RequestRecord, STATUS_ERROR, STATUS_OK};
use crate::sequencer::{ReconciliationRun, RunReport};

/// Result of one request file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed { message: String },
    Failed { kind: String, message: String },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Completed { .. })
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<(PathBuf, BatchOutcome)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct BatchDriver<'a> {
    ctx: &'a RunContext,
}

impl<'a> BatchDriver<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Processes `files` in order. A failure only ever ends the file it
    /// happened in.
    pub async fn run(&self, files: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let span = info_span!("request", file = %name);
            let outcome = self.process(path).instrument(span).await;
            summary.outcomes.push((path.clone(), outcome));
        }
        info!(
            "batch finished: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        summary
    }

    async fn process(&self, path: &Path) -> BatchOutcome {
        info!("processing {}", path.display());
        let mut doc = match JsonDocument::from_file(path) {
            Ok(doc) => doc,
            Err(e) => {
                error!("unreadable request: {e}");
                self.quarantine(path);
                return failed(&e);
            }
        };

        let outcome = match self.run_task(&mut doc).await {
            Ok(report) => {
                let message = if report.status_text.trim().is_empty() {
                    STATUS_OK.to_string()
                } else {
                    report.status_text
                };
                info!("request done: {message}");
                record_outcome(&mut doc, STATUS_OK, &message);
                BatchOutcome::Completed { message }
            }
            Err(e) => {
                error!("request failed: {}", e.classified_message());
                let outcome = failed(&e);
                if let BatchOutcome::Failed { message, .. } = &outcome {
                    record_outcome(&mut doc, STATUS_ERROR, message);
                }
                outcome
            }
        };

        if let Err(e) = doc.save_to(path) {
            error!("cannot write outcome back: {e}");
        }
        outcome
    }

    async fn run_task(&self, doc: &mut JsonDocument) -> Result<RunReport, TaskError> {
        let request = RequestRecord::parse(doc)?;
        info!(
            request = %request.id,
            kind = %request.request_type,
            business_unit = %request.business_unit,
            inn = %request.inn,
            kpp = %request.kpp,
            "request parsed"
        );

        let row = match_company(&request, self.ctx.lookup.rows())?;
        let task = Task::build(request, row, &self.ctx.config.be_codes)?;
        let folder = self.ctx.layout.create_request_folder(task.id())?;

        ReconciliationRun::new(self.ctx, &task, folder).execute().await
    }

    /// Moves a file that is not a JSON object out of the inbox, since its
    /// outcome cannot be written into it.
    fn quarantine(&self, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let target = self.ctx.layout.error().join(name);
        match fs::rename(path, &target) {
            Ok(()) => warn!("moved to {}", target.display()),
            Err(e) => warn!("cannot move to {}: {e}", target.display()),
        }
    }
}

fn failed(e: &TaskError) -> BatchOutcome {
    BatchOutcome::Failed {
        kind: e.kind().to_string(),
        message: e.classified_message(),
    }
}

/// Full run: prepare folders, load configuration and lookup table, start
/// the launcher, then work through the inbox. Any error returned here
/// happened before a request file was touched.
pub async fn run_inbox(layout: Layout, config_path: &Path) -> Result<BatchSummary, InitError> {
    layout.prepare()?;
    let config = Config::load_or_init(config_path)?;

    let files = layout.pending_requests()?;
    if files.is_empty() {
        info!("no requests to process");
        return Ok(BatchSummary::default());
    }

    let lookup = LookupTable::load(&config.lookup_table_path())?;
    let Engines { scripting, desktop } = platforms::create_engines().map_err(InitError::Platform)?;

    Launcher::new(&config.sap_logon_path, config.launcher_window_title.clone())
        .timeout(config.timings.launcher_timeout)
        .launch(desktop.as_ref())
        .await
        .map_err(InitError::Launch)?;

    let ctx = RunContext::new(config, layout, lookup, Engines { scripting, desktop });
    let span = info_span!("run", id = %ctx.run_id);
    let summary = BatchDriver::new(&ctx).run(&files).instrument(span).await;
    Ok(summary)
}
