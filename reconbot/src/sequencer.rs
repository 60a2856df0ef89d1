//! The reconciliation-act workflow for one task.
//!
//! Each [`Stage`] is a step function returning `Result`. The run stops at
//! the first failing stage and, if a session was opened, tries to leave it
//! with `/nex` before reporting the failure.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use crate::context::RunContext;
use crate::errors::{AutomationError, TaskError};
use crate::matcher::{validate_agreement_number, Task};
use crate::request::RequestType;
use crate::selector::{WindowPredicate, WindowRole};
use crate::session::{vkey, Session};
use crate::window::{ControlRole, WindowHandle, WindowWaiter};

pub const TRANSACTION: &str = "ZTSF_AKT_SVERKI";
pub const LOCKED_TENANT_MESSAGE: &str = "Этот мандант сейчас блокирован для регистрации в нём.";
pub const RESULTS_TITLE: &str = "Акт сверки расчетов с контрагентами: ALV отчет";
pub const NOT_FOUND_MARKER: &str = "не найдены";
pub const BROWSE_FOLDER_TITLE: &str = "Browse for Files or Folders";
pub const EXCEPTIONS_FILE: &str = "errorsAC.xls";
const DATE_FORMAT: &str = "%d.%m.%Y";

mod ids {
    pub const COMPANY_CODE: &str = "wnd[0]/usr/ctxtP_BUKRS";
    pub const DATE_LOW: &str = "wnd[0]/usr/ctxtS_BUDAT-LOW";
    pub const DATE_HIGH: &str = "wnd[0]/usr/ctxtS_BUDAT-HIGH";
    pub const OTHER_ACTS: &str = "wnd[0]/usr/radP_PROCH";
    pub const COUNTERPARTY: &str = "wnd[0]/usr/ctxtS_PARTN-LOW";
    pub const DETAIL: &str = "wnd[0]/usr/chkP_DETAIL";
    pub const ALL_AGREEMENTS: &str = "wnd[0]/usr/chkP_PRALL";
    pub const AGREEMENT: &str = "wnd[0]/usr/chkP_AGREE";
    pub const ZERO_BALANCE: &str = "wnd[0]/usr/chkP_NULL";
    pub const AGREEMENTS_MULTI: &str = "wnd[0]/usr/btn%_S_ZUONR_%_APP_%-VALU_PUSH";
    pub const ACCOUNTS_MULTI: &str = "wnd[0]/usr/btn%_S_HKONT_%_APP_%-VALU_PUSH";
    pub const INCLUDE_CELL: &str = "wnd[1]/usr/tabsTAB_STRIP/tabpSIVA/ssubSCREEN_HEADER:SAPLALDB:3010/tblSAPLALDBSINGLE/ctxtRSCSEL_255-SLOW_I[1,0]";
    pub const EXCLUDE_TAB: &str = "wnd[1]/usr/tabsTAB_STRIP/tabpNOSV";
    pub const EXCLUDE_TABLE: &str = "wnd[1]/usr/tabsTAB_STRIP/tabpSIVA/ssubSCREEN_HEADER:SAPLALDB:3030/tblSAPLALDBSINGLE_E";
    pub const EXCLUDE_CELL_PREFIX: &str = "wnd[1]/usr/tabsTAB_STRIP/tabpNOSV/ssubSCREEN_HEADER:SAPLALDB:3030/tblSAPLALDBSINGLE_E/ctxtRSCSEL_255-SLOW_E";
    pub const POPUP_EXECUTE: &str = "wnd[1]/tbar[0]/btn[8]";
    pub const POPUP_OK: &str = "wnd[1]/tbar[0]/btn[0]";
    pub const POPUP_PASTE: &str = "wnd[1]/tbar[0]/btn[24]";
    pub const EXECUTE: &str = "wnd[0]/tbar[1]/btn[8]";
    pub const GRID: &str = "wnd[0]/shellcont/shell";
    pub const SELECT_MARKED: &str = "wnd[0]/tbar[1]/btn[16]";
    pub const GENERATE: &str = "wnd[0]/tbar[1]/btn[13]";
    pub const DESELECT: &str = "wnd[0]/tbar[1]/btn[17]";
    pub const EXPORT_DOCUMENTS: &str = "wnd[0]/tbar[1]/btn[20]";
    pub const POPUP_BUTTON_1: &str = "wnd[1]/usr/btnBUTTON_1";
    pub const SIGNER_1: &str = "wnd[1]/usr/ctxtP_RUKOV1";
    pub const SIGNER_2: &str = "wnd[1]/usr/ctxtP_BUGAL2";
    pub const POPUP_WINDOW: &str = "wnd[1]";
    pub const HELP_SELECTION_TAB: &str = "wnd[2]/tbar[0]/btn[17]";
    pub const HELP_OK: &str = "wnd[2]/tbar[0]/btn[0]";
    pub const HELP_EXECUTE: &str = "wnd[2]/tbar[0]/btn[8]";
    pub const HELP_PREFIX: &str = "wnd[2]/usr/tabsG_SELONETABSTRIP/tabpTAB001/ssubSUBSCR_PRESEL:SAPLSDH4:0220/sub:SAPLSDH4:0220";
    pub const FILTER_VALUES: &str = "wnd[1]/usr/ssub%_SUBSCREEN_FREESEL:SAPLSSEL:1105/btn%_%%DYN001_%_APP_%-VALU_PUSH";
    pub const FILTER_EXCLUDE_TAB: &str = "wnd[2]/usr/tabsTAB_STRIP/tabpNOSV";
    pub const FILTER_EXCLUDE_CELL: &str = "wnd[2]/usr/tabsTAB_STRIP/tabpNOSV/ssubSCREEN_HEADER:SAPLALDB:3030/tblSAPLALDBSINGLE_E/ctxtRSCSEL_255-SLOW_E[1,0]";
    pub const SPREADSHEET_FORMAT: &str = "wnd[1]/usr/subSUBSCREEN_STEPLOOP:SAPLSPO5:0150/sub:SAPLSPO5:0150/radSPOPLI-SELFLAG[1,0]";
}

/// Accounts excluded from the act, in the batches the selection table takes
/// between scrolls.
pub const ACCOUNT_BATCHES: [&[&str]; 7] = [
    &[
        "6201010101", "6201010201", "6201010301", "6201010401", "6201010501", "6201010601",
        "6201020101", "6201030101",
    ],
    &[
        "6201030201", "6201030301", "6201030401", "6201030501", "6201030601", "6201030701",
        "6201040201",
    ],
    &[
        "6201040301", "6201110101", "6201130101", "6202010101", "6202010201", "6202010301",
        "6202010401",
    ],
    &[
        "6202010501", "6202010601", "6202020101", "6202030101", "6202030201", "6202030301",
        "6202030401",
    ],
    &[
        "6202030501", "6202030601", "6202030701", "6202040201", "6202040301", "6202110101",
        "6202120101",
    ],
    &[
        "6202130101", "7602020101", "7602040101", "7611010101", "7615020101", "7602010102",
        "7602020102",
    ],
    &["7602030102", "7602010101", "7602040102", "7615020102", "760903*"],
];

/// Scroll position of the exclusion table before batch `n + 1`.
pub const SCROLL_POSITIONS: [i32; 6] = [7, 14, 21, 28, 35, 42];

/// Workflow states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Disconnected,
    SessionEstablished,
    TransactionOpen,
    CriteriaEntered,
    ResultsListed,
    DocumentsGenerated,
    SignatoriesAssigned,
    DocumentsFinalized,
    ExceptionsExported,
    SessionClosed,
}

impl Stage {
    /// Stages a run steps through after `Disconnected`.
    pub const WORKFLOW: [Stage; 9] = [
        Stage::SessionEstablished,
        Stage::TransactionOpen,
        Stage::CriteriaEntered,
        Stage::ResultsListed,
        Stage::DocumentsGenerated,
        Stage::SignatoriesAssigned,
        Stage::DocumentsFinalized,
        Stage::ExceptionsExported,
        Stage::SessionClosed,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Status bar text captured after the documents were finalized
    pub status_text: String,
    /// The remote side already had documents and generated them again
    pub regenerated: bool,
    pub completed: Vec<Stage>,
}

pub struct ReconciliationRun<'a> {
    ctx: &'a RunContext,
    task: &'a Task,
    request_folder: PathBuf,
    session: Option<Session>,
    stage: Stage,
    report: RunReport,
}

impl<'a> ReconciliationRun<'a> {
    pub fn new(ctx: &'a RunContext, task: &'a Task, request_folder: PathBuf) -> Self {
        Self {
            ctx,
            task,
            request_folder,
            session: None,
            stage: Stage::Disconnected,
            report: RunReport::default(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[instrument(level = "info", skip(self), fields(request = %self.task.id()))]
    pub async fn execute(mut self) -> Result<RunReport, TaskError> {
        for stage in Stage::WORKFLOW {
            if let Err(e) = self.enter(stage).await {
                let e = e.at_stage(stage);
                error!("{e}");
                self.close_after_failure(stage).await;
                return Err(e);
            }
            info!("reached {stage}");
            self.stage = stage;
            self.report.completed.push(stage);
        }
        Ok(self.report)
    }

    async fn enter(&mut self, stage: Stage) -> Result<(), TaskError> {
        match stage {
            Stage::Disconnected => Ok(()),
            Stage::SessionEstablished => self.establish_session().await,
            Stage::TransactionOpen => self.open_transaction().await,
            Stage::CriteriaEntered => self.enter_criteria().await,
            Stage::ResultsListed => self.list_results().await,
            Stage::DocumentsGenerated => self.generate_documents().await,
            Stage::SignatoriesAssigned => self.assign_signatories().await,
            Stage::DocumentsFinalized => self.finalize_documents().await,
            Stage::ExceptionsExported => self.export_documents().await,
            Stage::SessionClosed => self.close_session().await,
        }
    }

    fn session(&self) -> Result<&Session, TaskError> {
        self.session.as_ref().ok_or_else(|| {
            AutomationError::PlatformError("no remote session is open".to_string()).into()
        })
    }

    async fn close_after_failure(&mut self, failed: Stage) {
        if failed == Stage::SessionClosed {
            return;
        }
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => info!("session closed after failure"),
                Err(e) => warn!("could not close session after failure: {e}"),
            }
        }
    }

    async fn establish_session(&mut self) -> Result<(), TaskError> {
        let ctx = self.ctx;
        let config = &ctx.config;
        let inner = ctx.scripting.open_session(&config.sap_stage)?;
        self.session = Some(Session::new(inner, config.timings.clone()));
        let session = self.session()?;

        if config.is_test_stage() {
            session.login(&config.sap_user, &config.sap_password).await?;
        }

        let status = session.wait_status_stable().await?;
        if status.contains(LOCKED_TENANT_MESSAGE) {
            return Err(AutomationError::Status(status).into());
        }
        info!("session open on {}", config.sap_stage);
        Ok(())
    }

    async fn open_transaction(&mut self) -> Result<(), TaskError> {
        self.session()?.start_transaction(TRANSACTION).await?;
        Ok(())
    }

    async fn enter_criteria(&mut self) -> Result<(), TaskError> {
        let task = self.task;
        let s = self.session()?;

        s.set_text(ids::COMPANY_CODE, &task.be_code).await?;
        s.set_text(ids::DATE_LOW, &task.date_start.format(DATE_FORMAT).to_string())
            .await?;
        s.set_text(ids::DATE_HIGH, &task.date_end.format(DATE_FORMAT).to_string())
            .await?;
        s.select_radio(ids::OTHER_ACTS).await?;

        for (id, selected) in [
            ("wnd[0]/usr/chkP_PRSLD", false),
            ("wnd[0]/usr/chkP_PRSPP", false),
            ("wnd[0]/usr/chkP_PRHKT", true),
            ("wnd[0]/usr/chkP_WAERS", false),
        ] {
            s.set_checkbox(id, selected).await?;
        }

        s.set_text(ids::COUNTERPARTY, &task.company_number).await?;
        self.enter_excluded_accounts().await?;

        match &task.request_type {
            RequestType::AllAgreements => {
                s.set_checkbox(ids::DETAIL, true).await?;
                s.set_checkbox(ids::ALL_AGREEMENTS, true).await?;
            }
            RequestType::SingleAgreement => self.enter_agreements().await?,
            RequestType::Other(title) => info!("request type '{title}' keeps default options"),
        }

        s.set_checkbox(ids::AGREEMENT, true).await?;
        s.set_checkbox(ids::ZERO_BALANCE, false).await?;
        info!("selection screen filled");
        Ok(())
    }

    async fn enter_excluded_accounts(&self) -> Result<(), TaskError> {
        let s = self.session()?;
        s.press(ids::ACCOUNTS_MULTI).await?;
        s.set_text(ids::INCLUDE_CELL, "*").await?;
        s.select_tab(ids::EXCLUDE_TAB).await?;

        for (batch_index, batch) in ACCOUNT_BATCHES.iter().enumerate() {
            // After scrolling, row 0 shows the last value of the previous batch
            let first_row = if batch_index == 0 {
                0
            } else {
                s.scroll_table(ids::EXCLUDE_TABLE, SCROLL_POSITIONS[batch_index - 1])
                    .await?;
                1
            };
            for (offset, account) in batch.iter().enumerate() {
                let cell = format!("{}[1,{}]", ids::EXCLUDE_CELL_PREFIX, first_row + offset);
                s.set_text(&cell, account).await?;
            }
        }

        s.press(ids::POPUP_EXECUTE).await?;
        Ok(())
    }

    async fn enter_agreements(&self) -> Result<(), TaskError> {
        let numbers = &self.task.agreement_numbers;
        if numbers.is_empty() {
            return Err(TaskError::Validation(
                "single-agreement request carries no agreement numbers".to_string(),
            ));
        }
        for number in numbers {
            validate_agreement_number(number)?;
        }

        let s = self.session()?;
        s.set_checkbox(ids::ALL_AGREEMENTS, false).await?;
        s.press(ids::AGREEMENTS_MULTI).await?;
        self.ctx.desktop.set_clipboard_text(&numbers.join("\n"))?;
        s.press(ids::POPUP_PASTE).await?;
        s.press(ids::POPUP_EXECUTE).await?;
        info!("{} agreement number(s) entered", numbers.len());
        Ok(())
    }

    async fn list_results(&mut self) -> Result<(), TaskError> {
        let s = self.session()?;
        s.press(ids::EXECUTE).await?;

        let status = s.wait_status_stable().await?;
        let title = s.frame_title().await?;
        if title.trim() != RESULTS_TITLE {
            if status.contains(NOT_FOUND_MARKER) {
                return Err(TaskError::NotFound(format!(
                    "no reconciliation data for counterparty {}: {status}",
                    self.task.company_number
                )));
            }
            if !status.trim().is_empty() {
                return Err(AutomationError::Status(format!(
                    "results window did not open ('{title}'): {status}"
                ))
                .into());
            }
        }
        Ok(())
    }

    async fn generate_documents(&mut self) -> Result<(), TaskError> {
        let s = self.session()?;
        let grid = s.grid(ids::GRID).await?;
        grid.set_current_cell(-1, "")?;
        grid.select_all()?;
        s.press(ids::SELECT_MARKED).await?;
        s.press(ids::GENERATE).await?;

        if s.press_if_present(ids::POPUP_BUTTON_1).await? {
            warn!("documents already existed for this counterparty; generated them again");
            self.report.regenerated = true;
        }
        Ok(())
    }

    async fn assign_signatories(&mut self) -> Result<(), TaskError> {
        let signatories = &self.task.signatories;
        for (field, personnel_number) in [
            (ids::SIGNER_1, signatories.first.as_str()),
            (ids::SIGNER_2, signatories.second.as_str()),
        ] {
            self.assign_signatory(field, personnel_number).await?;
        }
        Ok(())
    }

    async fn assign_signatory(&self, field: &str, personnel_number: &str) -> Result<(), TaskError> {
        let s = self.session()?;
        s.focus_with_context(field).await?;
        s.send_vkey(ids::POPUP_WINDOW, vkey::F4).await?;
        s.press(ids::HELP_SELECTION_TAB).await?;

        let cell = |column: u32| {
            let prefix = if column == 0 { "txt" } else { "ctxt" };
            format!("{}/{prefix}G_SELFLD_TAB-LOW[{column},24]", ids::HELP_PREFIX)
        };
        s.set_text(&cell(0), personnel_number).await?;
        for column in [1, 5, 6] {
            s.set_text(&cell(column), "").await?;
        }
        s.focus_with_context(&cell(6)).await?;

        s.press(ids::HELP_OK).await?;
        s.press(ids::HELP_OK).await?;

        let assigned = s.text(field).await?;
        info!("signatory field {field} set to '{assigned}'");
        Ok(())
    }

    async fn finalize_documents(&mut self) -> Result<(), TaskError> {
        let s = self.session()?;
        s.press(ids::POPUP_EXECUTE).await?;
        // landscape layout
        s.press(ids::POPUP_BUTTON_1).await?;
        let status = s.wait_status_stable().await?;
        info!("documents finalized: {status}");
        self.report.status_text = status;
        Ok(())
    }

    async fn export_documents(&mut self) -> Result<(), TaskError> {
        self.export_exceptions().await?;
        self.export_acts().await
    }

    /// Filters the list down to rows flagged with the `@5b@` icon and saves
    /// them as a spreadsheet into the temp folder.
    async fn export_exceptions(&self) -> Result<(), TaskError> {
        let s = self.session()?;
        s.press(ids::DESELECT).await?;

        let grid = s.grid(ids::GRID).await?;
        grid.set_current_cell(-1, "")?;
        grid.select_all()?;
        grid.press_toolbar_button("&MB_FILTER")?;

        s.press(ids::FILTER_VALUES).await?;
        s.select_tab(ids::FILTER_EXCLUDE_TAB).await?;
        s.set_text(ids::FILTER_EXCLUDE_CELL, "@5b@").await?;
        s.press(ids::HELP_EXECUTE).await?;
        s.press(ids::POPUP_OK).await?;
        s.wait_status_stable().await?;

        let grid = s.grid(ids::GRID).await?;
        grid.select_all()?;
        s.press(ids::SELECT_MARKED).await?;
        grid.press_toolbar_context_button("&MB_EXPORT")?;
        grid.select_context_menu_item("&PC")?;
        s.select_radio(ids::SPREADSHEET_FORMAT).await?;
        s.press(ids::POPUP_OK).await?;

        let temp_dir = self.ctx.layout.temp();
        let temp_lossy = temp_dir.to_string_lossy();
        let temp: &str = &temp_lossy;
        let save_dialog = WindowPredicate::Role(WindowRole::Modal);
        let waiter = WindowWaiter::new();
        waiter
            .wait_startup(s, &save_dialog, self.ctx.config.timings.window_timeout)
            .await?;
        waiter
            .with_retries(s, &save_dialog, self.ctx.retry_policy(), move |window: WindowHandle| async move {
                let popup = window.id().unwrap_or_else(|| ids::POPUP_WINDOW.to_string());
                s.set_text(&format!("{popup}/usr/ctxtDY_PATH"), temp).await?;
                s.set_text(&format!("{popup}/usr/ctxtDY_FILENAME"), EXCEPTIONS_FILE)
                    .await?;
                s.press(&format!("{popup}/tbar[0]/btn[0]")).await
            })
            .await?;
        info!("exceptions saved to {temp}/{EXCEPTIONS_FILE}");
        Ok(())
    }

    /// Triggers the act export and points the desktop folder picker at the
    /// destination folder.
    async fn export_acts(&self) -> Result<(), TaskError> {
        let s = self.session()?;
        s.press(ids::EXPORT_DOCUMENTS).await?;

        let desktop = self.ctx.desktop.as_ref();
        let timings = &self.ctx.config.timings;
        let waiter = WindowWaiter::new();

        let report = waiter
            .wait_startup(desktop, &WindowPredicate::title(RESULTS_TITLE), timings.window_timeout)
            .await?;
        let child = waiter
            .wait_startup(&report, &WindowPredicate::Any, timings.window_timeout)
            .await?;
        child.send_keys("{ENTER}")?;

        let folder_path = self.ctx.documents_folder(&self.request_folder);
        let folder_lossy = folder_path.to_string_lossy();
        let folder: &str = &folder_lossy;
        waiter
            .with_retries(
                desktop,
                &WindowPredicate::title(BROWSE_FOLDER_TITLE),
                self.ctx.retry_policy(),
                move |window: WindowHandle| async move {
                    let edit = window.control(ControlRole::Edit, "Folder:")?;
                    edit.set_value("")?;
                    edit.set_value(folder)?;
                    window.control(ControlRole::Button, "OK")?.click()
                },
            )
            .await?;
        info!("acts saved to {folder}");
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), TaskError> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}
