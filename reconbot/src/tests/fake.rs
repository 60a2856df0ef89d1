//! Scriptable stand-ins for a SAP GUI session and the desktop.
//!
//! Every element exists unless hidden, and its scripting type is inferred
//! from the id's last segment (`ctxt...`, `btn...`, `chk...`). All actions
//! are appended to a shared log the tests assert on.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::config::{Config, Timings};
use crate::context::RunContext;
use crate::element::{RemoteElement, RemoteElementImpl};
use crate::errors::AutomationError;
use crate::layout::Layout;
use crate::lookup::{LookupRow, LookupTable};
use crate::platforms::{DesktopEngine, Engines, ScriptingEngine, SessionImpl};
use crate::selector::{ElementId, WindowRole};
use crate::sequencer::{BROWSE_FOLDER_TITLE, RESULTS_TITLE};
use crate::window::{Control, ControlImpl, ControlRole, WindowHandle, WindowImpl, WindowSource};

pub const STAGE: &str = "PRD";
pub const TEST_STAGE: &str = "ER2";

#[derive(Debug, Default)]
pub struct SapState {
    pub log: Vec<String>,
    pub texts: HashMap<String, String>,
    pub hidden: HashSet<String>,
    /// Pressing the key makes the value visible
    pub reveal_on_press: HashMap<String, String>,
    pub status: String,
    pub status_on_press: HashMap<String, String>,
    pub active_title: String,
    pub title_on_press: HashMap<String, String>,
    /// Lookups that fail with a retryable error before answering
    pub retryable_failures: u32,
    /// Same, for the active window query
    pub active_window_failures: u32,
    pub active_window_calls: u32,
    pub fatal_lookup: Option<String>,
    pub find_calls: u32,
    pub sessions_opened: u32,
    pub windows: Vec<(String, String, WindowRole)>,
}

impl SapState {
    pub fn logged(&self, entry: &str) -> bool {
        self.log.iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log.iter().position(|e| e == entry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSap {
    pub state: Rc<RefCell<SapState>>,
}

impl FakeSap {
    pub fn new() -> Self {
        let sap = Self::default();
        {
            let mut state = sap.state.borrow_mut();
            state.active_title = RESULTS_TITLE.to_string();
            state.windows = vec![
                ("wnd[0]".into(), RESULTS_TITLE.into(), WindowRole::Main),
                ("wnd[1]".into(), "Сохранить список в файле...".into(), WindowRole::Modal),
            ];
        }
        sap
    }

    pub fn hide(&self, id: &str) {
        self.state.borrow_mut().hidden.insert(id.to_string());
    }

    pub fn reveal_on_press(&self, pressed: &str, revealed: &str) {
        self.state
            .borrow_mut()
            .reveal_on_press
            .insert(pressed.to_string(), revealed.to_string());
    }

    pub fn status_on_press(&self, pressed: &str, status: &str) {
        self.state
            .borrow_mut()
            .status_on_press
            .insert(pressed.to_string(), status.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    pub fn logged(&self, entry: &str) -> bool {
        self.state.borrow().logged(entry)
    }

    pub fn session(&self) -> Box<dyn SessionImpl> {
        Box::new(FakeSession {
            state: Rc::clone(&self.state),
        })
    }
}

impl ScriptingEngine for FakeSap {
    fn open_session(&self, system: &str) -> Result<Box<dyn SessionImpl>, AutomationError> {
        let mut state = self.state.borrow_mut();
        state.sessions_opened += 1;
        state.log.push(format!("open {system}"));
        drop(state);
        Ok(self.session())
    }
}

#[derive(Debug)]
struct FakeSession {
    state: Rc<RefCell<SapState>>,
}

fn infer_type(id: &ElementId) -> (&'static str, Option<&'static str>) {
    let leaf = id.leaf();
    if leaf.starts_with("wnd[") {
        return match id.window_index() {
            Some(0) => ("GuiMainWindow", None),
            _ => ("GuiModalWindow", None),
        };
    }
    let prefixes: [(&str, &str); 9] = [
        ("ctxt", "GuiCTextField"),
        ("txt", "GuiTextField"),
        ("pwd", "GuiPasswordField"),
        ("btn", "GuiButton"),
        ("chk", "GuiCheckBox"),
        ("rad", "GuiRadioButton"),
        ("tabp", "GuiTab"),
        ("tbl", "GuiTableControl"),
        ("sbar", "GuiStatusbar"),
    ];
    if leaf == "shell" {
        return ("GuiShell", Some("GridView"));
    }
    prefixes
        .iter()
        .find(|(prefix, _)| leaf.starts_with(prefix))
        .map(|(_, type_name)| (*type_name, None))
        .unwrap_or(("GuiLabel", None))
}

/// What the scripting host answers while it is busy.
fn call_rejected(operation: &str) -> AutomationError {
    AutomationError::UIAutomationAPIError {
        message: "call rejected".into(),
        com_error: Some(0x80010001u32 as i32),
        operation: operation.into(),
        is_retryable: true,
    }
}

impl FakeSession {
    fn element(&self, id: &ElementId) -> RemoteElement {
        let (type_name, sub_type) = infer_type(id);
        RemoteElement::new(Box::new(FakeElement {
            id: id.to_string(),
            type_name,
            sub_type,
            state: Rc::clone(&self.state),
        }))
    }
}

impl SessionImpl for FakeSession {
    fn find_by_id(&self, id: &ElementId) -> Result<Option<RemoteElement>, AutomationError> {
        let mut state = self.state.borrow_mut();
        state.find_calls += 1;
        if let Some(reason) = state.fatal_lookup.clone() {
            return Err(AutomationError::PlatformError(reason));
        }
        if state.retryable_failures > 0 {
            state.retryable_failures -= 1;
            return Err(call_rejected("FindById"));
        }
        if state.hidden.contains(id.as_str()) {
            return Ok(None);
        }
        drop(state);
        Ok(Some(self.element(id)))
    }

    fn active_window(&self) -> Result<Option<RemoteElement>, AutomationError> {
        let mut state = self.state.borrow_mut();
        state.active_window_calls += 1;
        if state.active_window_failures > 0 {
            state.active_window_failures -= 1;
            return Err(call_rejected("ActiveWindow"));
        }
        if state.hidden.contains("wnd[0]") {
            return Ok(None);
        }
        drop(state);
        Ok(Some(self.element(&ElementId::new("wnd[0]"))))
    }

    fn start_transaction(&self, code: &str) -> Result<(), AutomationError> {
        self.state.borrow_mut().log.push(format!("transaction {code}"));
        Ok(())
    }

    fn send_command(&self, command: &str) -> Result<(), AutomationError> {
        self.state.borrow_mut().log.push(format!("command {command}"));
        Ok(())
    }

    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        let state = self.state.borrow();
        Ok(state
            .windows
            .iter()
            .map(|(id, title, role)| {
                WindowHandle::new(Box::new(FakeWindow {
                    spec: WindowSpec::new(title, *role).with_id(id),
                    log: Rc::new(RefCell::new(Vec::new())),
                }))
            })
            .collect())
    }
}

#[derive(Debug)]
struct FakeElement {
    id: String,
    type_name: &'static str,
    sub_type: Option<&'static str>,
    state: Rc<RefCell<SapState>>,
}

impl FakeElement {
    fn record(&self, entry: String) -> Result<(), AutomationError> {
        self.state.borrow_mut().log.push(entry);
        Ok(())
    }
}

impl RemoteElementImpl for FakeElement {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn type_name(&self) -> String {
        self.type_name.to_string()
    }

    fn sub_type(&self) -> Option<String> {
        self.sub_type.map(String::from)
    }

    fn text(&self) -> Result<String, AutomationError> {
        let state = self.state.borrow();
        Ok(match self.type_name {
            "GuiStatusbar" => state.status.clone(),
            "GuiMainWindow" => state.active_title.clone(),
            _ => state.texts.get(&self.id).cloned().unwrap_or_default(),
        })
    }

    fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.state
            .borrow_mut()
            .texts
            .insert(self.id.clone(), text.to_string());
        self.record(format!("set {}={text}", self.id))
    }

    fn set_focus(&self) -> Result<(), AutomationError> {
        self.record(format!("focus {}", self.id))
    }

    fn press(&self) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        if let Some(revealed) = state.reveal_on_press.get(&self.id).cloned() {
            state.hidden.remove(&revealed);
        }
        if let Some(status) = state.status_on_press.get(&self.id).cloned() {
            state.status = status;
        }
        if let Some(title) = state.title_on_press.get(&self.id).cloned() {
            state.active_title = title;
        }
        state.log.push(format!("press {}", self.id));
        Ok(())
    }

    fn set_selected(&self, selected: bool) -> Result<(), AutomationError> {
        self.record(format!("check {}={selected}", self.id))
    }

    fn select(&self) -> Result<(), AutomationError> {
        self.record(format!("select {}", self.id))
    }

    fn show_context_menu(&self) -> Result<(), AutomationError> {
        self.record(format!("context {}", self.id))
    }

    fn send_vkey(&self, vkey: u32) -> Result<(), AutomationError> {
        self.record(format!("vkey {}={vkey}", self.id))
    }

    fn maximize(&self) -> Result<(), AutomationError> {
        self.record(format!("maximize {}", self.id))
    }

    fn set_vertical_scroll_position(&self, position: i32) -> Result<(), AutomationError> {
        self.record(format!("scroll {}={position}", self.id))
    }

    fn set_current_cell(&self, row: i32, column: &str) -> Result<(), AutomationError> {
        self.record(format!("cell {}={row},{column}", self.id))
    }

    fn select_all(&self) -> Result<(), AutomationError> {
        self.record(format!("select_all {}", self.id))
    }

    fn press_toolbar_button(&self, button: &str) -> Result<(), AutomationError> {
        self.record(format!("toolbar {button}"))
    }

    fn press_toolbar_context_button(&self, button: &str) -> Result<(), AutomationError> {
        self.record(format!("toolbar_context {button}"))
    }

    fn select_context_menu_item(&self, item: &str) -> Result<(), AutomationError> {
        self.record(format!("menu {item}"))
    }
}

/// Static description of a window the fakes report.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub id: Option<String>,
    pub title: String,
    pub role: WindowRole,
    pub children: Vec<WindowSpec>,
    pub controls: Vec<(ControlRole, String)>,
}

impl WindowSpec {
    pub fn new(title: &str, role: WindowRole) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            role,
            children: Vec::new(),
            controls: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_child(mut self, child: WindowSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_control(mut self, role: ControlRole, name: &str) -> Self {
        self.controls.push((role, name.to_string()));
        self
    }
}

#[derive(Debug)]
struct FakeWindow {
    spec: WindowSpec,
    log: Rc<RefCell<Vec<String>>>,
}

impl WindowImpl for FakeWindow {
    fn title(&self) -> String {
        self.spec.title.clone()
    }

    fn role(&self) -> WindowRole {
        self.spec.role
    }

    fn id(&self) -> Option<String> {
        self.spec.id.clone()
    }

    fn children(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        Ok(self
            .spec
            .children
            .iter()
            .map(|child| {
                WindowHandle::new(Box::new(FakeWindow {
                    spec: child.clone(),
                    log: Rc::clone(&self.log),
                }))
            })
            .collect())
    }

    fn find_control(
        &self,
        role: ControlRole,
        name: &str,
    ) -> Result<Option<Control>, AutomationError> {
        let found = self
            .spec
            .controls
            .iter()
            .any(|(r, n)| *r == role && n == name);
        Ok(found.then(|| {
            Control::new(
                role,
                Box::new(FakeControl {
                    name: name.to_string(),
                    log: Rc::clone(&self.log),
                }),
            )
        }))
    }

    fn send_keys(&self, keys: &str) -> Result<(), AutomationError> {
        self.log
            .borrow_mut()
            .push(format!("keys {}={keys}", self.spec.title));
        Ok(())
    }
}

#[derive(Debug)]
struct FakeControl {
    name: String,
    log: Rc<RefCell<Vec<String>>>,
}

impl ControlImpl for FakeControl {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.log
            .borrow_mut()
            .push(format!("value {}={value}", self.name));
        Ok(())
    }

    fn click(&self) -> Result<(), AutomationError> {
        self.log.borrow_mut().push(format!("click {}", self.name));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDesktop {
    pub windows: Rc<RefCell<Vec<WindowSpec>>>,
    pub log: Rc<RefCell<Vec<String>>>,
    pub clipboard: Rc<RefCell<Option<String>>>,
    /// Listing calls that fail with a retryable error first
    pub listing_failures: Rc<RefCell<u32>>,
}

impl FakeDesktop {
    pub fn new(windows: Vec<WindowSpec>) -> Self {
        Self {
            windows: Rc::new(RefCell::new(windows)),
            ..Default::default()
        }
    }

    /// Report window with its print dialog plus the folder picker.
    pub fn with_export_windows() -> Self {
        Self::new(vec![
            WindowSpec::new(RESULTS_TITLE, WindowRole::Main)
                .with_child(WindowSpec::new("Печать", WindowRole::Dialog)),
            browse_dialog(),
        ])
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

pub fn browse_dialog() -> WindowSpec {
    WindowSpec::new(BROWSE_FOLDER_TITLE, WindowRole::Dialog)
        .with_control(ControlRole::Edit, "Folder:")
        .with_control(ControlRole::Button, "OK")
}

impl WindowSource for FakeDesktop {
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        {
            let mut failures = self.listing_failures.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                return Err(AutomationError::UIAutomationAPIError {
                    message: "desktop busy".into(),
                    com_error: None,
                    operation: "find_all".into(),
                    is_retryable: true,
                });
            }
        }
        Ok(self
            .windows
            .borrow()
            .iter()
            .map(|spec| {
                WindowHandle::new(Box::new(FakeWindow {
                    spec: spec.clone(),
                    log: Rc::clone(&self.log),
                }))
            })
            .collect())
    }
}

impl DesktopEngine for FakeDesktop {
    fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError> {
        *self.clipboard.borrow_mut() = Some(text.to_string());
        Ok(())
    }
}

/// Short budgets so paused-clock tests stay readable.
pub fn test_timings() -> Timings {
    Timings {
        element_timeout: Duration::from_secs(2),
        element_poll: Duration::from_millis(100),
        dialog_timeout: Duration::from_secs(1),
        status_quiet: Duration::from_millis(300),
        status_timeout: Duration::from_secs(3),
        launcher_timeout: Duration::from_secs(5),
        window_timeout: Duration::from_secs(4),
        window_attempts: 3,
    }
}

pub const BUSINESS_UNIT: &str = "Волжская ГЭС";
pub const INN: &str = "7701234567";
pub const KPP: &str = "770101001";

pub const REQUEST_1: &str = "3f2b8c1a-0d4e-4b6a-9c7d-1e2f3a4b5c6d";
pub const REQUEST_2: &str = "a7e1d9f0-52c3-4e8b-b1a6-0f9e8d7c6b5a";
pub const REQUEST_3: &str = "c04d6e2b-9f13-47a5-8e2d-5b6c7d8e9f01";

pub fn test_config() -> Config {
    Config {
        sap_logon_path: "saplogon.exe".into(),
        excel_path: "registry.csv".into(),
        sap_stage: STAGE.to_string(),
        sap_test_stage: TEST_STAGE.to_string(),
        sap_user: "robot".to_string(),
        sap_password: "secret".to_string(),
        be_codes: [(BUSINESS_UNIT.to_string(), "1050".to_string())]
            .into_iter()
            .collect(),
        launcher_window_title: "SAP Logon 750".to_string(),
        documents_folder: None,
        timings: test_timings(),
    }
}

pub fn lookup_row(inn: &str, kpp: &str, personnel: &str) -> LookupRow {
    LookupRow::new([
        "1",
        BUSINESS_UNIT,
        "ООО Ромашка",
        "100200",
        inn,
        kpp,
        "active",
        "Иванов И.И.",
        personnel,
        "Петрова П.П.",
        "X",
    ])
}

pub fn test_context(root: &Path, config: Config, sap: &FakeSap, desktop: &FakeDesktop) -> RunContext {
    let layout = Layout::new(root);
    layout.prepare().unwrap();
    let lookup = LookupTable::from_rows(vec![lookup_row(INN, KPP, "00012345;00067890")]);
    RunContext::new(
        config,
        layout,
        lookup,
        Engines {
            scripting: Box::new(sap.clone()),
            desktop: Box::new(desktop.clone()),
        },
    )
}

/// Request document in the shape the inbox producer writes.
pub fn request_json(id: &str, request_type: &str, inn: &str, agreements: Option<&str>) -> String {
    let agreements = agreements
        .map(|a| format!("\"{a}\""))
        .unwrap_or_else(|| "null".to_string());
    format!(
        r#"{{
  "title": "{id}",
  "formType": {{"title": "{request_type}"}},
  "orgfilial": {{"title": "{BUSINESS_UNIT}"}},
  "organiz": {{"title": "ООО Ромашка"}},
  "startPeriod": "2024-01-01",
  "endPeriod": "2024-03-31",
  "innString": "{inn}",
  "kppString": "{KPP}",
  "regNumbDoc": {agreements},
  "contragent": ["100200"],
  "status": null,
  "message": null
}}"#
    )
}
