use std::fmt::Debug;

use crate::element::RemoteElement;
use crate::errors::AutomationError;
use crate::selector::ElementId;
use crate::window::{WindowHandle, WindowSource};

/// Entry point into the remote application's scripting interface.
pub trait ScriptingEngine {
    /// Opens a connection to `system` (a launcher entry) and returns its
    /// first session.
    fn open_session(&self, system: &str) -> Result<Box<dyn SessionImpl>, AutomationError>;
}

/// One remote session. Engines are single-threaded; nothing here is `Send`.
pub trait SessionImpl: Debug {
    /// Single lookup attempt. `Ok(None)` means the element is not there
    /// (yet); retrying is left to the locator.
    fn find_by_id(&self, id: &ElementId) -> Result<Option<RemoteElement>, AutomationError>;

    /// Window holding the focus, usually `wnd[0]` unless a popup is open.
    fn active_window(&self) -> Result<Option<RemoteElement>, AutomationError>;

    fn start_transaction(&self, code: &str) -> Result<(), AutomationError>;

    /// Sends an OK-code such as `/nex`.
    fn send_command(&self, command: &str) -> Result<(), AutomationError>;

    /// Open session windows (`wnd[0]`, `wnd[1]`, ...).
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError>;
}

/// Desktop top-level windows plus the clipboard.
pub trait DesktopEngine: WindowSource {
    fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError>;
}

pub struct Engines {
    pub scripting: Box<dyn ScriptingEngine>,
    pub desktop: Box<dyn DesktopEngine>,
}

#[cfg(target_os = "windows")]
pub mod windows;

pub fn create_engines() -> Result<Engines, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        windows::create_engines()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "SAP GUI scripting is only available on Windows".to_string(),
        ))
    }
}
