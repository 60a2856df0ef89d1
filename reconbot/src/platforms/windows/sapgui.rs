//! SAP GUI scripting reached through the running object table.

use windows::core::{BSTR, VARIANT};
use windows::Win32::Foundation::S_OK;
use windows::Win32::System::Com::{
    CoTaskMemFree, CreateBindCtx, GetRunningObjectTable, IMoniker,
};
use tracing::{debug, instrument};

use super::dispatch::{com_error, Dispatch};
use crate::element::{RemoteElement, RemoteElementImpl};
use crate::errors::AutomationError;
use crate::platforms::{ScriptingEngine, SessionImpl};
use crate::selector::{ElementId, WindowRole};
use crate::window::{Control, ControlRole, WindowHandle, WindowImpl};

/// Display name the launcher registers its scripting root under.
const ROT_ENTRY: &str = "SAPGUI";

#[derive(Debug, Default)]
pub struct SapScripting;

impl SapScripting {
    pub fn new() -> Self {
        Self
    }

    /// Looks up the launcher's scripting root in the running object table.
    fn root_object(&self) -> Result<Dispatch, AutomationError> {
        unsafe {
            let rot = GetRunningObjectTable(0).map_err(|e| com_error(e, "GetRunningObjectTable"))?;
            let monikers = rot
                .EnumRunning()
                .map_err(|e| com_error(e, "EnumRunning"))?;
            let bind = CreateBindCtx(0).map_err(|e| com_error(e, "CreateBindCtx"))?;

            loop {
                let mut slot: [Option<IMoniker>; 1] = [None];
                let mut fetched = 0u32;
                if monikers.Next(&mut slot, Some(&mut fetched as *mut u32)) != S_OK || fetched == 0 {
                    break;
                }
                let Some(moniker) = slot[0].take() else {
                    break;
                };
                let Ok(raw) = moniker.GetDisplayName(&bind, None::<&IMoniker>) else {
                    continue;
                };
                let name = raw.to_string().unwrap_or_default();
                CoTaskMemFree(Some(raw.0 as *const _));
                if !name.contains(ROT_ENTRY) {
                    continue;
                }
                debug!("found scripting root '{name}'");
                let unknown = rot
                    .GetObject(&moniker)
                    .map_err(|e| com_error(e, "IRunningObjectTable::GetObject"))?;
                return Dispatch::from_unknown(&unknown);
            }
        }
        Err(AutomationError::PlatformError(
            "SAP Logon is not running or scripting is disabled".to_string(),
        ))
    }
}

impl ScriptingEngine for SapScripting {
    #[instrument(level = "debug", skip(self))]
    fn open_session(&self, system: &str) -> Result<Box<dyn SessionImpl>, AutomationError> {
        let root = self.root_object()?;
        let engine = Dispatch::object(&root.call("GetScriptingEngine", &[])?)?
            .ok_or_else(|| AutomationError::PlatformError("no scripting engine".to_string()))?;

        let connection = Dispatch::object(&engine.call(
            "OpenConnection",
            &[
                VARIANT::from(BSTR::from(system)),
                VARIANT::from(false),
                VARIANT::from(true),
            ],
        )?)?
        .ok_or_else(|| AutomationError::PlatformError(format!("cannot connect to '{system}'")))?;

        let session = child_at(&connection, 0)?.ok_or_else(|| {
            AutomationError::PlatformError(format!("connection to '{system}' has no session"))
        })?;
        Ok(Box::new(SapSession { session }))
    }
}

fn child_at(parent: &Dispatch, index: i32) -> Result<Option<Dispatch>, AutomationError> {
    let Some(children) = parent.get_object("Children")? else {
        return Ok(None);
    };
    Dispatch::object(&children.call("ElementAt", &[VARIANT::from(index)])?)
}

fn child_count(parent: &Dispatch) -> Result<i32, AutomationError> {
    let Some(children) = parent.get_object("Children")? else {
        return Ok(0);
    };
    i32::try_from(&children.get("Count")?).map_err(|e| com_error(e, "Children.Count"))
}

#[derive(Debug)]
struct SapSession {
    session: Dispatch,
}

impl SapSession {
    fn element(&self, id: String, object: Dispatch) -> RemoteElement {
        let type_name = object.get_string("Type").unwrap_or_default();
        let sub_type = object
            .get_string("SubType")
            .ok()
            .filter(|s| !s.is_empty());
        RemoteElement::new(Box::new(SapElement {
            id,
            type_name,
            sub_type,
            object,
        }))
    }
}

impl SessionImpl for SapSession {
    fn find_by_id(&self, id: &ElementId) -> Result<Option<RemoteElement>, AutomationError> {
        let found = self.session.call(
            "FindById",
            &[VARIANT::from(BSTR::from(id.as_str())), VARIANT::from(false)],
        )?;
        Ok(Dispatch::object(&found)?.map(|object| self.element(id.to_string(), object)))
    }

    fn active_window(&self) -> Result<Option<RemoteElement>, AutomationError> {
        Ok(self.session.get_object("ActiveWindow")?.map(|object| {
            let id = short_id(&object.get_string("Id").unwrap_or_default());
            self.element(id, object)
        }))
    }

    fn start_transaction(&self, code: &str) -> Result<(), AutomationError> {
        self.session
            .call("StartTransaction", &[VARIANT::from(BSTR::from(code))])
            .map(|_| ())
    }

    fn send_command(&self, command: &str) -> Result<(), AutomationError> {
        self.session
            .call("SendCommand", &[VARIANT::from(BSTR::from(command))])
            .map(|_| ())
    }

    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        let count = child_count(&self.session)?;
        let mut windows = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count {
            if let Some(object) = child_at(&self.session, index)? {
                windows.push(WindowHandle::new(Box::new(SapWindow { object })));
            }
        }
        Ok(windows)
    }
}

/// Strips the `/app/con[0]/ses[0]/` prefix off a full scripting path.
fn short_id(full: &str) -> String {
    match full.find("wnd[") {
        Some(start) => full[start..].to_string(),
        None => full.to_string(),
    }
}

#[derive(Debug)]
struct SapElement {
    id: String,
    type_name: String,
    sub_type: Option<String>,
    object: Dispatch,
}

impl RemoteElementImpl for SapElement {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn sub_type(&self) -> Option<String> {
        self.sub_type.clone()
    }

    fn text(&self) -> Result<String, AutomationError> {
        self.object.get_string("Text")
    }

    fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.object.put("Text", VARIANT::from(BSTR::from(text)))
    }

    fn set_focus(&self) -> Result<(), AutomationError> {
        self.object.call("SetFocus", &[]).map(|_| ())
    }

    fn press(&self) -> Result<(), AutomationError> {
        self.object.call("Press", &[]).map(|_| ())
    }

    fn set_selected(&self, selected: bool) -> Result<(), AutomationError> {
        self.object.put("Selected", VARIANT::from(selected))
    }

    fn select(&self) -> Result<(), AutomationError> {
        self.object.call("Select", &[]).map(|_| ())
    }

    fn show_context_menu(&self) -> Result<(), AutomationError> {
        self.object.call("ShowContextMenu", &[]).map(|_| ())
    }

    fn send_vkey(&self, vkey: u32) -> Result<(), AutomationError> {
        self.object
            .call("SendVKey", &[VARIANT::from(vkey as i32)])
            .map(|_| ())
    }

    fn maximize(&self) -> Result<(), AutomationError> {
        self.object.call("Maximize", &[]).map(|_| ())
    }

    fn set_vertical_scroll_position(&self, position: i32) -> Result<(), AutomationError> {
        let scrollbar = self.object.get_object("VerticalScrollbar")?.ok_or_else(|| {
            AutomationError::UnsupportedOperation(format!("{} has no scrollbar", self.id))
        })?;
        scrollbar.put("Position", VARIANT::from(position))
    }

    fn set_current_cell(&self, row: i32, column: &str) -> Result<(), AutomationError> {
        self.object
            .call(
                "SetCurrentCell",
                &[VARIANT::from(row), VARIANT::from(BSTR::from(column))],
            )
            .map(|_| ())
    }

    fn select_all(&self) -> Result<(), AutomationError> {
        self.object.call("SelectAll", &[]).map(|_| ())
    }

    fn press_toolbar_button(&self, button: &str) -> Result<(), AutomationError> {
        self.object
            .call("PressToolbarButton", &[VARIANT::from(BSTR::from(button))])
            .map(|_| ())
    }

    fn press_toolbar_context_button(&self, button: &str) -> Result<(), AutomationError> {
        self.object
            .call(
                "PressToolbarContextButton",
                &[VARIANT::from(BSTR::from(button))],
            )
            .map(|_| ())
    }

    fn select_context_menu_item(&self, item: &str) -> Result<(), AutomationError> {
        self.object
            .call("SelectContextMenuItem", &[VARIANT::from(BSTR::from(item))])
            .map(|_| ())
    }
}

/// Session window as seen by window waits.
#[derive(Debug)]
struct SapWindow {
    object: Dispatch,
}

impl WindowImpl for SapWindow {
    fn title(&self) -> String {
        self.object.get_string("Text").unwrap_or_default()
    }

    fn role(&self) -> WindowRole {
        match self.object.get_string("Type").unwrap_or_default().as_str() {
            "GuiMainWindow" => WindowRole::Main,
            "GuiModalWindow" => WindowRole::Modal,
            _ => WindowRole::Other,
        }
    }

    fn id(&self) -> Option<String> {
        self.object
            .get_string("Id")
            .ok()
            .map(|full| short_id(&full))
    }

    fn children(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        Ok(Vec::new())
    }

    fn find_control(
        &self,
        _role: ControlRole,
        _name: &str,
    ) -> Result<Option<Control>, AutomationError> {
        Err(AutomationError::UnsupportedOperation(
            "session windows are driven by element id".to_string(),
        ))
    }

    fn send_keys(&self, _keys: &str) -> Result<(), AutomationError> {
        Err(AutomationError::UnsupportedOperation(
            "session windows take virtual keys, not key strings".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::short_id;

    #[test]
    fn full_paths_are_shortened() {
        assert_eq!(short_id("/app/con[0]/ses[0]/wnd[1]"), "wnd[1]");
        assert_eq!(short_id("wnd[0]"), "wnd[0]");
    }
}
