//! Top-level desktop windows through UI Automation, plus the clipboard.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use uiautomation::controls::ControlType;
use uiautomation::patterns;
use uiautomation::types::{TreeScope, UIProperty};
use uiautomation::variants::Variant;
use uiautomation::{UIAutomation, UIElement};

use crate::errors::AutomationError;
use crate::platforms::DesktopEngine;
use crate::selector::WindowRole;
use crate::window::{Control, ControlImpl, ControlRole, WindowHandle, WindowImpl, WindowSource};

/// Win32 class of standard dialog boxes.
const DIALOG_CLASS: &str = "#32770";

fn uia_error(e: uiautomation::Error, operation: &str) -> AutomationError {
    AutomationError::PlatformError(format!("{operation}: {e}"))
}

pub struct DesktopWindows {
    automation: Rc<UIAutomation>,
    clipboard: RefCell<Option<arboard::Clipboard>>,
}

impl DesktopWindows {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = UIAutomation::new().map_err(|e| uia_error(e, "UIAutomation::new"))?;
        Ok(Self {
            automation: Rc::new(automation),
            clipboard: RefCell::new(None),
        })
    }
}

fn children_of(
    automation: &Rc<UIAutomation>,
    element: &UIElement,
) -> Result<Vec<WindowHandle>, AutomationError> {
    let condition = automation
        .create_true_condition()
        .map_err(|e| uia_error(e, "create_true_condition"))?;
    let children = element
        .find_all(TreeScope::Children, &condition)
        .map_err(|e| uia_error(e, "find_all"))?;
    Ok(children
        .into_iter()
        .map(|element| {
            WindowHandle::new(Box::new(DesktopWindow {
                automation: Rc::clone(automation),
                element,
            }))
        })
        .collect())
}

impl WindowSource for DesktopWindows {
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        let root = self
            .automation
            .get_root_element()
            .map_err(|e| uia_error(e, "get_root_element"))?;
        children_of(&self.automation, &root)
    }
}

impl DesktopEngine for DesktopWindows {
    fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError> {
        let mut slot = self.clipboard.borrow_mut();
        if slot.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| AutomationError::PlatformError(format!("clipboard: {e}")))?;
            *slot = Some(clipboard);
        }
        match slot.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|e| AutomationError::PlatformError(format!("clipboard: {e}"))),
            None => Err(AutomationError::PlatformError(
                "clipboard unavailable".to_string(),
            )),
        }
    }
}

struct DesktopWindow {
    automation: Rc<UIAutomation>,
    element: UIElement,
}

impl std::fmt::Debug for DesktopWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopWindow")
            .field("name", &self.element.get_name().unwrap_or_default())
            .finish()
    }
}

impl WindowImpl for DesktopWindow {
    fn title(&self) -> String {
        self.element.get_name().unwrap_or_default()
    }

    fn role(&self) -> WindowRole {
        match self.element.get_classname() {
            Ok(class) if class == DIALOG_CLASS => WindowRole::Dialog,
            _ => WindowRole::Other,
        }
    }

    fn children(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        children_of(&self.automation, &self.element)
    }

    fn find_control(
        &self,
        role: ControlRole,
        name: &str,
    ) -> Result<Option<Control>, AutomationError> {
        let control_type = match role {
            ControlRole::Edit => ControlType::Edit,
            ControlRole::Button => ControlType::Button,
        };
        let condition = self
            .automation
            .create_property_condition(
                UIProperty::ControlType,
                Variant::from(control_type as i32),
                None,
            )
            .map_err(|e| uia_error(e, "create_property_condition"))?;
        let candidates = self
            .element
            .find_all(TreeScope::Descendants, &condition)
            .map_err(|e| uia_error(e, "find_all"))?;

        let found = candidates
            .into_iter()
            .find(|c| c.get_name().map(|n| n.trim() == name).unwrap_or(false));
        debug!("{role:?} '{name}' found: {}", found.is_some());
        Ok(found.map(|element| Control::new(role, Box::new(DesktopControl { element }))))
    }

    fn send_keys(&self, keys: &str) -> Result<(), AutomationError> {
        self.element
            .send_keys(keys, 10)
            .map_err(|e| uia_error(e, "send_keys"))
    }
}

struct DesktopControl {
    element: UIElement,
}

impl std::fmt::Debug for DesktopControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopControl")
            .field("name", &self.name())
            .finish()
    }
}

impl ControlImpl for DesktopControl {
    fn name(&self) -> String {
        self.element.get_name().unwrap_or_default()
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        let pattern = self
            .element
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| uia_error(e, "ValuePattern"))?;
        pattern
            .set_value(value)
            .map_err(|e| uia_error(e, "ValuePattern::set_value"))
    }

    fn click(&self) -> Result<(), AutomationError> {
        if let Ok(invoke) = self.element.get_pattern::<patterns::UIInvokePattern>() {
            return invoke.invoke().map_err(|e| uia_error(e, "InvokePattern"));
        }
        self.element.click().map_err(|e| uia_error(e, "click"))
    }
}
