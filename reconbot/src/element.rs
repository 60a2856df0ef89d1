//! Handles to elements of the remote scripting tree.
//!
//! A located element carries an [`ElementKind`] derived from its scripting
//! type. Actions are only reachable through the typed handles, which can
//! only be built from a matching kind.

use std::fmt::{self, Debug};

use tracing::instrument;

use crate::errors::AutomationError;

/// Platform side of a remote element. Actions default to
/// `UnsupportedOperation` so an implementation only overrides what its
/// element type can do.
pub trait RemoteElementImpl: Debug {
    fn id(&self) -> String;
    /// Scripting type name, e.g. `GuiCTextField`
    fn type_name(&self) -> String;
    /// Scripting sub type, only set for shells (`GridView`, ...)
    fn sub_type(&self) -> Option<String> {
        None
    }

    fn text(&self) -> Result<String, AutomationError> {
        Err(unsupported(self, "text"))
    }
    fn set_text(&self, _text: &str) -> Result<(), AutomationError> {
        Err(unsupported(self, "set_text"))
    }
    fn set_focus(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "set_focus"))
    }
    fn press(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "press"))
    }
    fn set_selected(&self, _selected: bool) -> Result<(), AutomationError> {
        Err(unsupported(self, "set_selected"))
    }
    fn select(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "select"))
    }
    fn show_context_menu(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "show_context_menu"))
    }
    fn send_vkey(&self, _vkey: u32) -> Result<(), AutomationError> {
        Err(unsupported(self, "send_vkey"))
    }
    fn maximize(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "maximize"))
    }
    fn set_vertical_scroll_position(&self, _position: i32) -> Result<(), AutomationError> {
        Err(unsupported(self, "set_vertical_scroll_position"))
    }
    fn set_current_cell(&self, _row: i32, _column: &str) -> Result<(), AutomationError> {
        Err(unsupported(self, "set_current_cell"))
    }
    fn select_all(&self) -> Result<(), AutomationError> {
        Err(unsupported(self, "select_all"))
    }
    fn press_toolbar_button(&self, _button: &str) -> Result<(), AutomationError> {
        Err(unsupported(self, "press_toolbar_button"))
    }
    fn press_toolbar_context_button(&self, _button: &str) -> Result<(), AutomationError> {
        Err(unsupported(self, "press_toolbar_context_button"))
    }
    fn select_context_menu_item(&self, _item: &str) -> Result<(), AutomationError> {
        Err(unsupported(self, "select_context_menu_item"))
    }
}

fn unsupported<T: RemoteElementImpl + ?Sized>(element: &T, action: &str) -> AutomationError {
    AutomationError::UnsupportedOperation(format!(
        "{action} on {} ({})",
        element.id(),
        element.type_name()
    ))
}

/// Closed set of element kinds the workflow touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// `contextual` is set for fields with a value help (`GuiCTextField`)
    TextField { contextual: bool },
    Button,
    CheckBox,
    RadioButton,
    Tab,
    Table,
    Grid,
    Frame,
    StatusBar,
    Label,
    Other(String),
}

impl ElementKind {
    pub fn from_type(type_name: &str, sub_type: Option<&str>) -> Self {
        match type_name {
            "GuiTextField" | "GuiPasswordField" => ElementKind::TextField { contextual: false },
            "GuiCTextField" => ElementKind::TextField { contextual: true },
            "GuiButton" => ElementKind::Button,
            "GuiCheckBox" => ElementKind::CheckBox,
            "GuiRadioButton" => ElementKind::RadioButton,
            "GuiTab" => ElementKind::Tab,
            "GuiTableControl" => ElementKind::Table,
            "GuiShell" if sub_type == Some("GridView") => ElementKind::Grid,
            "GuiMainWindow" | "GuiModalWindow" | "GuiFrameWindow" => ElementKind::Frame,
            "GuiStatusbar" => ElementKind::StatusBar,
            "GuiLabel" => ElementKind::Label,
            other => match sub_type {
                Some(sub) => ElementKind::Other(format!("{other}/{sub}")),
                None => ElementKind::Other(other.to_string()),
            },
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::TextField { contextual: true } => f.write_str("ContextField"),
            ElementKind::TextField { contextual: false } => f.write_str("TextField"),
            ElementKind::Other(t) => f.write_str(t),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A located element. Transient: obtained per operation, never cached.
#[derive(Debug)]
pub struct RemoteElement {
    kind: ElementKind,
    inner: Box<dyn RemoteElementImpl>,
}

impl RemoteElement {
    pub fn new(inner: Box<dyn RemoteElementImpl>) -> Self {
        let sub_type = inner.sub_type();
        let kind = ElementKind::from_type(&inner.type_name(), sub_type.as_deref());
        Self { kind, inner }
    }

    pub fn id(&self) -> String {
        self.inner.id()
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    fn mismatch(&self, expected: &str) -> AutomationError {
        AutomationError::UnsupportedOperation(format!(
            "element {} is a {}, not a {expected}",
            self.inner.id(),
            self.kind
        ))
    }

    pub fn into_text_field(self) -> Result<TextField, AutomationError> {
        match self.kind {
            ElementKind::TextField { .. } => Ok(TextField(self)),
            _ => Err(self.mismatch("TextField")),
        }
    }

    pub fn into_context_field(self) -> Result<ContextField, AutomationError> {
        match self.kind {
            ElementKind::TextField { contextual: true } => Ok(ContextField(self)),
            _ => Err(self.mismatch("ContextField")),
        }
    }

    pub fn into_button(self) -> Result<Button, AutomationError> {
        match self.kind {
            ElementKind::Button => Ok(Button(self)),
            _ => Err(self.mismatch("Button")),
        }
    }

    pub fn into_check_box(self) -> Result<CheckBox, AutomationError> {
        match self.kind {
            ElementKind::CheckBox => Ok(CheckBox(self)),
            _ => Err(self.mismatch("CheckBox")),
        }
    }

    pub fn into_radio_button(self) -> Result<RadioButton, AutomationError> {
        match self.kind {
            ElementKind::RadioButton => Ok(RadioButton(self)),
            _ => Err(self.mismatch("RadioButton")),
        }
    }

    pub fn into_tab(self) -> Result<Tab, AutomationError> {
        match self.kind {
            ElementKind::Tab => Ok(Tab(self)),
            _ => Err(self.mismatch("Tab")),
        }
    }

    pub fn into_table(self) -> Result<Table, AutomationError> {
        match self.kind {
            ElementKind::Table => Ok(Table(self)),
            _ => Err(self.mismatch("Table")),
        }
    }

    pub fn into_grid(self) -> Result<Grid, AutomationError> {
        match self.kind {
            ElementKind::Grid => Ok(Grid(self)),
            _ => Err(self.mismatch("Grid")),
        }
    }

    pub fn into_frame(self) -> Result<Frame, AutomationError> {
        match self.kind {
            ElementKind::Frame => Ok(Frame(self)),
            _ => Err(self.mismatch("Frame")),
        }
    }

    pub fn into_status_bar(self) -> Result<StatusBar, AutomationError> {
        match self.kind {
            ElementKind::StatusBar => Ok(StatusBar(self)),
            _ => Err(self.mismatch("StatusBar")),
        }
    }
}

#[derive(Debug)]
pub struct TextField(RemoteElement);

impl TextField {
    pub fn text(&self) -> Result<String, AutomationError> {
        self.0.inner.text()
    }

    #[instrument(level = "debug", skip(self, text), fields(id = %self.0.id()))]
    pub fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.0.inner.set_text(text)
    }

    pub fn set_focus(&self) -> Result<(), AutomationError> {
        self.0.inner.set_focus()
    }
}

/// Text field with a value help; the only kind that opens a lookup dialog.
#[derive(Debug)]
pub struct ContextField(RemoteElement);

impl ContextField {
    pub fn text(&self) -> Result<String, AutomationError> {
        self.0.inner.text()
    }

    #[instrument(level = "debug", skip(self, text), fields(id = %self.0.id()))]
    pub fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.0.inner.set_text(text)
    }

    pub fn set_focus(&self) -> Result<(), AutomationError> {
        self.0.inner.set_focus()
    }

    pub fn show_context_menu(&self) -> Result<(), AutomationError> {
        self.0.inner.show_context_menu()
    }
}

#[derive(Debug)]
pub struct Button(RemoteElement);

impl Button {
    #[instrument(level = "debug", skip(self), fields(id = %self.0.id()))]
    pub fn press(&self) -> Result<(), AutomationError> {
        self.0.inner.press()
    }
}

#[derive(Debug)]
pub struct CheckBox(RemoteElement);

impl CheckBox {
    #[instrument(level = "debug", skip(self), fields(id = %self.0.id()))]
    pub fn set_selected(&self, selected: bool) -> Result<(), AutomationError> {
        self.0.inner.set_selected(selected)
    }
}

#[derive(Debug)]
pub struct RadioButton(RemoteElement);

impl RadioButton {
    pub fn select(&self) -> Result<(), AutomationError> {
        self.0.inner.select()
    }
}

#[derive(Debug)]
pub struct Tab(RemoteElement);

impl Tab {
    pub fn select(&self) -> Result<(), AutomationError> {
        self.0.inner.select()
    }
}

#[derive(Debug)]
pub struct Table(RemoteElement);

impl Table {
    pub fn set_vertical_scroll_position(&self, position: i32) -> Result<(), AutomationError> {
        self.0.inner.set_vertical_scroll_position(position)
    }
}

/// ALV grid shell.
#[derive(Debug)]
pub struct Grid(RemoteElement);

impl Grid {
    pub fn set_current_cell(&self, row: i32, column: &str) -> Result<(), AutomationError> {
        self.0.inner.set_current_cell(row, column)
    }

    pub fn select_all(&self) -> Result<(), AutomationError> {
        self.0.inner.select_all()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn press_toolbar_button(&self, button: &str) -> Result<(), AutomationError> {
        self.0.inner.press_toolbar_button(button)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn press_toolbar_context_button(&self, button: &str) -> Result<(), AutomationError> {
        self.0.inner.press_toolbar_context_button(button)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn select_context_menu_item(&self, item: &str) -> Result<(), AutomationError> {
        self.0.inner.select_context_menu_item(item)
    }
}

/// Session window (`wnd[n]`).
#[derive(Debug)]
pub struct Frame(RemoteElement);

impl Frame {
    pub fn title(&self) -> Result<String, AutomationError> {
        self.0.inner.text()
    }

    #[instrument(level = "debug", skip(self), fields(id = %self.0.id()))]
    pub fn send_vkey(&self, vkey: u32) -> Result<(), AutomationError> {
        self.0.inner.send_vkey(vkey)
    }

    pub fn maximize(&self) -> Result<(), AutomationError> {
        self.0.inner.maximize()
    }
}

#[derive(Debug)]
pub struct StatusBar(RemoteElement);

impl StatusBar {
    pub fn text(&self) -> Result<String, AutomationError> {
        self.0.inner.text()
    }
}
