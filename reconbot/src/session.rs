//! Typed actions on a remote session. Every element goes through a
//! [`Locator`] first.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::Timings;
use crate::element::{Button, Grid, RemoteElement};
use crate::errors::AutomationError;
use crate::locator::{Locator, Lookup};
use crate::platforms::SessionImpl;
use crate::selector::ElementId;
use crate::window::{WindowHandle, WindowSource};

pub const MAIN_WINDOW: &str = "wnd[0]";
pub const STATUS_BAR: &str = "wnd[0]/sbar";

/// Virtual key codes understood by `SendVKey`.
pub mod vkey {
    pub const ENTER: u32 = 0;
    pub const F4: u32 = 4;
}

#[derive(Debug)]
pub struct Session {
    inner: Box<dyn SessionImpl>,
    timings: Timings,
}

impl Session {
    pub fn new(inner: Box<dyn SessionImpl>, timings: Timings) -> Self {
        Self { inner, timings }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Locator with the configured element budget.
    pub fn locator(&self, id: impl Into<ElementId>) -> Locator<'_> {
        Locator::new(self.inner.as_ref(), id)
            .timeout(self.timings.element_timeout)
            .poll_interval(self.timings.element_poll)
    }

    async fn element(&self, id: &str) -> Result<RemoteElement, AutomationError> {
        self.locator(id).wait().await
    }

    pub async fn set_text(&self, id: &str, text: &str) -> Result<(), AutomationError> {
        let field = self.element(id).await?.into_text_field()?;
        field.set_focus()?;
        field.set_text(text)
    }

    pub async fn text(&self, id: &str) -> Result<String, AutomationError> {
        self.element(id).await?.into_text_field()?.text()
    }

    pub async fn press(&self, id: &str) -> Result<(), AutomationError> {
        self.element(id).await?.into_button()?.press()
    }

    /// Presses a button only if it shows up within the dialog budget.
    /// Returns whether it was pressed.
    pub async fn press_if_present(&self, id: &str) -> Result<bool, AutomationError> {
        let found = self
            .locator(id)
            .timeout(self.timings.dialog_timeout)
            .find()
            .await?;
        match found {
            Some(element) => {
                let button: Button = element.into_button()?;
                button.press()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn set_checkbox(&self, id: &str, selected: bool) -> Result<(), AutomationError> {
        self.element(id).await?.into_check_box()?.set_selected(selected)
    }

    pub async fn select_radio(&self, id: &str) -> Result<(), AutomationError> {
        self.element(id).await?.into_radio_button()?.select()
    }

    pub async fn select_tab(&self, id: &str) -> Result<(), AutomationError> {
        self.element(id).await?.into_tab()?.select()
    }

    pub async fn scroll_table(&self, id: &str, position: i32) -> Result<(), AutomationError> {
        self.element(id)
            .await?
            .into_table()?
            .set_vertical_scroll_position(position)
    }

    pub async fn send_vkey(&self, window_id: &str, key: u32) -> Result<(), AutomationError> {
        self.element(window_id).await?.into_frame()?.send_vkey(key)
    }

    /// Focuses a value-help field and opens its context menu. Returns the
    /// text the field held.
    pub async fn focus_with_context(&self, id: &str) -> Result<String, AutomationError> {
        let field = self.element(id).await?.into_context_field()?;
        field.set_focus()?;
        let text = field.text()?;
        field.show_context_menu()?;
        Ok(text)
    }

    pub async fn grid(&self, id: &str) -> Result<Grid, AutomationError> {
        self.element(id).await?.into_grid()
    }

    /// Current status bar text; empty when the bar is not there.
    pub fn status_text(&self) -> Result<String, AutomationError> {
        match self.locator(STATUS_BAR).probe() {
            Lookup::Found(element) => element.into_status_bar()?.text(),
            Lookup::NotYet => Ok(String::new()),
            Lookup::Failed(e) => Err(e),
        }
    }

    /// Title of the focused session window. Polls with the element budget
    /// while the session has no active window or rejects the call; empty if
    /// no window shows up in time.
    #[instrument(level = "debug", skip(self))]
    pub async fn frame_title(&self) -> Result<String, AutomationError> {
        let timeout = self.timings.element_timeout;
        let poll = self.timings.element_poll.max(Duration::from_millis(1));
        let start = Instant::now();
        let mut rejected = None;

        loop {
            match self.inner.active_window() {
                Ok(Some(window)) => return window.into_frame()?.title(),
                Ok(None) => rejected = None,
                Err(e) if e.is_retryable() => {
                    debug!("active window not ready: {e}");
                    rejected = Some(e);
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return match rejected {
                    Some(e) => Err(e),
                    None => {
                        warn!("no active session window after {elapsed:?}");
                        Ok(String::new())
                    }
                };
            }
            sleep(poll.min(timeout - elapsed)).await;
        }
    }

    /// Waits until the status bar text stays unchanged for `status_quiet`.
    /// Gives up after `status_timeout` and returns whatever it shows then.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait_status_stable(&self) -> Result<String, AutomationError> {
        let quiet = self.timings.status_quiet;
        let poll = self.timings.element_poll.min(quiet).max(Duration::from_millis(1));
        let start = Instant::now();
        let mut last = self.status_text()?;
        let mut since = Instant::now();

        loop {
            if since.elapsed() >= quiet {
                return Ok(last);
            }
            if start.elapsed() >= self.timings.status_timeout {
                warn!("status bar still changing after {:?}: {last}", start.elapsed());
                return Ok(last);
            }
            sleep(poll).await;
            let current = self.status_text()?;
            if current != last {
                debug!("status bar changed: {current}");
                last = current;
                since = Instant::now();
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn start_transaction(&self, code: &str) -> Result<(), AutomationError> {
        self.inner.start_transaction(code).map_err(|e| match e {
            AutomationError::Status(_) => e,
            other => AutomationError::Status(format!("cannot start transaction {code}: {other}")),
        })
    }

    pub fn send_command(&self, command: &str) -> Result<(), AutomationError> {
        self.inner.send_command(command)
    }

    /// Fills the logon screen and confirms it.
    #[instrument(level = "info", skip(self, password))]
    pub async fn login(&self, user: &str, password: &str) -> Result<(), AutomationError> {
        let main = self.element(MAIN_WINDOW).await?.into_frame()?;
        self.set_text("wnd[0]/usr/txtRSYST-BNAME", user).await?;
        self.set_text("wnd[0]/usr/pwdRSYST-BCODE", password).await?;
        main.maximize()?;
        main.send_vkey(vkey::ENTER)?;
        info!("logon screen submitted");
        Ok(())
    }

    /// Leaves the session with `/nex`.
    pub async fn close(&self) -> Result<(), AutomationError> {
        self.element(MAIN_WINDOW).await?.into_frame()?;
        self.send_command("/nex")
    }
}

impl WindowSource for Session {
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        self.inner.windows()
    }
}
