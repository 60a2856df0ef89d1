//! Waiting for windows to show up.
//!
//! Windows are polled once per second from a [`WindowSource`]: the desktop,
//! the open windows of a remote session, or the children of a window.

use std::fmt::{self, Debug};
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::errors::AutomationError;
use crate::selector::{WindowPredicate, WindowRole};

/// Fixed polling granularity of every window wait.
pub const WINDOW_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub trait WindowImpl: Debug {
    fn title(&self) -> String;
    fn role(&self) -> WindowRole;
    /// Scripting path for session windows (`wnd[1]`); `None` on the desktop
    fn id(&self) -> Option<String> {
        None
    }
    fn children(&self) -> Result<Vec<WindowHandle>, AutomationError>;
    fn find_control(
        &self,
        role: ControlRole,
        name: &str,
    ) -> Result<Option<Control>, AutomationError>;
    fn send_keys(&self, keys: &str) -> Result<(), AutomationError>;
}

/// Transient reference to a live window.
#[derive(Debug)]
pub struct WindowHandle {
    inner: Box<dyn WindowImpl>,
}

impl WindowHandle {
    pub fn new(inner: Box<dyn WindowImpl>) -> Self {
        Self { inner }
    }

    pub fn title(&self) -> String {
        self.inner.title()
    }

    pub fn role(&self) -> WindowRole {
        self.inner.role()
    }

    pub fn id(&self) -> Option<String> {
        self.inner.id()
    }

    pub fn matches(&self, predicate: &WindowPredicate) -> bool {
        predicate.matches(&self.inner.title(), self.inner.role())
    }

    pub fn children(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        self.inner.children()
    }

    pub fn find_control(
        &self,
        role: ControlRole,
        name: &str,
    ) -> Result<Option<Control>, AutomationError> {
        self.inner.find_control(role, name)
    }

    /// Like [`find_control`](Self::find_control) but absence is an error.
    pub fn control(&self, role: ControlRole, name: &str) -> Result<Control, AutomationError> {
        self.find_control(role, name)?
            .ok_or_else(|| AutomationError::ElementNotFound {
                id: format!("{role:?} '{name}' in '{}'", self.title()),
                elapsed: Duration::ZERO,
            })
    }

    #[instrument(level = "debug", skip(self), fields(window = %self.title()))]
    pub fn send_keys(&self, keys: &str) -> Result<(), AutomationError> {
        self.inner.send_keys(keys)
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.id() {
            Some(id) => write!(f, "{id} '{}'", self.inner.title()),
            None => write!(f, "'{}'", self.inner.title()),
        }
    }
}

/// Anything a window wait can poll.
pub trait WindowSource {
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError>;

    fn find_window(
        &self,
        predicate: &WindowPredicate,
    ) -> Result<Option<WindowHandle>, AutomationError> {
        Ok(self.windows()?.into_iter().find(|w| w.matches(predicate)))
    }
}

/// A window's children are themselves a source.
impl WindowSource for WindowHandle {
    fn windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        self.children()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    Edit,
    Button,
}

pub trait ControlImpl: Debug {
    fn name(&self) -> String;
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    fn click(&self) -> Result<(), AutomationError>;
}

/// Control inside a desktop window (an edit box or a push button).
#[derive(Debug)]
pub struct Control {
    role: ControlRole,
    inner: Box<dyn ControlImpl>,
}

impl Control {
    pub fn new(role: ControlRole, inner: Box<dyn ControlImpl>) -> Self {
        Self { role, inner }
    }

    pub fn role(&self) -> ControlRole {
        self.role
    }

    pub fn name(&self) -> String {
        self.inner.name()
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        match self.role {
            ControlRole::Edit => self.inner.set_value(value),
            other => Err(AutomationError::UnsupportedOperation(format!(
                "set_value on {other:?} '{}'",
                self.inner.name()
            ))),
        }
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        match self.role {
            ControlRole::Button => self.inner.click(),
            other => Err(AutomationError::UnsupportedOperation(format!(
                "click on {other:?} '{}'",
                self.inner.name()
            ))),
        }
    }
}

/// Independent attempts of a bounded-retry wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Window waits at a fixed one second granularity.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowWaiter;

impl WindowWaiter {
    pub fn new() -> Self {
        Self
    }

    /// Polls `source` until a window matching `predicate` shows up. Returns
    /// `None` once `timeout` has elapsed.
    pub async fn wait_for_window<S>(
        &self,
        source: &S,
        predicate: &WindowPredicate,
        timeout: Duration,
    ) -> Result<Option<WindowHandle>, AutomationError>
    where
        S: WindowSource + ?Sized,
    {
        let start = Instant::now();
        loop {
            match source.find_window(predicate) {
                Ok(Some(window)) => {
                    debug!("found window {window} after {:?}", start.elapsed());
                    return Ok(Some(window));
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => debug!("window listing not ready: {e}"),
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(None);
            }
            sleep(WINDOW_POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }

    /// Confirms that a window appeared after something was started.
    #[instrument(level = "debug", skip(self, source))]
    pub async fn wait_startup<S>(
        &self,
        source: &S,
        predicate: &WindowPredicate,
        timeout: Duration,
    ) -> Result<WindowHandle, AutomationError>
    where
        S: WindowSource + ?Sized,
    {
        match self.wait_for_window(source, predicate, timeout).await? {
            Some(window) => {
                info!("{window} is up");
                Ok(window)
            }
            None => Err(AutomationError::Timeout(format!(
                "{predicate} did not appear within {timeout:?}"
            ))),
        }
    }

    /// Runs `action` on a matching window, giving the whole thing
    /// `policy.max_attempts` independent tries. Absence of the window and
    /// not-found or retryable failures inside `action` count as a failed
    /// attempt; any other failure is returned at once.
    #[instrument(level = "debug", skip(self, source, action))]
    pub async fn with_retries<S, F, Fut, T>(
        &self,
        source: &S,
        predicate: &WindowPredicate,
        policy: RetryPolicy,
        mut action: F,
    ) -> Result<T, AutomationError>
    where
        S: WindowSource + ?Sized,
        F: FnMut(WindowHandle) -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        let attempts = policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let window = match self
                .wait_for_window(source, predicate, policy.timeout)
                .await?
            {
                Some(window) => window,
                None => {
                    warn!("attempt {attempt}/{attempts}: {predicate} did not appear");
                    continue;
                }
            };

            match action(window).await {
                Ok(value) => return Ok(value),
                Err(e) if counts_as_missed_window(&e) => {
                    warn!("attempt {attempt}/{attempts} on {predicate} failed: {e}");
                    if attempt < attempts {
                        sleep(WINDOW_POLL_INTERVAL).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(AutomationError::WindowNotFound {
            window: predicate.to_string(),
            attempts,
        })
    }
}

fn counts_as_missed_window(e: &AutomationError) -> bool {
    e.is_retryable()
        || matches!(
            e,
            AutomationError::ElementNotFound { .. } | AutomationError::WindowNotFound { .. }
        )
}
