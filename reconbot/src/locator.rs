use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, trace};

use crate::element::RemoteElement;
use crate::errors::AutomationError;
use crate::platforms::SessionImpl;
use crate::selector::ElementId;

const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of a single probe.
#[derive(Debug)]
pub enum Lookup {
    Found(RemoteElement),
    /// Absent, or the remote tree is transiently unavailable
    NotYet,
    Failed(AutomationError),
}

impl From<Result<Option<RemoteElement>, AutomationError>> for Lookup {
    fn from(result: Result<Option<RemoteElement>, AutomationError>) -> Self {
        match result {
            Ok(Some(element)) => Lookup::Found(element),
            Ok(None) => Lookup::NotYet,
            Err(e) if e.is_retryable() => {
                trace!("retryable lookup failure: {e}");
                Lookup::NotYet
            }
            Err(e) => Lookup::Failed(e),
        }
    }
}

/// Resolves one element id against a session, polling until it appears or
/// the timeout runs out.
pub struct Locator<'a> {
    session: &'a dyn SessionImpl,
    id: ElementId,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a> Locator<'a> {
    pub fn new(session: &'a dyn SessionImpl, id: impl Into<ElementId>) -> Self {
        Self {
            session,
            id: id.into(),
            timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        // A zero interval would spin without yielding time
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn probe(&self) -> Lookup {
        self.session.find_by_id(&self.id).into()
    }

    /// Polls until the element appears. On timeout a required element is an
    /// `ElementNotFound` error, an optional one is `None`.
    #[instrument(level = "debug", skip(self), fields(id = %self.id))]
    pub async fn locate(&self, required: bool) -> Result<Option<RemoteElement>, AutomationError> {
        let start = Instant::now();
        loop {
            match self.probe() {
                Lookup::Found(element) => return Ok(Some(element)),
                Lookup::Failed(e) => return Err(e),
                Lookup::NotYet => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                if required {
                    return Err(AutomationError::ElementNotFound {
                        id: self.id.to_string(),
                        elapsed,
                    });
                }
                debug!("optional element absent after {elapsed:?}");
                return Ok(None);
            }
            sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    pub async fn wait(&self) -> Result<RemoteElement, AutomationError> {
        self.locate(true).await?.ok_or_else(|| AutomationError::ElementNotFound {
            id: self.id.to_string(),
            elapsed: self.timeout,
        })
    }

    pub async fn find(&self) -> Result<Option<RemoteElement>, AutomationError> {
        self.locate(false).await
    }
}
