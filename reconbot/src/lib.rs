//! Reconciliation-act generation through SAP GUI scripting.
//!
//! Requests dropped into the inbox are matched against the counterparty
//! lookup table and replayed as a fixed workflow against a live SAP GUI
//! session. Every request gets its outcome written back into its own file.

pub mod batch;
pub mod config;
pub mod context;
pub mod document;
pub mod duration;
pub mod element;
pub mod errors;
pub mod launcher;
pub mod layout;
pub mod locator;
pub mod lookup;
pub mod matcher;
pub mod platforms;
pub mod request;
pub mod selector;
pub mod sequencer;
pub mod session;
#[cfg(test)]
mod tests;
pub mod window;

pub use batch::{run_inbox, BatchDriver, BatchOutcome, BatchSummary};
pub use config::{Config, Timings};
pub use context::RunContext;
pub use document::JsonDocument;
pub use element::{ElementKind, RemoteElement};
pub use errors::{AutomationError, InitError, TaskError};
pub use layout::Layout;
pub use locator::{Locator, Lookup};
pub use lookup::{LookupRow, LookupTable};
pub use matcher::{match_company, validate_agreement_number, Signatories, Task};
pub use request::{RequestRecord, RequestType};
pub use selector::{ElementId, WindowPredicate, WindowRole};
pub use sequencer::{ReconciliationRun, RunReport, Stage};
pub use session::Session;
pub use window::{RetryPolicy, WindowHandle, WindowSource, WindowWaiter};
