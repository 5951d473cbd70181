//! Observability for the queue
//!
//! - Structured logging, one JSON object per line
//! - Typed lifecycle events
//! - Begin/complete scopes around multi-step operations
//!
//! Observability is read-only: a logging failure never changes the outcome
//! of the queue operation being logged.
//!
//! ```ignore
//! use ackqueue::observability::{log_event, Event, ObservationScope};
//!
//! log_event(Event::PagePurged, &[("page_num", "4")]);
//!
//! let scope = ObservationScope::new("QUEUE_OPEN");
//! // ... recover pages ...
//! scope.complete(&[]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use scope::ObservationScope;

/// Returns the severity an event is logged at
pub fn event_severity(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event with fields
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event_severity(event), event.as_str(), fields);
}
