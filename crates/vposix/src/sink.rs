//! Error reporting collaborator.
//!
//! Every failure the facade returns has been delivered here first, so the
//! embedding application decides what becomes a user-visible diagnostic.

use std::sync::Mutex;

use serde::Serialize;
use vposix_config::log_facade_warn;

use crate::error::ErrorKind;

/// One reported POSIX-domain failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    /// OS error number, when the failure came from a system call
    pub errno: Option<i32>,
    /// Path, program or operation the failure concerns
    pub context: String,
}

/// Receiver of failure reports
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &ErrorReport);

    /// The operation has no implementation on this platform.
    fn unimplemented(&self, operation: &'static str);
}

/// Default sink: one `warn` event per report
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, report: &ErrorReport) {
        log_facade_warn!(
            "posix error",
            kind = report.kind.as_str(),
            errno = report.errno.unwrap_or(0),
            context = report.context.as_str(),
        );
    }

    fn unimplemented(&self, operation: &'static str) {
        log_facade_warn!("operation not implemented", operation = operation);
    }
}

/// What a [`RecordingSink`] saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Report(ErrorReport),
    Unimplemented(&'static str),
}

/// Test sink that keeps every report in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Report(r) => Some(r),
                Recorded::Unimplemented(_) => None,
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports().iter().map(|r| r.kind).collect()
    }

    pub fn unimplemented_ops(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Unimplemented(op) => Some(op),
                Recorded::Report(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, event: Recorded) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, report: &ErrorReport) {
        self.push(Recorded::Report(report.clone()));
    }

    fn unimplemented(&self, operation: &'static str) {
        self.push(Recorded::Unimplemented(operation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: ErrorKind) -> ErrorReport {
        ErrorReport {
            kind,
            errno: Some(2),
            context: "/nowhere".to_string(),
        }
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());

        sink.report(&sample(ErrorKind::NotFound));
        sink.unimplemented("getpwent");
        sink.report(&sample(ErrorKind::Io));

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.kinds(), vec![ErrorKind::NotFound, ErrorKind::Io]);
        assert_eq!(sink.unimplemented_ops(), vec!["getpwent"]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let sink = TracingSink;
        sink.report(&sample(ErrorKind::PermissionDenied));
        sink.unimplemented("isatty");
    }
}
