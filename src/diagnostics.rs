//! Folding of engine statuses and diagnostic chains into [`EngineError`].

use std::fmt;

use tracing::debug;

use crate::adapter::Completion;
use crate::error::IngresError;
use crate::protocol::{
    DiagnosticKind, DiagnosticRecord, Engine, ErrorHandle, GetErrorInfoParm, Status,
};

/// Upper bound on records pulled from one chain, in case an engine never reports the end.
const MAX_RECORDS: usize = 256;

/// Structured error built from a failing status and/or the records attached to a request.
///
/// The display text starts with `"<location> status = <STATUS>"` when the status itself was a
/// failure, followed by one `"<KIND>: <message>"` line per record in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    location: &'static str,
    status: Status,
    records: Vec<DiagnosticRecord>,
    pending: bool,
}

impl EngineError {
    #[must_use]
    pub fn new(location: &'static str, status: Status, records: Vec<DiagnosticRecord>) -> Self {
        Self {
            location,
            status,
            records,
            pending: false,
        }
    }

    /// Error for a failing status that came without any records.
    #[must_use]
    pub fn from_status(location: &'static str, status: Status) -> Self {
        Self::new(location, status, Vec::new())
    }

    /// Operation that reported the error.
    #[must_use]
    pub fn location(&self) -> &'static str {
        self.location
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Every record of the chain, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    /// SQLSTATE of the most recent record.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&str> {
        self.records.last().map(|r| r.sqlstate.as_str())
    }

    /// Native error code of the most recent record.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.records.last().map(|r| r.code)
    }

    /// True if the wait gave up while the request was still outstanding in the engine.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// True if at least one record is classified as an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.kind == DiagnosticKind::Error)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Error => f.write_str("ERROR"),
            DiagnosticKind::Warning => f.write_str("WARNING"),
            DiagnosticKind::Message => f.write_str("USER MESSAGE"),
            DiagnosticKind::Unknown(_) => f.write_str("UNKNOWN"),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.status.is_failure() {
            write!(f, "{} status = {}", self.location, self.status)?;
            first = false;
        }
        for record in &self.records {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            write!(
                f,
                "{}: {}",
                record.kind,
                record.message.as_deref().unwrap_or("NULL")
            )?;
        }
        if first {
            // Only reachable for a hand-built error with a non-failing status and no records.
            write!(f, "{} status = {}", self.location, self.status)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Pull every record attached to `handle` until the engine reports the chain exhausted.
pub fn collect_records(engine: &dyn Engine, handle: ErrorHandle) -> Vec<DiagnosticRecord> {
    let mut records = Vec::new();
    while records.len() < MAX_RECORDS {
        let mut parm = GetErrorInfoParm {
            error_handle: handle,
            status: Status::Success,
            record: None,
        };
        engine.get_error_info(&mut parm);
        if parm.status != Status::Success {
            break;
        }
        match parm.record {
            Some(record) => records.push(record),
            None => break,
        }
    }
    records
}

/// Fold a completed request into an error.
///
/// Returns `None` for success-class statuses without attached records, including
/// [`Status::NoData`], which only marks the end of a result set. Records attached to a successful
/// status still produce an error, the same as a failing status does. A request left pending by
/// its wait is always an error.
pub fn aggregate(
    engine: &dyn Engine,
    location: &'static str,
    completion: Completion,
) -> Option<EngineError> {
    let records = completion
        .error_handle
        .map(|handle| collect_records(engine, handle))
        .unwrap_or_default();

    if !completion.pending && !completion.status.is_failure() && records.is_empty() {
        return None;
    }

    let mut err = EngineError::new(location, completion.status, records);
    err.pending = completion.pending;
    debug!(
        location,
        status = %completion.status,
        pending = err.pending,
        error = %err,
        "engine reported an error"
    );
    Some(err)
}

/// [`aggregate`] as a `Result`, for `?` at call sites.
///
/// # Errors
/// Returns [`IngresError::Engine`] when the request failed or carried diagnostic records.
pub fn check(
    engine: &dyn Engine,
    location: &'static str,
    completion: Completion,
) -> Result<(), IngresError> {
    match aggregate(engine, location, completion) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
