//! Blocking facade over the engine's dispatch/wait protocol.
//!
//! Every call blocks the current thread until the engine marks the request completed. There is no
//! background thread: progress is made only inside [`Engine::wait`].

use std::time::Duration;

use tracing::trace;

use crate::protocol::{Engine, ErrorHandle, GenParm, Request, Status};

/// Final status of a request plus the entry point of its diagnostic chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub status: Status,
    pub error_handle: Option<ErrorHandle>,
    /// The wait gave up before the engine completed the request. The request is still
    /// outstanding and its handle must not receive further requests.
    pub pending: bool,
}

impl Completion {
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.status.is_no_data()
    }
}

/// Drive `gen_parm` until the engine reports it completed.
///
/// `timeout` bounds each individual wait; `None` waits forever. A failing wait is reported as the
/// request's status with [`Completion::pending`] set, leaving the request itself outstanding.
pub fn wait(engine: &dyn Engine, gen_parm: &mut GenParm, timeout: Option<Duration>) -> Completion {
    while !gen_parm.completed {
        let status = engine.wait(gen_parm, timeout);
        if status != Status::Success {
            trace!(status = %status, "wait failed");
            return Completion {
                status,
                error_handle: gen_parm.error_handle,
                pending: !gen_parm.completed,
            };
        }
    }
    Completion {
        status: gen_parm.status,
        error_handle: gen_parm.error_handle,
        pending: false,
    }
}

/// Dispatch a request and block until it completes. Never fails by itself: the caller inspects
/// the returned [`Completion`], usually through [`crate::diagnostics::check`].
pub fn execute_and_wait<P, F>(
    engine: &dyn Engine,
    op: &'static str,
    parm: &mut P,
    timeout: Option<Duration>,
    dispatch: F,
) -> Completion
where
    P: Request,
    F: FnOnce(&dyn Engine, &mut P),
{
    trace!(op, "dispatching request");
    dispatch(engine, parm);
    let completion = wait(engine, parm.gen_parm_mut(), timeout);
    trace!(op, status = %completion.status, pending = completion.pending, "request completed");
    completion
}
