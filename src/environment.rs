//! The engine runtime handle every connection borrows.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::decode::DisplayConverter;
use crate::descriptor::ColumnDescriptor;
use crate::diagnostics::EngineError;
use crate::error::IngresError;
use crate::pool::{BufferPool, PooledBuffer};
use crate::protocol::{API_VERSION, ConvertParm, Engine, EnvHandle, InitParm, Status, TraceSink};

/// Size of the scratch buffer handed to the engine for display conversion.
pub const SCRATCH_LEN: usize = 100;

/// Capacity segment accumulation buffers start with.
const SEGMENT_CAPACITY: usize = 4096;

const MAX_IDLE_BUFFERS: usize = 16;

/// An initialized engine runtime.
///
/// Created once with [`Environment::initialize`] and shared as `Arc<Environment>`; every
/// [`Connection`](crate::session::Connection) keeps a clone, so the environment cannot be torn
/// down under a live connection. [`Environment::release`] shuts it down explicitly; dropping the
/// last reference does the same and logs any failure.
pub struct Environment {
    engine: Box<dyn Engine>,
    handle: EnvHandle,
    scratch: BufferPool,
    segments: BufferPool,
    released: bool,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Initialize the engine runtime.
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine refuses to initialize.
    pub fn initialize<E>(engine: E) -> Result<Arc<Self>, IngresError>
    where
        E: Engine + 'static,
    {
        Self::initialize_with_timeout(engine, None)
    }

    /// Same as [`Environment::initialize`] with a bound on the initialization wait.
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine refuses to initialize.
    pub fn initialize_with_timeout<E>(
        engine: E,
        timeout: Option<Duration>,
    ) -> Result<Arc<Self>, IngresError>
    where
        E: Engine + 'static,
    {
        let mut parm = InitParm {
            version: API_VERSION,
            timeout,
            ..InitParm::default()
        };
        engine.initialize(&mut parm);
        let handle = match parm.env_handle {
            Some(handle) if !parm.status.is_failure() => handle,
            _ => {
                let status = if parm.status.is_failure() {
                    parm.status
                } else {
                    Status::NotInitialized
                };
                return Err(EngineError::from_status("initialize", status).into());
            }
        };
        debug!(?handle, version = API_VERSION, "engine environment initialized");

        Ok(Arc::new(Self {
            engine: Box::new(engine),
            handle,
            scratch: BufferPool::new(SCRATCH_LEN, MAX_IDLE_BUFFERS),
            segments: BufferPool::new(SEGMENT_CAPACITY, MAX_IDLE_BUFFERS),
            released: false,
        }))
    }

    #[must_use]
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    #[must_use]
    pub fn handle(&self) -> EnvHandle {
        self.handle
    }

    /// Pool of accumulation buffers for segmented columns.
    pub(crate) fn segment_buffer(&self) -> PooledBuffer<'_> {
        self.segments.get()
    }

    #[must_use]
    pub fn idle_scratch_buffers(&self) -> usize {
        self.scratch.idle_count()
    }

    /// Forward the engine's own trace stream into `tracing` at TRACE level.
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine rejects the trace sink.
    pub fn enable_trace(&self) -> Result<(), IngresError> {
        let sink: TraceSink = Arc::new(|message: &str| {
            trace!(target: "ingres_client::engine", "{}", message.trim_end());
        });
        self.set_trace(Some(sink))
    }

    /// Stop forwarding engine trace messages.
    ///
    /// # Errors
    /// Returns [`IngresError::Engine`] if the engine rejects the change.
    pub fn disable_trace(&self) -> Result<(), IngresError> {
        self.set_trace(None)
    }

    fn set_trace(&self, sink: Option<TraceSink>) -> Result<(), IngresError> {
        let status = self.engine.set_trace(self.handle, sink);
        if status.is_failure() {
            return Err(EngineError::from_status("set_trace", status).into());
        }
        Ok(())
    }

    /// Release the environment and shut the engine runtime down.
    ///
    /// # Errors
    /// Returns [`IngresError::EnvironmentInUse`] while connections still hold the environment (it
    /// is then shut down when the last of them is dropped), or [`IngresError::Engine`] if the
    /// engine fails to release.
    pub fn release(env: Arc<Self>) -> Result<(), IngresError> {
        match Arc::try_unwrap(env) {
            Ok(mut env) => env.shutdown(),
            Err(shared) => Err(IngresError::EnvironmentInUse(Arc::strong_count(&shared) - 1)),
        }
    }

    fn shutdown(&mut self) -> Result<(), IngresError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let status = self.engine.release_env(self.handle);
        if status.is_failure() {
            return Err(EngineError::from_status("release_env", status).into());
        }
        let status = self.engine.terminate();
        if status.is_failure() {
            return Err(EngineError::from_status("terminate", status).into());
        }
        debug!(handle = ?self.handle, "engine environment released");
        Ok(())
    }
}

impl DisplayConverter for Environment {
    fn to_display(&self, column: &ColumnDescriptor, raw: &[u8]) -> Result<String, IngresError> {
        let mut scratch = self.scratch.get();
        scratch.resize(SCRATCH_LEN, 0);

        let mut parm = ConvertParm {
            src: column.to_descriptor(),
            src_value: raw,
            dst: &mut scratch[..],
            status: Status::Success,
        };
        self.engine.convert_data(&mut parm);
        if parm.status != Status::Success {
            return Err(IngresError::ConversionError(format!(
                "{} value of column {} could not be converted to text (status = {})",
                column.data_type, column.ordinal, parm.status
            )));
        }

        Ok(String::from_utf8_lossy(&scratch).into_owned())
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to release engine environment");
        }
    }
}
