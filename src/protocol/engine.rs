use std::sync::Arc;
use std::time::Duration;

use super::handles::EnvHandle;
use super::requests::{
    AbortParm, AutocommitParm, CloseParm, CommitParm, ConnectParm, ConvertParm, DisconnectParm,
    GenParm, GetColumnsParm, GetDescriptorParm, GetErrorInfoParm, GetQueryInfoParm, InitParm,
    PutParmsParm, QueryParm, RollbackParm, SetDescriptorParm,
};
use super::status::Status;

/// Receiver for the engine's own trace stream.
pub type TraceSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The engine collaborator: a request/wait/status protocol over opaque handles.
///
/// Request methods dispatch work and return immediately. The engine either completes the request
/// before returning (setting `gen_parm.completed`) or leaves it pending; callers then drive it with
/// [`Engine::wait`] until it completes. Only one request may be outstanding per connection.
///
/// A binding to a native client library implements this trait; [`crate::test_utils::MockEngine`]
/// is an in-process implementation used by the test suite.
pub trait Engine: Send + Sync {
    /// Initialize the runtime and hand out an environment handle.
    fn initialize(&self, parm: &mut InitParm);

    /// Release an environment handle.
    fn release_env(&self, env: EnvHandle) -> Status;

    /// Shut the runtime down once every environment is released.
    fn terminate(&self) -> Status;

    /// Install (or remove) a receiver for engine trace messages.
    fn set_trace(&self, env: EnvHandle, sink: Option<TraceSink>) -> Status;

    fn connect(&self, parm: &mut ConnectParm);

    /// Abort a connection that is not usable, typically a half-open one after a failed connect.
    fn abort(&self, parm: &mut AbortParm);

    fn disconnect(&self, parm: &mut DisconnectParm);

    fn autocommit(&self, parm: &mut AutocommitParm);

    fn query(&self, parm: &mut QueryParm);

    fn set_descriptor(&self, parm: &mut SetDescriptorParm);

    fn put_parms(&self, parm: &mut PutParmsParm<'_>);

    fn get_descriptor(&self, parm: &mut GetDescriptorParm);

    /// Fetch one row (or one segment of a long column) into the supplied slots.
    fn get_columns(&self, parm: &mut GetColumnsParm<'_>);

    fn get_query_info(&self, parm: &mut GetQueryInfoParm);

    fn close(&self, parm: &mut CloseParm);

    fn commit(&self, parm: &mut CommitParm);

    fn rollback(&self, parm: &mut RollbackParm);

    /// Block until the pending request behind `gen_parm` makes progress.
    ///
    /// `None` waits forever. A non-success return means the wait itself failed (for example it
    /// timed out); the request is then left as it was.
    fn wait(&self, gen_parm: &mut GenParm, timeout: Option<Duration>) -> Status;

    fn get_error_info(&self, parm: &mut GetErrorInfoParm);

    fn convert_data(&self, parm: &mut ConvertParm<'_>);
}
