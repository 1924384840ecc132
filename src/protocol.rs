//! Contract of the engine collaborator.
//!
//! Everything below this module is opaque to the rest of the crate except through the request
//! records and the [`Engine`] trait: status codes, wire type ids, handles and the synchronous
//! helper calls (error info, data conversion).

mod data_type;
mod engine;
mod handles;
mod requests;
mod status;

pub use data_type::DataType;
pub use engine::{Engine, TraceSink};
pub use handles::{ConnHandle, EnvHandle, ErrorHandle, StmtHandle, TranHandle};
pub use requests::{
    AbortParm, AutocommitParm, CloseParm, ColumnRole, CommitParm, ConnectParm, ConvertParm,
    DataValue, Descriptor, DiagnosticKind, DiagnosticRecord, DisconnectParm, GenParm,
    GetColumnsParm, GetDescriptorParm, GetErrorInfoParm, GetQueryInfoParm, InitParm, InputValue,
    PutParmsParm, QueryInfo, QueryParm, Request, RollbackParm, SetDescriptorParm,
};
pub use status::Status;

/// Protocol version requested at initialization.
pub const API_VERSION: u32 = 11;
