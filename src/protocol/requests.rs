//! Request records exchanged with the engine.
//!
//! Every asynchronous request embeds a [`GenParm`]. The engine may complete a request while it is
//! being dispatched or leave it pending until [`Engine::wait`](super::Engine::wait) reports
//! progress; callers only look at the outputs once `gen_parm.completed` is set.

use std::time::Duration;

use super::data_type::DataType;
use super::handles::{ConnHandle, EnvHandle, ErrorHandle, StmtHandle, TranHandle};
use super::status::Status;
use crate::types::QueryKind;

/// Completion block shared by every asynchronous request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenParm {
    pub completed: bool,
    pub status: Status,
    pub error_handle: Option<ErrorHandle>,
}

impl GenParm {
    /// Mark the request finished with `status`.
    pub fn complete(&mut self, status: Status) {
        self.completed = true;
        self.status = status;
    }

    /// Mark the request failed and attach a diagnostic chain.
    pub fn fail(&mut self, status: Status, error_handle: Option<ErrorHandle>) {
        self.complete(status);
        self.error_handle = error_handle;
    }
}

/// Access to the completion block of a request.
pub trait Request {
    fn gen_parm(&self) -> &GenParm;
    fn gen_parm_mut(&mut self) -> &mut GenParm;
}

macro_rules! request {
    ($($name:ident $(<$lt:lifetime>)?),* $(,)?) => {
        $(
            impl $(<$lt>)? Request for $name $(<$lt>)? {
                fn gen_parm(&self) -> &GenParm {
                    &self.gen_parm
                }

                fn gen_parm_mut(&mut self) -> &mut GenParm {
                    &mut self.gen_parm
                }
            }
        )*
    };
}

/// Runtime initialization. Synchronous.
#[derive(Debug, Clone, Default)]
pub struct InitParm {
    pub version: u32,
    pub timeout: Option<Duration>,
    pub status: Status,
    pub env_handle: Option<EnvHandle>,
}

#[derive(Debug, Clone)]
pub struct ConnectParm {
    pub gen_parm: GenParm,
    pub env_handle: EnvHandle,
    pub target: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
    /// Set by the engine, possibly even when the connect fails.
    pub conn_handle: Option<ConnHandle>,
}

#[derive(Debug, Clone)]
pub struct AbortParm {
    pub gen_parm: GenParm,
    pub conn_handle: ConnHandle,
}

#[derive(Debug, Clone)]
pub struct DisconnectParm {
    pub gen_parm: GenParm,
    pub conn_handle: ConnHandle,
}

/// Enables autocommit when `conn_handle` is set and `tran_handle` is empty; disables it when
/// only `tran_handle` is set.
#[derive(Debug, Clone, Default)]
pub struct AutocommitParm {
    pub gen_parm: GenParm,
    pub conn_handle: Option<ConnHandle>,
    pub tran_handle: Option<TranHandle>,
}

#[derive(Debug, Clone)]
pub struct QueryParm {
    pub gen_parm: GenParm,
    pub conn_handle: ConnHandle,
    pub kind: QueryKind,
    pub text: String,
    pub has_parameters: bool,
    /// In: the transaction to run in, or `None` to let the engine open one. Out: the transaction
    /// the statement runs in.
    pub tran_handle: Option<TranHandle>,
    pub stmt_handle: Option<StmtHandle>,
}

/// What a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnRole {
    #[default]
    Tuple,
    QueryParameter,
}

/// Engine-level description of one column or parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub data_type: DataType,
    pub nullable: bool,
    pub length: u16,
    pub precision: i16,
    pub scale: i16,
    pub role: ColumnRole,
    pub name: Option<String>,
}

impl Descriptor {
    #[must_use]
    pub fn new(data_type: DataType, length: u16) -> Self {
        Self {
            data_type,
            nullable: false,
            length,
            precision: 0,
            scale: 0,
            role: ColumnRole::Tuple,
            name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetDescriptorParm {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
    pub descriptors: Vec<Descriptor>,
}

/// Parameter value sent to the engine.
#[derive(Debug, Clone, Copy)]
pub struct InputValue<'a> {
    pub null: bool,
    pub value: &'a [u8],
}

#[derive(Debug)]
pub struct PutParmsParm<'a> {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
    pub values: Vec<InputValue<'a>>,
    pub more_segments: bool,
}

#[derive(Debug, Clone)]
pub struct GetDescriptorParm {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
    pub descriptors: Vec<Descriptor>,
}

/// Column slot the engine writes one value (or one segment) into.
#[derive(Debug)]
pub struct DataValue<'a> {
    pub null: bool,
    /// Number of bytes the engine wrote into `value`.
    pub length: u16,
    pub value: &'a mut [u8],
}

#[derive(Debug)]
pub struct GetColumnsParm<'a> {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
    pub row_count: u16,
    pub columns: Vec<DataValue<'a>>,
    /// Set by the engine when the (single, long) column has more segments to deliver.
    pub more_segments: bool,
}

/// Final information about a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryInfo {
    pub row_count: Option<i64>,
    pub last_insert_id: Option<i64>,
    pub procedure_return: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct GetQueryInfoParm {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
    pub info: QueryInfo,
}

#[derive(Debug, Clone)]
pub struct CloseParm {
    pub gen_parm: GenParm,
    pub stmt_handle: StmtHandle,
}

#[derive(Debug, Clone)]
pub struct CommitParm {
    pub gen_parm: GenParm,
    pub tran_handle: TranHandle,
}

#[derive(Debug, Clone)]
pub struct RollbackParm {
    pub gen_parm: GenParm,
    pub tran_handle: TranHandle,
}

/// Classification of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error,
    Warning,
    Message,
    Unknown(i32),
}

/// One classified unit of engine-reported detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub kind: DiagnosticKind,
    pub sqlstate: String,
    pub code: i32,
    pub message: Option<String>,
}

/// Pulls the next record of a diagnostic chain. Synchronous; `status` is
/// [`Status::NoData`] once the chain is exhausted.
#[derive(Debug, Clone)]
pub struct GetErrorInfoParm {
    pub error_handle: ErrorHandle,
    pub status: Status,
    pub record: Option<DiagnosticRecord>,
}

/// Engine-native conversion of a binary value into display text. Synchronous.
#[derive(Debug)]
pub struct ConvertParm<'a> {
    pub src: Descriptor,
    pub src_value: &'a [u8],
    pub dst: &'a mut [u8],
    pub status: Status,
}

request!(
    ConnectParm,
    AbortParm,
    DisconnectParm,
    AutocommitParm,
    QueryParm,
    SetDescriptorParm,
    PutParmsParm<'a>,
    GetDescriptorParm,
    GetColumnsParm<'a>,
    GetQueryInfoParm,
    CloseParm,
    CommitParm,
    RollbackParm,
);
