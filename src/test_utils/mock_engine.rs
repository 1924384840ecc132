use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::protocol::{
    AbortParm, AutocommitParm, CloseParm, ColumnRole, CommitParm, ConnHandle, ConnectParm,
    ConvertParm, DataType, Descriptor, DiagnosticKind, DiagnosticRecord, DisconnectParm, Engine,
    EnvHandle, ErrorHandle, GenParm, GetColumnsParm, GetDescriptorParm, GetErrorInfoParm,
    GetQueryInfoParm, InitParm, PutParmsParm, QueryParm, RollbackParm, SetDescriptorParm, Status,
    StmtHandle, TraceSink, TranHandle,
};
use crate::types::Value;

/// Payload bytes per segment unless configured otherwise.
pub const DEFAULT_SEGMENT_LEN: usize = 2000;

/// Computes the reply for a statement from its text and decoded parameters. Returning `None`
/// falls back to the scripted replies.
pub type ReplyHandler = Arc<dyn Fn(&str, &[Value]) -> Option<Reply> + Send + Sync>;

/// Column of a scripted result.
#[derive(Debug, Clone, PartialEq)]
pub struct MockColumn {
    pub name: String,
    pub data_type: DataType,
    pub length: u16,
    pub nullable: bool,
    pub precision: i16,
    pub scale: i16,
}

impl MockColumn {
    #[must_use]
    pub fn new(name: &str, data_type: DataType, length: u16) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            length,
            nullable: false,
            precision: 0,
            scale: 0,
        }
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: i16, scale: i16) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    fn descriptor(&self) -> Descriptor {
        Descriptor {
            data_type: self.data_type,
            nullable: self.nullable,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            role: ColumnRole::Tuple,
            name: Some(self.name.clone()),
        }
    }
}

/// What the mock answers to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A result set; values are encoded to each column's wire format when fetched.
    Rows {
        columns: Vec<MockColumn>,
        rows: Vec<Vec<Value>>,
    },
    Exec {
        rows_affected: i64,
        last_insert_id: Option<i64>,
    },
    Error {
        status: Status,
        records: Vec<DiagnosticRecord>,
    },
}

impl Reply {
    #[must_use]
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<Value>>) -> Self {
        Reply::Rows { columns, rows }
    }

    #[must_use]
    pub fn exec(rows_affected: i64) -> Self {
        Reply::Exec {
            rows_affected,
            last_insert_id: None,
        }
    }

    #[must_use]
    pub fn error(status: Status, records: Vec<DiagnosticRecord>) -> Self {
        Reply::Error { status, records }
    }

    /// The engine's answer to malformed SQL.
    #[must_use]
    pub fn syntax_error(detail: &str) -> Self {
        Reply::Error {
            status: Status::Error,
            records: vec![record(
                DiagnosticKind::Error,
                "42000",
                2500,
                &format!("Syntax error on line 1.  Last symbol read was: '{detail}'."),
            )],
        }
    }
}

/// Build a diagnostic record.
#[must_use]
pub fn record(kind: DiagnosticKind, sqlstate: &str, code: i32, message: &str) -> DiagnosticRecord {
    DiagnosticRecord {
        kind,
        sqlstate: sqlstate.to_string(),
        code,
        message: Some(message.to_string()),
    }
}

/// A one-shot failure injected into the next call of an operation.
#[derive(Debug, Clone)]
pub struct MockFailure {
    pub status: Status,
    pub records: Vec<DiagnosticRecord>,
    /// For `connect` and autocommit enabling: hand out a handle despite the failure.
    pub leave_handle: bool,
}

impl MockFailure {
    #[must_use]
    pub fn status(status: Status) -> Self {
        Self {
            status,
            records: Vec::new(),
            leave_handle: false,
        }
    }

    #[must_use]
    pub fn with_record(mut self, record: DiagnosticRecord) -> Self {
        self.records.push(record);
        self
    }

    #[must_use]
    pub fn leaving_handle(mut self) -> Self {
        self.leave_handle = true;
        self
    }
}

struct MockStatement {
    text: String,
    param_descriptors: Vec<Descriptor>,
    awaiting_params: bool,
    columns: Vec<MockColumn>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    next_column: usize,
    long_offset: usize,
    delivered: i64,
    affected: Option<i64>,
    last_insert_id: Option<i64>,
}

impl MockStatement {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            param_descriptors: Vec::new(),
            awaiting_params: false,
            columns: Vec::new(),
            rows: VecDeque::new(),
            current: None,
            next_column: 0,
            long_offset: 0,
            delivered: 0,
            affected: None,
            last_insert_id: None,
        }
    }

    fn load(&mut self, reply: Reply) {
        match reply {
            Reply::Rows { columns, rows } => {
                self.columns = columns;
                self.rows = rows.into();
            }
            Reply::Exec {
                rows_affected,
                last_insert_id,
            } => {
                self.affected = Some(rows_affected);
                self.last_insert_id = last_insert_id;
            }
            Reply::Error { .. } => {}
        }
    }
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    env: Option<EnvHandle>,
    terminated: bool,
    /// Open connections and their autocommit transaction.
    connections: HashMap<ConnHandle, Option<TranHandle>>,
    /// Autocommit transactions handed out together with an error.
    dangling_autocommit: HashSet<TranHandle>,
    transactions: HashSet<TranHandle>,
    committed: Vec<TranHandle>,
    rolled_back: Vec<TranHandle>,
    aborted: Vec<ConnHandle>,
    statements: HashMap<StmtHandle, MockStatement>,
    error_chains: HashMap<ErrorHandle, VecDeque<DiagnosticRecord>>,
    replies: HashMap<String, Reply>,
    handler: Option<ReplyHandler>,
    failures: HashMap<String, VecDeque<MockFailure>>,
    calls: Vec<String>,
    executed: Vec<(String, Vec<Value>)>,
    delayed: bool,
    wait_failure: Option<Status>,
    waits: usize,
    wait_timeouts: Vec<Option<Duration>>,
    segment_len: usize,
    trace: Option<TraceSink>,
}

impl MockState {
    fn new_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn log(&mut self, op: &str) {
        self.calls.push(op.to_string());
        if let Some(sink) = &self.trace {
            sink(&format!("mock engine: {op}"));
        }
    }

    fn take_failure(&mut self, op: &str) -> Option<MockFailure> {
        self.failures.get_mut(op).and_then(VecDeque::pop_front)
    }

    fn complete(&mut self, gen_parm: &mut GenParm, status: Status, records: Vec<DiagnosticRecord>) {
        gen_parm.status = status;
        gen_parm.error_handle = if records.is_empty() {
            None
        } else {
            let handle = ErrorHandle(self.new_id());
            self.error_chains.insert(handle, records.into());
            Some(handle)
        };
        gen_parm.completed = !self.delayed;
    }

    fn succeed(&mut self, gen_parm: &mut GenParm) {
        self.complete(gen_parm, Status::Success, Vec::new());
    }

    fn fail(&mut self, gen_parm: &mut GenParm, failure: MockFailure) {
        self.complete(gen_parm, failure.status, failure.records);
    }

    fn invalid_handle(&mut self, gen_parm: &mut GenParm) {
        self.complete(gen_parm, Status::InvalidHandle, Vec::new());
    }

    fn reject(&mut self, gen_parm: &mut GenParm, message: &str) {
        let records = vec![record(DiagnosticKind::Error, "HY000", -1, message)];
        self.complete(gen_parm, Status::Error, records);
    }

    fn is_live_transaction(&self, tran: TranHandle) -> bool {
        self.transactions.contains(&tran) || self.connections.values().any(|t| *t == Some(tran))
    }

    fn resolve(&self, text: &str, params: &[Value]) -> Reply {
        if let Some(handler) = &self.handler
            && let Some(reply) = handler(text, params)
        {
            return reply;
        }
        let key = text.trim();
        if let Some(reply) = self.replies.get(key) {
            return reply.clone();
        }
        if key.eq_ignore_ascii_case("begin transaction") {
            return Reply::exec(0);
        }
        Reply::Error {
            status: Status::Error,
            records: vec![record(
                DiagnosticKind::Error,
                "42000",
                -1,
                &format!("no reply scripted for: {key}"),
            )],
        }
    }
}

/// Scripted, in-process [`Engine`].
///
/// Cloning shares the state, so a test keeps one clone for assertions after handing another to
/// [`Environment::initialize`](crate::environment::Environment::initialize).
///
/// Statements are answered from a handler closure or from replies keyed by their trimmed text.
/// The mock tracks every handle it hands out, so tests can check that nothing leaked, and it logs
/// every call except `wait` and `get_error_info`.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("MockEngine")
            .field("connections", &st.connections.len())
            .field("statements", &st.statements.len())
            .field("transactions", &st.transactions.len())
            .finish_non_exhaustive()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    #[must_use]
    pub fn new() -> Self {
        let state = MockState {
            segment_len: DEFAULT_SEGMENT_LEN,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Answer `sql` (compared after trimming) with `reply`.
    #[must_use]
    pub fn with_reply(self, sql: &str, reply: Reply) -> Self {
        self.set_reply(sql, reply);
        self
    }

    pub fn set_reply(&self, sql: &str, reply: Reply) {
        self.lock().replies.insert(sql.trim().to_string(), reply);
    }

    #[must_use]
    pub fn with_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Option<Reply> + Send + Sync + 'static,
    {
        self.lock().handler = Some(Arc::new(handler));
        self
    }

    /// Make the next call of `op` (e.g. `"connect"`, `"close"`, `"get_columns"`) fail.
    pub fn fail_next(&self, op: &str, failure: MockFailure) {
        self.lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Leave requests pending until `wait` is called.
    pub fn set_delayed(&self, delayed: bool) {
        self.lock().delayed = delayed;
    }

    /// Make every `wait` fail with `status`, or succeed again with `None`.
    pub fn set_wait_failure(&self, status: Option<Status>) {
        self.lock().wait_failure = status;
    }

    /// Payload bytes delivered per segment of a long value.
    pub fn set_segment_len(&self, len: usize) {
        self.lock().segment_len = len.max(1);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == op).count()
    }

    #[must_use]
    pub fn waits(&self) -> usize {
        self.lock().waits
    }

    /// The bound passed to every `wait`, in order.
    #[must_use]
    pub fn wait_timeouts(&self) -> Vec<Option<Duration>> {
        self.lock().wait_timeouts.clone()
    }

    /// Statement texts with the parameters they were sent with, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().executed.clone()
    }

    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.lock().connections.len()
    }

    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.lock().statements.len()
    }

    /// Explicit and statement-owned transactions still open. Autocommit ones are not counted.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.lock().transactions.len()
    }

    #[must_use]
    pub fn autocommit_transactions(&self) -> usize {
        let st = self.lock();
        st.connections.values().filter(|t| t.is_some()).count() + st.dangling_autocommit.len()
    }

    #[must_use]
    pub fn committed(&self) -> Vec<TranHandle> {
        self.lock().committed.clone()
    }

    #[must_use]
    pub fn rolled_back(&self) -> Vec<TranHandle> {
        self.lock().rolled_back.clone()
    }

    #[must_use]
    pub fn aborted(&self) -> Vec<ConnHandle> {
        self.lock().aborted.clone()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    #[must_use]
    pub fn env_released(&self) -> bool {
        let st = self.lock();
        st.env.is_none() && st.next_id > 0
    }

    #[must_use]
    pub fn trace_installed(&self) -> bool {
        self.lock().trace.is_some()
    }
}

fn decode_param(desc: &Descriptor, bytes: &[u8]) -> Value {
    match (desc.data_type, bytes.len()) {
        (DataType::Char | DataType::Varchar, _) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        (DataType::Integer, 8) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Value::Int64(i64::from_ne_bytes(raw))
        }
        (DataType::Float, 4) => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(bytes);
            Value::Float32(f32::from_ne_bytes(raw))
        }
        (DataType::Float, 8) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Value::Float64(f64::from_ne_bytes(raw))
        }
        _ => Value::Bytes(bytes.to_vec()),
    }
}

fn utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_ne_bytes).collect()
}

fn value_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Text(s) => s.as_bytes().to_vec(),
        Value::Bytes(b) => b.clone(),
        other => format!("{other:?}").into_bytes(),
    }
}

/// Full payload of a long value, delivered across segments.
fn long_payload(column: &MockColumn, value: &Value) -> Vec<u8> {
    match (column.data_type, value) {
        (DataType::LongNVarchar, Value::Text(s)) => utf16_bytes(s),
        _ => value_bytes(value),
    }
}

fn prefixed(count: usize, payload: &[u8]) -> Vec<u8> {
    let mut out = u16::try_from(count).unwrap_or(u16::MAX).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

/// Wire image of a non-long value, as the engine would fill the column buffer.
fn encode_fixed(column: &MockColumn, value: &Value) -> Vec<u8> {
    let len = usize::from(column.length);
    let mut out = match column.data_type {
        DataType::Integer => {
            let v = value.as_int().unwrap_or_default();
            match column.length {
                1 => (v as i8).to_ne_bytes().to_vec(),
                2 => (v as i16).to_ne_bytes().to_vec(),
                4 => (v as i32).to_ne_bytes().to_vec(),
                _ => v.to_ne_bytes().to_vec(),
            }
        }
        DataType::Float => {
            let v = value.as_float().unwrap_or_default();
            if column.length == 4 {
                (v as f32).to_ne_bytes().to_vec()
            } else {
                v.to_ne_bytes().to_vec()
            }
        }
        DataType::Boolean => vec![u8::from(value.as_bool().unwrap_or_default())],
        DataType::Chr | DataType::Char => {
            let mut bytes = value_bytes(value);
            bytes.resize(len, b' ');
            bytes
        }
        DataType::NChar => {
            let text = value.as_text().unwrap_or_default();
            let mut bytes = utf16_bytes(text);
            while bytes.len() + 2 <= len {
                bytes.extend_from_slice(&u16::from(b' ').to_ne_bytes());
            }
            bytes
        }
        DataType::Varchar | DataType::Text | DataType::Varbyte => {
            let payload = value_bytes(value);
            prefixed(payload.len(), &payload)
        }
        DataType::NVarchar => {
            let payload = utf16_bytes(value.as_text().unwrap_or_default());
            prefixed(payload.len() / 2, &payload)
        }
        _ => value_bytes(value),
    };
    if out.len() < len {
        out.resize(len, 0);
    }
    out
}

impl Engine for MockEngine {
    fn initialize(&self, parm: &mut InitParm) {
        let mut st = self.lock();
        st.log("initialize");
        if let Some(failure) = st.take_failure("initialize") {
            parm.status = failure.status;
            return;
        }
        if parm.version == 0 {
            parm.status = Status::NotInitialized;
            return;
        }
        let handle = EnvHandle(st.new_id());
        st.env = Some(handle);
        parm.env_handle = Some(handle);
        parm.status = Status::Success;
    }

    fn release_env(&self, env: EnvHandle) -> Status {
        let mut st = self.lock();
        st.log("release_env");
        if let Some(failure) = st.take_failure("release_env") {
            return failure.status;
        }
        if st.env == Some(env) {
            st.env = None;
            Status::Success
        } else {
            Status::InvalidHandle
        }
    }

    fn terminate(&self) -> Status {
        let mut st = self.lock();
        st.log("terminate");
        st.terminated = true;
        Status::Success
    }

    fn set_trace(&self, env: EnvHandle, sink: Option<TraceSink>) -> Status {
        let mut st = self.lock();
        st.log("set_trace");
        if st.env != Some(env) {
            return Status::InvalidHandle;
        }
        st.trace = sink;
        Status::Success
    }

    fn connect(&self, parm: &mut ConnectParm) {
        let mut st = self.lock();
        st.log("connect");
        if let Some(failure) = st.take_failure("connect") {
            if failure.leave_handle {
                let handle = ConnHandle(st.new_id());
                st.connections.insert(handle, None);
                parm.conn_handle = Some(handle);
            }
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.env != Some(parm.env_handle) {
            st.invalid_handle(&mut parm.gen_parm);
            return;
        }
        let handle = ConnHandle(st.new_id());
        st.connections.insert(handle, None);
        parm.conn_handle = Some(handle);
        st.succeed(&mut parm.gen_parm);
    }

    fn abort(&self, parm: &mut AbortParm) {
        let mut st = self.lock();
        st.log("abort");
        if let Some(failure) = st.take_failure("abort") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.connections.remove(&parm.conn_handle).is_some() {
            st.aborted.push(parm.conn_handle);
            st.succeed(&mut parm.gen_parm);
        } else {
            st.invalid_handle(&mut parm.gen_parm);
        }
    }

    fn disconnect(&self, parm: &mut DisconnectParm) {
        let mut st = self.lock();
        st.log("disconnect");
        if let Some(failure) = st.take_failure("disconnect") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.connections.remove(&parm.conn_handle).is_some() {
            st.succeed(&mut parm.gen_parm);
        } else {
            st.invalid_handle(&mut parm.gen_parm);
        }
    }

    fn autocommit(&self, parm: &mut AutocommitParm) {
        let mut st = self.lock();
        st.log("autocommit");
        match (parm.conn_handle, parm.tran_handle) {
            (Some(conn), None) => {
                let tran = TranHandle(st.new_id());
                if let Some(failure) = st.take_failure("autocommit") {
                    if failure.leave_handle {
                        st.dangling_autocommit.insert(tran);
                        parm.tran_handle = Some(tran);
                    }
                    st.fail(&mut parm.gen_parm, failure);
                    return;
                }
                match st.connections.get(&conn).copied() {
                    None => st.invalid_handle(&mut parm.gen_parm),
                    Some(Some(_)) => st.reject(&mut parm.gen_parm, "autocommit is already enabled"),
                    Some(None) => {
                        st.connections.insert(conn, Some(tran));
                        parm.tran_handle = Some(tran);
                        st.succeed(&mut parm.gen_parm);
                    }
                }
            }
            (_, Some(tran)) => {
                if let Some(failure) = st.take_failure("autocommit") {
                    st.fail(&mut parm.gen_parm, failure);
                    return;
                }
                if st.dangling_autocommit.remove(&tran) {
                    st.succeed(&mut parm.gen_parm);
                    return;
                }
                let owner = st
                    .connections
                    .iter()
                    .find(|(_, t)| **t == Some(tran))
                    .map(|(conn, _)| *conn);
                match owner {
                    Some(conn) => {
                        st.connections.insert(conn, None);
                        st.succeed(&mut parm.gen_parm);
                    }
                    None => st.invalid_handle(&mut parm.gen_parm),
                }
            }
            (None, None) => st.invalid_handle(&mut parm.gen_parm),
        }
    }

    fn query(&self, parm: &mut QueryParm) {
        let mut st = self.lock();
        st.log("query");
        if let Some(failure) = st.take_failure("query") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if !st.connections.contains_key(&parm.conn_handle) {
            st.invalid_handle(&mut parm.gen_parm);
            return;
        }
        let tran = match parm.tran_handle {
            Some(tran) if st.is_live_transaction(tran) => tran,
            Some(_) => {
                st.invalid_handle(&mut parm.gen_parm);
                return;
            }
            None => {
                let tran = TranHandle(st.new_id());
                st.transactions.insert(tran);
                tran
            }
        };
        parm.tran_handle = Some(tran);

        let handle = StmtHandle(st.new_id());
        let mut stmt = MockStatement::new(&parm.text);
        parm.stmt_handle = Some(handle);

        if parm.has_parameters {
            stmt.awaiting_params = true;
            st.statements.insert(handle, stmt);
            st.succeed(&mut parm.gen_parm);
            return;
        }

        st.executed.push((parm.text.clone(), Vec::new()));
        let reply = st.resolve(&parm.text, &[]);
        st.statements.insert(handle, stmt);
        if let Reply::Error { status, records } = reply {
            st.complete(&mut parm.gen_parm, status, records);
            return;
        }
        if let Some(stmt) = st.statements.get_mut(&handle) {
            stmt.load(reply);
        }
        st.succeed(&mut parm.gen_parm);
    }

    fn set_descriptor(&self, parm: &mut SetDescriptorParm) {
        let mut st = self.lock();
        st.log("set_descriptor");
        if let Some(failure) = st.take_failure("set_descriptor") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        match st.statements.get_mut(&parm.stmt_handle) {
            Some(stmt) => {
                stmt.param_descriptors = parm.descriptors.clone();
                st.succeed(&mut parm.gen_parm);
            }
            None => st.invalid_handle(&mut parm.gen_parm),
        }
    }

    fn put_parms(&self, parm: &mut PutParmsParm<'_>) {
        let mut st = self.lock();
        st.log("put_parms");
        if let Some(failure) = st.take_failure("put_parms") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        let (text, descriptors) = match st.statements.get(&parm.stmt_handle) {
            Some(stmt) => (stmt.text.clone(), stmt.param_descriptors.clone()),
            None => {
                st.invalid_handle(&mut parm.gen_parm);
                return;
            }
        };
        if descriptors.len() != parm.values.len() {
            st.reject(&mut parm.gen_parm, "parameter count does not match descriptors");
            return;
        }
        let params: Vec<Value> = descriptors
            .iter()
            .zip(&parm.values)
            .map(|(desc, input)| {
                if input.null {
                    Value::Null
                } else {
                    decode_param(desc, input.value)
                }
            })
            .collect();

        st.executed.push((text.clone(), params.clone()));
        let reply = st.resolve(&text, &params);
        if let Reply::Error { status, records } = reply {
            st.complete(&mut parm.gen_parm, status, records);
            return;
        }
        if let Some(stmt) = st.statements.get_mut(&parm.stmt_handle) {
            stmt.awaiting_params = false;
            stmt.load(reply);
        }
        st.succeed(&mut parm.gen_parm);
    }

    fn get_descriptor(&self, parm: &mut GetDescriptorParm) {
        let mut st = self.lock();
        st.log("get_descriptor");
        if let Some(failure) = st.take_failure("get_descriptor") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        let descriptors = match st.statements.get(&parm.stmt_handle) {
            Some(stmt) if stmt.awaiting_params => None,
            Some(stmt) => Some(stmt.columns.iter().map(MockColumn::descriptor).collect()),
            None => {
                st.invalid_handle(&mut parm.gen_parm);
                return;
            }
        };
        match descriptors {
            Some(descriptors) => {
                parm.descriptors = descriptors;
                st.succeed(&mut parm.gen_parm);
            }
            None => st.reject(&mut parm.gen_parm, "parameters were not sent"),
        }
    }

    fn get_columns(&self, parm: &mut GetColumnsParm<'_>) {
        let mut st = self.lock();
        st.log("get_columns");
        if let Some(failure) = st.take_failure("get_columns") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        let segment_len = st.segment_len;
        let Some(stmt) = st.statements.get_mut(&parm.stmt_handle) else {
            st.invalid_handle(&mut parm.gen_parm);
            return;
        };

        if stmt.current.is_none() {
            match stmt.rows.pop_front() {
                Some(row) => {
                    stmt.current = Some(row);
                    stmt.next_column = 0;
                    stmt.long_offset = 0;
                }
                None => {
                    st.complete(&mut parm.gen_parm, Status::NoData, Vec::new());
                    return;
                }
            }
        }

        parm.more_segments = false;
        let mut overrun = false;
        if let Some(row) = &stmt.current {
            for slot in &mut parm.columns {
                let index = stmt.next_column;
                let (Some(column), Some(value)) = (stmt.columns.get(index), row.get(index)) else {
                    overrun = true;
                    break;
                };
                slot.null = value.is_null();
                if slot.null {
                    slot.length = 0;
                    stmt.next_column += 1;
                    continue;
                }

                if column.data_type.is_long() {
                    let payload = long_payload(column, value);
                    let room = slot.value.len().saturating_sub(2);
                    let mut n = segment_len.min(room).min(payload.len() - stmt.long_offset);
                    let wide = column.data_type == DataType::LongNVarchar;
                    if wide {
                        n &= !1;
                    }
                    let count = if wide { n / 2 } else { n };
                    let chunk = prefixed(count, &payload[stmt.long_offset..stmt.long_offset + n]);
                    slot.value[..chunk.len()].copy_from_slice(&chunk);
                    slot.length = u16::try_from(chunk.len()).unwrap_or(u16::MAX);
                    stmt.long_offset += n;
                    if stmt.long_offset < payload.len() && n > 0 {
                        parm.more_segments = true;
                        break;
                    }
                    stmt.long_offset = 0;
                } else {
                    let bytes = encode_fixed(column, value);
                    let n = bytes.len().min(slot.value.len());
                    slot.value[..n].copy_from_slice(&bytes[..n]);
                    slot.length = u16::try_from(n).unwrap_or(u16::MAX);
                }
                stmt.next_column += 1;
            }
        }

        if !overrun && stmt.next_column >= stmt.columns.len() && !parm.more_segments {
            stmt.current = None;
            stmt.next_column = 0;
            stmt.delivered += 1;
        }

        if overrun {
            st.reject(&mut parm.gen_parm, "more columns requested than the row has");
        } else {
            st.succeed(&mut parm.gen_parm);
        }
    }

    fn get_query_info(&self, parm: &mut GetQueryInfoParm) {
        let mut st = self.lock();
        st.log("get_query_info");
        if let Some(failure) = st.take_failure("get_query_info") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        let info = st
            .statements
            .get(&parm.stmt_handle)
            .map(|stmt| (stmt.affected.unwrap_or(stmt.delivered), stmt.last_insert_id));
        match info {
            Some((row_count, last_insert_id)) => {
                parm.info.row_count = Some(row_count);
                parm.info.last_insert_id = last_insert_id;
                st.succeed(&mut parm.gen_parm);
            }
            None => st.invalid_handle(&mut parm.gen_parm),
        }
    }

    fn close(&self, parm: &mut CloseParm) {
        let mut st = self.lock();
        st.log("close");
        if let Some(failure) = st.take_failure("close") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.statements.remove(&parm.stmt_handle).is_some() {
            st.succeed(&mut parm.gen_parm);
        } else {
            st.invalid_handle(&mut parm.gen_parm);
        }
    }

    fn commit(&self, parm: &mut CommitParm) {
        let mut st = self.lock();
        st.log("commit");
        if let Some(failure) = st.take_failure("commit") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.transactions.remove(&parm.tran_handle) {
            st.committed.push(parm.tran_handle);
            st.succeed(&mut parm.gen_parm);
        } else {
            st.invalid_handle(&mut parm.gen_parm);
        }
    }

    fn rollback(&self, parm: &mut RollbackParm) {
        let mut st = self.lock();
        st.log("rollback");
        if let Some(failure) = st.take_failure("rollback") {
            st.fail(&mut parm.gen_parm, failure);
            return;
        }
        if st.transactions.remove(&parm.tran_handle) {
            st.rolled_back.push(parm.tran_handle);
            st.succeed(&mut parm.gen_parm);
        } else {
            st.invalid_handle(&mut parm.gen_parm);
        }
    }

    fn wait(&self, gen_parm: &mut GenParm, timeout: Option<Duration>) -> Status {
        let mut st = self.lock();
        st.waits += 1;
        st.wait_timeouts.push(timeout);
        if let Some(status) = st.wait_failure {
            return status;
        }
        gen_parm.completed = true;
        Status::Success
    }

    fn get_error_info(&self, parm: &mut GetErrorInfoParm) {
        let mut st = self.lock();
        let next = st
            .error_chains
            .get_mut(&parm.error_handle)
            .and_then(VecDeque::pop_front);
        match next {
            Some(record) => {
                parm.record = Some(record);
                parm.status = Status::Success;
            }
            None => {
                st.error_chains.remove(&parm.error_handle);
                parm.record = None;
                parm.status = Status::NoData;
            }
        }
    }

    fn convert_data(&self, parm: &mut ConvertParm<'_>) {
        let mut st = self.lock();
        st.log("convert_data");
        if let Some(failure) = st.take_failure("convert_data") {
            parm.status = failure.status;
            return;
        }
        let text_len = parm
            .src_value
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        let n = text_len.min(parm.dst.len());
        parm.dst[..n].copy_from_slice(&parm.src_value[..n]);
        parm.dst[n..].fill(b' ');
        parm.status = Status::Success;
    }
}
