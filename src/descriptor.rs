//! Result-column metadata.

use serde::Serialize;

use crate::adapter::execute_and_wait;
use crate::diagnostics::check;
use crate::error::IngresError;
use crate::protocol::{ColumnRole, DataType, Descriptor, Engine, GetDescriptorParm, GenParm, StmtHandle};
use crate::types::ScanType;

/// Reported length of long varchar / long byte columns.
pub const LONG_BYTES_LENGTH: i64 = 2_000_000_000;
/// Reported length of long nvarchar columns, in characters.
pub const LONG_NCHARS_LENGTH: i64 = 1_000_000_000;

/// One result column as the engine described it. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Zero-based position in the result.
    pub ordinal: usize,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Declared length in bytes, including any length prefix.
    pub length: u16,
    pub precision: i16,
    pub scale: i16,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn from_descriptor(ordinal: usize, desc: &Descriptor) -> Self {
        Self {
            ordinal,
            name: desc.name.clone().unwrap_or_default(),
            data_type: desc.data_type,
            nullable: desc.nullable,
            length: desc.length,
            precision: desc.precision,
            scale: desc.scale,
        }
    }

    /// Engine-level descriptor, used as the source of a display conversion.
    #[must_use]
    pub fn to_descriptor(&self) -> Descriptor {
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

    #[must_use]
    pub fn is_long(&self) -> bool {
        self.data_type.is_long()
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        ColumnType {
            scan_type: scan_type(self.data_type, self.length),
            database_type_name: self.data_type.type_name(self.length),
            length: variable_length(self.data_type, self.length),
            precision_scale: (self.data_type == DataType::Decimal)
                .then_some((self.precision, self.scale)),
            nullable: self.nullable,
        }
    }
}

/// What an application needs to know to scan a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnType {
    pub scan_type: ScanType,
    pub database_type_name: &'static str,
    /// Only reported for variable-length types.
    pub length: Option<i64>,
    /// Only reported for decimal columns.
    pub precision_scale: Option<(i16, i16)>,
    pub nullable: bool,
}

fn scan_type(data_type: DataType, length: u16) -> ScanType {
    match data_type {
        DataType::Chr
        | DataType::Char
        | DataType::Varchar
        | DataType::LongVarchar
        | DataType::NChar
        | DataType::NVarchar
        | DataType::LongNVarchar
        | DataType::Text
        | DataType::LongText
        | DataType::Money
        | DataType::Decimal => ScanType::Text,
        DataType::Integer => match length {
            1 => ScanType::Int8,
            2 => ScanType::Int16,
            4 => ScanType::Int32,
            8 => ScanType::Int64,
            _ => ScanType::Bytes,
        },
        DataType::Float => match length {
            4 => ScanType::Float32,
            8 => ScanType::Float64,
            _ => ScanType::Bytes,
        },
        DataType::Boolean => ScanType::Bool,
        DataType::IngresDate
        | DataType::AnsiDate
        | DataType::TimeLocal
        | DataType::TimeWithoutTz
        | DataType::TimeWithTz
        | DataType::TimestampLocal
        | DataType::TimestampWithoutTz
        | DataType::TimestampWithTz => ScanType::Timestamp,
        DataType::IntervalYearToMonth | DataType::IntervalDayToSecond => ScanType::Duration,
        _ => ScanType::Bytes,
    }
}

fn variable_length(data_type: DataType, declared: u16) -> Option<i64> {
    match data_type {
        DataType::LongVarchar | DataType::LongByte => Some(LONG_BYTES_LENGTH),
        DataType::LongNVarchar => Some(LONG_NCHARS_LENGTH),
        DataType::Varchar
        | DataType::NVarchar
        | DataType::Text
        | DataType::LongText
        | DataType::Varbyte => Some(i64::from(declared)),
        _ => None,
    }
}

/// Ask the engine for the result columns of an open statement.
///
/// Called once per result-bearing statement. The caller owns the statement and closes it if this
/// fails.
///
/// # Errors
/// Returns [`IngresError::Engine`] if the engine fails to describe the result.
pub fn resolve(engine: &dyn Engine, stmt: StmtHandle) -> Result<Vec<ColumnDescriptor>, IngresError> {
    let mut parm = GetDescriptorParm {
        gen_parm: GenParm::default(),
        stmt_handle: stmt,
        descriptors: Vec::new(),
    };
    let completion = execute_and_wait(engine, "get_descriptor", &mut parm, None, |e, p| {
        e.get_descriptor(p);
    });
    check(engine, "get_descriptor", completion)?;

    Ok(parm
        .descriptors
        .iter()
        .enumerate()
        .map(|(ordinal, desc)| ColumnDescriptor::from_descriptor(ordinal, desc))
        .collect())
}
