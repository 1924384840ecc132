//! Positional parameter encoding.

use crate::adapter::execute_and_wait;
use crate::diagnostics::check;
use crate::error::IngresError;
use crate::protocol::{
    ColumnRole, DataType, Descriptor, Engine, GenParm, InputValue, PutParmsParm,
    SetDescriptorParm, StmtHandle,
};
use crate::types::Value;

/// A parameter turned into its wire type and raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedParam {
    pub descriptor: Descriptor,
    pub bytes: Vec<u8>,
}

/// Encode parameters in order. Nothing is sent to the engine.
///
/// Text becomes `char`, every integer width is widened to an 8-byte integer and floats keep
/// their width.
///
/// # Errors
/// Returns [`IngresError::ParameterError`] for NULLs, byte strings, booleans, and text longer
/// than a descriptor can describe.
pub fn encode(values: &[Value]) -> Result<Vec<EncodedParam>, IngresError> {
    values
        .iter()
        .enumerate()
        .map(|(position, value)| encode_one(position, value))
        .collect()
}

fn encode_one(position: usize, value: &Value) -> Result<EncodedParam, IngresError> {
    let (data_type, bytes) = match value {
        Value::Text(s) => (DataType::Char, s.as_bytes().to_vec()),
        Value::Int8(v) => (DataType::Integer, i64::from(*v).to_ne_bytes().to_vec()),
        Value::Int16(v) => (DataType::Integer, i64::from(*v).to_ne_bytes().to_vec()),
        Value::Int32(v) => (DataType::Integer, i64::from(*v).to_ne_bytes().to_vec()),
        Value::Int64(v) => (DataType::Integer, v.to_ne_bytes().to_vec()),
        Value::Float32(v) => (DataType::Float, v.to_ne_bytes().to_vec()),
        Value::Float64(v) => (DataType::Float, v.to_ne_bytes().to_vec()),
        other => {
            return Err(IngresError::ParameterError(format!(
                "parameter {} has unsupported type: {other:?}",
                position + 1
            )));
        }
    };

    let length = u16::try_from(bytes.len()).map_err(|_| {
        IngresError::ParameterError(format!(
            "parameter {} is too long ({} bytes)",
            position + 1,
            bytes.len()
        ))
    })?;

    let mut descriptor = Descriptor::new(data_type, length);
    descriptor.role = ColumnRole::QueryParameter;
    Ok(EncodedParam { descriptor, bytes })
}

/// Describe and send encoded parameters for a statement that was opened with parameters.
///
/// # Errors
/// Returns [`IngresError::Engine`] if the engine rejects the descriptors or the values.
pub fn send(
    engine: &dyn Engine,
    stmt: StmtHandle,
    params: &[EncodedParam],
) -> Result<(), IngresError> {
    let mut describe = SetDescriptorParm {
        gen_parm: GenParm::default(),
        stmt_handle: stmt,
        descriptors: params.iter().map(|p| p.descriptor.clone()).collect(),
    };
    let completion = execute_and_wait(engine, "set_descriptor", &mut describe, None, |e, p| {
        e.set_descriptor(p);
    });
    check(engine, "set_descriptor", completion)?;

    let mut put = PutParmsParm {
        gen_parm: GenParm::default(),
        stmt_handle: stmt,
        values: params
            .iter()
            .map(|p| InputValue {
                null: false,
                value: &p.bytes,
            })
            .collect(),
        more_segments: false,
    };
    let completion = execute_and_wait(engine, "put_parms", &mut put, None, |e, p| {
        e.put_parms(p);
    });
    check(engine, "put_parms", completion)
}
