//! Wire bytes to [`Value`].

use crate::descriptor::ColumnDescriptor;
use crate::error::IngresError;
use crate::protocol::DataType;
use crate::types::Value;

/// Engine-side rendering of binary values (decimal, money, dates, times, intervals) as text.
pub trait DisplayConverter {
    /// Render `raw` as the engine would display it. The result may carry trailing blanks or NULs.
    ///
    /// # Errors
    /// Returns [`IngresError::ConversionError`] if the engine cannot convert the value.
    fn to_display(&self, column: &ColumnDescriptor, raw: &[u8]) -> Result<String, IngresError>;
}

/// Decode one non-NULL column value.
///
/// `raw` is the column's receive buffer, or for long columns the bytes accumulated from all
/// segments. Only the display conversion round trip touches the engine.
///
/// # Errors
/// Returns [`IngresError::UnsupportedType`] for types without a decoding, and
/// [`IngresError::DecodeError`] when `raw` is too short for the declared type.
pub fn decode(
    column: &ColumnDescriptor,
    raw: &[u8],
    converter: &dyn DisplayConverter,
) -> Result<Value, IngresError> {
    let value = match column.data_type {
        DataType::Integer => match column.length {
            1 => Value::Int8(i8::from_ne_bytes(fixed(column, raw)?)),
            2 => Value::Int16(i16::from_ne_bytes(fixed(column, raw)?)),
            4 => Value::Int32(i32::from_ne_bytes(fixed(column, raw)?)),
            8 => Value::Int64(i64::from_ne_bytes(fixed(column, raw)?)),
            other => return Err(bad_width(column, other)),
        },
        DataType::Float => match column.length {
            4 => Value::Float32(f32::from_ne_bytes(fixed(column, raw)?)),
            8 => Value::Float64(f64::from_ne_bytes(fixed(column, raw)?)),
            other => return Err(bad_width(column, other)),
        },
        DataType::Boolean => {
            let [byte] = fixed::<1>(column, raw)?;
            Value::Bool(byte == 1)
        }
        DataType::Chr | DataType::Char => Value::Text(trim_nul_blank(&text(raw)).to_owned()),
        dt if dt.has_length_prefix() => {
            let payload = prefixed(column, raw)?;
            match dt {
                DataType::Varbyte => Value::Bytes(payload.to_vec()),
                DataType::NVarchar => Value::Text(trim_nul(&utf16(payload)).to_owned()),
                _ => Value::Text(trim_nul(&text(payload)).to_owned()),
            }
        }
        DataType::Byte | DataType::LongByte | DataType::Uuid | DataType::Ipv4 | DataType::Ipv6 => {
            Value::Bytes(raw.to_vec())
        }
        DataType::NChar => Value::Text(trim_nul_blank(&utf16(raw)).to_owned()),
        DataType::LongVarchar | DataType::LongText => Value::Text(trim_nul(&text(raw)).to_owned()),
        DataType::LongNVarchar => Value::Text(trim_nul(&utf16(raw)).to_owned()),
        dt if dt.needs_display_conversion() => {
            let display = converter.to_display(column, raw)?;
            Value::Text(trim_nul_blank(&display).to_owned())
        }
        other => return Err(IngresError::UnsupportedType(other)),
    };
    Ok(value)
}

fn fixed<const N: usize>(column: &ColumnDescriptor, raw: &[u8]) -> Result<[u8; N], IngresError> {
    raw.get(..N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or_else(|| short_buffer(column, N, raw.len()))
}

/// Payload of a value carrying a little-endian 2-byte count in front. The count is in bytes, or
/// in UTF-16 code units for national character types.
fn prefixed<'r>(column: &ColumnDescriptor, raw: &'r [u8]) -> Result<&'r [u8], IngresError> {
    let [lo, hi] = fixed::<2>(column, raw)?;
    let count = usize::from(u16::from_le_bytes([lo, hi]));
    let len = if column.data_type == DataType::NVarchar {
        count * 2
    } else {
        count
    };
    raw.get(2..2 + len)
        .ok_or_else(|| short_buffer(column, 2 + len, raw.len()))
}

fn text(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn utf16(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn trim_nul(s: &str) -> &str {
    s.trim_end_matches('\0')
}

fn trim_nul_blank(s: &str) -> &str {
    s.trim_end_matches(['\0', ' '])
}

fn short_buffer(column: &ColumnDescriptor, needed: usize, got: usize) -> IngresError {
    IngresError::DecodeError(format!(
        "column {} ({}): need {needed} bytes, got {got}",
        column.ordinal, column.data_type
    ))
}

fn bad_width(column: &ColumnDescriptor, width: u16) -> IngresError {
    IngresError::DecodeError(format!(
        "column {} ({}): unsupported width {width}",
        column.ordinal, column.data_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Descriptor;

    struct Echo;

    impl DisplayConverter for Echo {
        fn to_display(&self, _: &ColumnDescriptor, raw: &[u8]) -> Result<String, IngresError> {
            let mut s = String::from_utf8_lossy(raw).into_owned();
            s.push_str("   \0\0");
            Ok(s)
        }
    }

    fn col(data_type: DataType, length: u16) -> ColumnDescriptor {
        ColumnDescriptor::from_descriptor(0, &Descriptor::new(data_type, length))
    }

    fn with_prefix(count: u16, payload: &[u8], declared: usize) -> Vec<u8> {
        let mut raw = count.to_le_bytes().to_vec();
        raw.extend_from_slice(payload);
        raw.resize(declared, 0);
        raw
    }

    #[test]
    fn fixed_width_numbers() {
        let cases = [
            (col(DataType::Integer, 1), (-5i8).to_ne_bytes().to_vec(), Value::Int8(-5)),
            (col(DataType::Integer, 2), 300i16.to_ne_bytes().to_vec(), Value::Int16(300)),
            (col(DataType::Integer, 4), i32::MIN.to_ne_bytes().to_vec(), Value::Int32(i32::MIN)),
            (col(DataType::Integer, 8), i64::MAX.to_ne_bytes().to_vec(), Value::Int64(i64::MAX)),
            (col(DataType::Float, 4), 1.5f32.to_ne_bytes().to_vec(), Value::Float32(1.5)),
            (col(DataType::Float, 8), (-0.25f64).to_ne_bytes().to_vec(), Value::Float64(-0.25)),
            (col(DataType::Boolean, 1), vec![1], Value::Bool(true)),
            (col(DataType::Boolean, 1), vec![0], Value::Bool(false)),
        ];
        for (column, raw, expected) in cases {
            assert_eq!(decode(&column, &raw, &Echo).unwrap(), expected);
        }
    }

    #[test]
    fn fixed_character_is_trimmed() {
        let value = decode(&col(DataType::Char, 8), b"abc  \0\0\0", &Echo).unwrap();
        assert_eq!(value, Value::from("abc"));
    }

    #[test]
    fn variable_length_ignores_declared_slack() {
        for declared in [5, 16, 200] {
            let raw = with_prefix(3, b"xyz", declared);
            let column = col(DataType::Varchar, u16::try_from(declared).unwrap());
            assert_eq!(decode(&column, &raw, &Echo).unwrap(), Value::from("xyz"));
        }
        let raw = with_prefix(2, &[0xde, 0xad], 10);
        assert_eq!(
            decode(&col(DataType::Varbyte, 10), &raw, &Echo).unwrap(),
            Value::Bytes(vec![0xde, 0xad])
        );
    }

    #[test]
    fn every_prefixed_type_honours_its_count() {
        let wide: Vec<u8> = "q".encode_utf16().flat_map(u16::to_ne_bytes).collect();
        let cases = [
            (DataType::Varchar, with_prefix(1, b"qz", 12), Value::from("q")),
            (DataType::Text, with_prefix(1, b"qz", 12), Value::from("q")),
            (DataType::Varbyte, with_prefix(1, b"qz", 12), Value::Bytes(vec![b'q'])),
            (DataType::NVarchar, with_prefix(1, &wide, 12), Value::from("q")),
        ];
        for (data_type, raw, expected) in cases {
            assert!(data_type.has_length_prefix(), "{data_type:?}");
            assert_eq!(decode(&col(data_type, 12), &raw, &Echo).unwrap(), expected);
        }
        assert!(!DataType::Char.has_length_prefix());
        assert!(!DataType::LongVarchar.has_length_prefix());
    }

    #[test]
    fn national_character_widening() {
        let units: Vec<u8> = "héllo".encode_utf16().flat_map(u16::to_ne_bytes).collect();
        let raw = with_prefix(5, &units, 40);
        assert_eq!(
            decode(&col(DataType::NVarchar, 40), &raw, &Echo).unwrap(),
            Value::from("héllo")
        );

        let mut padded: Vec<u8> = "ab  ".encode_utf16().flat_map(u16::to_ne_bytes).collect();
        padded.extend_from_slice(&[0, 0]);
        assert_eq!(
            decode(&col(DataType::NChar, 10), &padded, &Echo).unwrap(),
            Value::from("ab")
        );
    }

    #[test]
    fn display_conversion_is_trimmed() {
        let value = decode(&col(DataType::IngresDate, 12), b"10-oct-2021", &Echo).unwrap();
        assert_eq!(value, Value::from("10-oct-2021"));
    }

    #[test]
    fn short_buffers_are_errors() {
        assert!(matches!(
            decode(&col(DataType::Integer, 4), &[1, 2], &Echo),
            Err(IngresError::DecodeError(_))
        ));
        assert!(matches!(
            decode(&col(DataType::Varchar, 4), &with_prefix(9, b"ab", 4), &Echo),
            Err(IngresError::DecodeError(_))
        ));
    }

    #[test]
    fn locators_are_unsupported() {
        assert!(matches!(
            decode(&col(DataType::LongByteLocator, 4), &[0; 4], &Echo),
            Err(IngresError::UnsupportedType(DataType::LongByteLocator))
        ));
    }
}
