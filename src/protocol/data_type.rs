use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire type identifiers understood by the engine.
///
/// The raw ids follow the engine's published data type codes. Ids this crate has no name for are
/// kept as [`DataType::Unknown`] so descriptors never fail to resolve; decoding them fails later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Legacy `c` type, blank padded.
    Chr,
    Char,
    Varchar,
    LongVarchar,
    LongCharLocator,
    Byte,
    Varbyte,
    LongByte,
    LongByteLocator,
    NChar,
    NVarchar,
    LongNVarchar,
    LongNCharLocator,
    Text,
    LongText,
    Decimal,
    Money,
    Integer,
    Float,
    Boolean,
    Uuid,
    Ipv4,
    Ipv6,
    IngresDate,
    AnsiDate,
    TimeLocal,
    TimeWithoutTz,
    TimeWithTz,
    TimestampLocal,
    TimestampWithoutTz,
    TimestampWithTz,
    IntervalYearToMonth,
    IntervalDayToSecond,
    Unknown(i16),
}

impl DataType {
    #[must_use]
    pub fn from_id(id: i16) -> Self {
        match id {
            32 => DataType::Chr,
            20 => DataType::Char,
            21 => DataType::Varchar,
            22 => DataType::LongVarchar,
            36 => DataType::LongCharLocator,
            23 => DataType::Byte,
            24 => DataType::Varbyte,
            25 => DataType::LongByte,
            35 => DataType::LongByteLocator,
            26 => DataType::NChar,
            27 => DataType::NVarchar,
            28 => DataType::LongNVarchar,
            29 => DataType::LongNCharLocator,
            37 => DataType::Text,
            41 => DataType::LongText,
            10 => DataType::Decimal,
            5 => DataType::Money,
            30 => DataType::Integer,
            31 => DataType::Float,
            38 => DataType::Boolean,
            11 => DataType::Uuid,
            12 => DataType::Ipv4,
            13 => DataType::Ipv6,
            3 => DataType::IngresDate,
            4 => DataType::AnsiDate,
            8 => DataType::TimeLocal,
            6 => DataType::TimeWithoutTz,
            7 => DataType::TimeWithTz,
            19 => DataType::TimestampLocal,
            9 => DataType::TimestampWithoutTz,
            18 => DataType::TimestampWithTz,
            33 => DataType::IntervalYearToMonth,
            34 => DataType::IntervalDayToSecond,
            other => DataType::Unknown(other),
        }
    }

    #[must_use]
    pub fn id(self) -> i16 {
        match self {
            DataType::Chr => 32,
            DataType::Char => 20,
            DataType::Varchar => 21,
            DataType::LongVarchar => 22,
            DataType::LongCharLocator => 36,
            DataType::Byte => 23,
            DataType::Varbyte => 24,
            DataType::LongByte => 25,
            DataType::LongByteLocator => 35,
            DataType::NChar => 26,
            DataType::NVarchar => 27,
            DataType::LongNVarchar => 28,
            DataType::LongNCharLocator => 29,
            DataType::Text => 37,
            DataType::LongText => 41,
            DataType::Decimal => 10,
            DataType::Money => 5,
            DataType::Integer => 30,
            DataType::Float => 31,
            DataType::Boolean => 38,
            DataType::Uuid => 11,
            DataType::Ipv4 => 12,
            DataType::Ipv6 => 13,
            DataType::IngresDate => 3,
            DataType::AnsiDate => 4,
            DataType::TimeLocal => 8,
            DataType::TimeWithoutTz => 6,
            DataType::TimeWithTz => 7,
            DataType::TimestampLocal => 19,
            DataType::TimestampWithoutTz => 9,
            DataType::TimestampWithTz => 18,
            DataType::IntervalYearToMonth => 33,
            DataType::IntervalDayToSecond => 34,
            DataType::Unknown(id) => id,
        }
    }

    /// Long types can only be fetched as an open-ended sequence of segments.
    #[must_use]
    pub fn is_long(self) -> bool {
        matches!(
            self,
            DataType::LongVarchar | DataType::LongNVarchar | DataType::LongText | DataType::LongByte
        )
    }

    /// Types whose binary form must go through the engine's display-string conversion.
    #[must_use]
    pub fn needs_display_conversion(self) -> bool {
        matches!(
            self,
            DataType::Decimal
                | DataType::Money
                | DataType::IngresDate
                | DataType::AnsiDate
                | DataType::TimeLocal
                | DataType::TimeWithoutTz
                | DataType::TimeWithTz
                | DataType::TimestampLocal
                | DataType::TimestampWithoutTz
                | DataType::TimestampWithTz
                | DataType::IntervalYearToMonth
                | DataType::IntervalDayToSecond
        )
    }

    /// Types carrying a 2-byte length prefix in front of their payload.
    #[must_use]
    pub fn has_length_prefix(self) -> bool {
        matches!(
            self,
            DataType::Varchar | DataType::Text | DataType::Varbyte | DataType::NVarchar
        )
    }

    /// Database type name as the engine spells it. Integer and float names depend on the width.
    #[must_use]
    pub fn type_name(self, length: u16) -> &'static str {
        match self {
            DataType::Chr => "c",
            DataType::Char => "char",
            DataType::Varchar => "varchar",
            DataType::LongVarchar => "long varchar",
            DataType::LongCharLocator => "long char locator",
            DataType::NChar => "nchar",
            DataType::NVarchar => "nvarchar",
            DataType::LongNVarchar => "long nvarchar",
            DataType::LongNCharLocator => "long nchar locator",
            DataType::Text => "text",
            DataType::LongText => "long text",
            DataType::Byte => "byte",
            DataType::Varbyte => "varbyte",
            DataType::LongByte => "long byte",
            DataType::LongByteLocator => "long byte locator",
            DataType::Money => "money",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::Uuid => "UUID",
            DataType::Ipv4 => "IPV4",
            DataType::Ipv6 => "IPV6",
            DataType::IngresDate => "ingresdate",
            DataType::AnsiDate => "ansidate",
            DataType::TimeLocal => "time with local time zone",
            DataType::TimeWithoutTz => "time without time zone",
            DataType::TimeWithTz => "time with time zone",
            DataType::TimestampLocal => "timestamp with local time zone",
            DataType::TimestampWithoutTz => "timestamp without time zone",
            DataType::TimestampWithTz => "timestamp with time zone",
            DataType::IntervalYearToMonth => "interval year to month",
            DataType::IntervalDayToSecond => "interval day to second",
            DataType::Integer => match length {
                1 => "integer1",
                2 => "integer2",
                4 => "integer4",
                8 => "integer8",
                _ => "UNKNOWN",
            },
            DataType::Float => match length {
                4 => "float4",
                8 => "float8",
                _ => "UNKNOWN",
            },
            DataType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown(id) => write!(f, "unknown type {id}"),
            DataType::Integer => f.write_str("integer"),
            DataType::Float => f.write_str("float"),
            other => f.write_str(other.type_name(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for id in -2..64 {
            assert_eq!(DataType::from_id(id).id(), id);
        }
    }

    #[test]
    fn long_kinds() {
        let long: Vec<_> = (0..64)
            .map(DataType::from_id)
            .filter(|dt| dt.is_long())
            .collect();
        assert_eq!(
            long,
            vec![
                DataType::LongVarchar,
                DataType::LongByte,
                DataType::LongNVarchar,
                DataType::LongText
            ]
        );
    }

    #[test]
    fn width_dependent_names() {
        assert_eq!(DataType::Integer.type_name(1), "integer1");
        assert_eq!(DataType::Integer.type_name(8), "integer8");
        assert_eq!(DataType::Float.type_name(4), "float4");
        assert_eq!(DataType::Float.type_name(3), "UNKNOWN");
        assert_eq!(DataType::Unknown(99).type_name(4), "UNKNOWN");
    }
}
