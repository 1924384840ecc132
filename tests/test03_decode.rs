use ingres_client::prelude::*;
use ingres_client::protocol::{DataType, Status};
use ingres_client::test_utils::{MockColumn, MockEngine, MockFailure, Reply, connect};

fn single_row(columns: Vec<MockColumn>, row: Vec<Value>) -> MockEngine {
    MockEngine::new().with_reply("select * from t", Reply::rows(columns, vec![row]))
}

fn fetch_row(engine: &MockEngine) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let (_env, conn) = connect(engine)?;
    let result = conn.fetch_all("select * from t", &[])?;
    Ok(result.results[0].values.clone())
}

#[test]
fn test03_numeric_widths() -> Result<(), Box<dyn std::error::Error>> {
    let columns = vec![
        MockColumn::new("i1", DataType::Integer, 1),
        MockColumn::new("i2", DataType::Integer, 2),
        MockColumn::new("i4", DataType::Integer, 4),
        MockColumn::new("i8", DataType::Integer, 8),
        MockColumn::new("f4", DataType::Float, 4),
        MockColumn::new("f8", DataType::Float, 8),
        MockColumn::new("b", DataType::Boolean, 1),
    ];
    let row = vec![
        Value::Int8(i8::MIN),
        Value::Int16(-12_345),
        Value::Int32(i32::MAX),
        Value::Int64(-9_000_000_000),
        Value::Float32(3.25),
        Value::Float64(f64::MIN_POSITIVE),
        Value::Bool(true),
    ];
    let engine = single_row(columns, row.clone());
    assert_eq!(fetch_row(&engine)?, row);
    Ok(())
}

#[test]
fn test03_character_types() -> Result<(), Box<dyn std::error::Error>> {
    let columns = vec![
        MockColumn::new("c", DataType::Chr, 10),
        MockColumn::new("ch", DataType::Char, 10),
        MockColumn::new("vc", DataType::Varchar, 42),
        MockColumn::new("tx", DataType::Text, 42),
        MockColumn::new("nc", DataType::NChar, 20),
        MockColumn::new("nv", DataType::NVarchar, 42),
    ];
    let row = vec![
        Value::from("abc"),
        Value::from("padded"),
        Value::from("trailing  "),
        Value::from("text"),
        Value::from("ñandú"),
        Value::from("日本語テキスト"),
    ];
    let engine = single_row(columns, row);
    let values = fetch_row(&engine)?;

    // fixed-width values lose their padding, variable-length ones keep what was stored
    assert_eq!(values[0], Value::from("abc"));
    assert_eq!(values[1], Value::from("padded"));
    assert_eq!(values[2], Value::from("trailing  "));
    assert_eq!(values[3], Value::from("text"));
    assert_eq!(values[4], Value::from("ñandú"));
    assert_eq!(values[5], Value::from("日本語テキスト"));
    Ok(())
}

#[test]
fn test03_binary_types() -> Result<(), Box<dyn std::error::Error>> {
    let uuid: Vec<u8> = (0u8..16).collect();
    let columns = vec![
        MockColumn::new("vb", DataType::Varbyte, 12),
        MockColumn::new("by", DataType::Byte, 4),
        MockColumn::new("id", DataType::Uuid, 16),
        MockColumn::new("ip", DataType::Ipv4, 4),
    ];
    let row = vec![
        Value::Bytes(vec![0, 1, 0xfe]),
        Value::Bytes(vec![9, 8, 7, 6]),
        Value::Bytes(uuid.clone()),
        Value::Bytes(vec![127, 0, 0, 1]),
    ];
    let engine = single_row(columns, row.clone());
    assert_eq!(fetch_row(&engine)?, row);
    Ok(())
}

#[test]
fn test03_display_conversion() -> Result<(), Box<dyn std::error::Error>> {
    let columns = vec![
        MockColumn::new("price", DataType::Decimal, 16).precision(10, 2),
        MockColumn::new("cash", DataType::Money, 16),
        MockColumn::new("day", DataType::IngresDate, 26),
        MockColumn::new("ansi", DataType::AnsiDate, 26),
        MockColumn::new("ts", DataType::TimestampWithoutTz, 30),
        MockColumn::new("span", DataType::IntervalDayToSecond, 30),
    ];
    let row = vec![
        Value::from("12.50"),
        Value::from("$7.25"),
        Value::from("10-oct-2021"),
        Value::from("2021-10-10"),
        Value::from("2007-12-15 12:30:55.000000"),
        Value::from("1 02:03:04"),
    ];
    let engine = single_row(columns, row.clone());
    let (env, conn) = connect(&engine)?;
    let result = conn.fetch_all("select * from t", &[])?;

    let values = &result.results[0].values;
    assert_eq!(values, &row);
    assert_eq!(
        values[4].as_timestamp().map(|ts| ts.to_string()),
        Some("2007-12-15 12:30:55".to_string())
    );
    assert_eq!(engine.call_count("convert_data"), 6);
    // one scratch buffer served every conversion
    assert_eq!(env.idle_scratch_buffers(), 1);
    Ok(())
}

#[test]
fn test03_conversion_failure() -> Result<(), Box<dyn std::error::Error>> {
    let engine = single_row(
        vec![MockColumn::new("price", DataType::Decimal, 16)],
        vec![Value::from("1.00")],
    );
    engine.fail_next("convert_data", MockFailure::status(Status::Error));
    let (_env, conn) = connect(&engine)?;

    let err = conn.fetch_all("select * from t", &[]).unwrap_err();
    assert!(matches!(err, IngresError::ConversionError(_)), "{err}");
    assert_eq!(engine.open_statements(), 0);
    Ok(())
}

#[test]
fn test03_unsupported_types() -> Result<(), Box<dyn std::error::Error>> {
    let engine = single_row(
        vec![
            MockColumn::new("id", DataType::Integer, 4),
            MockColumn::new("loc", DataType::LongByteLocator, 4),
        ],
        vec![Value::Int32(1), Value::Bytes(vec![0, 0, 0, 1])],
    );
    let (_env, conn) = connect(&engine)?;

    // the column still describes itself
    let mut cursor = conn.query("select * from t", &[])?;
    assert_eq!(
        cursor.column_type(1).map(|t| t.database_type_name),
        Some("long byte locator")
    );
    let err = cursor.next_row().unwrap_err();
    assert!(matches!(
        err,
        IngresError::UnsupportedType(DataType::LongByteLocator)
    ));
    Ok(())
}

#[test]
fn test03_rows_render_as_json() -> Result<(), Box<dyn std::error::Error>> {
    let engine = single_row(
        vec![
            MockColumn::new("id", DataType::Integer, 4),
            MockColumn::new("name", DataType::Varchar, 22).nullable(),
        ],
        vec![Value::Int32(4), Value::Null],
    );
    let (_env, conn) = connect(&engine)?;
    let result = conn.fetch_all("select * from t", &[])?;
    assert_eq!(
        result.results[0].to_json(),
        serde_json::json!({ "id": 4, "name": null })
    );
    Ok(())
}
