use ingres_client::prelude::*;
use ingres_client::protocol::DataType;
use ingres_client::test_utils::{MockColumn, MockEngine, Reply, connect};

fn echo_engine() -> MockEngine {
    // answers every statement with its parameters as a single row
    MockEngine::new().with_handler(|sql, params| {
        if !sql.starts_with("select") {
            return Some(Reply::exec(i64::try_from(params.len()).unwrap_or_default()));
        }
        let columns = params
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = format!("p{i}");
                match value {
                    Value::Int64(_) => MockColumn::new(&name, DataType::Integer, 8),
                    Value::Float32(_) => MockColumn::new(&name, DataType::Float, 4),
                    Value::Float64(_) => MockColumn::new(&name, DataType::Float, 8),
                    _ => MockColumn::new(&name, DataType::Varchar, 202),
                }
            })
            .collect();
        Some(Reply::rows(columns, vec![params.to_vec()]))
    })
}

#[test]
fn test06_parameters_reach_engine_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let engine = echo_engine();
    let (_env, conn) = connect(&engine)?;

    let params = [
        Value::Int8(-1),
        Value::Int16(2),
        Value::Int32(-3),
        Value::Int64(4),
        Value::from("five"),
        Value::Float32(6.5),
        Value::Float64(-7.25),
    ];
    let result = conn.fetch_all("select ?, ?, ?, ?, ?, ?, ?", &params)?;

    // every integer width is sent as an 8-byte integer
    assert_eq!(
        result.results[0].values,
        vec![
            Value::Int64(-1),
            Value::Int64(2),
            Value::Int64(-3),
            Value::Int64(4),
            Value::from("five"),
            Value::Float32(6.5),
            Value::Float64(-7.25),
        ]
    );
    assert_eq!(
        engine.calls().iter().filter(|c| *c == "set_descriptor" || *c == "put_parms").count(),
        2
    );
    Ok(())
}

#[test]
fn test06_statements_without_parameters_skip_sending() -> Result<(), Box<dyn std::error::Error>> {
    let engine = echo_engine();
    let (_env, conn) = connect(&engine)?;

    conn.execute("delete from t", &[])?;
    assert_eq!(engine.call_count("set_descriptor"), 0);
    assert_eq!(engine.call_count("put_parms"), 0);
    Ok(())
}

#[test]
fn test06_unsupported_parameters_are_rejected_locally() -> Result<(), Box<dyn std::error::Error>> {
    let engine = echo_engine();
    let (_env, conn) = connect(&engine)?;
    engine.clear_calls();

    for bad in [Value::Null, Value::Bool(true), Value::Bytes(vec![1, 2])] {
        let err = conn
            .execute("insert into t values (?, ?)", &[Value::Int32(1), bad])
            .unwrap_err();
        match &err {
            IngresError::ParameterError(message) => {
                assert!(message.starts_with("parameter 2"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_usage_error());
    }
    assert!(engine.calls().is_empty());
    Ok(())
}

#[test]
fn test06_prepared_query_with_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let engine = echo_engine();
    let (_env, conn) = connect(&engine)?;

    let prepared = conn.prepare("select ?")?;
    for word in ["alpha", "beta"] {
        let mut cursor = conn.query_prepared(&prepared, &[Value::from(word)])?;
        let row = cursor.next_row()?.expect("one row");
        assert_eq!(row.get("p0"), Some(&Value::from(word)));
        assert!(cursor.next_row()?.is_none());
    }
    assert_eq!(engine.open_statements(), 0);
    Ok(())
}
