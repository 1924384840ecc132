use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use ingres_client::prelude::*;
use ingres_client::protocol::{DataType, Status};
use ingres_client::test_utils::{MockColumn, MockEngine, Reply, connect, connect_with};

fn iirelation() -> Reply {
    let columns = vec![
        MockColumn::new("reltid", DataType::Integer, 4),
        MockColumn::new("relid", DataType::Char, 32),
    ];
    let rows = (1..=8)
        .map(|i| vec![Value::Int32(i), Value::from(format!("table_{i}"))])
        .collect();
    Reply::rows(columns, rows)
}

#[test]
fn test02_select_with_limit() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_handler(|sql, _| {
        sql.strip_prefix("select reltid, relid from iirelation limit ")
            .and_then(|n| n.trim().parse::<usize>().ok())
            .map(|limit| match iirelation() {
                Reply::Rows { columns, mut rows } => {
                    rows.truncate(limit);
                    Reply::rows(columns, rows)
                }
                other => other,
            })
    });
    let (_env, conn) = connect(&engine)?;

    let result = conn.fetch_all("select reltid, relid from iirelation limit 5", &[])?;
    assert_eq!(result.len(), 5);
    assert_eq!(
        result.get_column_names().map(|names| names.as_slice()),
        Some(&["reltid".to_string(), "relid".to_string()][..])
    );
    assert_eq!(result.results[0].get("reltid"), Some(&Value::Int32(1)));
    assert_eq!(result.results[4].get("RELID"), Some(&Value::from("table_5")));
    assert_eq!(result.rows_affected, 5);

    assert_eq!(engine.open_statements(), 0);
    Ok(())
}

#[test]
fn test02_syntax_error() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("selec 1", Reply::syntax_error("selec"));
    let (_env, conn) = connect(&engine)?;

    let err = conn.query("selec 1", &[]).unwrap_err();
    let engine_err = err.engine().expect("engine error");
    assert!(engine_err.has_errors());
    assert_eq!(err.sqlstate(), Some("42000"));
    let message = err.to_string();
    assert!(message.contains("query status = ERROR"), "{message}");
    assert!(message.contains("ERROR: Syntax error"), "{message}");

    // the statement handle the engine created was closed again
    assert_eq!(engine.open_statements(), 0);
    assert!(conn.is_autocommit());
    Ok(())
}

#[test]
fn test02_insert_then_count() -> Result<(), Box<dyn std::error::Error>> {
    let rows = Arc::new(AtomicI64::new(0));
    let counter = Arc::clone(&rows);
    let engine = MockEngine::new().with_handler(move |sql, _| {
        if sql.starts_with("insert into t values") {
            let inserted = i64::try_from(sql.matches('(').count()).unwrap_or_default();
            counter.fetch_add(inserted, Ordering::SeqCst);
            Some(Reply::exec(inserted))
        } else if sql == "select count(*) from t" {
            Some(Reply::rows(
                vec![MockColumn::new("col1", DataType::Integer, 4)],
                vec![vec![Value::Int32(
                    i32::try_from(counter.load(Ordering::SeqCst)).unwrap_or_default(),
                )]],
            ))
        } else {
            None
        }
    });
    let (_env, conn) = connect(&engine)?;

    let inserted = conn.execute("insert into t values (1), (2)", &[])?;
    assert_eq!(inserted.rows_affected, 2);
    assert_eq!(rows.load(Ordering::SeqCst), 2);

    let count = conn.fetch_all("select count(*) from t", &[])?;
    assert_eq!(count.scalar().and_then(Value::as_int), Some(2));
    Ok(())
}

#[test]
fn test02_end_of_rows_signalled_once() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select reltid, relid from iirelation", iirelation());
    let (_env, conn) = connect(&engine)?;

    let mut cursor = conn.query("select reltid, relid from iirelation", &[])?;
    let mut out = vec![Value::Null; 2];
    let mut seen = 0;
    while cursor.read_into(&mut out)? {
        seen += 1;
        assert_eq!(out[0], Value::Int32(seen));
        assert_eq!(cursor.state(), CursorState::Open);
    }
    assert_eq!(seen, 8);
    assert_eq!(cursor.state(), CursorState::Done);
    assert_eq!(cursor.rows_affected(), Some(8));
    // the statement was released as soon as the end was reached
    assert_eq!(engine.open_statements(), 0);

    // later reads keep reporting the end without contacting the engine
    let fetches = engine.call_count("get_columns");
    assert!(!cursor.read_into(&mut out)?);
    assert_eq!(engine.call_count("get_columns"), fetches);
    assert_eq!(out[0], Value::Int32(8));

    cursor.close()?;
    assert_eq!(cursor.state(), CursorState::Closed);
    assert!(matches!(
        cursor.read_into(&mut out),
        Err(IngresError::StatementClosed)
    ));
    Ok(())
}

#[test]
fn test02_empty_result() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply(
        "select relid from iirelation where 1 = 0",
        Reply::rows(vec![MockColumn::new("relid", DataType::Varchar, 34)], vec![]),
    );
    let (_env, conn) = connect(&engine)?;

    let mut cursor = conn.query("select relid from iirelation where 1 = 0", &[])?;
    assert_eq!(cursor.column_names(), ["relid".to_string()]);
    assert!(cursor.next_row()?.is_none());
    assert_eq!(cursor.rows_affected(), Some(0));
    Ok(())
}

#[test]
fn test02_nulls_in_rows() -> Result<(), Box<dyn std::error::Error>> {
    let columns = vec![
        MockColumn::new("id", DataType::Integer, 8),
        MockColumn::new("name", DataType::Varchar, 22).nullable(),
        MockColumn::new("score", DataType::Float, 8).nullable(),
        MockColumn::new("flag", DataType::Boolean, 1).nullable(),
    ];
    let rows = vec![
        vec![Value::Int64(1), Value::Null, Value::Float64(2.5), Value::Bool(true)],
        vec![Value::Int64(2), Value::from("bob"), Value::Null, Value::Null],
        vec![Value::Int64(3), Value::from("carol"), Value::Float64(-1.0), Value::Bool(false)],
    ];
    let engine = MockEngine::new().with_reply("select * from people", Reply::rows(columns, rows.clone()));
    let (_env, conn) = connect(&engine)?;

    let result = conn.fetch_all("select * from people", &[])?;
    let decoded: Vec<Vec<Value>> = result.results.iter().map(|row| row.values.clone()).collect();
    assert_eq!(decoded, rows);
    Ok(())
}

#[test]
fn test02_iterator_over_rows() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select reltid, relid from iirelation", iirelation());
    let (_env, conn) = connect(&engine)?;

    let ids: Vec<i64> = conn
        .query("select reltid, relid from iirelation", &[])?
        .map(|row| row.map(|r| r.get_by_index(0).and_then(Value::as_int).unwrap_or_default()))
        .collect::<Result<_, _>>()?;
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test02_close_early_releases_statement() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select reltid, relid from iirelation", iirelation());
    let (_env, conn) = connect(&engine)?;

    let mut cursor = conn.query("select reltid, relid from iirelation", &[])?;
    assert!(cursor.next_row()?.is_some());
    assert_eq!(engine.open_statements(), 1);
    cursor.close()?;
    cursor.close()?;
    assert_eq!(engine.open_statements(), 0);
    assert_eq!(engine.call_count("close"), 1);

    {
        let mut dropped = conn.query("select reltid, relid from iirelation", &[])?;
        let _ = dropped.next_row()?;
    }
    assert_eq!(engine.open_statements(), 0);
    Ok(())
}

#[test]
fn test02_column_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let columns = vec![
        MockColumn::new("id", DataType::Integer, 2),
        MockColumn::new("price", DataType::Decimal, 8).precision(10, 2).nullable(),
        MockColumn::new("note", DataType::Varchar, 102),
        MockColumn::new("body", DataType::LongVarchar, 0),
        MockColumn::new("created", DataType::AnsiDate, 4),
    ];
    let engine = MockEngine::new().with_reply("select * from items", Reply::rows(columns, vec![]));
    let (_env, conn) = connect(&engine)?;

    let cursor = conn.query("select * from items", &[])?;
    let id = cursor.column_type(0).expect("id column");
    assert_eq!(id.scan_type, ScanType::Int16);
    assert_eq!(id.database_type_name, "integer2");
    assert_eq!(id.length, None);

    let price = cursor.column_type(1).expect("price column");
    assert_eq!(price.precision_scale, Some((10, 2)));
    assert!(price.nullable);
    assert_eq!(price.database_type_name, "decimal");

    let note = cursor.column_type(2).expect("note column");
    assert_eq!(note.length, Some(102));
    assert_eq!(note.scan_type, ScanType::Text);

    let body = cursor.column_type(3).expect("body column");
    assert_eq!(body.length, Some(2_000_000_000));

    let created = cursor.column_type(4).expect("created column");
    assert_eq!(created.scan_type, ScanType::Timestamp);
    assert!(cursor.column_type(5).is_none());

    assert_eq!(cursor.blocks().len(), 3);
    Ok(())
}

#[test]
fn test02_implicit_transaction_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select reltid, relid from iirelation", iirelation());
    let options = ConnectOptions::builder("testdb").autocommit(false).finish();
    let (_env, conn) = connect_with(&engine, options)?;

    let outcome = Statement::new("select reltid, relid from iirelation")
        .context(TransactionContext::Implicit)
        .run(&conn)?;
    let mut cursor = outcome.into_cursor()?;
    assert!(cursor.next_row()?.is_some());
    assert_eq!(engine.open_transactions(), 1);
    cursor.close()?;

    assert_eq!(engine.open_transactions(), 0);
    assert_eq!(engine.rolled_back().len(), 1);
    assert_eq!(conn.transaction_state(), TransactionState::NoTransaction);
    Ok(())
}

#[test]
fn test02_outcome_kinds() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new()
        .with_reply("select reltid, relid from iirelation", iirelation())
        .with_reply("drop table t", Reply::exec(0));
    let (_env, conn) = connect(&engine)?;

    let exec = conn.run(&Statement::new("drop table t").kind(QueryKind::Exec))?;
    assert!(matches!(exec, StatementOutcome::Executed(ExecResult { rows_affected: 0, .. })));
    assert!(exec.into_cursor().is_err());

    let rows = conn.run(&Statement::new("select reltid, relid from iirelation"))?;
    assert!(matches!(rows.into_exec(), Err(IngresError::ExecutionError(_))));
    assert_eq!(engine.open_statements(), 0);

    let singleton = conn.run(
        &Statement::new("select reltid, relid from iirelation").kind(QueryKind::SelectSingleton),
    )?;
    assert_eq!(singleton.into_cursor()?.columns().len(), 2);
    Ok(())
}

#[test]
fn test02_fetch_failure_mid_result() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select reltid, relid from iirelation", iirelation());
    let (_env, conn) = connect(&engine)?;

    let mut cursor = conn.query("select reltid, relid from iirelation", &[])?;
    assert!(cursor.next().is_some());
    engine.fail_next(
        "get_columns",
        ingres_client::test_utils::MockFailure::status(Status::Failure),
    );
    assert!(matches!(cursor.next(), Some(Err(IngresError::Engine(_)))));
    // the iterator stops after the first error
    assert!(cursor.next().is_none());
    drop(cursor);
    assert_eq!(engine.open_statements(), 0);
    Ok(())
}

#[test]
fn test02_prepared_statements() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_handler(|sql, params| {
        (sql == "insert into t values (?)").then(|| Reply::exec(i64::try_from(params.len()).unwrap_or(0)))
    });
    let (_env, conn) = connect(&engine)?;

    let prepared = conn.prepare("insert into t values (?)")?;
    assert_eq!(prepared.sql(), "insert into t values (?)");
    assert!(engine.executed().is_empty());
    for i in 0..3 {
        conn.execute_prepared(&prepared, &[Value::Int32(i)])?;
    }
    let sent: Vec<Vec<Value>> = engine.executed().into_iter().map(|(_, params)| params).collect();
    assert_eq!(
        sent,
        vec![vec![Value::Int64(0)], vec![Value::Int64(1)], vec![Value::Int64(2)]]
    );
    assert!(matches!(conn.prepare("   "), Err(IngresError::ExecutionError(_))));
    Ok(())
}
