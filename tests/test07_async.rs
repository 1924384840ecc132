#![cfg(feature = "tokio")]

use ingres_client::prelude::*;
use ingres_client::test_utils::{MockEngine, Reply, mock_environment, text_rows};

#[tokio::test]
async fn test07_async_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new()
        .with_reply("select name from users", text_rows(&["name"], &[&["alice"], &["bob"]]))
        .with_reply("update users set seen = 1", Reply::exec(2));
    let env = mock_environment(&engine)?;

    let conn = AsyncConnection::connect(env, ConnectOptions::new("testdb")).await?;
    assert!(matches!(
        conn.transaction_state().await,
        TransactionState::Autocommit(_)
    ));

    let users = conn.fetch_all("select name from users", vec![]).await?;
    let names: Vec<&str> = users
        .results
        .iter()
        .filter_map(|row| row.get("name").and_then(Value::as_text))
        .collect();
    assert_eq!(names, ["alice", "bob"]);

    conn.begin_transaction().await?;
    let updated = conn.execute("update users set seen = 1", vec![]).await?;
    assert_eq!(updated.rows_affected, 2);
    conn.commit().await?;
    assert_eq!(engine.committed().len(), 1);

    conn.disconnect().await?;
    assert_eq!(engine.open_connections(), 0);
    Ok(())
}

#[tokio::test]
async fn test07_shared_handles_serialize_calls() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("update t set n = n + 1", Reply::exec(1));
    let env = mock_environment(&engine)?;
    let conn = AsyncConnection::connect(env, ConnectOptions::new("testdb")).await?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let conn = conn.clone();
        tasks.push(tokio::spawn(async move {
            conn.execute("update t set n = n + 1", vec![]).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await??.rows_affected, 1);
    }
    assert_eq!(engine.executed().len(), 8);

    // a clone is still alive until here
    let extra = conn.clone();
    assert!(matches!(
        extra.disconnect().await,
        Err(IngresError::ConnectionError(_))
    ));
    conn.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test07_with_connection_runs_cursor_code() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MockEngine::new().with_reply("select name from users", text_rows(&["name"], &[&["a"], &["b"], &["c"]]));
    let env = mock_environment(&engine)?;
    let conn = AsyncConnection::connect(env, ConnectOptions::new("testdb")).await?;

    let count = conn
        .with_connection(|c| {
            let mut cursor = c.query("select name from users", &[])?;
            let mut n = 0;
            while cursor.next_row()?.is_some() {
                n += 1;
            }
            Ok(n)
        })
        .await?;
    assert_eq!(count, 3);
    Ok(())
}
