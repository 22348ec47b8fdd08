use postwire::{Client, ErrorKind, Param, Result, Value};

pub async fn main() -> Result<()> {
    let client = Client::connect_env().await?;

    // Execute

    client.execute("CREATE TEMP TABLE postwire(id serial, name text, note text)", []).await?;

    client
        .query("INSERT INTO postwire(name, note) VALUES($1, $2)")
        .bind("name", "Deez")
        .bind("note", Option::<&str>::None)
        .await?;

    client.execute("INSERT INTO postwire(name) VALUES('Foo')", []).await?;

    // Queries

    let rows = client.query("SELECT * FROM postwire ORDER BY id").await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name").and_then(Value::as_str), Some("Deez"));
    assert!(rows[0].get("note").is_some_and(Value::is_null));
    tracing::info!("{rows:?}");

    let rows = client
        .execute("SELECT name FROM postwire WHERE id = $1", [Param::new("id", 2)])
        .await?;
    assert_eq!(rows[0].get_idx(0).and_then(Value::as_str), Some("Foo"));

    // Concurrent callers share one connection

    let mut handles = vec![];
    for i in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.query("SELECT $1::int * 2 AS n").bind("i", i).await
        }));
    }
    for h in handles {
        let rows = h.await.expect("task panicked")?;
        tracing::debug!("{rows:?}");
    }

    // Error case

    client.execute("", []).await?;
    let err = client.execute("SELECT foo", []).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Database(_)));
    tracing::info!(code = err.as_database().map(|e| e.code()), "expected error");

    // still usable after a statement error
    client.execute("SELECT 1", []).await?;

    client.close().await?;
    Ok(())
}
