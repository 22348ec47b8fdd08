use std::env::var;
use postwire::{Client, Config, Connection, Result, State};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect_env().await?;
    conn.execute("SELECT 1", &[]).await?;
    tracing::info!(
        server_version = conn.server_version(),
        tx_status = ?conn.transaction_status(),
        "connected",
    );
    conn.close().await?;
    assert_eq!(conn.state(), State::Closed);

    if let Ok(url) = var("POSTWIRE_URL") {
        let config: Config = url.parse()?;
        let client = Client::connect(&config).await?;
        client.execute("SELECT 1", []).await?;
        client.close().await?;
    }

    let client = Client::with_capacity(&Config::from_env(), 4).await?;
    client.execute("SELECT 1", []).await?;
    drop(client);

    Ok(())
}
