//! Shared connection handle.
//!
//! A [`Client`] owns no socket, it submits statements to a worker task which
//! owns the [`Connection`] and runs them one at a time in submission order.
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot},
};

use crate::{
    Result,
    connection::{Config, Connection, ConnectionClosed},
    encode::Param,
    query::Query,
    row::Row,
};

mod worker;

pub(crate) use worker::{StatementRequest, WorkerMessage};

/// Default bounded queue capacity.
pub const DEFAULT_CAPACITY: usize = 100;

/// Cloneable handle to a connection worker.
///
/// When the queue is full, submission waits until there is room.
///
/// ```no_run
/// use postwire::{Client, Config};
///
/// # async fn app() -> postwire::Result<()> {
/// let client = Client::connect(&Config::from_env()).await?;
///
/// let rows = client
///     .query("SELECT $1::int + 1 AS n")
///     .bind("n", 41)
///     .await?;
///
/// assert_eq!(rows[0].get("n").and_then(|v| v.as_str()), Some("42"));
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) send: mpsc::Sender<WorkerMessage>,
}

impl Client {
    /// Connect and spawn the worker with the default queue capacity.
    pub async fn connect(config: &Config) -> Result<Client> {
        Self::with_capacity(config, DEFAULT_CAPACITY).await
    }

    /// Same as [`Client::connect`] with [`Config::from_env`].
    pub async fn connect_env() -> Result<Client> {
        Self::connect(&Config::from_env()).await
    }

    /// Connect and spawn the worker with given queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub async fn with_capacity(config: &Config, capacity: usize) -> Result<Client> {
        let conn = Connection::connect(config).await?;
        Ok(Self::from_connection(conn, capacity))
    }

    /// Spawn worker for an established connection.
    ///
    /// Must be called within tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn from_connection<S>(conn: Connection<S>, capacity: usize) -> Client
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (send, recv) = mpsc::channel(capacity);
        tokio::spawn(worker::run(conn, recv));
        Self { send }
    }

    /// Start building a statement.
    pub fn query(&self, sql: impl Into<String>) -> Query<'_> {
        Query::new(self, sql.into())
    }

    /// Execute a statement and collect all returned rows.
    ///
    /// Parameters bind by position in iteration order.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Result<Vec<Row>> {
        let (reply, recv) = oneshot::channel();
        let req = StatementRequest {
            sql: sql.into(),
            params: params.into_iter().collect(),
            reply,
        };

        self.send
            .send(WorkerMessage::Execute(req))
            .await
            .map_err(|_| ConnectionClosed)?;

        recv.await.map_err(|_| ConnectionClosed)?
    }

    /// Close the connection after every already queued statement.
    ///
    /// Closing an already closed client is not an error.
    pub async fn close(&self) -> Result<()> {
        let (reply, recv) = oneshot::channel();
        if self.send.send(WorkerMessage::Close(reply)).await.is_err() {
            return Ok(());
        }
        recv.await.unwrap_or(Ok(()))
    }

    /// Returns `true` if the worker is gone.
    pub fn is_closed(&self) -> bool {
        self.send.is_closed()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("closed", &self.is_closed())
            .finish()
    }
}
