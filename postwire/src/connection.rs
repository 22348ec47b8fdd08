//! Postgres connection.
//!
//! A [`Connection`] owns one stream and runs a single statement at a time. Use
//! [`Client`][crate::Client] to share it between tasks.
use std::{collections::HashMap, fmt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{
    Result,
    common::debug,
    io::PgStream,
    postgres::{TransactionStatus, backend::BackendKeyData, frontend},
};

mod config;
mod error;
mod startup;

pub use config::{Config, ParseError};
pub use error::{ConnectionClosed, Timeout, UnsupportedAuth};

/// Connection life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    AwaitingAuth,
    AwaitingBackendReady,
    /// Idle and ready for the next statement.
    Ready,
    /// Closed by [`Connection::close`].
    Closed,
    /// An io or protocol error occured, the connection is unusable.
    Failed,
}

/// Single postgres connection.
pub struct Connection<S = TcpStream> {
    pub(crate) stream: PgStream<S>,
    pub(crate) state: State,
    pub(crate) tx_status: TransactionStatus,
    pub(crate) params: HashMap<String, String>,
    pub(crate) backend_key: Option<BackendKeyData>,
    /// A statement was sent but its `ReadyForQuery` is not received yet.
    pub(crate) pending_ready: bool,
}

impl Connection {
    /// Connect over tcp and perform the startup handshake.
    ///
    /// The configured timeout bounds both tcp connect and the handshake.
    pub async fn connect(config: &Config) -> Result<Connection> {
        let host = config.get_host();
        let port = config.get_port();
        debug!("connecting to {host}:{port}");

        startup::with_deadline(config.get_timeout(), async {
            let socket = TcpStream::connect((host, port)).await?;
            socket.set_nodelay(true)?;
            startup::startup(socket, config).await
        })
        .await
        .map_err(|e| e.context(format!("failed to connect to {host}:{port}")))
    }

    /// Same as [`Connection::connect`] with [`Config::from_env`].
    pub async fn connect_env() -> Result<Connection> {
        Self::connect(&Config::from_env()).await
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the startup handshake over an already open stream.
    pub async fn handshake(io: S, config: &Config) -> Result<Connection<S>> {
        startup::with_deadline(config.get_timeout(), startup::startup(io, config)).await
    }

    /// Gracefully close the connection.
    ///
    /// Sends `Terminate` and shutdown the stream. Closing a failed or closed
    /// connection only marks it closed.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Ok(()),
            State::Failed => {
                self.state = State::Closed;
                return Ok(());
            },
            _ => {},
        }

        self.state = State::Closed;
        self.stream.discard_pending();
        self.stream.send(frontend::Terminate);
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        debug!("connection closed");
        Ok(())
    }
}

impl<S> Connection<S> {
    pub(crate) fn new(stream: PgStream<S>) -> Self {
        Self {
            stream,
            state: State::Disconnected,
            tx_status: TransactionStatus::Idle,
            params: HashMap::new(),
            backend_key: None,
            pending_ready: false,
        }
    }

    /// Current life-cycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Transaction status reported by the last `ReadyForQuery`.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// Get run-time parameter reported by the server.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Iterate all run-time parameters reported by the server.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Backend process id and secret key, used for cancellation.
    pub fn backend_key(&self) -> Option<BackendKeyData> {
        self.backend_key
    }

    /// The `server_version` run-time parameter.
    pub fn server_version(&self) -> Option<&str> {
        self.parameter("server_version")
    }

    pub(crate) fn set_param(&mut self, name: String, value: String) {
        debug!("parameter {name} = {value}");
        self.params.insert(name, value);
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("tx_status", &self.tx_status)
            .field("backend_key", &self.backend_key)
            .finish()
    }
}
