//! Postgres frontend/backend protocol client.
//!
//! Speaks protocol 3.0 directly over a stream, no driver underneath:
//!
//! - startup handshake with trust or MD5 authentication
//! - simple query protocol for statements without parameters
//! - extended query protocol with unnamed statement and portal otherwise
//! - rows returned as column name to raw [`Value`] mapping
//!
//! # Examples
//!
//! Shared client:
//!
//! ```no_run
//! use postwire::{Client, Config};
//!
//! # async fn app() -> postwire::Result<()> {
//! let config = Config::parse("Host=localhost;Username=postgres;Password=secret;ConnectionTimeout=5")?;
//! let client = Client::connect(&config).await?;
//!
//! client.execute("CREATE TEMP TABLE foo(id int, name text)", []).await?;
//!
//! client
//!     .query("INSERT INTO foo(id, name) VALUES ($1, $2)")
//!     .bind("id", 1)
//!     .bind("name", "Foo")
//!     .await?;
//!
//! let rows = client.query("SELECT * FROM foo").await?;
//! assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("Foo"));
//! # Ok(())
//! # }
//! ```
//!
//! Single connection:
//!
//! ```no_run
//! use postwire::Connection;
//!
//! # async fn app() -> postwire::Result<()> {
//! let mut conn = Connection::connect_env().await?;
//! let rows = conn.execute("SELECT 420 AS n", &[]).await?;
//! assert_eq!(rows[0].get("n").and_then(|v| v.as_str()), Some("420"));
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

mod common;
mod ext;
mod io;

// Protocol
pub mod postgres;

// Encoding
pub mod encode;
pub mod row;

// Operation
mod fetch;
pub mod query;

// Connection
pub mod connection;
pub mod client;

mod error;

#[cfg(test)]
mod mock;

pub use encode::{Encode, Param};
pub use row::{Row, Value};
pub use postgres::{DatabaseError, TransactionStatus};

pub use connection::{Config, Connection, State};
pub use client::Client;
pub use query::Query;
pub use error::{Error, ErrorKind, Result};
