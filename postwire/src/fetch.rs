//! Query execution.
//!
//! A statement without parameters uses the simple query protocol, otherwise
//! the extended protocol with unnamed statement and portal:
//!
//! ```text
//! Parse -> Describe(S) -> Bind -> Execute -> Sync
//! ```
//!
//! Both are followed by the same response loop which ends at `ReadyForQuery`.
//!
//! <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-SIMPLE-QUERY>
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Result,
    common::{debug, span, verbose, warning},
    connection::{Connection, ConnectionClosed, State},
    encode::{Encoded, Param},
    io::MAX_FRAME_LEN,
    postgres::{
        BackendMessage, DatabaseError, PgFormat, ProtocolError,
        backend::FieldDescriptor,
        frontend,
    },
    row::Row,
};

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Execute a statement and collect all returned rows.
    ///
    /// Parameters bind by position. A server reported error, or a statement
    /// rejected for its size before sending, leaves the connection usable. Any
    /// other error moves it to [`State::Failed`] and shuts the stream down.
    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        if self.state != State::Ready {
            return Err(ConnectionClosed.into());
        }

        // nothing is written yet, the connection stays usable
        check_size(sql, params)?;

        match span!(self.execute_inner(sql, params), "execute", params = params.len()).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                if err.is_fatal() {
                    debug!("connection failed: {err:#}");
                    self.state = State::Failed;
                    let _ = self.stream.shutdown().await;
                }
                Err(err)
            },
        }
    }

    async fn execute_inner(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        self.ensure_ready().await?;

        if params.is_empty() {
            verbose!(sql, "simple query");
            self.stream.send(frontend::Query { sql });
        } else {
            verbose!(sql, params = params.len(), "extended query");
            let values = params.iter().map(|p| p.value.clone()).collect::<Vec<Encoded>>();
            self.stream.send(frontend::Parse {
                prepare_name: "",
                sql,
                oids_len: params.len() as u16,
                oids: std::iter::repeat(0),
            });
            self.stream.send(frontend::Describe { kind: b'S', name: "" });
            self.stream.send(frontend::Bind {
                portal_name: "",
                stmt_name: "",
                param_format: PgFormat::Text,
                params: &values,
                result_format: PgFormat::Text,
            });
            self.stream.send(frontend::Execute { portal_name: "", max_row: 0 });
            self.stream.send(frontend::Sync);
        }

        self.pending_ready = true;
        self.stream.flush().await?;

        self.collect().await
    }

    /// Recover from a previous statement whose future was dropped.
    async fn ensure_ready(&mut self) -> Result<()> {
        // rest of a partially written batch
        if self.stream.pending_len() != 0 {
            self.stream.flush().await?;
        }
        if self.pending_ready {
            debug!("discarding response of an abandoned statement");
            self.drain_ready().await?;
        }
        Ok(())
    }

    async fn collect(&mut self) -> Result<Vec<Row>> {
        let mut fields = Vec::<FieldDescriptor>::new();
        let mut rows = vec![];

        loop {
            match self.stream.recv().await? {
                BackendMessage::ReadyForQuery(r) => {
                    self.tx_status = r.tx_status;
                    self.pending_ready = false;
                    return Ok(rows);
                },
                // Indicates that rows are about to be returned in response to a SELECT, FETCH, etc. query.
                BackendMessage::RowDescription(rd) => fields = rd.fields,
                // One of the set of rows returned by a SELECT, FETCH, etc. query.
                BackendMessage::DataRow(dr) => rows.push(Row::decode(&fields, dr)?),
                BackendMessage::CommandComplete(c) => {
                    debug!("{}", c.tag);
                    let _ = c;
                },
                BackendMessage::ErrorResponse(err) => {
                    // the backend always sends ReadyForQuery after an error
                    self.drain_ready().await?;
                    return Err(DatabaseError::new(err.fields).into());
                },
                BackendMessage::NoticeResponse(notice) => {
                    warning!("{}", notice.fields);
                    let _ = notice;
                },
                BackendMessage::ParameterStatus(p) => self.set_param(p.name, p.value),
                BackendMessage::ParameterDescription(d) => {
                    verbose!(oids = ?d.oids, "parameter description");
                    let _ = d;
                },
                BackendMessage::NotificationResponse(n) => {
                    debug!("notification from {} on `{}`: {}", n.process_id, n.channel, n.payload);
                    let _ = n;
                },
                BackendMessage::ParseComplete(_)
                | BackendMessage::BindComplete(_)
                | BackendMessage::NoData(_)
                | BackendMessage::EmptyQueryResponse(_)
                | BackendMessage::PortalSuspended(_)
                | BackendMessage::CloseComplete(_)
                | BackendMessage::FunctionCallResponse(_) => {},
                f => {
                    debug!("skip `{}` in query", BackendMessage::message_name(f.msgtype()));
                    let _ = f;
                },
            }
        }
    }

    /// Discard messages until `ReadyForQuery`.
    async fn drain_ready(&mut self) -> Result<()> {
        loop {
            match self.stream.recv().await? {
                BackendMessage::ReadyForQuery(r) => {
                    self.tx_status = r.tx_status;
                    self.pending_ready = false;
                    return Ok(());
                },
                BackendMessage::ParameterStatus(p) => self.set_param(p.name, p.value),
                BackendMessage::NoticeResponse(notice) => {
                    warning!("{}", notice.fields);
                    let _ = notice;
                },
                BackendMessage::ErrorResponse(err) => {
                    debug!("discarded error: {}", err.fields);
                    let _ = err;
                },
                f => {
                    verbose!(msgtype = %(f.msgtype() as char), "discard");
                    let _ = f;
                },
            }
        }
    }
}

/// Reject statements whose frames would exceed the protocol limit.
fn check_size(sql: &str, params: &[Param]) -> Result<(), ProtocolError> {
    let values = params.iter().map(|p| 4 + p.value.as_slice().len()).sum::<usize>();
    if params.len() > u16::MAX as usize || sql.len() + 64 > MAX_FRAME_LEN || values + 64 > MAX_FRAME_LEN {
        return Err(ProtocolError::MessageTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ErrorKind,
        mock::{self, MockServer},
        postgres::TransactionStatus,
        row::Value,
    };

    async fn connect() -> (Connection<tokio::io::DuplexStream>, MockServer) {
        let (io, mut server) = mock::pair();
        let config = mock::config();
        let (conn, _) = tokio::join!(Connection::handshake(io, &config), server.accept());
        (conn.unwrap(), server)
    }

    #[tokio::test]
    async fn simple_query_rows() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            let q = server.read_frame().await;
            assert_eq!(q.msgtype, b'Q');
            assert_eq!(&q.body[..], b"SELECT id, name FROM t\0");
            server.write(&[
                mock::row_description(&["id", "name"]),
                mock::data_row(&[Some("1"), None]),
                mock::data_row(&[Some("2"), Some("bob")]),
                mock::command_complete("SELECT 2"),
                mock::ready(b'I'),
            ]).await;
        };

        let (rows, _) = tokio::join!(conn.execute("SELECT id, name FROM t", &[]), backend);
        let rows = rows.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Text("1".into())));
        assert_eq!(rows[0].get("name"), Some(&Value::Null));
        assert_eq!(rows[1].get("name").and_then(Value::as_str), Some("bob"));
        assert_eq!(conn.state(), State::Ready);
    }

    #[tokio::test]
    async fn extended_query_messages() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            let parse = server.read_frame().await;
            assert_eq!(parse.msgtype, b'P');
            assert_eq!(&parse.body[..], b"\0SELECT $1, $2\0\0\x02\0\0\0\0\0\0\0\0");
            assert_eq!(server.read_msgtypes(4).await, [b'D', b'B', b'E', b'S']);
            server.write(&[
                mock::unit(b'1'),
                mock::frame(b't', |b| {
                    use bytes::BufMut;
                    b.put_i16(2);
                    b.put_u32(23);
                    b.put_u32(25);
                }),
                mock::row_description(&["a", "b"]),
                mock::unit(b'2'),
                mock::data_row(&[Some("7"), None]),
                mock::command_complete("SELECT 1"),
                mock::ready(b'T'),
            ]).await;
        };

        let params = [Param::new("a", 7), Param::new("b", Option::<&str>::None)];
        let (rows, _) = tokio::join!(conn.execute("SELECT $1, $2", &params), backend);
        let rows = rows.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("a").and_then(Value::as_str), Some("7"));
        assert!(rows[0].get("b").unwrap().is_null());
        assert_eq!(conn.transaction_status(), TransactionStatus::InTransaction);
    }

    #[tokio::test]
    async fn error_then_recover() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            server.read_frame().await;
            server.write(&[
                mock::notice("01000", "careful"),
                mock::row_description(&["x"]),
                mock::data_row(&[Some("1")]),
                mock::error("42601", "syntax error"),
                mock::ready(b'I'),
            ]).await;
            server.read_frame().await;
            server.write(&[
                mock::row_description(&["ok"]),
                mock::data_row(&[Some("t")]),
                mock::command_complete("SELECT 1"),
                mock::ready(b'I'),
            ]).await;
        };

        let run = async {
            let err = conn.execute("SELEC 1", &[]).await.unwrap_err();
            let db = err.as_database().unwrap();
            assert_eq!(db.code(), "42601");
            assert_eq!(db.message(), "syntax error");
            assert!(!err.is_fatal());
            assert_eq!(conn.state(), State::Ready);

            let rows = conn.execute("SELECT true AS ok", &[]).await.unwrap();
            assert_eq!(rows[0].get("ok").and_then(Value::as_str), Some("t"));
        };

        tokio::join!(run, backend);
    }

    #[tokio::test]
    async fn informational_messages() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            server.read_frame().await;
            server.write(&[
                mock::unit(b'I'),
                mock::unit(b'n'),
                mock::param("TimeZone", "UTC"),
                mock::frame(b'A', |b| {
                    use crate::ext::BufMutExt;
                    use bytes::BufMut;
                    b.put_i32(9);
                    b.put_nul_string("chan");
                    b.put_nul_string("hello");
                }),
                mock::frame(b'!', |b| b.extend_from_slice(b"future message")),
                mock::ready(b'I'),
            ]).await;
        };

        let (rows, _) = tokio::join!(conn.execute("", &[]), backend);
        assert!(rows.unwrap().is_empty());
        assert_eq!(conn.parameter("TimeZone"), Some("UTC"));
    }

    #[tokio::test]
    async fn io_error_fails_connection() {
        let (mut conn, server) = connect().await;
        drop(server);

        let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(conn.state(), State::Failed);

        let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Closed(_)));
    }

    #[tokio::test]
    async fn column_count_mismatch_is_fatal() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            server.read_frame().await;
            server.write(&[
                mock::row_description(&["a", "b"]),
                mock::data_row(&[Some("1")]),
                mock::ready(b'I'),
            ]).await;
        };

        let (res, _) = tokio::join!(conn.execute("SELECT 1, 2", &[]), backend);
        assert!(matches!(res.unwrap_err().kind(), ErrorKind::Protocol(ProtocolError::ColumnCount { .. })));
        assert_eq!(conn.state(), State::Failed);

        // stream is shut down on failure
        assert!(server.read_eof().await);
    }

    #[tokio::test]
    async fn extended_error_then_recover() {
        let (mut conn, mut server) = connect().await;

        let backend = async {
            assert_eq!(server.read_msgtypes(5).await, [b'P', b'D', b'B', b'E', b'S']);
            // parse failed, the backend skips to Sync
            server.write(&[mock::error("42703", "column \"nope\" does not exist"), mock::ready(b'I')]).await;

            assert_eq!(server.read_msgtypes(5).await, [b'P', b'D', b'B', b'E', b'S']);
            server.write(&[
                mock::unit(b'1'),
                mock::unit(b'2'),
                mock::row_description(&["n"]),
                mock::data_row(&[Some("1")]),
                mock::command_complete("SELECT 1"),
                mock::ready(b'I'),
            ]).await;
        };

        let run = async {
            let err = conn.execute("SELECT nope WHERE $1", &[Param::new("p", true)]).await.unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Database(e) if e.code() == "42703"));
            assert_eq!(conn.state(), State::Ready);
            assert!(!conn.pending_ready);

            let rows = conn.execute("SELECT $1::int AS n", &[Param::new("n", 1)]).await.unwrap();
            assert_eq!(rows[0].get("n").and_then(Value::as_str), Some("1"));
        };

        tokio::join!(run, backend);
    }

    #[tokio::test]
    async fn abandoned_statement_is_drained() {
        let (mut conn, mut server) = connect().await;

        // drop the statement future before any response arrives
        {
            let fut = conn.execute("SELECT pg_sleep(10)", &[]);
            tokio::pin!(fut);
            let poll = futures_poll_once(fut.as_mut()).await;
            assert!(poll.is_none());
        }
        assert!(conn.pending_ready);

        let backend = async {
            assert_eq!(server.read_frame().await.msgtype, b'Q');
            server.write(&[
                mock::row_description(&["stale"]),
                mock::data_row(&[Some("x")]),
                mock::ready(b'I'),
            ]).await;
            assert_eq!(server.read_frame().await.msgtype, b'Q');
            server.write(&[
                mock::row_description(&["fresh"]),
                mock::data_row(&[Some("y")]),
                mock::ready(b'I'),
            ]).await;
        };

        let (rows, _) = tokio::join!(conn.execute("SELECT 'y' AS fresh", &[]), backend);
        let rows = rows.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("fresh").and_then(Value::as_str), Some("y"));
        assert!(rows[0].get("stale").is_none());
    }

    /// Poll a future once, returns its output if ready.
    async fn futures_poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(out) => Some(out),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }

    #[tokio::test]
    async fn oversized_statement_keeps_connection() {
        let (mut conn, mut server) = connect().await;
        let params = vec![Param::new("p", 1); u16::MAX as usize + 1];

        let err = conn.execute("SELECT 1", &params).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::MessageTooLarge)));
        assert_eq!(conn.state(), State::Ready);
        assert!(!conn.pending_ready);

        let backend = async {
            // nothing of the rejected statement was sent
            assert_eq!(server.read_frame().await.msgtype, b'Q');
            server.write(&[
                mock::row_description(&["n"]),
                mock::data_row(&[Some("1")]),
                mock::command_complete("SELECT 1"),
                mock::ready(b'I'),
            ]).await;
        };

        let (rows, _) = tokio::join!(conn.execute("SELECT 1 AS n", &[]), backend);
        assert_eq!(rows.unwrap().len(), 1);
        assert_eq!(conn.state(), State::Ready);
    }

    #[test]
    fn oversized_statement() {
        let params = vec![Param::new("p", 1); u16::MAX as usize + 1];
        assert!(matches!(check_size("SELECT 1", &params), Err(ProtocolError::MessageTooLarge)));
        assert!(check_size("SELECT 1", &params[..3]).is_ok());
    }
}
