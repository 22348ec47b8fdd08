//! Startup phase.
//!
//! <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-START-UP>
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Config, Connection, State, Timeout, UnsupportedAuth};
use crate::{
    ErrorKind, Result,
    common::{debug, span, verbose, warning},
    io::{MAX_FRAME_LEN, PgStream},
    postgres::{BackendMessage, DatabaseError, ProtocolError, backend::Authentication, frontend},
};

/// Reported as `application_name`.
const APPLICATION_NAME: &str = "postwire";

/// Run `f` under an optional deadline.
///
/// On expiry the future is dropped, which closes any stream it owns.
pub(crate) async fn with_deadline<T>(
    deadline: Option<Duration>,
    f: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(d) => tokio::time::timeout(d, f).await.map_err(|_| Timeout)?,
        None => f.await,
    }
}

/// Perform the startup handshake.
pub(crate) async fn startup<S>(io: S, config: &Config) -> Result<Connection<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    check_startup_size(config.get_user().len(), config.get_database().len())?;
    span!(run(io, config), "startup", user = config.get_user()).await
}

async fn run<S>(io: S, config: &Config) -> Result<Connection<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = Connection::new(PgStream::new(io));
    conn.state = State::Connecting;

    // To begin a session, a frontend opens a connection to the server and sends a startup message.
    conn.stream.send_startup(frontend::Startup {
        user: config.get_user(),
        database: Some(config.get_database()),
        application_name: Some(APPLICATION_NAME),
        client_encoding: Some("UTF8"),
    });
    conn.stream.flush().await?;
    conn.state = State::AwaitingAuth;
    verbose!(user = config.get_user(), "startup sent");

    // The server then sends an appropriate authentication request message,
    // to which the frontend must reply with an appropriate authentication response message.
    loop {
        match conn.stream.recv().await? {
            BackendMessage::Authentication(Authentication::Ok) => break,
            BackendMessage::Authentication(Authentication::MD5Password { salt }) => {
                debug!("md5 authentication requested");
                let password = md5_password(config.get_user(), config.get_password(), &salt);
                conn.stream.send(frontend::PasswordMessage { password: &password });
                conn.stream.flush().await?;
            },
            BackendMessage::Authentication(auth) => {
                Err(UnsupportedAuth { method: auth.method(), code: auth.code() })?
            },
            BackendMessage::ErrorResponse(err) => {
                Err(ErrorKind::Authentication(DatabaseError::new(err.fields)))?
            },
            BackendMessage::NoticeResponse(notice) => {
                warning!("{}", notice.fields);
                let _ = notice;
            },
            // server does not support the requested minor version, 3.0 is still used
            BackendMessage::NegotiateProtocolVersion(v) => {
                debug!("protocol negotiated minor version {}", v.minor);
                let _ = v;
            },
            f => Err(ProtocolError::unexpected_phase(f.msgtype(), "authentication"))?,
        }
    }

    // After having received AuthenticationOk, the frontend must wait for further messages from the server.
    // The backend will send some ParameterStatus messages, BackendKeyData, and finally ReadyForQuery.
    conn.state = State::AwaitingBackendReady;
    debug!("authenticated");

    loop {
        match conn.stream.recv().await? {
            BackendMessage::ReadyForQuery(r) => {
                conn.tx_status = r.tx_status;
                break;
            },
            BackendMessage::ParameterStatus(p) => conn.set_param(p.name, p.value),
            BackendMessage::BackendKeyData(key) => conn.backend_key = Some(key),
            // startup attempt failed, e.g. database does not exist
            BackendMessage::ErrorResponse(err) => Err(DatabaseError::new(err.fields))?,
            BackendMessage::NoticeResponse(notice) => {
                warning!("{}", notice.fields);
                let _ = notice;
            },
            f => {
                debug!("skip `{}` in startup", BackendMessage::message_name(f.msgtype()));
                let _ = f;
            },
        }
    }

    conn.state = State::Ready;
    debug!("connection ready");
    Ok(conn)
}

/// Reject startup parameters whose message would exceed the protocol limit.
fn check_startup_size(user: usize, database: usize) -> Result<(), ProtocolError> {
    if user + database + APPLICATION_NAME.len() + 64 > MAX_FRAME_LEN {
        return Err(ProtocolError::MessageTooLarge);
    }
    Ok(())
}

/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`
pub(crate) fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}"));
    let mut outer = format!("{inner:x}").into_bytes();
    outer.extend_from_slice(salt);
    format!("md5{:x}", md5::compute(outer))
}
