//! `postwire` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    connection::{ConnectionClosed, ParseError, Timeout, UnsupportedAuth},
    postgres::{DatabaseError, ProtocolError},
};

/// A specialized [`Result`] type for `postwire` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `postwire` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns `true` if the connection can not be used after this error.
    ///
    /// Only statement level [`Database`][ErrorKind::Database] error, or a
    /// statement rejected as [`MessageTooLarge`][ProtocolError::MessageTooLarge]
    /// before sending, leaves the connection usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::Database(_) | ErrorKind::Protocol(ProtocolError::MessageTooLarge)
        )
    }

    /// Returns the server reported error fields, if any.
    pub fn as_database(&self) -> Option<&DatabaseError> {
        match &self.kind {
            ErrorKind::Database(e) | ErrorKind::Authentication(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// All possible error kind from `postwire` library.
pub enum ErrorKind {
    /// Connection string parse failure.
    Config(ParseError),
    /// Transport error, including premature stream closure.
    Io(io::Error),
    /// Malformed or unexpected backend message.
    Protocol(ProtocolError),
    /// Server requested an authentication method other than trust or MD5.
    UnsupportedAuth(UnsupportedAuth),
    /// Server rejected the authentication.
    Authentication(DatabaseError),
    /// Server reported error.
    Database(DatabaseError),
    /// Handshake deadline elapsed.
    Timeout(Timeout),
    /// Connection is closed or failed.
    Closed(ConnectionClosed),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<UnsupportedAuth>e => ErrorKind::UnsupportedAuth(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<Timeout>e => ErrorKind::Timeout(e));
from!(<ConnectionClosed>e => ErrorKind::Closed(e));

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => fmt::Display::fmt(e, f),
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::UnsupportedAuth(e) => fmt::Display::fmt(e, f),
            Self::Authentication(e) => write!(f, "authentication failed: {e}"),
            Self::Database(e) => fmt::Display::fmt(e, f),
            Self::Timeout(e) => fmt::Display::fmt(e, f),
            Self::Closed(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
