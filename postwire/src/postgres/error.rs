//! Protocol error
use std::{fmt, str::Utf8Error};

use super::BackendMessage;

/// An error when translating buffer from postgres.
pub enum ProtocolError {
    /// Message is not expected in the current phase.
    Unexpected {
        expect: Option<u8>,
        found: u8,
        phase: Option<&'static str>,
    },
    /// Message body ended before the field was complete.
    UnexpectedEof {
        field: &'static str,
    },
    /// Declared message length is not valid.
    InvalidLength {
        msgtype: u8,
        len: i32,
    },
    /// Invalid `DataRow` column length.
    InvalidColumnLength {
        len: i32,
    },
    /// `DataRow` column count differ from the preceding `RowDescription`.
    ColumnCount {
        expect: usize,
        found: usize,
    },
    /// Unknown `ReadyForQuery` transaction status.
    TxStatus(u8),
    /// Frontend message would exceed the protocol limit.
    MessageTooLarge,
    /// Postgres sent non utf8 string.
    Utf8(Utf8Error),
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Unexpected { expect, found, phase } => {
                let found = BackendMessage::message_name(found);
                match expect {
                    Some(m) => {
                        write!(
                            f,
                            "Expected message `{}` found `{found}`",
                            BackendMessage::message_name(m),
                        )?
                    },
                    None => write!(f, "Unexpected message `{found}`")?,
                }
                if let Some(phase) = phase {
                    write!(f, " in `{phase}`")?
                }
                Ok(())
            },
            ProtocolError::UnexpectedEof { field } => {
                write!(f, "Message body ended while reading `{field}`")
            },
            ProtocolError::InvalidLength { msgtype, len } => {
                write!(
                    f,
                    "Invalid message length {len} for `{}`",
                    BackendMessage::message_name(msgtype),
                )
            },
            ProtocolError::InvalidColumnLength { len } => {
                write!(f, "Invalid column value length {len}")
            },
            ProtocolError::ColumnCount { expect, found } => {
                write!(f, "Row described {expect} column(s) but data row has {found}")
            },
            ProtocolError::TxStatus(b) => {
                write!(f, "Unknown transaction status `{}`", b.escape_ascii())
            },
            ProtocolError::MessageTooLarge => f.write_str("Message too large for protocol"),
            ProtocolError::Utf8(ref e) => write!(f, "Postgres sent invalid utf8 string: {e}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl ProtocolError {
    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected {
            expect: None,
            found,
            phase: Some(phase),
        }
    }

    pub(crate) fn unexpected(expect: u8, found: u8) -> ProtocolError {
        Self::Unexpected {
            expect: Some(expect),
            found,
            phase: None,
        }
    }

    pub(crate) fn eof(field: &'static str) -> ProtocolError {
        Self::UnexpectedEof { field }
    }
}
