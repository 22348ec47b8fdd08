//! `ErrorResponse` and `NoticeResponse` fields.
//!
//! <https://www.postgresql.org/docs/current/protocol-error-fields.html>
use bytes::{Buf, Bytes};
use std::fmt;

use super::ProtocolError;
use crate::ext::BytesExt;

/// Identified field codes.
pub mod field {
    /// Severity: the field contents are `ERROR`, `FATAL`, or `PANIC` (in an error message),
    /// or `WARNING`, `NOTICE`, `DEBUG`, `INFO`, or `LOG` (in a notice message),
    /// or a localized translation of one of these. Always present.
    pub const SEVERITY: u8 = b'S';
    /// Severity, never localized. Present only in messages generated by PostgreSQL versions 9.6 and later.
    pub const SEVERITY_NONLOCALIZED: u8 = b'V';
    /// Code: the SQLSTATE code for the error. Not localizable. Always present.
    pub const CODE: u8 = b'C';
    /// Message: the primary human-readable error message. Always present.
    pub const MESSAGE: u8 = b'M';
    /// Detail: an optional secondary error message carrying more detail about the problem.
    pub const DETAIL: u8 = b'D';
    /// Hint: an optional suggestion what to do about the problem.
    pub const HINT: u8 = b'H';
    /// Position: the field value is a decimal ASCII integer, indicating an error cursor
    /// position as an index into the original query string.
    pub const POSITION: u8 = b'P';
    /// Where: an indication of the context in which the error occurred.
    pub const WHERE: u8 = b'W';
    /// File: the file name of the source-code location where the error was reported.
    pub const FILE: u8 = b'F';
    /// Line: the line number of the source-code location where the error was reported.
    pub const LINE: u8 = b'L';
    /// Routine: the name of the source-code routine reporting the error.
    pub const ROUTINE: u8 = b'R';
}

/// Identified fields of an `ErrorResponse` or `NoticeResponse`.
///
/// The message body consists of one or more identified fields, followed by a zero byte as a terminator.
/// Fields can appear in any order.
///
/// For each field there is the following:
///
/// `Byte1` A code identifying the field type; if zero, this is the message terminator and no string follows.
/// Since more field types might be added in future,
/// frontends should silently ignore fields of unrecognized type.
///
/// `String` The field value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(u8, String)>,
}

impl Fields {
    /// Decode fields until the terminator or the end of message body.
    pub(crate) fn decode(body: &mut Bytes) -> Result<Fields, ProtocolError> {
        let mut me = Fields::default();
        while body.has_remaining() {
            let code = body.read_byte()?;
            if code == b'\0' {
                break;
            }
            let value = body.read_cstring()?;
            me.insert(code, value);
        }
        Ok(me)
    }

    fn insert(&mut self, code: u8, value: String) {
        match self.entries.iter_mut().find(|(c, _)| *c == code) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((code, value)),
        }
    }

    /// Get field by its code.
    pub fn get(&self, code: u8) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(c, v)| (*c == code).then_some(v.as_str()))
    }

    /// Severity, e.g. `ERROR`, `FATAL`, `NOTICE`.
    pub fn severity(&self) -> &str {
        self.get(field::SEVERITY).unwrap_or_default()
    }

    /// SQLSTATE code.
    pub fn code(&self) -> &str {
        self.get(field::CODE).unwrap_or_default()
    }

    /// The primary human-readable message.
    pub fn message(&self) -> &str {
        self.get(field::MESSAGE).unwrap_or_default()
    }

    pub fn detail(&self) -> Option<&str> {
        self.get(field::DETAIL)
    }

    pub fn hint(&self) -> Option<&str> {
        self.get(field::HINT)
    }

    /// Error cursor position, one based index into the query string.
    pub fn position(&self) -> Option<u32> {
        self.get(field::POSITION).and_then(|p| p.parse().ok())
    }

    pub fn where_(&self) -> Option<&str> {
        self.get(field::WHERE)
    }

    pub fn file(&self) -> Option<&str> {
        self.get(field::FILE)
    }

    pub fn line(&self) -> Option<u32> {
        self.get(field::LINE).and_then(|p| p.parse().ok())
    }

    pub fn routine(&self) -> Option<&str> {
        self.get(field::ROUTINE)
    }

    /// Iterate fields in the order the backend sent them.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.entries.iter().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity(), self.message())?;
        if let Some(code) = self.get(field::CODE) {
            write!(f, " ({code})")?;
        }
        if let Some(detail) = self.detail() {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = self.hint() {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for (code, value) in self.iter() {
            dbg.entry(&(code as char), &value);
        }
        dbg.finish()
    }
}

/// An error reported by the backend.
///
/// Statement level errors leave the connection usable.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseError {
    fields: Fields,
}

impl DatabaseError {
    pub(crate) fn new(fields: Fields) -> Self {
        Self { fields }
    }

    /// Returns all identified fields.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}

impl std::ops::Deref for DatabaseError {
    type Target = Fields;

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.fields, f)
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
