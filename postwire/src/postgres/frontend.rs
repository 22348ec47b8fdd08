//! Postgres Frontend Messages
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{BufMut, BytesMut};

use super::{Oid, PgFormat};
use crate::{
    encode::Encoded,
    ext::{BufMutExt, StrExt, UsizeExt},
};

/// The protocol version number, `3.0`.
///
/// The most significant 16 bits are the major version number (3 for the protocol described here).
/// The least significant 16 bits are the minor version number (0 for the protocol described here).
pub const PROTOCOL_VERSION: u32 = 196_608;

/// Write a frontend message to `buf`.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    // msgtype + length
    const PREFIX: usize = 1 + 4;

    let size_hint = msg.size_hint();
    buf.reserve(PREFIX + size_hint as usize);

    let offset = buf.len();
    buf.put_u8(F::MSGTYPE);
    buf.put_u32(4 + size_hint);

    msg.encode(&mut *buf);

    debug_assert_eq!(
        buf.len() - offset,
        PREFIX + size_hint as usize,
        "Frontend message body size not equal to size hint"
    );
}

/// A type which can be encoded into postgres frontend message
pub trait FrontendProtocol {
    /// Message type.
    const MSGTYPE: u8;

    /// Size of the main body.
    ///
    /// Note that this is **only** the size of main body as oppose of actual postgres message which
    /// include the length itself.
    fn size_hint(&self) -> u32;

    /// Write the main body of the message.
    ///
    /// The lenght of body written must be equal to the
    /// length returned by [`size_hint`][FrontendProtocol::size_hint].
    fn encode(self, buf: impl BufMut);
}

/// Postgres Startup frontend message
///
/// For historical reasons, the very first message sent by the client (the [`Startup`] message)
/// has no initial message-type byte, thus [`Startup`] does not implement [`FrontendProtocol`].
///
/// To write startup message, use [`Startup::write`].
#[derive(Debug)]
pub struct Startup<'a> {
    /// The database user name to connect as. Required; there is no default.
    pub user: &'a str,
    /// The database to connect to. Defaults to the user name.
    pub database: Option<&'a str>,
    /// Reported in `pg_stat_activity`.
    pub application_name: Option<&'a str>,
    /// Session character set, rows are decoded as utf8.
    pub client_encoding: Option<&'a str>,
}

impl Startup<'_> {
    pub fn write(self, buf: &mut BytesMut) {
        let offset = buf.len();

        // Length of message contents in bytes, including self.
        // reserve 4 bytes for length
        buf.put_u32(0);

        buf.put_u32(PROTOCOL_VERSION);

        // The protocol version number is followed by one or more pairs of parameter name and value strings.

        buf.put_nul_string("user");
        buf.put_nul_string(self.user);

        if let Some(db) = self.database {
            buf.put_nul_string("database");
            buf.put_nul_string(db);
        }

        // Other parameters are treated as run-time parameters to be set at backend start time.

        if let Some(app) = self.application_name {
            buf.put_nul_string("application_name");
            buf.put_nul_string(app);
        }

        if let Some(encoding) = self.client_encoding {
            buf.put_nul_string("client_encoding");
            buf.put_nul_string(encoding);
        }

        // A zero byte is required as a terminator after the last name/value pair.
        buf.put_u8(b'\0');

        // write the length
        let mut written_buf = &mut buf[offset..];
        written_buf.put_u32(written_buf.len().to_u32());
    }
}

/// Identifies the message as a password response.
#[derive(Debug)]
pub struct PasswordMessage<'a> {
    /// The password (encrypted, if requested)
    pub password: &'a str,
}

impl FrontendProtocol for PasswordMessage<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        self.password.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.password);
    }
}

/// Identifies the message as a simple query
pub struct Query<'a> {
    /// the query string itself
    pub sql: &'a str,
}

impl FrontendProtocol for Query<'_> {
    const MSGTYPE: u8 = b'Q';

    fn size_hint(&self) -> u32 {
        self.sql.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.sql);
    }
}

/// Identifies the message as a Parse command
pub struct Parse<'a,I> {
    /// prepared statement name (an empty string selects the unnamed prepared statement).
    pub prepare_name: &'a str,
    /// The query string to be parsed.
    pub sql: &'a str,
    /// The number of parameter data types specified (can be zero).
    ///
    /// Note that this is not an indication of the number of parameters that might appear in the query string,
    /// only the number that the frontend wants to prespecify types for.
    pub oids_len: u16,
    /// Specifies the object ID of the parameter data type.
    ///
    /// Placing a zero here is equivalent to leaving the type unspecified.
    pub oids: I,
}

impl<I> FrontendProtocol for Parse<'_,I>
where
    I: IntoIterator<Item = Oid>
{
    const MSGTYPE: u8 = b'P';

    fn size_hint(&self) -> u32 {
        self.prepare_name.nul_string_len()
            + self.sql.nul_string_len()
            + size_of::<u16>() as u32
            + self.oids_len as u32 * size_of::<Oid>() as u32
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.prepare_name);
        buf.put_nul_string(self.sql);
        buf.put_u16(self.oids_len);
        for oid in self.oids.into_iter().take(self.oids_len as usize) {
            buf.put_u32(oid);
        }
    }
}

/// Identifies the message as a Describe command.
pub struct Describe<'a> {
    /// 'S' to describe a prepared statement; or 'P' to describe a portal.
    pub kind: u8,
    /// The name of the prepared statement or portal to describe
    /// (an empty string selects the unnamed prepared statement or portal).
    pub name: &'a str,
}

impl FrontendProtocol for Describe<'_> {
    const MSGTYPE: u8 = b'D';

    fn size_hint(&self) -> u32 {
        1 + self.name.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_nul_string(self.name);
    }
}

/// Identifies the message as a Bind command.
pub struct Bind<'a> {
    /// The name of the destination portal (an empty string selects the unnamed portal).
    pub portal_name: &'a str,
    /// The name of the source prepared statement (an empty string selects the unnamed prepared statement).
    pub stmt_name: &'a str,
    /// Format code written once per parameter.
    pub param_format: PgFormat,
    /// Parameter values, `NULL` is written as length -1 with no value bytes.
    pub params: &'a [Encoded],
    /// Single format code applied to all result columns.
    pub result_format: PgFormat,
}

impl FrontendProtocol for Bind<'_> {
    const MSGTYPE: u8 = b'B';

    fn size_hint(&self) -> u32 {
        let params_len = self.params.len().to_u32();
        self.portal_name.nul_string_len()
            + self.stmt_name.nul_string_len()
            // param format codes
            + 2 + 2 * params_len
            // param values
            + 2 + self.params.iter().fold(0, |acc, n| acc + 4 + n.as_slice().len().to_u32())
            // result format codes
            + 2 + 2
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_nul_string(self.stmt_name);

        buf.put_u16(self.params.len().to_u16());
        for _ in self.params {
            buf.put_i16(self.param_format.format_code());
        }

        buf.put_u16(self.params.len().to_u16());
        for param in self.params {
            // can be -1 for NULL
            buf.put_i32(param.size());
            buf.put_slice(param.as_slice());
        }

        buf.put_u16(1);
        buf.put_i16(self.result_format.format_code());
    }
}

/// Identifies the message as a Execute command
pub struct Execute<'a> {
    /// The name of the portal to execute (an empty string selects the unnamed portal).
    pub portal_name: &'a str,
    /// Maximum number of rows to return, if portal contains a query that returns rows
    /// (ignored otherwise). Zero denotes “no limit”.
    pub max_row: u32,
}

impl FrontendProtocol for Execute<'_> {
    const MSGTYPE: u8 = b'E';

    fn size_hint(&self) -> u32 {
        self.portal_name.nul_string_len() + size_of::<u32>() as u32
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_u32(self.max_row);
    }
}

/// Identifies the message as a Sync command
pub struct Sync;

impl FrontendProtocol for Sync {
    const MSGTYPE: u8 = b'S';

    fn size_hint(&self) -> u32 { 0 }

    fn encode(self, _: impl BufMut) { }
}

/// Identifies the message as a termination.
pub struct Terminate;

impl FrontendProtocol for Terminate {
    const MSGTYPE: u8 = b'X';

    fn size_hint(&self) -> u32 { 0 }

    fn encode(self, _: impl BufMut) { }
}

#[cfg(test)]
mod test {
    use bytes::Buf;

    use super::*;
    use crate::encode::Encode;

    fn frame<F: FrontendProtocol>(msg: F) -> BytesMut {
        let mut buf = BytesMut::new();
        write(msg, &mut buf);
        buf
    }

    #[test]
    fn startup_length() {
        let mut buf = BytesMut::new();
        Startup { user: "u", database: Some("d"), application_name: None, client_encoding: None }
            .write(&mut buf);

        let len = buf.get_u32();
        assert_eq!(len, 4 + 5 + 2 + 9 + 2 + 1 + 4);
        assert_eq!(len as usize, buf.len() + 4);
        assert_eq!(buf.get_u32(), PROTOCOL_VERSION);
        assert_eq!(&buf[..], b"user\0u\0database\0d\0\0");
    }

    #[test]
    fn query_frame() {
        let mut buf = frame(Query { sql: "SELECT 1" });
        assert_eq!(buf.get_u8(), b'Q');
        // text + nul + length itself
        assert_eq!(buf.get_u32(), 8 + 1 + 4);
        assert_eq!(&buf[..], b"SELECT 1\0");
    }

    #[test]
    fn password_frame() {
        let mut buf = frame(PasswordMessage { password: "md5abc" });
        assert_eq!(buf.get_u8(), b'p');
        assert_eq!(buf.get_u32(), 4 + 7);
        assert_eq!(&buf[..], b"md5abc\0");
    }

    #[test]
    fn parse_frame() {
        let mut buf = frame(Parse { prepare_name: "", sql: "SELECT $1", oids_len: 2, oids: [0, 0] });
        assert_eq!(buf.get_u8(), b'P');
        assert_eq!(buf.get_u32() as usize, buf.len() + 4);
        assert_eq!(&buf[..11], b"\0SELECT $1\0");
        buf.advance(11);
        assert_eq!(buf.get_u16(), 2);
        assert_eq!(buf.get_u32(), 0);
        assert_eq!(buf.get_u32(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn bind_frame() {
        let params = [ "abc".encode(), Option::<i32>::None.encode() ];
        let mut buf = frame(Bind {
            portal_name: "",
            stmt_name: "",
            param_format: PgFormat::Text,
            params: &params,
            result_format: PgFormat::Text,
        });

        assert_eq!(buf.get_u8(), b'B');
        assert_eq!(buf.get_u32() as usize, buf.len() + 4);
        assert_eq!(buf.get_u16(), 0); // portal + stmt nul
        assert_eq!(buf.get_u16(), 2);
        assert_eq!(buf.get_i16(), 0);
        assert_eq!(buf.get_i16(), 0);
        assert_eq!(buf.get_u16(), 2);
        assert_eq!(buf.get_i32(), 3);
        assert_eq!(&buf.split_to(3)[..], b"abc");
        assert_eq!(buf.get_i32(), -1);
        assert_eq!(buf.get_u16(), 1);
        assert_eq!(buf.get_i16(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn execute_describe_sync_frames() {
        let mut buf = frame(Describe { kind: b'S', name: "" });
        assert_eq!(&buf.split_to(5)[..], &[b'D', 0, 0, 0, 6]);
        assert_eq!(&buf[..], b"S\0");

        let buf = frame(Execute { portal_name: "", max_row: 0 });
        assert_eq!(&buf[..], &[b'E', 0, 0, 0, 9, 0, 0, 0, 0, 0]);

        assert_eq!(&frame(Sync)[..], &[b'S', 0, 0, 0, 4]);
        assert_eq!(&frame(Terminate)[..], &[b'X', 0, 0, 0, 4]);
    }
}
