//! Scripted fake backend for tests.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

use crate::{connection::Config, ext::BufMutExt};

/// Frontend frame read by the fake backend.
#[derive(Debug)]
pub struct Frame {
    pub msgtype: u8,
    pub body: Bytes,
}

/// Server half of an in memory connection.
pub struct MockServer {
    io: DuplexStream,
}

/// Create connected client io and fake backend.
pub fn pair() -> (DuplexStream, MockServer) {
    let (client, server) = duplex(8 * 1024);
    (client, MockServer { io: server })
}

pub fn config() -> Config {
    Config::default().user("md5test").password("secret").database("db")
}

impl MockServer {
    /// Read the untagged startup message, returns its key value pairs.
    pub async fn read_startup(&mut self) -> Vec<(String, String)> {
        let len = self.io.read_u32().await.unwrap() as usize;
        let mut body = vec![0u8; len - 4];
        self.io.read_exact(&mut body).await.unwrap();
        let mut body = Bytes::from(body);
        assert_eq!(body.get_u32(), crate::postgres::frontend::PROTOCOL_VERSION);

        let mut pairs = vec![];
        let mut parts = body.split(|b| *b == 0).map(|s| String::from_utf8(s.to_vec()).unwrap());
        while let Some(key) = parts.next() {
            if key.is_empty() {
                break;
            }
            pairs.push((key, parts.next().unwrap()));
        }
        pairs
    }

    /// Read one tagged frontend message.
    pub async fn read_frame(&mut self) -> Frame {
        let msgtype = self.io.read_u8().await.unwrap();
        let len = self.io.read_u32().await.unwrap() as usize;
        let mut body = vec![0u8; len - 4];
        self.io.read_exact(&mut body).await.unwrap();
        Frame { msgtype, body: body.into() }
    }

    /// Read tagged frontend messages, returns their types.
    pub async fn read_msgtypes(&mut self, n: usize) -> Vec<u8> {
        let mut types = Vec::with_capacity(n);
        for _ in 0..n {
            types.push(self.read_frame().await.msgtype);
        }
        types
    }

    /// Returns `true` once the client shut its write half down.
    pub async fn read_eof(&mut self) -> bool {
        let mut rest = vec![];
        matches!(self.io.read_to_end(&mut rest).await, Ok(0))
    }

    pub async fn write(&mut self, frames: &[BytesMut]) {
        for frame in frames {
            self.io.write_all(frame).await.unwrap();
        }
        self.io.flush().await.unwrap();
    }

    /// Answer startup with trust authentication.
    pub async fn accept(&mut self) {
        self.read_startup().await;
        self.write(&[
            auth(0, &[]),
            param("server_version", "16.2"),
            key_data(7, 42),
            ready(b'I'),
        ]).await;
    }
}

pub fn frame(msgtype: u8, body: impl FnOnce(&mut BytesMut)) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(msgtype);
    buf.put_u32(0);
    body(&mut buf);
    let len = (buf.len() - 1) as u32;
    buf[1..5].copy_from_slice(&len.to_be_bytes());
    buf
}

pub fn auth(code: i32, extra: &[u8]) -> BytesMut {
    frame(b'R', |b| {
        b.put_i32(code);
        b.put_slice(extra);
    })
}

pub fn param(name: &str, value: &str) -> BytesMut {
    frame(b'S', |b| {
        b.put_nul_string(name);
        b.put_nul_string(value);
    })
}

pub fn key_data(process_id: i32, secret_key: i32) -> BytesMut {
    frame(b'K', |b| {
        b.put_i32(process_id);
        b.put_i32(secret_key);
    })
}

pub fn ready(status: u8) -> BytesMut {
    frame(b'Z', |b| b.put_u8(status))
}

/// `RowDescription` with text format columns.
pub fn row_description(names: &[&str]) -> BytesMut {
    frame(b'T', |b| {
        b.put_i16(names.len() as i16);
        for name in names {
            b.put_nul_string(name);
            b.put_u32(0);
            b.put_i16(0);
            b.put_u32(25);
            b.put_i16(-1);
            b.put_i32(-1);
            b.put_i16(0);
        }
    })
}

pub fn data_row(values: &[Option<&str>]) -> BytesMut {
    frame(b'D', |b| {
        b.put_i16(values.len() as i16);
        for value in values {
            match value {
                Some(v) => {
                    b.put_i32(v.len() as i32);
                    b.put_slice(v.as_bytes());
                },
                None => b.put_i32(-1),
            }
        }
    })
}

pub fn command_complete(tag: &str) -> BytesMut {
    frame(b'C', |b| b.put_nul_string(tag))
}

pub fn error(code: &str, message: &str) -> BytesMut {
    fields(b'E', code, message)
}

pub fn notice(code: &str, message: &str) -> BytesMut {
    fields(b'N', code, message)
}

fn fields(msgtype: u8, code: &str, message: &str) -> BytesMut {
    let severity = if msgtype == b'E' { "ERROR" } else { "NOTICE" };
    frame(msgtype, |b| {
        b.put_u8(b'S');
        b.put_nul_string(severity);
        b.put_u8(b'C');
        b.put_nul_string(code);
        b.put_u8(b'M');
        b.put_nul_string(message);
        b.put_u8(0);
    })
}

pub fn unit(msgtype: u8) -> BytesMut {
    frame(msgtype, |_| {})
}
