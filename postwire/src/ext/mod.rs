use bytes::{Buf, BufMut, Bytes};

use crate::postgres::ProtocolError;

/// Integer signess in postgres docs is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while sometime postgres want `u32`,
    /// this will panic when overflow instead of wrapping.
    ///
    /// Callers check message size against the frame limit before encoding.
    fn to_u32(self) -> u32;
    /// Length is `usize` in rust, while sometime postgres want `u16`,
    /// this will panic when overflow instead of wrapping.
    fn to_u16(self) -> u16;
}

/// Nul string operation.
pub trait StrExt {
    /// String length plus nul (1).
    fn nul_string_len(&self) -> u32;
}

/// Nul string operation in [`BufMut`]
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

/// Checked reads of a message body.
///
/// The body is already framed, so running out of bytes here means the
/// backend declared fields it did not send.
pub trait BytesExt {
    /// Read one octet.
    fn read_byte(&mut self) -> Result<u8, ProtocolError>;

    /// Read big-endian `Int16`.
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;

    /// Read big-endian `Int32`.
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;

    /// Read exactly `n` octets.
    fn read_nbytes(&mut self, n: usize) -> Result<Bytes, ProtocolError>;

    /// Read octets until nul, the nul is consumed but not returned.
    fn read_nul_bytes(&mut self) -> Result<Bytes, ProtocolError>;

    /// Read nul terminated utf8 string.
    fn read_cstring(&mut self) -> Result<String, ProtocolError>;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u16(self) -> u16 {
        self.try_into().expect("message size too large for protocol")
    }
}

impl StrExt for str {
    fn nul_string_len(&self) -> u32 {
        self.len().to_u32() + 1/* nul */
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

macro_rules! ensure {
    ($self:ident, $n:expr, $what:literal) => {
        if $self.remaining() < $n {
            return Err(ProtocolError::eof($what));
        }
    };
}

impl BytesExt for Bytes {
    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        ensure!(self, 1, "Byte1");
        Ok(self.get_u8())
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        ensure!(self, 2, "Int16");
        Ok(self.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        ensure!(self, 4, "Int32");
        Ok(self.get_i32())
    }

    fn read_nbytes(&mut self, n: usize) -> Result<Bytes, ProtocolError> {
        ensure!(self, n, "Byten");
        Ok(self.split_to(n))
    }

    fn read_nul_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        let Some(end) = self.iter().position(|e| matches!(e, b'\0')) else {
            return Err(ProtocolError::eof("String"));
        };
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        Ok(me)
    }

    fn read_cstring(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.read_nul_bytes()?;
        String::from_utf8(bytes.into()).map_err(|e| ProtocolError::Utf8(e.utf8_error()))
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
