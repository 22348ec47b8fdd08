use std::fmt;

use crate::common::unit_error;

/// Server requested an authentication method other than trust or MD5.
pub struct UnsupportedAuth {
    pub(crate) method: &'static str,
    pub(crate) code: i32,
}

impl UnsupportedAuth {
    /// Authentication method name.
    pub fn method(&self) -> &str {
        self.method
    }

    /// Authentication request code.
    pub fn code(&self) -> i32 {
        self.code
    }
}

impl std::error::Error for UnsupportedAuth { }

impl fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported authentication method `{}` ({})", self.method, self.code)
    }
}

impl fmt::Debug for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

unit_error! {
    /// Connect and handshake did not finish before the configured deadline.
    pub struct Timeout("connection timed out");
}

unit_error! {
    /// Connection is closed, failed, or its worker is gone.
    pub struct ConnectionClosed("connection closed");
}
