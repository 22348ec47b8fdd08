//! Parameter encoding.
//!
//! All parameters are sent in text format, the server infers their types.
use bytes::Bytes;
use std::{borrow::Cow, fmt};

use crate::ext::FmtExt;

/// Value that can be encoded to be bound to sql parameter.
pub trait Encode {
    fn encode(self) -> Encoded;
}

/// Postgres encoded parameter value.
#[derive(Clone, PartialEq, Eq)]
pub struct Encoded {
    value: Option<Bytes>,
}

impl Encoded {
    /// Encoded `NULL`.
    pub const fn null() -> Encoded {
        Self { value: None }
    }

    /// Encoded text value.
    pub fn text(value: impl Into<Bytes>) -> Encoded {
        Self { value: Some(value.into()) }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Wire length of the value, -1 for `NULL`.
    pub(crate) fn size(&self) -> i32 {
        match &self.value {
            Some(value) => value.len() as i32,
            None => -1,
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match &self.value {
            Some(value) => &value[..],
            None => &[],
        }
    }
}

impl fmt::Debug for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => fmt::Debug::fmt(&value.lossy(), f),
            None => f.write_str("NULL"),
        }
    }
}

impl Encode for Encoded {
    fn encode(self) -> Encoded {
        self
    }
}

impl Encode for &str {
    fn encode(self) -> Encoded {
        Encoded::text(Bytes::copy_from_slice(self.as_bytes()))
    }
}

impl Encode for &String {
    fn encode(self) -> Encoded {
        self.as_str().encode()
    }
}

impl Encode for String {
    fn encode(self) -> Encoded {
        Encoded::text(self)
    }
}

impl Encode for Cow<'_, str> {
    fn encode(self) -> Encoded {
        match self {
            Cow::Borrowed(s) => s.encode(),
            Cow::Owned(s) => s.encode(),
        }
    }
}

impl Encode for &[u8] {
    fn encode(self) -> Encoded {
        Encoded::text(Bytes::copy_from_slice(self))
    }
}

impl Encode for Bytes {
    fn encode(self) -> Encoded {
        Encoded::text(self)
    }
}

impl Encode for bool {
    fn encode(self) -> Encoded {
        Encoded::text(Bytes::from_static(if self { b"t" } else { b"f" }))
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(self) -> Encoded {
        match self {
            Some(value) => value.encode(),
            None => Encoded::null(),
        }
    }
}

macro_rules! encode_int {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode(self) -> Encoded {
                let mut b = itoa::Buffer::new();
                Encoded::text(Bytes::copy_from_slice(b.format(self).as_bytes()))
            }
        }
    )*};
}

encode_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, isize, usize);

macro_rules! encode_float {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode(self) -> Encoded {
                let text = match self {
                    f if f.is_nan() => String::from("NaN"),
                    f if f == <$ty>::INFINITY => String::from("Infinity"),
                    f if f == <$ty>::NEG_INFINITY => String::from("-Infinity"),
                    f => f.to_string(),
                };
                Encoded::text(text)
            }
        }
    )*};
}

encode_float!(f32, f64);

/// Named parameter binding.
///
/// Parameters bind by position, the name only labels the value.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub value: Encoded,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Encode) -> Self {
        Self { name: name.into(), value: value.encode() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_text() {
        assert_eq!("abc".encode().as_slice(), b"abc");
        assert_eq!(String::from("x").encode().size(), 1);
        assert_eq!("".encode().size(), 0);
        assert!(!"".encode().is_null());
    }

    #[test]
    fn encode_numbers() {
        assert_eq!(42i32.encode().as_slice(), b"42");
        assert_eq!((-7i64).encode().as_slice(), b"-7");
        assert_eq!(u64::MAX.encode().as_slice(), b"18446744073709551615");
        assert_eq!(1.5f64.encode().as_slice(), b"1.5");
        assert_eq!(f32::NAN.encode().as_slice(), b"NaN");
        assert_eq!(f64::NEG_INFINITY.encode().as_slice(), b"-Infinity");
        assert_eq!(true.encode().as_slice(), b"t");
    }

    #[test]
    fn encode_null() {
        let null = Option::<&str>::None.encode();
        assert!(null.is_null());
        assert_eq!(null.size(), -1);
        assert!(null.as_slice().is_empty());
        assert_eq!(Some(5u8).encode(), 5u8.encode());
        assert_eq!(format!("{null:?}"), "NULL");
    }

    #[test]
    fn param_keeps_name() {
        let p = Param::new("id", 1);
        assert_eq!(p.name, "id");
        assert_eq!(p.value.as_slice(), b"1");
    }
}
