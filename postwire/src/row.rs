//! Postgres row operation.
//!
//! - [`Row`]
//! - [`Value`]
use bytes::Bytes;
use std::fmt;

use crate::{
    ext::FmtExt,
    postgres::{
        PgFormat, ProtocolError,
        backend::{DataRow, FieldDescriptor},
    },
};

/// Column value.
///
/// Values are never coerced, the variant follows the column format code.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Text format value.
    Text(String),
    /// Binary format value.
    Binary(Bytes),
}

impl Value {
    /// Return `true` if value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns text value, [`None`] for `NULL` or binary value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns raw bytes of either text or binary value.
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.as_bytes()),
            Value::Binary(b) => Some(&b[..]),
        }
    }

    fn decode(format: PgFormat, value: Option<Bytes>) -> Result<Value, ProtocolError> {
        let Some(value) = value else {
            return Ok(Value::Null);
        };
        match format {
            PgFormat::Text => String::from_utf8(value.into())
                .map(Value::Text)
                .map_err(|e| ProtocolError::Utf8(e.utf8_error())),
            PgFormat::Binary => Ok(Value::Binary(value)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) => fmt::Debug::fmt(s, f),
            Value::Binary(b) => fmt::Debug::fmt(&b.lossy(), f),
        }
    }
}

/// Postgres row.
///
/// Columns keep the order of the preceding `RowDescription`. A repeated
/// column name overwrites the value of the earlier column.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Assemble a `DataRow` against its `RowDescription`.
    pub(crate) fn decode(fields: &[FieldDescriptor], data: DataRow) -> Result<Row, ProtocolError> {
        if fields.len() != data.values.len() {
            return Err(ProtocolError::ColumnCount {
                expect: fields.len(),
                found: data.values.len(),
            });
        }

        let mut row = Row { columns: Vec::with_capacity(fields.len()) };
        for (field, value) in fields.iter().zip(data.values) {
            let value = Value::decode(field.format(), value)?;
            row.insert(&field.name, value);
        }
        Ok(row)
    }

    fn insert(&mut self, name: &str, value: Value) {
        match self.columns.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, v)) => *v = value,
            None => self.columns.push((name.to_owned(), value)),
        }
    }

    /// Get value by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n.as_str() == name).map(|(_, v)| v)
    }

    /// Get value by column position.
    pub fn get_idx(&self, idx: usize) -> Option<&Value> {
        self.columns.get(idx).map(|(_, v)| v)
    }

    /// Returns column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate column name and value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);

    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for (name, value) in &self.columns {
            dbg.entry(name, value);
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn field(name: &str, format_code: i16) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into(),
            table_oid: 0,
            attribute_number: 0,
            type_oid: 25,
            type_size: -1,
            type_modifier: -1,
            format_code,
        }
    }

    #[test]
    fn decode_text_and_null() {
        let fields = [field("id", 0), field("name", 0)];
        let data = DataRow { values: vec![Some(Bytes::from_static(b"1")), None] };

        let row = Row::decode(&fields, data).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Text("1".into())));
        assert_eq!(row.get("name"), Some(&Value::Null));
        assert!(row.get("name").unwrap().is_null());
        assert_eq!(row.get_idx(0).and_then(Value::as_str), Some("1"));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(format!("{row:?}"), r#"{"id": "1", "name": NULL}"#);
    }

    #[test]
    fn empty_text_is_not_null() {
        let row = Row::decode(&[field("v", 0)], DataRow { values: vec![Some(Bytes::new())] }).unwrap();
        assert_eq!(row.get("v").and_then(Value::as_str), Some(""));
    }

    #[test]
    fn binary_format_keeps_bytes() {
        let data = DataRow { values: vec![Some(Bytes::from_static(&[0, 0, 0, 7]))] };
        let row = Row::decode(&[field("n", 1)], data).unwrap();
        assert_eq!(row.get("n"), Some(&Value::Binary(Bytes::from_static(&[0, 0, 0, 7]))));
        assert_eq!(row.get("n").unwrap().as_str(), None);
        assert_eq!(row.get("n").unwrap().as_bytes(), Some(&[0u8, 0, 0, 7][..]));
    }

    #[test]
    fn duplicate_name_overwrites() {
        let fields = [field("a", 0), field("a", 0)];
        let data = DataRow { values: vec![Some(Bytes::from_static(b"1")), Some(Bytes::from_static(b"2"))] };
        let row = Row::decode(&fields, data).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("a").and_then(Value::as_str), Some("2"));
    }

    #[test]
    fn column_count_mismatch() {
        let data = DataRow { values: vec![None] };
        let err = Row::decode(&[field("a", 0), field("b", 0)], data).unwrap_err();
        assert!(matches!(err, ProtocolError::ColumnCount { expect: 2, found: 1 }));
    }

    #[test]
    fn invalid_utf8_text() {
        let data = DataRow { values: vec![Some(Bytes::from_static(&[0xff, 0xfe]))] };
        assert!(matches!(Row::decode(&[field("a", 0)], data), Err(ProtocolError::Utf8(_))));
    }
}
