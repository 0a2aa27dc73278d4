//! Column descriptors, re-typed on every access.
//!
//! A column has no fixed type. Each read states the representation it wants
//! and the value is decoded again from the backend's stored row into a buffer
//! shaped by the current row's length cell.

use std::ffi::CStr;

use crate::backend::PreparedStatement;
use crate::error::{Error, Result};

/// The representation last requested for a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnKind {
    #[default]
    Unset,
    Integer,
    Text,
}

/// The decoded value held by a column descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnValue {
    /// Not read since the last row change.
    #[default]
    Unset,
    Null,
    Integer(i64),
    /// Value bytes followed by one NUL terminator.
    Text(Vec<u8>),
}

/// One result column's descriptor.
#[derive(Debug, Clone, Default)]
pub struct ColumnSlot {
    kind: ColumnKind,
    length: Option<usize>,
    value: ColumnValue,
}

impl ColumnSlot {
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Value length of the current row, `None` for NULL or no row.
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn value(&self) -> &ColumnValue {
        &self.value
    }

    /// Record the value length for a newly fetched row.
    pub fn refresh_length(&mut self, length: Option<usize>) {
        self.length = length;
        if !matches!(self.value, ColumnValue::Text(_)) {
            self.value = ColumnValue::Unset;
        }
    }

    /// Forget the current row.
    pub fn clear_row(&mut self) {
        self.length = None;
        self.value = ColumnValue::Unset;
    }

    /// Decode column `index` of the current row as an integer (0 for NULL).
    pub fn decode_integer<S: PreparedStatement>(&mut self, stmt: &S, index: usize) -> Result<i64> {
        self.kind = ColumnKind::Integer;
        match stmt.read_integer(index)? {
            Some(v) => {
                self.value = ColumnValue::Integer(v);
                Ok(v)
            }
            None => {
                self.value = ColumnValue::Null;
                Ok(0)
            }
        }
    }

    /// Decode column `index` of the current row as a NUL-terminated byte string.
    ///
    /// The buffer is sized from the length cell plus one terminator byte and
    /// reused only while that size stays the same.
    pub fn decode_text<S: PreparedStatement>(
        &mut self,
        stmt: &S,
        index: usize,
    ) -> Result<Option<&CStr>> {
        self.kind = ColumnKind::Text;
        let Some(len) = self.length else {
            self.value = ColumnValue::Null;
            return Ok(None);
        };

        let mut buf = match std::mem::take(&mut self.value) {
            ColumnValue::Text(mut buf) if buf.len() == len + 1 => {
                buf.fill(0);
                buf
            }
            _ => vec![0u8; len + 1],
        };
        if stmt.read_text(index, &mut buf[..len])?.is_none() {
            self.value = ColumnValue::Null;
            return Ok(None);
        }

        self.value = ColumnValue::Text(buf);
        match &self.value {
            ColumnValue::Text(buf) => CStr::from_bytes_until_nul(buf)
                .map(Some)
                .map_err(|_| Error::Backend("text buffer lost its terminator".to_string())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ColumnMeta;

    /// A one-row statement holding text-form values.
    struct OneRow(Vec<Option<&'static str>>);

    impl PreparedStatement for OneRow {
        fn param_count(&self) -> usize {
            0
        }
        fn columns(&self) -> Option<&[ColumnMeta]> {
            None
        }
        fn update_max_length(&mut self, _enabled: bool) {}
        fn fetch(&mut self) -> Result<bool> {
            Ok(true)
        }
        fn column_length(&self, index: usize) -> Option<usize> {
            self.0.get(index).copied().flatten().map(str::len)
        }
        fn read_integer(&self, index: usize) -> Result<Option<i64>> {
            Ok(self.0[index].map(|d| d.parse().unwrap_or(0)))
        }
        fn read_text(&self, index: usize, buf: &mut [u8]) -> Result<Option<usize>> {
            Ok(self.0[index].map(|d| {
                let n = d.len().min(buf.len());
                buf[..n].copy_from_slice(&d.as_bytes()[..n]);
                d.len()
            }))
        }
    }

    fn slot_for(stmt: &OneRow, index: usize) -> ColumnSlot {
        let mut slot = ColumnSlot::default();
        slot.refresh_length(stmt.column_length(index));
        slot
    }

    #[test]
    fn test_same_value_as_integer_and_text() {
        let stmt = OneRow(vec![Some("42")]);
        let mut slot = slot_for(&stmt, 0);

        assert_eq!(slot.decode_integer(&stmt, 0).unwrap(), 42);
        assert_eq!(slot.kind(), ColumnKind::Integer);
        assert_eq!(slot.decode_text(&stmt, 0).unwrap(), Some(c"42"));
        assert_eq!(slot.kind(), ColumnKind::Text);
        assert_eq!(slot.value(), &ColumnValue::Text(b"42\0".to_vec()));
        assert_eq!(slot.decode_integer(&stmt, 0).unwrap(), 42);
    }

    #[test]
    fn test_null_column() {
        let stmt = OneRow(vec![None]);
        let mut slot = slot_for(&stmt, 0);
        assert_eq!(slot.decode_integer(&stmt, 0).unwrap(), 0);
        assert_eq!(slot.decode_text(&stmt, 0).unwrap(), None);
        assert_eq!(slot.value(), &ColumnValue::Null);
    }

    #[test]
    fn test_buffer_follows_row_length() {
        let mut slot = ColumnSlot::default();

        let first = OneRow(vec![Some("Volkswagen")]);
        slot.refresh_length(first.column_length(0));
        assert_eq!(slot.decode_text(&first, 0).unwrap(), Some(c"Volkswagen"));

        let second = OneRow(vec![Some("Audi")]);
        slot.refresh_length(second.column_length(0));
        assert_eq!(slot.decode_text(&second, 0).unwrap(), Some(c"Audi"));
        assert_eq!(slot.value(), &ColumnValue::Text(b"Audi\0".to_vec()));

        let third = OneRow(vec![Some("Opel")]);
        slot.refresh_length(third.column_length(0));
        assert_eq!(slot.decode_text(&third, 0).unwrap(), Some(c"Opel"));
    }

    #[test]
    fn test_empty_text_is_not_null() {
        let stmt = OneRow(vec![Some("")]);
        let mut slot = slot_for(&stmt, 0);
        assert_eq!(slot.decode_text(&stmt, 0).unwrap(), Some(c""));
    }

    #[test]
    fn test_cleared_row_reads_neutral() {
        let stmt = OneRow(vec![Some("7")]);
        let mut slot = slot_for(&stmt, 0);
        slot.clear_row();
        assert_eq!(slot.length(), None);
        assert_eq!(slot.decode_text(&stmt, 0).unwrap(), None);
    }
}
