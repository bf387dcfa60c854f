use std::io::{Cursor, Read};

use crate::error::MapError;
use crate::value::Value;

/// Cursor position of a driver, seen as a positional array of named fields.
///
/// Index arguments are always below `field_count()`; decoders validate their
/// window before touching the row.
pub trait RowSource {
    fn field_count(&self) -> usize;

    fn field_name(&self, index: usize) -> &str;

    fn is_null(&self, index: usize) -> bool;

    fn raw_value(&self, index: usize) -> Result<Value, MapError>;

    /// Binary read in two calls.
    ///
    /// - `buffer = None`: returns the payload length remaining after `offset`.
    /// - `buffer = Some(buf)`: copies up to `buf.len()` bytes starting at
    ///   `offset` and returns the number copied.
    fn get_bytes(
        &self,
        index: usize,
        offset: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, MapError>;

    /// Live stream over a binary column, when the driver supports one.
    ///
    /// Default: `None`, decoders fall back to a buffered copy.
    fn open_stream(&self, _index: usize) -> Result<Option<Box<dyn Read + Send>>, MapError> {
        Ok(None)
    }
}

/// Owned row held in memory. Order of `columns` is the field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRow {
    columns: Vec<(String, Value)>,
    streaming: bool,
}

impl MemoryRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }

    /// Hand out live streams for binary columns instead of letting the
    /// decoder buffer them.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    fn binary(&self, index: usize) -> Result<&[u8], MapError> {
        match &self.columns[index].1 {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.as_bytes()),
            other => Err(MapError::row_source(format!(
                "field {index} '{}' holds {}, not binary data",
                self.columns[index].0,
                other.type_label()
            ))),
        }
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for MemoryRow {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(n, v)| (n.into(), v)).collect(),
            streaming: false,
        }
    }
}

impl RowSource for MemoryRow {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, index: usize) -> &str {
        &self.columns[index].0
    }

    fn is_null(&self, index: usize) -> bool {
        self.columns[index].1.is_null()
    }

    fn raw_value(&self, index: usize) -> Result<Value, MapError> {
        self.columns
            .get(index)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| MapError::row_source(format!("no field at index {index}")))
    }

    fn get_bytes(
        &self,
        index: usize,
        offset: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, MapError> {
        let data = self.binary(index)?;
        let remaining = data.get(offset..).unwrap_or_default();
        match buffer {
            None => Ok(remaining.len()),
            Some(buf) => {
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                Ok(n)
            }
        }
    }

    fn open_stream(&self, index: usize) -> Result<Option<Box<dyn Read + Send>>, MapError> {
        if !self.streaming {
            return Ok(None);
        }
        let data = self.binary(index)?.to_vec();
        Ok(Some(Box::new(Cursor::new(data))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_row() -> MemoryRow {
        MemoryRow::new()
            .with("id", 1)
            .with("payload", vec![1u8, 2, 3, 4, 5])
    }

    #[test]
    fn probe_then_fetch() {
        let row = blob_row();
        assert_eq!(row.get_bytes(1, 0, None).unwrap(), 5);
        assert_eq!(row.get_bytes(1, 3, None).unwrap(), 2);

        let mut buf = [0u8; 3];
        assert_eq!(row.get_bytes(1, 1, Some(&mut buf)).unwrap(), 3);
        assert_eq!(buf, [2, 3, 4]);
    }

    #[test]
    fn offset_past_end_reads_nothing() {
        let row = blob_row();
        assert_eq!(row.get_bytes(1, 10, None).unwrap(), 0);
    }

    #[test]
    fn non_binary_column_is_rejected() {
        let err = blob_row().get_bytes(0, 0, None).unwrap_err();
        assert!(matches!(err, MapError::Source(msg) if msg.contains("Int32")));
    }

    #[test]
    fn streams_only_when_enabled() {
        let row = blob_row();
        assert!(row.open_stream(1).unwrap().is_none());

        let mut stream = row.streaming(true).open_stream(1).unwrap().unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn collects_from_pairs() {
        let row: MemoryRow = [("a", Value::Null), ("b", Value::from(2i64))]
            .into_iter()
            .collect();
        assert_eq!(row.field_count(), 2);
        assert_eq!(row.field_name(1), "b");
        assert!(row.is_null(0));
        assert_eq!(row.raw_value(1).unwrap(), Value::Int64(2));
    }
}
