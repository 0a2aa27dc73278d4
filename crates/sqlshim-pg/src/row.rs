//! Owned result rows.

/// A row returned from an execution: one raw text-format value per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<Vec<u8>>>,
}

impl Row {
    /// Create a row by copying the column slices of a DataRow.
    pub fn new(raw_values: Vec<Option<&[u8]>>) -> Self {
        let values = raw_values
            .into_iter()
            .map(|v| v.map(|d| d.to_vec()))
            .collect();
        Self { values }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw bytes of a column. `None` for SQL NULL or an out-of-range index.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Byte length of a column's value. `None` for SQL NULL or an out-of-range index.
    pub fn value_len(&self, index: usize) -> Option<usize> {
        self.get(index).map(<[u8]>::len)
    }

    /// Whether a column holds SQL NULL.
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }
}

impl From<Vec<Option<Vec<u8>>>> for Row {
    fn from(values: Vec<Option<Vec<u8>>>) -> Self {
        Self { values }
    }
}
