//! Parameter bind descriptors.

use std::borrow::Cow;

use tracing::debug;

/// A value bound to one placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParamValue {
    /// SQL NULL. Unbound placeholders stay here.
    #[default]
    Null,
    Integer(i64),
    /// Owned copy of the caller's bytes.
    Text(Vec<u8>),
}

impl ParamValue {
    /// The text-format wire representation, `None` for NULL.
    pub fn to_text(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            ParamValue::Null => None,
            ParamValue::Integer(v) => Some(Cow::Owned(v.to_string().into_bytes())),
            ParamValue::Text(bytes) => Some(Cow::Borrowed(bytes.as_slice())),
        }
    }
}

/// Number of bytes of `value` a text bind stores.
///
/// An explicit length is clamped to the slice. Without one, the value runs to
/// the first NUL byte (or the whole slice if there is none).
pub fn text_length(value: &[u8], len: Option<usize>) -> usize {
    match len {
        Some(n) => n.min(value.len()),
        None => value.iter().position(|&b| b == 0).unwrap_or(value.len()),
    }
}

/// The parameter descriptors of one statement, addressed by 0-based index.
#[derive(Debug, Clone, Default)]
pub struct Params {
    slots: Vec<ParamValue>,
}

impl Params {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ParamValue::Null; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Replace the value at `index`, dropping the previous buffer.
    ///
    /// Returns `false` (and changes nothing) when `index` is out of range.
    pub fn set(&mut self, index: usize, value: ParamValue) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                debug!(index, count = self.slots.len(), "bind index out of range, ignored");
                false
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.slots.get(index)
    }

    pub fn as_slice(&self) -> &[ParamValue] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
