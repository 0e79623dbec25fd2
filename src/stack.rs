//! The interpreter's data stack.

use crate::{codec::encode_script_num, error::ScriptError};

/// LIFO stack of byte strings; depth arguments count from the top (0 = top).
///
/// Size limits are enforced by the interpreter, which sees the alt-stack too.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ScriptStack {
    items: Vec<Vec<u8>>,
}

impl ScriptStack {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, data: Vec<u8>) {
        self.items.push(data);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push(if value { vec![1] } else { Vec::new() });
    }

    pub fn push_num(&mut self, value: i64) {
        self.push(encode_script_num(value));
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.items.pop().ok_or(ScriptError::InvalidStackOperation)
    }

    /// Element `depth` positions below the top.
    pub fn top(&self, depth: usize) -> Result<&[u8], ScriptError> {
        self.index_of(depth).map(|index| self.items[index].as_slice())
    }

    pub fn remove(&mut self, depth: usize) -> Result<Vec<u8>, ScriptError> {
        let index = self.index_of(depth)?;
        Ok(self.items.remove(index))
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), ScriptError> {
        let (a, b) = (self.index_of(a)?, self.index_of(b)?);
        self.items.swap(a, b);
        Ok(())
    }

    /// Pushes copies of the `count` elements starting `depth` below the top,
    /// preserving their order.
    pub fn copy_range(&mut self, depth: usize, count: usize) -> Result<(), ScriptError> {
        let start = self.index_of(depth)?;
        let end = start + count;
        if end > self.items.len() {
            return Err(ScriptError::InvalidStackOperation);
        }
        self.items.extend_from_within(start..end);
        Ok(())
    }

    /// Fails unless at least `count` elements are present.
    pub fn require(&self, count: usize) -> Result<(), ScriptError> {
        if self.items.len() < count {
            Err(ScriptError::InvalidStackOperation)
        } else {
            Ok(())
        }
    }

    pub fn last(&self) -> Option<&[u8]> {
        self.items.last().map(Vec::as_slice)
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.items.iter().map(Vec::as_slice)
    }

    fn index_of(&self, depth: usize) -> Result<usize, ScriptError> {
        self.items
            .len()
            .checked_sub(depth + 1)
            .ok_or(ScriptError::InvalidStackOperation)
    }
}
