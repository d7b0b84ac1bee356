//! Per-level change record for [`JsonMeta`](crate::JsonMeta)

use indexmap::IndexSet;

/// Keys changed at one level of a tree, in the order they were first marked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRecord {
    updated: IndexSet<String>,
}

impl UpdateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key; returns false if it was already marked
    pub fn mark_dirty(&mut self, key: &str) -> bool {
        if self.updated.contains(key) {
            return false;
        }
        self.updated.insert(key.to_string())
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.updated.contains(key)
    }

    pub fn updated_fields(&self) -> impl Iterator<Item = &str> {
        self.updated.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.updated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }

    pub fn clear(&mut self) {
        self.updated.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_keeps_first_order() {
        let mut record = UpdateRecord::new();
        assert!(record.mark_dirty("b"));
        assert!(record.mark_dirty("a"));
        assert!(!record.mark_dirty("b"));

        assert_eq!(record.updated_fields().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(record.is_dirty("a"));
        assert!(!record.is_dirty("c"));

        record.clear();
        assert!(record.is_empty());
    }
}
