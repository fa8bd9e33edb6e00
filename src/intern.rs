// tecount: Transposable element quantification from sequencing reads.
//
// Copyright 2026 tecount contributors.
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use indexmap::IndexSet;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct NotInterned(String);

impl std::fmt::Display for NotInterned {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} is not in the interning table", self.0)
    }
}

impl std::error::Error for NotInterned {}

/// Bidirectional mapping between dense integer keys and distinct strings.
///
/// Annotation columns are highly redundant (many copies of one TE share a
/// family name), so each column stores every distinct value once and rows
/// refer to it by key. Keys are assigned in first-seen order starting from 0
/// and stay contiguous; entries are never removed, which keeps keys stable
/// for the whole run.
///
/// ## Usage
///
/// ```rust
/// use tecount::intern::InternTable;
///
/// let mut table = InternTable::new();
/// assert_eq!(table.add("LINE1"), 0);
/// assert_eq!(table.add("SINE1"), 1);
/// assert_eq!(table.add("LINE1"), 0);
///
/// assert_eq!(table.value(1).unwrap(), "SINE1");
/// assert_eq!(table.key("LINE1").unwrap(), 0);
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InternTable {
    values: IndexSet<String>,
}

impl InternTable {
    pub fn new() -> Self {
        Self { values: IndexSet::new() }
    }

    /// Interns `value` and returns its key.
    ///
    /// Returns the existing key if `value` has been seen before, otherwise
    /// assigns the next sequential key.
    pub fn add(&mut self, value: &str) -> usize {
        if let Some(key) = self.values.get_index_of(value) {
            key
        } else {
            self.values.insert_full(value.to_string()).0
        }
    }

    /// Looks up the value stored under `key`.
    pub fn value(&self, key: usize) -> Result<&str, E> {
        self.values
            .get_index(key)
            .map(|value| value.as_str())
            .ok_or_else(|| Box::new(NotInterned(format!("key {}", key))) as E)
    }

    /// Looks up the key assigned to `value`.
    pub fn key(&self, value: &str) -> Result<usize, E> {
        self.values
            .get_index_of(value)
            .ok_or_else(|| Box::new(NotInterned(format!("value '{}'", value))) as E)
    }

    /// Number of distinct values interned so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn add_is_idempotent() {
        use super::InternTable;

        let mut table = InternTable::new();
        let first = table.add("L1MdA");
        let second = table.add("L1MdA");

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn keys_are_dense_and_first_seen_ordered() {
        use super::InternTable;

        let values = ["LINE", "SINE", "LTR", "SINE", "DNA", "LINE"];

        let mut table = InternTable::new();
        let keys: Vec<usize> = values.iter().map(|value| table.add(value)).collect();

        assert_eq!(keys, vec![0, 1, 2, 1, 3, 0]);
        assert_eq!(table.len(), 4);
        for key in 0..table.len() {
            assert!(table.value(key).is_ok());
        }
    }

    #[test]
    fn lookup_roundtrip() {
        use super::InternTable;

        let mut table = InternTable::new();
        table.add("LINE");
        table.add("SINE");

        assert_eq!(table.value(table.key("SINE").unwrap()).unwrap(), "SINE");
        assert_eq!(table.key(table.value(0).unwrap()).unwrap(), 0);
    }

    #[test]
    fn absent_entries_are_not_found() {
        use super::InternTable;

        let mut table = InternTable::new();
        table.add("LINE");

        assert!(table.value(1).is_err());
        assert!(table.key("SINE").is_err());
    }
}
