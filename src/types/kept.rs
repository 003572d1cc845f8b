//! Per-file kept-line maps.
//!
//! Lines are 0-indexed here (presumed line minus one) so that a file's
//! `FileLines` can be zipped with the file's text directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::canonical_hash_hex;

/// Retain flags for the lines of one file.
///
/// Grows on demand; lines past the end are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileLines(Vec<bool>);

impl FileLines {
    /// Empty flag vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `line`, growing the vector if needed.
    pub fn keep(&mut self, line: usize) {
        if line >= self.0.len() {
            self.0.resize(line + 1, false);
        }
        self.0[line] = true;
    }

    /// Whether `line` is kept.
    pub fn is_kept(&self, line: usize) -> bool {
        self.0.get(line).copied().unwrap_or(false)
    }

    /// Number of tracked lines (one past the last line ever kept).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no line was ever tracked.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices of the kept lines, ascending.
    pub fn kept(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(line, &kept)| kept.then_some(line))
    }

    /// Number of kept lines.
    pub fn kept_count(&self) -> usize {
        self.0.iter().filter(|&&kept| kept).count()
    }

    /// Whether every line kept here is also kept in `other`.
    pub fn is_subset_of(&self, other: &FileLines) -> bool {
        self.kept().all(|line| other.is_kept(line))
    }
}

/// Kept lines of every file touched by a carve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeptLines(BTreeMap<String, FileLines>);

impl KeptLines {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep 0-indexed `line` of `file`.
    pub fn keep(&mut self, file: &str, line: usize) {
        match self.0.get_mut(file) {
            Some(lines) => lines.keep(line),
            None => {
                let mut lines = FileLines::new();
                lines.keep(line);
                self.0.insert(file.to_string(), lines);
            }
        }
    }

    /// Whether 0-indexed `line` of `file` is kept.
    pub fn is_kept(&self, file: &str, line: usize) -> bool {
        self.0.get(file).is_some_and(|lines| lines.is_kept(line))
    }

    /// Flags of one file.
    pub fn file(&self, name: &str) -> Option<&FileLines> {
        self.0.get(name)
    }

    /// Names of the files with at least one tracked line.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate files and their flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileLines)> {
        self.0.iter().map(|(name, lines)| (name.as_str(), lines))
    }

    /// Whether nothing is kept.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|lines| lines.kept_count() == 0)
    }

    /// Total kept lines across files.
    pub fn kept_count(&self) -> usize {
        self.0.values().map(FileLines::kept_count).sum()
    }

    /// Whether every line kept here is also kept in `other`.
    pub fn is_subset_of(&self, other: &KeptLines) -> bool {
        self.0.iter().all(|(name, lines)| match other.file(name) {
            Some(theirs) => lines.is_subset_of(theirs),
            None => lines.kept_count() == 0,
        })
    }

    /// Canonical xxh64 fingerprint of the map.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_grows_on_demand() {
        let mut lines = FileLines::new();
        lines.keep(4);
        assert_eq!(lines.len(), 5);
        assert!(lines.is_kept(4));
        assert!(!lines.is_kept(0));
        assert!(!lines.is_kept(100));
        assert_eq!(lines.kept().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_subset() {
        let mut small = KeptLines::new();
        small.keep("a.c", 1);

        let mut large = KeptLines::new();
        large.keep("a.c", 1);
        large.keep("a.c", 3);
        large.keep("b.h", 0);

        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
        assert!(KeptLines::new().is_subset_of(&small));
    }

    #[test]
    fn test_serializes_as_file_map() {
        let mut kept = KeptLines::new();
        kept.keep("main.c", 1);
        let json = serde_json::to_string(&kept).unwrap();
        assert_eq!(json, r#"{"main.c":[false,true]}"#);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut a = KeptLines::new();
        a.keep("main.c", 0);
        let mut b = KeptLines::new();
        b.keep("main.c", 0);
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.keep("main.c", 2);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
