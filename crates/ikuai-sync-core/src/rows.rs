//! Deduplicated row sets and chunking
//!
//! A [`RowSet`] collects the normalized rows of every source URL of one job
//! run. Its iteration order is unspecified; the device treats groups as
//! unordered collections.

use std::collections::HashSet;

use crate::job::ResourceKind;
use crate::normalize::normalize;

/// Unique, normalized rows for one job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    kind: ResourceKind,
    rows: HashSet<String>,
}

impl RowSet {
    /// Create an empty set normalizing rows for `kind`
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            rows: HashSet::new(),
        }
    }

    /// Normalize and collect raw rows
    pub fn collect<I, S>(kind: ResourceKind, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new(kind);
        set.extend(rows);
        set
    }

    /// Normalize one raw row and insert it
    ///
    /// Returns `true` if the row was valid and not already present.
    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize(self.kind, raw) {
            Some(row) => self.rows.insert(row),
            None => false,
        }
    }

    /// Normalize and insert many raw rows
    pub fn extend<I, S>(&mut self, rows: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for row in rows {
            self.insert(row.as_ref());
        }
    }

    /// Number of unique rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no valid row was collected
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a canonical row is present
    pub fn contains(&self, row: &str) -> bool {
        self.rows.contains(row)
    }

    /// Iterate over the rows in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.rows.iter()
    }

    /// Freeze into a sequence suitable for chunking
    pub fn into_vec(self) -> Vec<String> {
        self.rows.into_iter().collect()
    }
}

/// Split entries into contiguous chunks of at most `size` entries
///
/// The last chunk may be smaller. A `size` of zero is treated as one.
///
/// ```
/// use ikuai_sync_core::rows::chunks;
///
/// let rows: Vec<String> = (0..5).map(|i| i.to_string()).collect();
/// let sizes: Vec<usize> = chunks(&rows, 2).map(|c| c.len()).collect();
/// assert_eq!(sizes, vec![2, 2, 1]);
/// ```
pub fn chunks(entries: &[String], size: usize) -> impl Iterator<Item = &[String]> {
    entries.chunks(size.max(1))
}

/// Number of chunks [`chunks`] yields for `len` entries
pub fn chunk_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}
