//! # Blocking Index
//!
//! Groups records by the tuple of values at a set of key fields. Used both
//! for the blocking passes of the matching engine and as the hash side of
//! registry joins.

use crate::model::{Record, RecordIndex, Table};
use hashbrown::HashMap;

/// Records grouped by their key tuple over `fields`
#[derive(Debug, Clone)]
pub struct BlockingIndex {
    fields: Vec<String>,
    /// Maps key tuple -> member records, ascending
    blocks: HashMap<Vec<String>, Vec<RecordIndex>>,
    /// Records whose key had a null component
    unkeyed: usize,
}

impl BlockingIndex {
    /// Build the index over every record of `table`.
    ///
    /// Records with any null (or absent) key component are left out: null
    /// never matches null.
    pub fn build(table: &Table, fields: &[String]) -> Self {
        let mut blocks: HashMap<Vec<String>, Vec<RecordIndex>> = HashMap::new();
        let mut unkeyed = 0;

        for (index, record) in table.iter_indexed() {
            match extract_key(record, fields) {
                Some(key) => blocks.entry(key).or_default().push(index),
                None => unkeyed += 1,
            }
        }

        Self {
            fields: fields.to_vec(),
            blocks,
            unkeyed,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Members sharing `key`, ascending; empty when the key is unknown
    pub fn lookup(&self, key: &[String]) -> &[RecordIndex] {
        self.blocks.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blocks with more than one member, ordered by their first member
    pub fn candidate_groups(&self) -> Vec<&[RecordIndex]> {
        let mut groups: Vec<&[RecordIndex]> = self
            .blocks
            .values()
            .filter(|members| members.len() > 1)
            .map(Vec::as_slice)
            .collect();
        groups.sort_unstable_by_key(|members| members[0]);
        groups
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of records left out because of a null key component
    pub fn unkeyed_count(&self) -> usize {
        self.unkeyed
    }
}

/// Key tuple of `record` over `fields`, `None` if any component is null
pub fn extract_key(record: &Record, fields: &[String]) -> Option<Vec<String>> {
    record.key_for(fields)
}
