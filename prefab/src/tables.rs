//! Deduplicated, index-addressed reference tables.
//!
//! A document references assets, classes, and names by `i32` index into
//! three per-document tables; `-1` is the null sentinel. Indices are
//! valid only within the document that owns the tables. Lookups with an
//! out-of-range index resolve to `None`, which callers treat as null.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The null sentinel for table indices.
pub const NONE_INDEX: i32 = -1;

/// The three reference tables of one document: asset paths, class names,
/// and interned names. Append-only within a single save; a fresh instance
/// is owned per call.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReferenceTables {
    assets: Vec<String>,
    classes: Vec<String>,
    names: Vec<String>,
    #[serde(skip)]
    asset_lookup: HashMap<String, i32>,
    #[serde(skip)]
    class_lookup: HashMap<String, i32>,
    #[serde(skip)]
    name_lookup: HashMap<String, i32>,
}

fn find_or_add(list: &mut Vec<String>, lookup: &mut HashMap<String, i32>, value: &str) -> i32 {
    if value.is_empty() {
        return NONE_INDEX;
    }
    if let Some(&index) = lookup.get(value) {
        return index;
    }
    let index = list.len() as i32;
    list.push(value.to_owned());
    lookup.insert(value.to_owned(), index);
    index
}

fn by_index(list: &[String], index: i32) -> Option<&str> {
    if index < 0 {
        return None;
    }
    list.get(index as usize).map(|s| s.as_str())
}

impl ReferenceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from raw table contents, e.g. after wire decoding.
    pub(crate) fn from_parts(assets: Vec<String>, classes: Vec<String>, names: Vec<String>) -> Self {
        let mut tables = Self {
            assets,
            classes,
            names,
            ..Default::default()
        };
        for (i, value) in tables.assets.iter().enumerate() {
            tables.asset_lookup.insert(value.clone(), i as i32);
        }
        for (i, value) in tables.classes.iter().enumerate() {
            tables.class_lookup.insert(value.clone(), i as i32);
        }
        for (i, value) in tables.names.iter().enumerate() {
            tables.name_lookup.insert(value.clone(), i as i32);
        }
        tables
    }

    pub fn find_or_add_asset(&mut self, path: &str) -> i32 {
        find_or_add(&mut self.assets, &mut self.asset_lookup, path)
    }

    pub fn find_or_add_class(&mut self, name: &str) -> i32 {
        find_or_add(&mut self.classes, &mut self.class_lookup, name)
    }

    pub fn find_or_add_name(&mut self, name: &str) -> i32 {
        find_or_add(&mut self.names, &mut self.name_lookup, name)
    }

    pub fn asset_by_index(&self, index: i32) -> Option<&str> {
        by_index(&self.assets, index)
    }

    pub fn class_by_index(&self, index: i32) -> Option<&str> {
        by_index(&self.classes, index)
    }

    pub fn name_by_index(&self, index: i32) -> Option<&str> {
        by_index(&self.names, index)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
