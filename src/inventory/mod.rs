//! Platform inventories and the inventory differ.
//!
//! An [`Inventory`] maps record types to the set of names a platform claims
//! to manage. The differ compares the name sets of two inventories; the
//! "present in both" list derived from them is the only input the consistency
//! checker ever probes.

pub mod client;
pub mod legacy;
pub mod platform;

pub use client::{build_http_client, Credentials};
pub use legacy::LegacyGtmSource;
pub use platform::PagedZoneSource;

use crate::core::{normalize_name, ComparisonResult, DomainRecord, RecordType};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{source_name}: request to {url} failed: {error}")]
    Transport {
        source_name: String,
        url: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name}: {url} returned HTTP {status}")]
    Status {
        source_name: String,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{source_name}: could not decode response from {url}: {error}")]
    Decode {
        source_name: String,
        url: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name}: invalid inventory response: {reason}")]
    Invalid { source_name: String, reason: String },
}

/// Names Source B serves that Source A does not know.
///
/// A non-empty gap blocks resolution checking for the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} domain(s) missing from Source A: {}", .missing.len(), .missing.iter().join(", "))]
pub struct InventoryGap {
    pub missing: BTreeSet<String>,
    /// The record types Source B lists each missing name under.
    pub records: Vec<DomainRecord>,
}

impl InventoryGap {
    /// One `MISSING_FROM_A` result per missing (name, type) entry.
    pub fn results(&self) -> Vec<ComparisonResult> {
        self.records
            .iter()
            .cloned()
            .map(ComparisonResult::missing_from_a)
            .collect()
    }
}

/// Returns every name in `authoritative` that is absent from `candidate`.
pub fn diff(authoritative: &BTreeSet<String>, candidate: &BTreeSet<String>) -> BTreeSet<String> {
    authoritative.difference(candidate).cloned().collect()
}

/// The domain names one platform manages, grouped by record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    by_type: BTreeMap<RecordType, BTreeSet<String>>,
}

impl Inventory {
    /// Builds an inventory from `(record type, name)` entries. Names are normalized.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (RecordType, S)>,
        S: AsRef<str>,
    {
        let mut by_type: BTreeMap<RecordType, BTreeSet<String>> = BTreeMap::new();
        for (record_type, name) in entries {
            by_type
                .entry(record_type)
                .or_default()
                .insert(normalize_name(name.as_ref()));
        }
        Self { by_type }
    }

    /// Names listed under `record_type`.
    pub fn names_of(&self, record_type: RecordType) -> impl Iterator<Item = &str> {
        self.by_type
            .get(&record_type)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Every name, regardless of record type.
    pub fn names(&self) -> BTreeSet<String> {
        self.by_type.values().flatten().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.by_type.values().any(|names| names.contains(&name))
    }

    /// Total number of (type, name) entries.
    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry as a [`DomainRecord`], in (type, name) order.
    pub fn records(&self) -> impl Iterator<Item = DomainRecord> + '_ {
        self.by_type.iter().flat_map(|(record_type, names)| {
            names
                .iter()
                .map(move |name| DomainRecord::new(name, *record_type))
        })
    }
}

/// Checks that Source A knows every name Source B serves.
pub fn find_gap(source_a: &Inventory, source_b: &Inventory) -> Option<InventoryGap> {
    let missing = diff(&source_b.names(), &source_a.names());
    if missing.is_empty() {
        return None;
    }
    let records = source_b
        .records()
        .filter(|record| missing.contains(record.name()))
        .collect();
    Some(InventoryGap { missing, records })
}

/// The pairs to probe: Source A's typed entries whose name Source B also serves.
pub fn present_in_both(source_a: &Inventory, source_b: &Inventory) -> Vec<DomainRecord> {
    let served_by_b = source_b.names();
    source_a
        .records()
        .filter(|record| served_by_b.contains(record.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_diff_is_set_difference() {
        let x = set(&["a.com.", "b.com.", "c.com."]);
        let y = set(&["b.com.", "d.com."]);
        assert_eq!(diff(&x, &y), set(&["a.com.", "c.com."]));
        assert_eq!(diff(&y, &x), set(&["d.com."]));
        assert_eq!(diff(&x, &BTreeSet::new()), x);
        assert!(diff(&BTreeSet::new(), &x).is_empty());
    }

    #[test]
    fn test_diff_with_itself_is_empty() {
        let x = set(&["a.com.", "b.com."]);
        assert!(diff(&x, &x).is_empty());
    }

    #[test]
    fn test_diff_direction_scenario() {
        let a = set(&["foo.com."]);
        let b = set(&["foo.com.", "bar.com."]);
        assert!(diff(&a, &b).is_empty());
        assert_eq!(diff(&b, &a), set(&["bar.com."]));
    }

    #[test]
    fn test_inventory_normalizes_names() {
        let inv = Inventory::from_entries([
            (RecordType::A, "WWW.Example.COM"),
            (RecordType::A, "www.example.com."),
        ]);
        assert_eq!(inv.len(), 1);
        assert!(inv.contains("www.example.com"));
        assert_eq!(inv.names(), set(&["www.example.com."]));
    }

    #[test]
    fn test_find_gap_reports_names_missing_from_a() {
        let a = Inventory::from_entries([(RecordType::A, "foo.com.")]);
        let b = Inventory::from_entries([
            (RecordType::A, "foo.com."),
            (RecordType::A, "bar.com."),
        ]);

        let gap = find_gap(&a, &b).expect("gap expected");
        assert_eq!(gap.missing, set(&["bar.com."]));
        let results = gap.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].domain.name(), "bar.com.");
        assert_eq!(results[0].verdict, crate::core::Verdict::MissingFromA);
        assert_eq!(results[0].attempts_used, 0);

        assert!(find_gap(&b, &a).is_none(), "names only in A are not a gap");
    }

    #[test]
    fn test_gap_display_lists_names() {
        let a = Inventory::default();
        let b = Inventory::from_entries([(RecordType::A, "b.com"), (RecordType::A, "a.com")]);
        let gap = find_gap(&a, &b).unwrap();
        assert_eq!(gap.to_string(), "2 domain(s) missing from Source A: a.com., b.com.");
    }

    #[test]
    fn test_present_in_both_keeps_source_a_types() {
        let a = Inventory::from_entries([
            (RecordType::A, "foo.com."),
            (RecordType::CNAME, "alias.com."),
            (RecordType::AAAA, "foo.com."),
            (RecordType::A, "legacy-only.com."),
        ]);
        let b = Inventory::from_entries([
            (RecordType::A, "foo.com."),
            (RecordType::A, "alias.com."),
        ]);

        let pairs = present_in_both(&a, &b);
        assert_eq!(
            pairs,
            vec![
                DomainRecord::new("foo.com.", RecordType::A),
                DomainRecord::new("foo.com.", RecordType::AAAA),
                DomainRecord::new("alias.com.", RecordType::CNAME),
            ]
        );
    }
}
