//! Answer normalization
//!
//! Turns the raw answer text of a DNS query into an [`AnswerSet`]: a multiset
//! of answer tuples that compares equal regardless of record order but keeps
//! duplicate counts (round-robin pools often repeat addresses).

use crate::core::normalize_name;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The last token of dig's command echo header (`;; global options: +cmd`).
pub const COMMAND_ECHO_MARKER: &str = "+cmd";

/// Whether TTLs take part in answer comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlPolicy {
    /// TTLs must match exactly.
    #[default]
    Compare,
    /// TTLs are dropped from the comparison key.
    Ignore,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line_no}: expected 'name [ttl] class type value', got '{line}'")]
    MissingFields { line_no: usize, line: String },

    #[error("line {line_no}: invalid TTL '{ttl}'")]
    InvalidTtl { line_no: usize, ttl: String },
}

/// One normalized answer record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnswerRecord {
    pub name: String,
    pub ttl: Option<u32>,
    pub class: String,
    pub record_type: String,
    pub value: String,
}

impl fmt::Display for AnswerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ttl {
            Some(ttl) => write!(
                f,
                "{} {} {} {} {}",
                self.name, ttl, self.class, self.record_type, self.value
            ),
            None => write!(
                f,
                "{} {} {} {}",
                self.name, self.class, self.record_type, self.value
            ),
        }
    }
}

/// An order-insensitive, multiplicity-aware set of answer records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSet {
    records: BTreeMap<AnswerRecord, usize>,
}

impl AnswerSet {
    pub fn insert(&mut self, record: AnswerRecord) {
        *self.records.entry(record).or_insert(0) += 1;
    }

    /// How many times `record` occurs.
    pub fn count(&self, record: &AnswerRecord) -> usize {
        self.records.get(record).copied().unwrap_or(0)
    }

    /// Total number of records, duplicates included.
    pub fn len(&self) -> usize {
        self.records.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct records with their multiplicities, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&AnswerRecord, usize)> {
        self.records.iter().map(|(record, count)| (record, *count))
    }
}

impl FromIterator<AnswerRecord> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = AnswerRecord>>(iter: I) -> Self {
        let mut set = AnswerSet::default();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl fmt::Display for AnswerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.iter().map(|(record, count)| {
            if count > 1 {
                format!("{} (x{})", record, count)
            } else {
                record.to_string()
            }
        });
        write!(f, "[{}]", entries.format("; "))
    }
}

/// Normalizes a raw answer block, as printed by `dig +noall +answer`.
///
/// Everything up to and including the line carrying [`COMMAND_ECHO_MARKER`]
/// is discarded; input without the marker is parsed whole.
pub fn normalize(raw: &str, policy: TtlPolicy) -> Result<AnswerSet, ParseError> {
    normalize_lines(answer_section(raw).lines(), policy)
}

/// Normalizes individual answer lines. Blank lines and `;` comments are skipped.
pub fn normalize_lines<'a, I>(lines: I, policy: TtlPolicy) -> Result<AnswerSet, ParseError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = AnswerSet::default();
    for (idx, line) in lines.into_iter().enumerate() {
        if let Some(record) = parse_line(idx + 1, line, policy)? {
            set.insert(record);
        }
    }
    Ok(set)
}

fn answer_section(raw: &str) -> &str {
    match raw.find(COMMAND_ECHO_MARKER) {
        Some(idx) => {
            let rest = &raw[idx + COMMAND_ECHO_MARKER.len()..];
            match rest.find('\n') {
                Some(newline) => &rest[newline + 1..],
                None => "",
            }
        }
        None => raw,
    }
}

fn parse_line(
    line_no: usize,
    line: &str,
    policy: TtlPolicy,
) -> Result<Option<AnswerRecord>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') {
        return Ok(None);
    }

    let missing = || ParseError::MissingFields {
        line_no,
        line: line.to_string(),
    };

    let mut fields = line.split_whitespace().peekable();
    let name = fields.next().ok_or_else(missing)?;

    // The TTL column is absent when dig runs with +nottlid.
    let ttl = match fields.peek() {
        Some(token) if is_class(token) => None,
        Some(token) => {
            let parsed = token.parse::<u32>().map_err(|_| ParseError::InvalidTtl {
                line_no,
                ttl: token.to_string(),
            })?;
            fields.next();
            Some(parsed)
        }
        None => return Err(missing()),
    };

    let class = fields.next().ok_or_else(missing)?;
    if !is_class(class) {
        return Err(missing());
    }
    let record_type = fields.next().ok_or_else(missing)?;
    let value = fields.join(" ");
    if value.is_empty() {
        return Err(missing());
    }

    Ok(Some(AnswerRecord {
        name: normalize_name(name),
        ttl: match policy {
            TtlPolicy::Compare => ttl,
            TtlPolicy::Ignore => None,
        },
        class: class.to_ascii_uppercase(),
        record_type: record_type.to_ascii_uppercase(),
        value,
    }))
}

fn is_class(token: &str) -> bool {
    let upper = token.to_ascii_uppercase();
    matches!(upper.as_str(), "IN" | "CH" | "CS" | "HS" | "NONE" | "ANY")
        || upper.starts_with("CLASS")
}
