//! Core domain types and service traits for dnsreconcile
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::answer::AnswerSet;
use crate::inventory::{Inventory, InventoryError};
use crate::probe::{ProbeError, ResolverTarget};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The record types the two platforms manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    MX,
    NAPTR,
    SRV,
}

impl RecordType {
    /// Every supported record type, in enumeration order.
    pub const ALL: [RecordType; 6] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::CNAME,
        RecordType::MX,
        RecordType::NAPTR,
        RecordType::SRV,
    ];

    /// The canonical (uppercase) mnemonic, as used in DNS presentation format.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CNAME => "CNAME",
            RecordType::MX => "MX",
            RecordType::NAPTR => "NAPTR",
            RecordType::SRV => "SRV",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported record type '{0}'")]
pub struct UnknownRecordType(pub String);

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|rt| rt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

impl TryFrom<String> for RecordType {
    type Error = UnknownRecordType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

/// Lowercases a domain name and ensures it carries exactly one trailing dot.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('.');
    let mut name = trimmed.to_ascii_lowercase();
    name.push('.');
    name
}

/// A (name, record type) pair identifying one thing to probe.
///
/// The name is always fully qualified, lowercase and dot-terminated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DomainRecord {
    name: String,
    record_type: RecordType,
}

impl DomainRecord {
    pub fn new(name: &str, record_type: RecordType) -> Self {
        Self {
            name: normalize_name(name),
            record_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }
}

impl fmt::Display for DomainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.record_type)
    }
}

/// The classification of a (domain, record type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Both platforms returned the same answers.
    Consistent,
    /// The answers still differed after the retry budget was spent.
    Divergent,
    /// Source B serves the name but Source A does not know it.
    MissingFromA,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Consistent => "CONSISTENT",
            Verdict::Divergent => "DIVERGENT",
            Verdict::MissingFromA => "MISSING_FROM_A",
        };
        f.write_str(s)
    }
}

/// The outcome of reconciling one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub domain: DomainRecord,
    pub verdict: Verdict,
    /// Number of Source B probes issued (0 for names never probed).
    pub attempts_used: u32,
    pub last_a: AnswerSet,
    pub last_b: AnswerSet,
    /// The error of Source A's probe, if it failed.
    pub error_a: Option<String>,
    /// The error of the last Source B probe, if it failed.
    pub error_b: Option<String>,
    /// Source B probes that failed, including ones a later retry recovered from.
    pub b_failures: u32,
}

impl ComparisonResult {
    /// A result for a name Source A does not know. Such names are never probed.
    pub fn missing_from_a(domain: DomainRecord) -> Self {
        Self {
            domain,
            verdict: Verdict::MissingFromA,
            attempts_used: 0,
            last_a: AnswerSet::default(),
            last_b: AnswerSet::default(),
            error_a: None,
            error_b: None,
            b_failures: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.verdict == Verdict::Consistent
    }
}

/// A single report-only observation of both platforms, without a verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub domain: DomainRecord,
    pub answer_a: AnswerSet,
    pub answer_b: AnswerSet,
    pub error_a: Option<String>,
    pub error_b: Option<String>,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Enumerates the domain names one platform claims to manage.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// A short label for logs (e.g. "source-a").
    fn name(&self) -> &str;

    /// Fetches the complete inventory.
    ///
    /// # Returns
    /// * `Ok(Inventory)` once every page/record type has been read
    /// * `Err` on any transport, authentication or decoding failure
    async fn fetch(&self) -> Result<Inventory, InventoryError>;
}

/// Issues one live DNS query against a specific resolver.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Queries `target` for `record` and returns the raw answer text.
    ///
    /// # Returns
    /// * `Ok(String)` with one answer record per line (may contain a command header)
    /// * `Err(ProbeError)` when the resolver is unreachable or the query fails
    async fn probe(&self, target: &ResolverTarget, record: &DomainRecord)
        -> Result<String, ProbeError>;
}
