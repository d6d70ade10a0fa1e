//! Fact extraction and conflict detection over the indexed corpus.
//!
//! Both passes scan every stored chunk with a fixed set of compiled
//! pattern rules: date-bearing phrases for contract expirations, and
//! `company:` / `address:` labels for cross-document consistency checks.
//! Extraction is deliberately regex-based and heuristic; it makes no
//! attempt at general entity recognition.
//!
//! Address attribution is positional: an address belongs to the nearest
//! preceding `company:` label within the same chunk scan, and an address
//! seen before any company label is dropped. This is a heuristic, not a
//! guarantee of semantic correctness.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::index::{IndexError, VectorIndex};
use crate::models::{Chunk, ConflictFinding, ExpirationFinding};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("bulk read from index failed: {0}")]
    BulkRead(#[from] IndexError),
}

/// The named pattern rules, compiled once and reused across scans.
pub struct PatternSet {
    expiration: Vec<Regex>,
    company: Regex,
    address: Regex,
}

impl PatternSet {
    pub fn new() -> Self {
        let date = r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})";
        let expiration = [
            "expiration date",
            "expires",
            "end date",
            "termination date",
        ]
        .iter()
        .map(|phrase| Regex::new(&format!(r"(?i){}:?\s*{}", phrase, date)).unwrap())
        .collect();

        Self {
            expiration,
            company: Regex::new(r"(?i)company:?\s*([^\n]+)").unwrap(),
            address: Regex::new(r"(?i)address:?\s*([^\n]+)").unwrap(),
        }
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan the whole corpus for contracts expiring within `window_days` of
/// `today`. A bulk-read fault is returned to the caller so it can be told
/// apart from an empty corpus.
pub async fn extract_expirations(
    index: &dyn VectorIndex,
    patterns: &PatternSet,
    today: NaiveDate,
    window_days: i64,
) -> Result<Vec<ExpirationFinding>, AnalysisError> {
    let chunks = index.get_all().await?;
    Ok(scan_expirations(patterns, &chunks, today, window_days))
}

/// Scan the whole corpus for companies recorded with conflicting addresses.
pub async fn detect_conflicts(
    index: &dyn VectorIndex,
    patterns: &PatternSet,
) -> Result<Vec<ConflictFinding>, AnalysisError> {
    let chunks = index.get_all().await?;
    Ok(scan_conflicts(patterns, &chunks))
}

/// Pure expiration scan over chunks. Window is inclusive on both ends:
/// `today <= date <= today + window_days`. Unparseable date tokens are
/// skipped; every in-window match is retained, one finding per match.
pub fn scan_expirations(
    patterns: &PatternSet,
    chunks: &[Chunk],
    today: NaiveDate,
    window_days: i64,
) -> Vec<ExpirationFinding> {
    let threshold = today + chrono::Duration::days(window_days);
    let mut findings = Vec::new();

    for chunk in chunks {
        let document = document_name(chunk);
        for pattern in &patterns.expiration {
            for cap in pattern.captures_iter(&chunk.text) {
                let token = match cap.get(1) {
                    Some(m) => m.as_str(),
                    None => continue,
                };
                let date = match parse_date_token(token) {
                    Some(d) => d,
                    None => {
                        debug!("skipping unparseable date token: {}", token);
                        continue;
                    }
                };
                if today <= date && date <= threshold {
                    findings.push(ExpirationFinding {
                        document: document.clone(),
                        date,
                        days_until_expiration: (date - today).num_days(),
                    });
                }
            }
        }
    }

    findings
}

/// Pure conflict scan over chunks. Company keys are lowercased; addresses
/// are lowercased before comparison so casing differences do not fabricate
/// conflicts.
pub fn scan_conflicts(patterns: &PatternSet, chunks: &[Chunk]) -> Vec<ConflictFinding> {
    struct CompanyRecord {
        addresses: BTreeMap<String, Vec<String>>,
        documents: Vec<String>,
    }

    let mut companies: BTreeMap<String, CompanyRecord> = BTreeMap::new();

    for chunk in chunks {
        let document = document_name(chunk);

        // Merge company and address labels into one positional stream.
        let mut labels: Vec<(usize, bool, String)> = Vec::new();
        for cap in patterns.company.captures_iter(&chunk.text) {
            if let Some(m) = cap.get(1) {
                labels.push((m.start(), true, m.as_str().trim().to_lowercase()));
            }
        }
        for cap in patterns.address.captures_iter(&chunk.text) {
            if let Some(m) = cap.get(1) {
                labels.push((m.start(), false, m.as_str().trim().to_lowercase()));
            }
        }
        labels.sort_by_key(|(pos, _, _)| *pos);

        let mut current_company: Option<String> = None;
        for (_, is_company, value) in labels {
            if value.is_empty() {
                continue;
            }
            if is_company {
                let record = companies.entry(value.clone()).or_insert_with(|| {
                    CompanyRecord {
                        addresses: BTreeMap::new(),
                        documents: Vec::new(),
                    }
                });
                record.documents.push(document.clone());
                current_company = Some(value);
            } else {
                match current_company.as_ref().and_then(|c| companies.get_mut(c)) {
                    Some(record) => {
                        record
                            .addresses
                            .entry(value)
                            .or_default()
                            .push(document.clone());
                    }
                    None => {
                        debug!("dropping address with no preceding company label");
                    }
                }
            }
        }
    }

    companies
        .into_iter()
        .filter(|(_, record)| record.addresses.len() > 1)
        .map(|(company, record)| {
            let addresses: BTreeMap<String, Vec<String>> = record
                .addresses
                .into_iter()
                .map(|(addr, docs)| (addr, dedup_preserving_order(docs)))
                .collect();
            ConflictFinding {
                company,
                issue: "Multiple addresses found for the same company".to_string(),
                addresses,
                documents: dedup_preserving_order(record.documents),
            }
        })
        .collect()
}

fn document_name(chunk: &Chunk) -> String {
    if chunk.source.is_empty() {
        "Unknown".to_string()
    } else {
        chunk.source.clone()
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

/// Parse an `M/D/Y` or `M-D-Y` token. A 2-digit year is normalized by
/// prefixing `20`. Returns `None` for tokens that are not a real calendar
/// date.
fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let sep = if token.contains('/') { '/' } else { '-' };
    let parts: Vec<&str> = token.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }

    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let year_str = if parts[2].len() == 2 {
        format!("20{}", parts[2])
    } else {
        parts[2].to_string()
    };
    let year: i32 = year_str.parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}
