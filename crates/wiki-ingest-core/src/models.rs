//! Core data models shared by the extractor, merger, and catalog stores.
//!
//! A [`CharacterRecord`] starts life as a *candidate* produced by
//! [`extract`](crate::extract), becomes *accepted* once the merger has
//! assigned it an identity key and validated its shape, and is finally
//! owned by a [`CatalogStore`](crate::store::CatalogStore) after commit.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionError;

/// A character as extracted from a wiki page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Stable identity key. `None` (or a malformed value) on candidates
    /// that the source did not tag; the merger fills it in.
    pub id: Option<String>,
    pub name: String,
    pub universe: String,
    pub role: String,
    pub rarity: String,
    pub level: u32,
    pub description: Option<String>,
    /// Absolute image URL from the infobox, if any.
    pub image: Option<String>,
    /// Page the record was extracted from.
    pub source_url: Option<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    /// Any other labelled infobox rows, keyed by label.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CharacterRecord {
    /// Returns a copy of the record carrying the given identity key.
    pub fn with_id(&self, key: &str) -> Self {
        let mut record = self.clone();
        record.id = Some(key.to_string());
        record
    }

    /// Field-by-field equality ignoring `source_url`.
    ///
    /// The same character found on two pages is the same content.
    pub fn same_content(&self, other: &Self) -> bool {
        let CharacterRecord {
            id,
            name,
            universe,
            role,
            rarity,
            level,
            description,
            image,
            source_url: _,
            stats,
            abilities,
            attributes,
        } = self;
        *id == other.id
            && *name == other.name
            && *universe == other.universe
            && *role == other.role
            && *rarity == other.rarity
            && *level == other.level
            && *description == other.description
            && *image == other.image
            && *stats == other.stats
            && *abilities == other.abilities
            && *attributes == other.attributes
    }

    /// Short human label used in logs and reports.
    pub fn label(&self) -> String {
        if self.universe.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.universe)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    pub icon: String,
    pub description: String,
    pub damage: Damage,
    /// Seconds; never negative.
    pub cooldown: f64,
}

/// Ability damage as printed on the wiki: either a single value or a
/// `min-max` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Damage {
    Scalar { value: f64 },
    Range { min: f64, max: f64 },
}

impl Damage {
    /// Parse `"120"` or `"100-150"`. Negative or non-finite values and
    /// inverted ranges are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some((lo, hi)) = raw.split_once('-') {
            let min = parse_non_negative(lo)?;
            let max = parse_non_negative(hi)?;
            if min > max {
                return None;
            }
            return Some(Damage::Range { min, max });
        }
        parse_non_negative(raw).map(|value| Damage::Scalar { value })
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            Damage::Scalar { value } => value.is_finite() && value >= 0.0,
            Damage::Range { min, max } => {
                min.is_finite() && max.is_finite() && min >= 0.0 && min <= max
            }
        }
    }
}

impl fmt::Display for Damage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Damage::Scalar { value } => write!(f, "{}", value),
            Damage::Range { min, max } => write!(f, "{}-{}", min, max),
        }
    }
}

/// Parse a finite, non-negative decimal number.
pub fn parse_non_negative(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// The game or universe a wiki is about, read from its landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseInfo {
    pub url: String,
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Raw content of one fetched wiki page.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// Number of network attempts it took to get this page.
    pub attempts: u32,
}

impl RawPage {
    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml")
    }
}

/// A request to ingest one wiki.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub source_url: String,
    /// Explicit page list. When set, no link discovery happens.
    #[serde(default)]
    pub pages: Option<Vec<String>>,
}

impl IngestionRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            pages: None,
        }
    }

    pub fn with_pages(mut self, pages: Vec<String>) -> Self {
        self.pages = Some(pages);
        self
    }
}

/// Terminal state of one ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestionStatus::Done => "done",
            IngestionStatus::Failed => "failed",
            IngestionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Why a candidate (or a whole page) did not make it into the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    InvalidUrl { message: String },
    FetchError { transient: bool, message: String },
    ExtractionError { message: String },
    Conflict { existing: Box<CharacterRecord> },
    InvalidRecord { message: String },
    StoreCommit { message: String },
}

impl RejectReason {
    /// Stable short code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::InvalidUrl { .. } => "InvalidUrl",
            RejectReason::FetchError { .. } => "FetchError",
            RejectReason::ExtractionError { .. } => "ExtractionError",
            RejectReason::Conflict { .. } => "conflict",
            RejectReason::InvalidRecord { .. } => "InvalidRecord",
            RejectReason::StoreCommit { .. } => "StoreCommit",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidUrl { message }
            | RejectReason::ExtractionError { message }
            | RejectReason::InvalidRecord { message }
            | RejectReason::StoreCommit { message } => write!(f, "{}: {}", self.code(), message),
            RejectReason::FetchError { transient, message } => {
                let kind = if *transient { "transient" } else { "permanent" };
                write!(f, "FetchError ({}): {}", kind, message)
            }
            RejectReason::Conflict { existing } => {
                write!(f, "conflict: differs from catalog record {}", existing.label())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub candidate: Option<CharacterRecord>,
    pub page_url: Option<String>,
    pub reason: RejectReason,
}

/// A catalog record replaced under the overwrite policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub old: CharacterRecord,
    pub new: CharacterRecord,
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub source_url: String,
    pub timestamp: DateTime<Utc>,
    pub status: IngestionStatus,
    pub pages_fetched: usize,
    /// Landing page metadata, when the source page was fetched for discovery.
    #[serde(default)]
    pub universe: Option<UniverseInfo>,
    /// Newly inserted records.
    pub accepted: Vec<CharacterRecord>,
    /// Records overwritten because overwrite was allowed.
    pub updated: Vec<RecordUpdate>,
    /// Candidates identical to what the catalog already holds.
    pub skipped: Vec<CharacterRecord>,
    pub rejected: Vec<Rejection>,
    /// Field-level detail for every `ExtractionError` rejection.
    #[serde(default)]
    pub extraction_errors: Vec<ExtractionError>,
}

impl IngestionResult {
    pub fn new(source_url: &str, status: IngestionStatus) -> Self {
        Self {
            source_url: source_url.to_string(),
            timestamp: Utc::now(),
            status,
            pages_fetched: 0,
            universe: None,
            accepted: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
            rejected: Vec::new(),
            extraction_errors: Vec::new(),
        }
    }

    /// Count of rejections with the given [`RejectReason::code`].
    pub fn rejected_with(&self, code: &str) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.reason.code() == code)
            .count()
    }
}
