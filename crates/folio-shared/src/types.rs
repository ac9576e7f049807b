use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{Deal, Product};
use crate::constants::MAX_SLUG_LEN;
use crate::error::SharedError;

// ASCII digits only: `\d` would also accept other Unicode digit classes.
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("static date regex"));

// ---------------------------------------------------------------------------
// BackupDate
// ---------------------------------------------------------------------------

/// Calendar day used to key daily backups, always `YYYY-MM-DD`.
///
/// Only the shape is checked; `2024-13-45` is a well-formed key that simply
/// never has a backup file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackupDate(String);

impl BackupDate {
    pub fn parse(s: &str) -> Result<Self, SharedError> {
        if DATE_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(SharedError::InvalidDate(s.to_string()))
        }
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    pub fn today() -> Self {
        Self::from_naive(Utc::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the snapshot file for this day, e.g. `2024-01-31.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    /// Inverse of [`BackupDate::file_name`]; `None` for anything else.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_suffix(".json")
            .and_then(|stem| Self::parse(stem).ok())
    }
}

impl TryFrom<String> for BackupDate {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BackupDate> for String {
    fn from(value: BackupDate) -> Self {
        value.0
    }
}

impl fmt::Display for BackupDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Slug
// ---------------------------------------------------------------------------

/// Content identifier used in URLs (`/posts/{slug}`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn parse(s: &str) -> Result<Self, SharedError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_SLUG_LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(SharedError::InvalidSlug(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Change actions
// ---------------------------------------------------------------------------

/// What a change record did to its entity.
///
/// Serialized as the upper snake case strings stored in `metadata.json`.
/// Strings this build does not know are kept verbatim in `Unknown` so that
/// rewriting the index never loses them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeAction {
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    CreateDeal,
    UpdateDeal,
    DeleteDeal,
    Unknown(String),
}

/// Bucket a [`ChangeAction`] is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Unknown,
}

impl ChangeAction {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeAction::CreateProduct => "CREATE_PRODUCT",
            ChangeAction::UpdateProduct => "UPDATE_PRODUCT",
            ChangeAction::DeleteProduct => "DELETE_PRODUCT",
            ChangeAction::CreateDeal => "CREATE_DEAL",
            ChangeAction::UpdateDeal => "UPDATE_DEAL",
            ChangeAction::DeleteDeal => "DELETE_DEAL",
            ChangeAction::Unknown(raw) => raw,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeAction::CreateProduct | ChangeAction::CreateDeal => ChangeKind::Create,
            ChangeAction::UpdateProduct | ChangeAction::UpdateDeal => ChangeKind::Update,
            ChangeAction::DeleteProduct | ChangeAction::DeleteDeal => ChangeKind::Delete,
            ChangeAction::Unknown(_) => ChangeKind::Unknown,
        }
    }
}

impl From<String> for ChangeAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CREATE_PRODUCT" => ChangeAction::CreateProduct,
            "UPDATE_PRODUCT" => ChangeAction::UpdateProduct,
            "DELETE_PRODUCT" => ChangeAction::DeleteProduct,
            "CREATE_DEAL" => ChangeAction::CreateDeal,
            "UPDATE_DEAL" => ChangeAction::UpdateDeal,
            "DELETE_DEAL" => ChangeAction::DeleteDeal,
            _ => ChangeAction::Unknown(value),
        }
    }
}

impl From<&str> for ChangeAction {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ChangeAction> for String {
    fn from(value: ChangeAction) -> Self {
        match value {
            ChangeAction::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Change records and the metadata index
// ---------------------------------------------------------------------------

/// One audited mutation of a catalog entity. Never modified after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub date: NaiveDate,
    pub action: ChangeAction,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl ChangeRecord {
    /// Record stamped with the current time; `date` is the UTC day.
    pub fn now(action: ChangeAction, entity_id: impl Into<String>, actor: Option<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            date: timestamp.date_naive(),
            action,
            entity_id: entity_id.into(),
            timestamp,
            actor,
        }
    }
}

/// Append-only log of change records, persisted as `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataIndex {
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl MetadataIndex {
    pub fn push(&mut self, record: ChangeRecord) {
        self.last_updated = Some(record.timestamp);
        self.changes.push(record);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Daily backups
// ---------------------------------------------------------------------------

/// Full snapshot of the catalog for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBackup {
    pub date: BackupDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

impl DailyBackup {
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn deals_count(&self) -> usize {
        self.deals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_date_accepts_iso_day() {
        let date = BackupDate::parse("2024-01-31").unwrap();
        assert_eq!(date.file_name(), "2024-01-31.json");
    }

    #[test]
    fn test_backup_date_rejects_malformed() {
        for bad in ["2024-1-1", "abc", "", "2024-01-01x", "../2024-01-01", "２０２４-01-01"] {
            assert!(BackupDate::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_backup_date_from_file_name() {
        assert_eq!(
            BackupDate::from_file_name("2024-02-03.json"),
            Some(BackupDate::parse("2024-02-03").unwrap())
        );
        assert_eq!(BackupDate::from_file_name("2024-02-03.json.tmp"), None);
        assert_eq!(BackupDate::from_file_name("notes.json"), None);
    }

    #[test]
    fn test_slug_validation() {
        assert!(Slug::parse("hello-world_2").is_ok());
        assert!(Slug::parse("").is_err());
        assert!(Slug::parse("a/b").is_err());
        assert!(Slug::parse(&"x".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn test_unknown_action_survives_serde() {
        let json = r#"{"date":"2024-01-01","action":"ARCHIVE_PRODUCT","entityId":"p1","timestamp":"2024-01-01T10:00:00Z"}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.action, ChangeAction::Unknown("ARCHIVE_PRODUCT".into()));
        assert_eq!(record.action.kind(), ChangeKind::Unknown);

        let back = serde_json::to_string(&record).unwrap();
        assert!(back.contains("\"action\":\"ARCHIVE_PRODUCT\""));
    }

    #[test]
    fn test_known_actions_map_to_kinds() {
        assert_eq!(ChangeAction::from("CREATE_DEAL").kind(), ChangeKind::Create);
        assert_eq!(ChangeAction::from("UPDATE_PRODUCT").kind(), ChangeKind::Update);
        assert_eq!(ChangeAction::from("DELETE_PRODUCT").kind(), ChangeKind::Delete);
    }

    #[test]
    fn test_index_push_tracks_last_updated() {
        let mut index = MetadataIndex::default();
        let record = ChangeRecord::now(ChangeAction::CreateProduct, "p1", None);
        let ts = record.timestamp;
        index.push(record);
        assert_eq!(index.len(), 1);
        assert_eq!(index.last_updated, Some(ts));
    }
}
