//! On-disk change history: the `metadata.json` change log and one full
//! catalog snapshot per day under `history/`.
//!
//! A [`HistoryStore`] handle owns the writer lock for its directory. Appends
//! through one handle are serialised; separate handles (or separate
//! processes) over the same directory are not coordinated and can lose
//! updates, see `test_independent_handles_lose_updates`.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use folio_shared::constants::{HISTORY_DIR, METADATA_FILE};
use folio_shared::types::{BackupDate, ChangeRecord, DailyBackup, MetadataIndex};

use crate::error::ServerError;

/// One snapshot file found in the history directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub date: BackupDate,
    pub file_name: String,
    pub size_bytes: u64,
}

/// A loaded snapshot together with its derived counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupView {
    pub date: BackupDate,
    pub data: DailyBackup,
    pub product_count: usize,
    pub deals_count: usize,
}

#[derive(Debug)]
pub struct HistoryStore {
    metadata_path: PathBuf,
    history_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub async fn new(data_dir: &Path) -> Result<Self, ServerError> {
        let history_dir = data_dir.join(HISTORY_DIR);
        fs::create_dir_all(&history_dir).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create history directory '{}': {}",
                history_dir.display(),
                e
            ))
        })?;

        info!(path = %data_dir.display(), "History store initialized");

        Ok(Self {
            metadata_path: data_dir.join(METADATA_FILE),
            history_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Read the change log. A missing file is an empty log.
    pub async fn load_index(&self) -> Result<MetadataIndex, ServerError> {
        Ok(read_json(&self.metadata_path).await?.unwrap_or_default())
    }

    /// Replace the change log wholesale.
    ///
    /// This is the unlocked half of a read-modify-write cycle; prefer
    /// [`HistoryStore::append_change`].
    pub async fn save_index(&self, index: &MetadataIndex) -> Result<(), ServerError> {
        write_json_atomic(&self.metadata_path, index).await
    }

    /// Append one record to the change log. Returns the new number of records.
    pub async fn append_change(&self, record: ChangeRecord) -> Result<usize, ServerError> {
        let _guard = self.write_lock.lock().await;

        let mut index = self.load_index().await?;
        debug!(
            action = %record.action,
            entity = %record.entity_id,
            "Appending change record"
        );
        index.push(record);
        self.save_index(&index).await?;

        Ok(index.len())
    }

    /// Every snapshot file, newest date first. Files whose name is not
    /// `YYYY-MM-DD.json` are ignored.
    pub async fn list_backup_dates(&self) -> Result<Vec<BackupFile>, ServerError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.history_dir)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to list history: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(date) = BackupDate::from_file_name(&name) else {
                continue;
            };
            let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            files.push(BackupFile {
                date,
                file_name: name,
                size_bytes,
            });
        }

        files.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(files)
    }

    /// Load the snapshot for `date`.
    ///
    /// The date is validated before any filesystem access, so a malformed
    /// value can never name a path outside the history directory.
    pub async fn load_backup(&self, date: &str) -> Result<BackupView, ServerError> {
        let date = BackupDate::parse(date)?;
        let path = self.history_dir.join(date.file_name());

        let data: DailyBackup = read_json(&path)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("No backup for {date}")))?;

        Ok(BackupView {
            product_count: data.product_count(),
            deals_count: data.deals_count(),
            date,
            data,
        })
    }

    /// Write the snapshot for `backup.date`, replacing any earlier one from
    /// the same day.
    pub async fn write_backup(&self, backup: &DailyBackup) -> Result<(), ServerError> {
        let path = self.history_dir.join(backup.date.file_name());
        write_json_atomic(&path, backup).await?;

        debug!(
            date = %backup.date,
            products = backup.products.len(),
            deals = backup.deals.len(),
            "Wrote daily backup"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file helpers (shared with the catalog)
// ---------------------------------------------------------------------------

/// Parse a JSON file, `None` when it does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ServerError> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ServerError::Storage(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_slice(&raw).map(Some).map_err(|e| {
        ServerError::Storage(format!("Malformed JSON in '{}': {}", path.display(), e))
    })
}

/// Serialize to a sibling temp file, then rename it over `path`.
pub(crate) async fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), ServerError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| ServerError::Internal(format!("Serialization failed: {e}")))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ServerError::Internal(format!("Bad target path '{}'", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    fs::write(&tmp, &json)
        .await
        .map_err(|e| ServerError::Storage(format!("Failed to write '{}': {}", tmp.display(), e)))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ServerError::Storage(format!(
            "Failed to replace '{}': {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use folio_shared::types::ChangeAction;
    use tempfile::TempDir;

    use super::*;

    async fn test_store() -> (HistoryStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path()).await.unwrap();
        (store, dir)
    }

    fn change(entity: &str) -> ChangeRecord {
        ChangeRecord::now(ChangeAction::CreateProduct, entity, Some("admin".into()))
    }

    fn backup(date: &str, products: usize) -> DailyBackup {
        let now = Utc::now();
        DailyBackup {
            date: BackupDate::parse(date).unwrap(),
            created_at: now,
            products: (0..products)
                .map(|i| folio_shared::catalog::Product {
                    id: Uuid::new_v4(),
                    name: format!("product {i}"),
                    url: "https://shop.example/p".into(),
                    price: None,
                    currency: None,
                    image_url: None,
                    category: None,
                    description: None,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
            deals: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let (store, _dir) = test_store().await;
        assert!(store.load_index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_reload() {
        let (store, dir) = test_store().await;
        assert_eq!(store.append_change(change("p1")).await.unwrap(), 1);
        assert_eq!(store.append_change(change("p2")).await.unwrap(), 2);

        let reopened = HistoryStore::new(dir.path()).await.unwrap();
        let index = reopened.load_index().await.unwrap();
        let ids: Vec<_> = index.changes.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert!(index.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_malformed_index_is_an_error() {
        let (store, dir) = test_store().await;
        std::fs::write(dir.path().join(METADATA_FILE), b"{\"changes\": [").unwrap();
        assert!(matches!(
            store.load_index().await,
            Err(ServerError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_appends_through_one_handle() {
        let (store, _dir) = test_store().await;
        let store = Arc::new(store);

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.append_change(change(&format!("p{i}"))).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.load_index().await.unwrap().len(), 20);
    }

    /// Known gap: handles do not share a lock, so an interleaved
    /// read-modify-write cycle drops the other handle's append.
    #[tokio::test]
    async fn test_independent_handles_lose_updates() {
        let dir = TempDir::new().unwrap();
        let a = HistoryStore::new(dir.path()).await.unwrap();
        let b = HistoryStore::new(dir.path()).await.unwrap();

        let mut stale = a.load_index().await.unwrap();
        b.append_change(change("from-b")).await.unwrap();
        stale.push(change("from-a"));
        a.save_index(&stale).await.unwrap();

        let index = a.load_index().await.unwrap();
        let ids: Vec<_> = index.changes.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["from-a"]);
    }

    #[tokio::test]
    async fn test_backup_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.load_backup("2024-01-01").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_date_rejected() {
        let (store, _dir) = test_store().await;
        for bad in ["2024-1-1", "abc", "../metadata"] {
            assert!(matches!(
                store.load_backup(bad).await,
                Err(ServerError::BadRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_backup_rewrite_replaces() {
        let (store, _dir) = test_store().await;
        store.write_backup(&backup("2024-02-01", 3)).await.unwrap();
        store.write_backup(&backup("2024-02-01", 1)).await.unwrap();

        let view = store.load_backup("2024-02-01").await.unwrap();
        assert_eq!(view.product_count, 1);
        assert_eq!(view.deals_count, 0);
        assert_eq!(store.list_backup_dates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_backups_sorted_descending() {
        let (store, dir) = test_store().await;
        for date in ["2024-01-15", "2023-12-31", "2024-02-01"] {
            store.write_backup(&backup(date, 0)).await.unwrap();
        }
        std::fs::write(dir.path().join(HISTORY_DIR).join("notes.txt"), b"x").unwrap();

        let dates: Vec<_> = store
            .list_backup_dates()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.date.to_string())
            .collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-01-15", "2023-12-31"]);
    }
}
