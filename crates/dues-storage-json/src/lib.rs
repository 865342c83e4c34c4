use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dues_core::{ClubStorage, CoreError};
use dues_domain::{BillingSnapshot, ClubCode, LedgerSnapshot};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, io::AsyncWriteExt};

const CLUBS_DIR: &str = "clubs";
const BILLING_FILE: &str = "billing.json";
const LEDGER_FILE: &str = "ledger.json";
const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed JSON persistence, one directory per club:
/// `<root>/clubs/<slug>/billing.json` and `ledger.json`.
#[derive(Debug, Clone)]
pub struct JsonClubStorage {
    clubs_dir: PathBuf,
}

impl JsonClubStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            clubs_dir: root.into().join(CLUBS_DIR),
        }
    }

    pub fn club_dir(&self, club: &ClubCode) -> PathBuf {
        self.clubs_dir.join(canonical_name(club.as_str()))
    }

    pub fn billing_path(&self, club: &ClubCode) -> PathBuf {
        self.club_dir(club).join(BILLING_FILE)
    }

    pub fn ledger_path(&self, club: &ClubCode) -> PathBuf {
        self.club_dir(club).join(LEDGER_FILE)
    }

    /// Slugs of every club directory holding at least one snapshot.
    pub async fn list_clubs(&self) -> Result<Vec<String>, CoreError> {
        if fs::metadata(&self.clubs_dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut slugs = Vec::new();
        let mut entries = fs::read_dir(&self.clubs_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let has_snapshot = exists(&path.join(BILLING_FILE)).await || exists(&path.join(LEDGER_FILE)).await;
            if !has_snapshot {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                slugs.push(name.to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }
}

#[async_trait]
impl ClubStorage for JsonClubStorage {
    async fn load_billing(&self, club: &ClubCode) -> Result<BillingSnapshot, CoreError> {
        load_snapshot(&self.billing_path(club)).await
    }

    async fn save_billing(&self, club: &ClubCode, snapshot: &BillingSnapshot) -> Result<(), CoreError> {
        save_snapshot(&self.billing_path(club), snapshot).await
    }

    async fn load_ledger(&self, club: &ClubCode) -> Result<LedgerSnapshot, CoreError> {
        load_snapshot(&self.ledger_path(club)).await
    }

    async fn save_ledger(&self, club: &ClubCode, snapshot: &LedgerSnapshot) -> Result<(), CoreError> {
        save_snapshot(&self.ledger_path(club), snapshot).await
    }
}

/// Loads a snapshot; a missing file is an empty snapshot.
async fn load_snapshot<T: DeserializeOwned + Default>(path: &Path) -> Result<T, CoreError> {
    let data = match fs::read_to_string(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&data).map_err(|err| {
        tracing::warn!(path = %path.display(), error = %err, "snapshot is not valid JSON");
        CoreError::Serde(err.to_string())
    })
}

async fn save_snapshot<T: Serialize>(path: &Path, snapshot: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(snapshot).map_err(|err| CoreError::Serde(err.to_string()))?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "club".into()
    } else {
        sanitized
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}
