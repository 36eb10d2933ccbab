use crate::errors::{FlacVaultError, Result};
use crate::model::HistoryEntry;
use crate::utils::fs::FileUtils;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

#[derive(Debug, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub completed: usize,
    pub errored: usize,
    pub cancelled: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    entries: Vec<HistoryEntry>,
}

/// Newest-first download history (§6). A thin JSON-backed store, separate
/// from the queue so completed/errored jobs survive `ClearCompleted`.
pub struct History {
    path: PathBuf,
    inner: RwLock<Vec<HistoryEntry>>,
}

impl History {
    pub fn load(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(FlacVaultError::Io)?;
            let doc: HistoryDocument = serde_json::from_str(&content)?;
            doc.entries
        } else {
            Vec::new()
        };
        Ok(Self { path, inner: RwLock::new(entries) })
    }

    fn lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<HistoryEntry>>> {
        self.inner.write().map_err(|_| FlacVaultError::Other("history lock poisoned".to_string()))
    }

    pub fn record(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert(0, entry);
        drop(entries);
        self.save()
    }

    pub fn get_all(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.inner.read().map_err(|_| FlacVaultError::Other("history lock poisoned".to_string()))?.clone())
    }

    pub fn search(&self, query: &str) -> Result<Vec<HistoryEntry>> {
        let needle = query.to_lowercase();
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|e| e.title.to_lowercase().contains(&needle) || e.artist.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn stats(&self) -> Result<HistoryStats> {
        let entries = self.get_all()?;
        Ok(HistoryStats {
            total: entries.len(),
            completed: entries.iter().filter(|e| e.status == "complete").count(),
            errored: entries.iter().filter(|e| e.status == "error").count(),
            cancelled: entries.iter().filter(|e| e.status == "cancelled").count(),
            total_bytes: entries.iter().filter_map(|e| e.size).sum(),
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut entries = self.lock()?;
        entries.retain(|e| e.id != id);
        drop(entries);
        self.save()
    }

    pub fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        entries.clear();
        drop(entries);
        self.save()
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.get_all()?.into_iter().find(|e| e.id == id))
    }

    fn save(&self) -> Result<()> {
        let entries = self.inner.read().map_err(|_| FlacVaultError::Other("history lock poisoned".to_string()))?;
        let doc = HistoryDocument { entries: entries.clone() };
        let json = serde_json::to_string_pretty(&doc)?;
        FileUtils::write_atomic(&self.path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QualityTier;

    fn sample_entry(id: &str, status: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            source_url: "https://www.youtube.com/watch?v=x".to_string(),
            title: "Title".to_string(),
            artist: "Artist".to_string(),
            audio_source: Some("tidal".to_string()),
            quality: QualityTier::Best,
            output_path: None,
            duration_secs: Some(120),
            size: Some(1000),
            timestamp: 0,
            status: status.to_string(),
            error: None,
        }
    }

    #[test]
    fn record_inserts_newest_first() {
        let history = History { path: PathBuf::from("/tmp/flacvault-test-history.json"), inner: RwLock::new(Vec::new()) };
        history.record(sample_entry("a", "complete")).unwrap();
        history.record(sample_entry("b", "complete")).unwrap();
        let all = history.get_all().unwrap();
        assert_eq!(all[0].id, "b");
    }

    #[test]
    fn stats_counts_by_status() {
        let history = History { path: PathBuf::from("/tmp/flacvault-test-history2.json"), inner: RwLock::new(Vec::new()) };
        history.record(sample_entry("a", "complete")).unwrap();
        history.record(sample_entry("b", "error")).unwrap();
        let stats = history.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.errored, 1);
    }
}
