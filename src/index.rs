use crate::errors::{FlacVaultError, Result};
use crate::model::FileIndexEntry;
use crate::tools::prober::Prober;
use crate::utils::fs::FileUtils;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

/// On-disk file index (§4.6): maps normalised (title, artist) keys to output
/// files already produced, used by the pipeline's skip check. A single
/// read-write lock guards the map; saves are skipped when not dirty.
pub struct FileIndex {
    inner: RwLock<IndexState>,
    path: PathBuf,
}

struct IndexState {
    entries: Vec<FileIndexEntry>,
    dirty: bool,
}

impl FileIndex {
    pub fn new(path: PathBuf) -> Self {
        Self { inner: RwLock::new(IndexState { entries: Vec::new(), dirty: false }), path }
    }

    pub fn load(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(FlacVaultError::Io)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };
        Ok(Self { inner: RwLock::new(IndexState { entries, dirty: false }), path })
    }

    pub fn save(&self) -> Result<()> {
        let mut state = self.inner.write().map_err(|_| FlacVaultError::Other("index lock poisoned".to_string()))?;
        if !state.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&state.entries)?;
        FileUtils::write_atomic(&self.path, json.as_bytes())?;
        state.dirty = false;
        Ok(())
    }

    pub fn add_entry(&self, entry: FileIndexEntry) -> Result<()> {
        let mut state = self.inner.write().map_err(|_| FlacVaultError::Other("index lock poisoned".to_string()))?;
        state.entries.retain(|e| e.path != entry.path);
        state.entries.push(entry);
        state.dirty = true;
        Ok(())
    }

    /// Returns the first entry whose file still exists on disk (P4: never
    /// returns a stale path).
    pub fn find_match(&self, title: &str, artist: &str) -> Result<Option<FileIndexEntry>> {
        let key_title = normalise(title);
        let key_artist = normalise(artist);
        let state = self.inner.read().map_err(|_| FlacVaultError::Other("index lock poisoned".to_string()))?;
        Ok(state
            .entries
            .iter()
            .find(|e| e.normalised_title == key_title && e.normalised_artist == key_artist && e.path.exists())
            .cloned())
    }

    /// Recursively walks `root`, reading embedded tags (falling back to
    /// filename parsing) and inserting an entry per media file found.
    pub async fn scan_directory(&self, root: &Path, prober: &Prober) -> Result<usize> {
        let files = FileUtils::walk_recursive(root)?;
        let mut added = 0;
        for file in files {
            let ext = file.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
            if !matches!(ext.as_deref(), Some("mkv") | Some("mp4") | Some("flac")) {
                continue;
            }

            let tags = prober.probe_tags(&file).await.unwrap_or_default();
            let (title, artist) = match (tags.title, tags.artist) {
                (Some(t), Some(a)) => (t, a),
                _ => match parse_from_filename(&file) {
                    Some(pair) => pair,
                    None => continue,
                },
            };

            let size = FileUtils::get_file_size(&file).unwrap_or(0);
            self.add_entry(FileIndexEntry::new(file, normalise(&title), normalise(&artist), None, size))?;
            added += 1;
        }
        Ok(added)
    }
}

/// Strips platform noise and folds case/punctuation so lookups are stable
/// across minor title variance. Idempotent: `normalise(normalise(s)) == normalise(s)`.
pub fn normalise(input: &str) -> String {
    let stripped = platform_suffix_re().replace_all(input, "");
    let stripped = topic_suffix_re().replace_all(&stripped, "");
    let stripped = remaster_re().replace_all(&stripped, "");
    let alnum_only: String = stripped.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
    whitespace_re().replace_all(&alnum_only, " ").trim().to_lowercase()
}

/// Parses `"Artist - Title"` from a filename, or an `Artist/Title/Title.ext`
/// directory-triple layout when the stem alone carries no separator.
fn parse_from_filename(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    if let Some((artist, title)) = stem.split_once(" - ") {
        return Some((title.trim().to_string(), artist.trim().to_string()));
    }
    let title = stem.to_string();
    let artist = path.parent()?.file_name()?.to_str()?.to_string();
    Some((title, artist))
}

fn platform_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*[\(\[](official video|official music video|official audio|lyrics?|hd|4k|hq)[\)\]]").unwrap()
    })
}

fn topic_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*-\s*Topic$").unwrap())
}

fn remaster_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*[\(\[]\d{4}\s*remaster(ed)?[\)\]]").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_is_idempotent() {
        let s = "Never Gonna Give You Up (Official Video)";
        let once = normalise(s);
        assert_eq!(normalise(&once), once);
    }

    #[test]
    fn normalise_strips_platform_suffix_and_case() {
        assert_eq!(normalise("Hello (Official Video)"), normalise("HELLO"));
    }

    #[test]
    fn normalise_strips_topic_suffix() {
        assert_eq!(normalise("Rick Astley - Topic"), normalise("Rick Astley"));
    }

    #[test]
    fn parses_artist_dash_title_filename() {
        let (title, artist) = parse_from_filename(Path::new("/out/Rick Astley - Never Gonna Give You Up.mkv")).unwrap();
        assert_eq!(artist, "Rick Astley");
        assert_eq!(title, "Never Gonna Give You Up");
    }

    #[test]
    fn find_match_ignores_missing_files() {
        let index = FileIndex::new(PathBuf::from("/tmp/flacvault-test-index.json"));
        index
            .add_entry(FileIndexEntry::new(
                PathBuf::from("/does/not/exist.mkv"),
                normalise("Title"),
                normalise("Artist"),
                None,
                0,
            ))
            .unwrap();
        assert!(index.find_match("Title", "Artist").unwrap().is_none());
    }
}
