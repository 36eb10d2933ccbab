use crate::errors::{FlacVaultError, Result};
use std::path::{Path, PathBuf};

/// File system helpers shared by the index, queue, history, and config layers.
#[allow(dead_code)]
pub struct FileUtils;

impl FileUtils {
    pub fn get_file_size(path: &Path) -> Result<u64> {
        let metadata = std::fs::metadata(path).map_err(FlacVaultError::Io)?;
        Ok(metadata.len())
    }

    pub fn file_exists(path: &Path) -> bool {
        path.exists() && path.is_file()
    }

    pub fn directory_exists(path: &Path) -> bool {
        path.exists() && path.is_dir()
    }

    pub fn create_directory(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn delete_file(path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn delete_directory(path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            Self::create_directory(parent)?;
        }
        std::fs::copy(from, to).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn move_file(from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            Self::create_directory(parent)?;
        }
        std::fs::rename(from, to).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn read_to_string(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(FlacVaultError::Io)
    }

    pub fn write_string(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::create_directory(parent)?;
        }
        std::fs::write(path, content).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(FlacVaultError::Io)
    }

    pub fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::create_directory(parent)?;
        }
        std::fs::write(path, content).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    /// Writes via a sibling temp file then renames into place, so readers never
    /// observe a partially-written document (queue/history/index/config all use this).
    pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::create_directory(parent)?;
        }
        let tmp = path.with_extension(format!(
            "{}.tmp-{}",
            path.extension().and_then(|e| e.to_str()).unwrap_or("json"),
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&tmp, content).map_err(FlacVaultError::Io)?;
        std::fs::rename(&tmp, path).map_err(FlacVaultError::Io)?;
        Ok(())
    }

    pub fn list_files(path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).map_err(FlacVaultError::Io)? {
            let entry = entry.map_err(FlacVaultError::Io)?;
            let p = entry.path();
            if p.is_file() {
                files.push(p);
            }
        }
        Ok(files)
    }

    pub fn list_directories(path: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(path).map_err(FlacVaultError::Io)? {
            let entry = entry.map_err(FlacVaultError::Io)?;
            let p = entry.path();
            if p.is_dir() {
                dirs.push(p);
            }
        }
        Ok(dirs)
    }

    pub fn walk_recursive(root: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        if !root.is_dir() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(root).map_err(FlacVaultError::Io)? {
            let entry = entry.map_err(FlacVaultError::Io)?;
            let p = entry.path();
            if p.is_dir() {
                out.extend(Self::walk_recursive(&p)?);
            } else {
                out.push(p);
            }
        }
        Ok(out)
    }

    pub fn get_temp_file_path(prefix: &str, suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefix}_{}.{suffix}", uuid::Uuid::new_v4()))
    }

    /// A fresh per-job scratch directory under the system temp dir, destroyed
    /// on every pipeline exit path.
    pub fn job_temp_dir(job_id: &str) -> Result<PathBuf> {
        let dir = std::env::temp_dir().join(format!("flacvault-job-{job_id}"));
        Self::create_directory(&dir)?;
        Ok(dir)
    }
}
