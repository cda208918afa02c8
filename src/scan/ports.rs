use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;

use crate::core::{EntryType, InstalledApp};
use crate::platform::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub modified_at: SystemTime,
}

#[derive(Debug, thiserror::Error)]
pub enum DiskUsageError {
    #[error("アクセスが拒否されました: {path}")]
    PermissionDenied { path: String },
    #[error("パスが存在しません: {path}")]
    NotFound { path: String },
    #[error("du が失敗しました（exit_code={exit_code}）: {stderr}")]
    Failed { exit_code: i32, stderr: String },
    #[error("du の出力を解釈できませんでした: {0:?}")]
    Unparsable(String),
    #[error(transparent)]
    Command(#[from] CommandError),
}

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>>;
    fn stat(&self, path: &Path) -> Result<EntryStat>;
}

/// On-disk size measurement, in KiB.
pub trait DiskUsage: Send + Sync {
    fn size_in_kb(&self, path: &Path) -> std::result::Result<u64, DiskUsageError>;
}

pub trait AppDetection {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>>;
}
