use std::path::Path;

use anyhow::{Context, Result, anyhow};
use walkdir::WalkDir;

use crate::core::EntryType;
use crate::scan::ports::{DirEntry, EntryStat, FileSystem};

/// The real filesystem. Never follows symlinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let msg = err
                        .io_error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| err.to_string());
                    return Err(anyhow!(msg))
                        .with_context(|| format!("一覧の取得に失敗しました: {}", path.display()));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "エントリを読み取れませんでした");
                    continue;
                }
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_path_buf(),
                entry_type: EntryType::from_file_type(entry.file_type()),
            });
        }
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> Result<EntryStat> {
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("メタデータ取得: {}", path.display()))?;
        let modified_at = meta
            .modified()
            .with_context(|| format!("更新日時の取得: {}", path.display()))?;
        Ok(EntryStat { modified_at })
    }
}
