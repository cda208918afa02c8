use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use walkdir::WalkDir;

use crate::core::InstalledApp;
use crate::scan::ports::AppDetection;

static BUNDLE_ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"<key>CFBundleIdentifier</key>\s*<string>\s*([^<\s]+)\s*</string>").ok()
});

pub fn default_search_dirs(home_dir: &Path) -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
        home_dir.join("Applications"),
    ]
}

/// Finds `.app` bundles up to one folder deep (e.g. `/Applications/Utilities`).
#[derive(Debug, Clone)]
pub struct BundleScanner {
    search_dirs: Vec<PathBuf>,
}

impl BundleScanner {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }
}

impl AppDetection for BundleScanner {
    fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        let mut seen = HashSet::new();
        let mut apps = Vec::new();

        for dir in &self.search_dirs {
            if !dir.is_dir() {
                tracing::debug!(dir = %dir.display(), "アプリ検索ディレクトリがありません");
                continue;
            }
            let mut it = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(2)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter();
            while let Some(entry) = it.next() {
                let Ok(entry) = entry else {
                    continue;
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy().to_string();
                let Some(stem) = file_name.strip_suffix(".app") else {
                    continue;
                };
                it.skip_current_dir();

                let path = entry.path().to_path_buf();
                if !seen.insert(path.clone()) {
                    continue;
                }
                let mut app = InstalledApp::new(stem, path.display().to_string());
                app.bundle_id = read_bundle_id(&path);
                apps.push(app);
            }
        }

        tracing::debug!(count = apps.len(), "インストール済みアプリを検出しました");
        Ok(apps)
    }
}

fn read_bundle_id(bundle: &Path) -> Option<String> {
    let plist = bundle.join("Contents/Info.plist");
    let bytes = std::fs::read(&plist).ok()?;
    if bytes.starts_with(b"bplist") {
        return None;
    }
    parse_bundle_id(&String::from_utf8_lossy(&bytes))
}

fn parse_bundle_id(xml: &str) -> Option<String> {
    let re = BUNDLE_ID_RE.as_ref()?;
    re.captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
