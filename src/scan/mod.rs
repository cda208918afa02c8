//! Pruning directory walker.
//!
//! Targets run one after another. Inside a target, the entries of each
//! directory level are shared by a fixed pool of scoped worker threads that
//! pull the next entry from one atomic index. Every entry is sized first and
//! dropped, subtree included, when it is below the threshold.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use globset::GlobSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::apps::AppMatcher;
use crate::core::{
    Category, EntryType, InstalledApp, RiskLevel, ScanItem, ScanReport, ScanTarget, SkippedEntry,
};
use crate::rules;

pub mod ports;
pub mod targets;
pub mod threshold;

use ports::{DirEntry, DiskUsage, FileSystem};

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Hard ceiling on recursion, whatever the category allows.
pub const ABSOLUTE_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    TargetStarted {
        path: String,
        index: usize,
        total: usize,
    },
    EntryMeasured {
        path: String,
        size_bytes: u64,
        recorded: bool,
    },
    EntrySkipped {
        path: String,
        reason: String,
    },
    TargetFinished {
        path: String,
        items: usize,
        bytes: u64,
    },
}

pub type ProgressSink<'a> = dyn Fn(&ScanEvent) + Send + Sync + 'a;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker count per directory level. Nested levels get their own pool, so
    /// the live thread count across a deep walk can exceed this.
    pub concurrency: usize,
    pub threshold_bytes: u64,
    pub exclude: GlobSet,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            threshold_bytes: threshold::DEFAULT_THRESHOLD_BYTES,
            exclude: GlobSet::empty(),
        }
    }
}

pub fn build_exclude_set(excludes: &[String]) -> anyhow::Result<GlobSet> {
    use anyhow::Context;
    use globset::{Glob, GlobSetBuilder};

    let mut builder = GlobSetBuilder::new();
    for pat in excludes {
        builder.add(Glob::new(pat).with_context(|| format!("exclude glob が不正です: {pat}"))?);
    }
    builder
        .build()
        .context("exclude glob の構築に失敗しました")
}

pub struct Scanner<'a> {
    fs: &'a dyn FileSystem,
    du: &'a dyn DiskUsage,
    matcher: Option<AppMatcher>,
    options: ScanOptions,
    progress: Option<&'a ProgressSink<'a>>,
}

#[derive(Debug, Default)]
struct Outcome {
    items: Vec<ScanItem>,
    skipped: Vec<SkippedEntry>,
}

impl Outcome {
    fn merge(&mut self, other: Outcome) {
        self.items.extend(other.items);
        self.skipped.extend(other.skipped);
    }
}

impl<'a> Scanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, du: &'a dyn DiskUsage, options: ScanOptions) -> Self {
        Self {
            fs,
            du,
            matcher: None,
            options,
            progress: None,
        }
    }

    pub fn with_installed_apps(self, apps: Vec<InstalledApp>) -> Self {
        self.with_matcher(AppMatcher::new(apps))
    }

    pub fn with_matcher(mut self, matcher: AppMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_progress(mut self, sink: &'a ProgressSink<'a>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn scan(&self, targets: &[ScanTarget]) -> ScanReport {
        let existing: Vec<&ScanTarget> = targets
            .iter()
            .filter(|t| {
                let exists = self.fs.exists(Path::new(&t.path));
                if !exists {
                    tracing::debug!(root = %t.path, "対象が存在しないため除外します");
                }
                exists
            })
            .collect();

        let mut items = Vec::new();
        let mut skipped = Vec::new();
        for (index, target) in existing.iter().enumerate() {
            self.emit(ScanEvent::TargetStarted {
                path: target.path.clone(),
                index,
                total: existing.len(),
            });

            let outcome = self.scan_target(target);
            let bytes: u64 = outcome.items.iter().map(|i| i.size_bytes).sum();
            tracing::info!(
                root = %target.path,
                items = outcome.items.len(),
                skipped = outcome.skipped.len(),
                bytes,
                "対象のスキャンが完了しました"
            );
            self.emit(ScanEvent::TargetFinished {
                path: target.path.clone(),
                items: outcome.items.len(),
                bytes,
            });

            items.extend(outcome.items);
            skipped.extend(outcome.skipped);
        }

        ScanReport {
            schema_version: "1.0".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: format_time(SystemTime::now()),
            threshold_bytes: self.options.threshold_bytes,
            targets: existing.into_iter().cloned().collect(),
            totals_by_category: ScanReport::totals_for(&items),
            items,
            skipped,
        }
    }

    fn scan_target(&self, target: &ScanTarget) -> Outcome {
        match self.fs.list_entries(Path::new(&target.path)) {
            Ok(entries) => self.scan_level(target, &entries),
            Err(err) => {
                let mut outcome = Outcome::default();
                outcome.skipped.push(self.skip(&target.path, format!("{err:#}")));
                outcome
            }
        }
    }

    fn scan_level(&self, target: &ScanTarget, entries: &[DirEntry]) -> Outcome {
        if entries.is_empty() {
            return Outcome::default();
        }

        let workers = self.options.concurrency.max(1).min(entries.len());
        let next = AtomicUsize::new(0);
        let mut outcome = Outcome::default();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut local = Outcome::default();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(entry) = entries.get(idx) else {
                                break;
                            };
                            local.merge(self.scan_entry(target, entry));
                        }
                        local
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(local) => outcome.merge(local),
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
        });

        outcome
    }

    fn scan_entry(&self, target: &ScanTarget, entry: &DirEntry) -> Outcome {
        let mut outcome = Outcome::default();
        let path_s = entry.path.display().to_string();

        if self.options.exclude.is_match(&entry.path) {
            tracing::debug!(path = %path_s, "除外パターンに一致しました");
            return outcome;
        }

        let size_kb = match self.du.size_in_kb(&entry.path) {
            Ok(kb) => kb,
            Err(err) => {
                outcome.skipped.push(self.skip(&path_s, err.to_string()));
                return outcome;
            }
        };
        let size_bytes = size_kb.saturating_mul(1024);
        let recorded = size_bytes >= self.options.threshold_bytes;
        self.emit(ScanEvent::EntryMeasured {
            path: path_s.clone(),
            size_bytes,
            recorded,
        });
        if !recorded {
            return outcome;
        }

        let stat = match self.fs.stat(&entry.path) {
            Ok(stat) => stat,
            Err(err) => {
                outcome.skipped.push(self.skip(&path_s, format!("{err:#}")));
                return outcome;
            }
        };

        let category = target.category;
        let depth = rules::calculate_depth(&entry.path, Path::new(&target.path));
        let mut safe_to_delete = rules::is_safe_to_delete(&path_s, &entry.name, category, depth);
        let mut app_installed = None;
        let mut matched_app_name = None;

        if category == Category::ApplicationSupport {
            if let Some(matcher) = &self.matcher {
                let verdict = matcher.match_folder(&entry.name);
                app_installed = Some(verdict.is_installed);
                matched_app_name = verdict.matched_app.map(|a| a.name.clone());
                if !verdict.is_installed
                    && !safe_to_delete
                    && !rules::matches_explicit_unsafe(&path_s)
                {
                    safe_to_delete = true;
                }
            }
        }

        outcome.items.push(ScanItem {
            name: entry.name.clone(),
            path: path_s.clone(),
            category,
            size_kb,
            size_bytes,
            modified_at: format_time(stat.modified_at),
            entry_type: entry.entry_type,
            risk_level: RiskLevel::for_category(category),
            safe_to_delete,
            parent_target_path: target.path.clone(),
            app_installed,
            matched_app_name,
        });

        if should_recurse(category, entry, &path_s, depth) {
            match self.fs.list_entries(&entry.path) {
                Ok(children) => outcome.merge(self.scan_level(target, &children)),
                Err(err) => outcome.skipped.push(self.skip(&path_s, format!("{err:#}"))),
            }
        }

        outcome
    }

    fn skip(&self, path: &str, reason: String) -> SkippedEntry {
        tracing::warn!(path, reason = %reason, "スキップしました");
        self.emit(ScanEvent::EntrySkipped {
            path: path.to_string(),
            reason: reason.clone(),
        });
        SkippedEntry {
            path: path.to_string(),
            reason,
        }
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(sink) = self.progress {
            sink(&event);
        }
    }
}

fn should_recurse(category: Category, entry: &DirEntry, path: &str, depth: usize) -> bool {
    entry.entry_type == EntryType::Directory
        && depth < category.max_depth().min(ABSOLUTE_MAX_DEPTH)
        && !rules::is_leaf_cache_directory(path, &entry.name)
        && category.is_recursable()
}

fn format_time(t: SystemTime) -> String {
    OffsetDateTime::from(t)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ports::{DiskUsageError, EntryStat};
    use anyhow::{Result, anyhow};
    use globset::{Glob, GlobSetBuilder};
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    const MIB: u64 = 1024;

    #[derive(Default)]
    struct FakeFs {
        dirs: HashMap<PathBuf, Vec<DirEntry>>,
        sizes: HashMap<PathBuf, Option<u64>>,
        unlistable: HashSet<PathBuf>,
        listed: Mutex<Vec<PathBuf>>,
        measured: Mutex<Vec<PathBuf>>,
    }

    impl FakeFs {
        fn dir(&mut self, path: &str, kb: Option<u64>) -> &mut Self {
            self.node(path, EntryType::Directory, kb);
            self.dirs.entry(PathBuf::from(path)).or_default();
            self
        }

        fn file(&mut self, path: &str, kb: u64) -> &mut Self {
            self.node(path, EntryType::File, Some(kb))
        }

        fn root(&mut self, path: &str) -> &mut Self {
            self.dirs.entry(PathBuf::from(path)).or_default();
            self
        }

        fn node(&mut self, path: &str, entry_type: EntryType, kb: Option<u64>) -> &mut Self {
            let path = PathBuf::from(path);
            let parent = path.parent().expect("parent").to_path_buf();
            let name = path
                .file_name()
                .expect("name")
                .to_string_lossy()
                .to_string();
            self.dirs.entry(parent).or_default().push(DirEntry {
                name,
                path: path.clone(),
                entry_type,
            });
            self.sizes.insert(path, kb);
            self
        }
    }

    impl FileSystem for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.dirs.contains_key(path) || self.sizes.contains_key(path)
        }

        fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>> {
            self.listed.lock().unwrap().push(path.to_path_buf());
            if self.unlistable.contains(path) {
                return Err(anyhow!("Permission denied"));
            }
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("not a directory: {}", path.display()))
        }

        fn stat(&self, _path: &Path) -> Result<EntryStat> {
            Ok(EntryStat {
                modified_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            })
        }
    }

    impl DiskUsage for FakeFs {
        fn size_in_kb(&self, path: &Path) -> std::result::Result<u64, DiskUsageError> {
            self.measured.lock().unwrap().push(path.to_path_buf());
            match self.sizes.get(path) {
                Some(Some(kb)) => Ok(*kb),
                Some(None) => Err(DiskUsageError::PermissionDenied {
                    path: path.display().to_string(),
                }),
                None => Err(DiskUsageError::NotFound {
                    path: path.display().to_string(),
                }),
            }
        }
    }

    fn library() -> FakeFs {
        let mut fs = FakeFs::default();
        fs.root("/lib/Caches")
            .dir("/lib/Caches/com.big", Some(20 * MIB))
            .dir("/lib/Caches/com.big/Cache", Some(15 * MIB))
            .file("/lib/Caches/com.big/Cache/blob", 15 * MIB)
            .file("/lib/Caches/com.big/data.bin", 5 * MIB)
            .dir("/lib/Caches/com.small", Some(100))
            .dir("/lib/Caches/com.small/huge", Some(50 * MIB))
            .dir("/lib/Caches/broken", None)
            .dir("/lib/Caches/a", Some(8 * MIB))
            .dir("/lib/Caches/a/b", Some(8 * MIB))
            .dir("/lib/Caches/a/b/c", Some(8 * MIB))
            .dir("/lib/Caches/a/b/c/d", Some(8 * MIB));
        fs.root("/lib/Application Support")
            .dir("/lib/Application Support/Notion", Some(30 * MIB))
            .dir("/lib/Application Support/OldApp", Some(12 * MIB))
            .dir("/lib/Application Support/Legacy Data", Some(12 * MIB));
        fs
    }

    fn targets() -> Vec<ScanTarget> {
        vec![
            ScanTarget::new("/lib/Caches", Category::Caches),
            ScanTarget::new("/lib/Application Support", Category::ApplicationSupport),
            ScanTarget::new("/lib/Missing", Category::Logs),
        ]
    }

    fn options(concurrency: usize) -> ScanOptions {
        ScanOptions {
            concurrency,
            threshold_bytes: 1024 * 1024,
            exclude: GlobSet::empty(),
        }
    }

    fn item<'r>(report: &'r ScanReport, path: &str) -> Option<&'r ScanItem> {
        report.items.iter().find(|i| i.path == path)
    }

    #[test]
    fn sizes_and_totals_are_consistent() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());

        assert!(!report.items.is_empty());
        for i in &report.items {
            assert_eq!(i.size_bytes, i.size_kb * 1024);
            assert_eq!(i.risk_level, RiskLevel::for_category(i.category));
        }
        assert_eq!(report.totals_by_category.len(), 8);
        for category in Category::ALL {
            assert!(report.totals_by_category.contains_key(&category));
        }
        let sum: u64 = report.items.iter().map(|i| i.size_bytes).sum();
        assert_eq!(report.total_bytes(), sum);
        assert_eq!(report.totals_by_category[&Category::Logs], 0);
    }

    #[test]
    fn missing_targets_are_excluded() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());
        let paths: Vec<&str> = report.targets.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["/lib/Caches", "/lib/Application Support"]);
        assert!(report.skipped.iter().all(|s| s.path != "/lib/Missing"));
    }

    #[test]
    fn below_threshold_is_pruned_with_its_subtree() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());

        assert!(item(&report, "/lib/Caches/com.small").is_none());
        assert!(item(&report, "/lib/Caches/com.small/huge").is_none());
        let listed = fs.listed.lock().unwrap();
        assert!(!listed.contains(&PathBuf::from("/lib/Caches/com.small")));
        let measured = fs.measured.lock().unwrap();
        assert!(!measured.contains(&PathBuf::from("/lib/Caches/com.small/huge")));
    }

    #[test]
    fn leaf_cache_directories_are_atomic() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());

        let cache = item(&report, "/lib/Caches/com.big/Cache").expect("Cache item");
        assert!(cache.safe_to_delete);
        assert!(item(&report, "/lib/Caches/com.big/Cache/blob").is_none());
        assert!(item(&report, "/lib/Caches/com.big/data.bin").is_some());
        assert!(
            !fs.listed
                .lock()
                .unwrap()
                .contains(&PathBuf::from("/lib/Caches/com.big/Cache"))
        );
    }

    #[test]
    fn recursion_stops_at_category_depth() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());
        assert!(item(&report, "/lib/Caches/a/b/c").is_some());
        assert!(item(&report, "/lib/Caches/a/b/c/d").is_none());
    }

    #[test]
    fn failed_measurement_is_isolated() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(3)).scan(&targets());

        let skipped = report
            .skipped
            .iter()
            .find(|s| s.path == "/lib/Caches/broken")
            .expect("broken skipped");
        assert!(skipped.reason.contains("アクセスが拒否されました"));
        assert!(item(&report, "/lib/Caches/com.big").is_some());
        assert!(item(&report, "/lib/Caches/a").is_some());
    }

    #[test]
    fn unreadable_target_aborts_only_that_target() {
        let mut fs = library();
        fs.unlistable.insert(PathBuf::from("/lib/Caches"));
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());

        assert!(report.skipped.iter().any(|s| s.path == "/lib/Caches"));
        assert!(report.items.iter().all(|i| i.category != Category::Caches));
        assert!(item(&report, "/lib/Application Support/Notion").is_some());
    }

    #[test]
    fn concurrency_does_not_change_the_item_set() {
        let fs = library();
        let one: HashSet<ScanItem> = Scanner::new(&fs, &fs, options(1))
            .scan(&targets())
            .items
            .into_iter()
            .collect();
        let fs = library();
        let eight: HashSet<ScanItem> = Scanner::new(&fs, &fs, options(8))
            .scan(&targets())
            .items
            .into_iter()
            .collect();
        assert_eq!(one, eight);
    }

    #[test]
    fn every_entry_is_measured_once() {
        let fs = library();
        let _ = Scanner::new(&fs, &fs, options(4)).scan(&targets());
        let measured = fs.measured.lock().unwrap();
        let unique: HashSet<&PathBuf> = measured.iter().collect();
        assert_eq!(unique.len(), measured.len());
    }

    #[test]
    fn orphaned_app_folders_become_deletable() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5))
            .with_installed_apps(vec![
                InstalledApp::new("Notion", "/Applications/Notion.app").with_bundle_id("notion.id"),
            ])
            .scan(&targets());

        let notion = item(&report, "/lib/Application Support/Notion").expect("Notion");
        assert_eq!(notion.app_installed, Some(true));
        assert_eq!(notion.matched_app_name.as_deref(), Some("Notion"));
        assert!(!notion.safe_to_delete);

        let old = item(&report, "/lib/Application Support/OldApp").expect("OldApp");
        assert_eq!(old.app_installed, Some(false));
        assert_eq!(old.matched_app_name, None);
        assert!(old.safe_to_delete);

        let legacy = item(&report, "/lib/Application Support/Legacy Data").expect("Legacy");
        assert_eq!(legacy.app_installed, Some(false));
        assert!(!legacy.safe_to_delete);

        let cache = item(&report, "/lib/Caches/com.big").expect("com.big");
        assert_eq!(cache.app_installed, None);
    }

    #[test]
    fn nested_orphan_folders_are_matched_too() {
        let mut fs = FakeFs::default();
        fs.root("/AS")
            .dir("/AS/Vendor", Some(50_000))
            .dir("/AS/Vendor/GoneApp", Some(50_000));
        let report = Scanner::new(&fs, &fs, options(2))
            .with_installed_apps(vec![InstalledApp::new(
                "Vendor",
                "/Applications/Vendor.app",
            )])
            .scan(&[ScanTarget::new("/AS", Category::ApplicationSupport)]);

        let vendor = item(&report, "/AS/Vendor").expect("Vendor");
        assert_eq!(vendor.app_installed, Some(true));
        assert!(!vendor.safe_to_delete);

        let gone = item(&report, "/AS/Vendor/GoneApp").expect("GoneApp");
        assert_eq!(gone.app_installed, Some(false));
        assert_eq!(gone.matched_app_name, None);
        assert!(gone.safe_to_delete);
    }

    #[test]
    fn without_matcher_app_fields_stay_empty() {
        let fs = library();
        let report = Scanner::new(&fs, &fs, options(5)).scan(&targets());
        let old = item(&report, "/lib/Application Support/OldApp").expect("OldApp");
        assert_eq!(old.app_installed, None);
        assert!(!old.safe_to_delete);
    }

    #[test]
    fn excluded_entries_are_not_measured() {
        let fs = library();
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("**/com.big").expect("glob"));
        let opts = ScanOptions {
            exclude: builder.build().expect("globset"),
            ..options(5)
        };
        let report = Scanner::new(&fs, &fs, opts).scan(&targets());
        assert!(item(&report, "/lib/Caches/com.big").is_none());
        assert!(
            !fs.measured
                .lock()
                .unwrap()
                .contains(&PathBuf::from("/lib/Caches/com.big"))
        );
    }

    #[test]
    fn progress_events_are_emitted() {
        let fs = library();
        let events = Mutex::new(Vec::new());
        let sink = |e: &ScanEvent| events.lock().unwrap().push(e.clone());
        let _ = Scanner::new(&fs, &fs, options(2))
            .with_progress(&sink)
            .scan(&targets());

        let events = events.into_inner().unwrap();
        let started = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::TargetStarted { total: 2, .. }))
            .count();
        assert_eq!(started, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::EntrySkipped { path, .. } if path == "/lib/Caches/broken"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::EntryMeasured { recorded: false, .. }
        )));
    }
}
