use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::core::{Category, InstalledApp, ScanReport, ScanTarget};
use crate::platform::apps::{BundleScanner, default_search_dirs};
use crate::platform::{DuCommand, LocalFileSystem};
use crate::scan::ports::AppDetection;
use crate::scan::{ScanEvent, ScanOptions, Scanner};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Per-`du` budget.
    pub timeout: Duration,
    pub privacy_mask_home: bool,
}

#[derive(Clone)]
pub struct Engine {
    opts: EngineOptions,
    home_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub categories: Vec<Category>,
    pub include_system: bool,
    pub min_size: Option<String>,
    pub concurrency: usize,
    pub exclude: Vec<String>,
    pub apps_enabled: bool,
    pub app_search_dirs: Vec<PathBuf>,
    pub show_progress: bool,
}

impl Engine {
    pub fn with_home_dir(opts: EngineOptions, home_dir: PathBuf) -> Self {
        Self { opts, home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn targets(&self, categories: &[Category], include_system: bool) -> Vec<ScanTarget> {
        crate::scan::targets::filter_by_category(
            crate::scan::targets::default_targets(&self.home_dir, include_system),
            categories,
        )
    }

    pub fn installed_apps(&self, search_dirs: &[PathBuf]) -> Result<Vec<InstalledApp>> {
        let dirs = if search_dirs.is_empty() {
            default_search_dirs(&self.home_dir)
        } else {
            search_dirs.to_vec()
        };
        BundleScanner::new(dirs).installed_apps()
    }

    pub fn scan(&self, req: ScanRequest) -> Result<ScanReport> {
        let targets = self.targets(&req.categories, req.include_system);
        let options = ScanOptions {
            concurrency: req.concurrency,
            threshold_bytes: crate::scan::threshold::resolve_threshold(req.min_size.as_deref()),
            exclude: crate::scan::build_exclude_set(&req.exclude)?,
        };
        tracing::debug!(
            targets = targets.len(),
            concurrency = options.concurrency,
            threshold_bytes = options.threshold_bytes,
            "スキャンを開始します"
        );

        let fs = LocalFileSystem;
        let du = DuCommand::new(self.opts.timeout);
        let mut scanner = Scanner::new(&fs, &du, options);

        if req.apps_enabled {
            match self.installed_apps(&req.app_search_dirs) {
                Ok(apps) => {
                    tracing::debug!(apps = apps.len(), "インストール済みアプリを読み込みました");
                    scanner = scanner.with_installed_apps(apps);
                }
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "アプリ一覧を取得できませんでした（孤立判定なしで続行します）");
                }
            }
        }

        use std::io::IsTerminal;
        let progress_enabled = req.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message("スキャンを準備中...");
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let report = match &pb {
            Some(pb) => {
                let home = self.opts.privacy_mask_home.then(|| self.home_dir.clone());
                let sink = move |event: &ScanEvent| {
                    if let ScanEvent::TargetStarted { path, index, total } = event {
                        let shown = match &home {
                            Some(h) => crate::ui::mask_home(path, h),
                            None => path.clone(),
                        };
                        pb.set_message(format!("スキャン中 [{}/{}] {shown}", index + 1, total));
                    }
                };
                scanner.with_progress(&sink).scan(&targets)
            }
            None => scanner.scan(&targets),
        };

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        Ok(report)
    }
}
