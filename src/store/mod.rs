use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::ScanReport;

const REPORT_FILE: &str = "last-scan.json";

pub fn reports_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".cache/macsweep")
}

pub fn default_report_path(home_dir: &Path) -> PathBuf {
    reports_dir(home_dir).join(REPORT_FILE)
}

/// Writes `report` as the last scan and returns where it went.
pub fn save_report(home_dir: &Path, report: &ScanReport) -> Result<PathBuf> {
    let path = default_report_path(home_dir);
    write_report(&path, report)?;
    Ok(path)
}

pub fn write_report(path: &Path, report: &ScanReport) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| {
            format!("レポートディレクトリの作成に失敗しました: {}", dir.display())
        })?;
    }

    let mut buf =
        serde_json::to_vec_pretty(report).context("レポート(JSON)のシリアライズに失敗しました")?;
    buf.push(b'\n');

    // Written beside the target, then renamed over it.
    let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
    std::fs::write(&tmp, buf)
        .with_context(|| format!("レポートの書き込みに失敗しました: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("レポートの書き込みに失敗しました: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "レポートを保存しました");
    Ok(())
}

pub fn load_report(path: &Path) -> Result<ScanReport> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("レポートの読み取りに失敗しました: {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("レポート(JSON)の解析に失敗しました: {}", path.display()))
}
