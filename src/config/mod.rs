use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::Category;
use crate::scan::DEFAULT_CONCURRENCY;

pub const CONFIG_ENV: &str = "MACSWEEP_CONFIG";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub scan: ScanConfig,
    pub apps: AppsConfig,
    pub privacy: PrivacyConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    /// Kept as written; malformed sizes fall back to the default threshold at scan time.
    pub min_size: String,
    pub concurrency: usize,
    pub include_system: bool,
    /// Empty means every category.
    pub categories: Vec<Category>,
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub du_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppsConfig {
    pub enabled: bool,
    /// Empty means the platform defaults.
    pub search_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivacyConfig {
    pub mask_home: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            scan: ScanConfig {
                min_size: "10MB".to_string(),
                concurrency: DEFAULT_CONCURRENCY,
                include_system: false,
                categories: vec![],
                exclude: vec![],
                du_timeout_secs: None,
            },
            apps: AppsConfig {
                enabled: true,
                search_dirs: vec![],
            },
            privacy: PrivacyConfig { mask_home: true },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    scan: Option<RawScanConfig>,
    apps: Option<RawAppsConfig>,
    privacy: Option<RawPrivacyConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScanConfig {
    min_size: Option<String>,
    concurrency: Option<usize>,
    include_system: Option<bool>,
    categories: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    du_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAppsConfig {
    enabled: Option<bool>,
    search_dirs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPrivacyConfig {
    mask_home: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/macsweep/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("設定ファイルの読み取りに失敗しました: {}", path.display()))?;
        let raw: RawConfig =
            toml::from_str(&s).context("設定ファイル(TOML)の解析に失敗しました")?;
        apply_raw_config(&mut cfg, raw)
            .with_context(|| format!("設定ファイルの値が不正です: {}", path.display()))?;
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        tracing::debug!(path = %path.display(), "指定された設定ファイルが存在しません");
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) -> Result<()> {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(scan) = raw.scan {
        if let Some(min_size) = scan.min_size {
            cfg.scan.min_size = min_size;
        }
        if let Some(concurrency) = scan.concurrency {
            cfg.scan.concurrency = validate_concurrency(concurrency).context("scan.concurrency")?;
        }
        if let Some(include_system) = scan.include_system {
            cfg.scan.include_system = include_system;
        }
        if let Some(categories) = scan.categories {
            cfg.scan.categories = parse_categories(&categories).context("scan.categories")?;
        }
        if let Some(exclude) = scan.exclude {
            cfg.scan.exclude = exclude;
        }
        if let Some(secs) = scan.du_timeout_secs {
            cfg.scan.du_timeout_secs = Some(secs);
        }
    }

    if let Some(apps) = raw.apps {
        if let Some(enabled) = apps.enabled {
            cfg.apps.enabled = enabled;
        }
        if let Some(search_dirs) = apps.search_dirs {
            cfg.apps.search_dirs = search_dirs;
        }
    }

    if let Some(privacy) = raw.privacy {
        if let Some(mask_home) = privacy.mask_home {
            cfg.privacy.mask_home = mask_home;
        }
    }

    Ok(())
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("MACSWEEP_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "MACSWEEP_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("MACSWEEP_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "MACSWEEP_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("MACSWEEP_SCAN_MIN_SIZE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.scan.min_size = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("MACSWEEP_SCAN_CONCURRENCY") {
        let n = v
            .trim()
            .parse::<usize>()
            .with_context(|| "MACSWEEP_SCAN_CONCURRENCY")?;
        cfg.scan.concurrency =
            validate_concurrency(n).with_context(|| "MACSWEEP_SCAN_CONCURRENCY")?;
    }
    if let Ok(v) = std::env::var("MACSWEEP_SCAN_INCLUDE_SYSTEM") {
        cfg.scan.include_system =
            parse_bool(&v).with_context(|| "MACSWEEP_SCAN_INCLUDE_SYSTEM")?;
    }
    if let Ok(v) = std::env::var("MACSWEEP_SCAN_CATEGORIES") {
        let parts = split_list(&v);
        if !parts.is_empty() {
            cfg.scan.categories =
                parse_categories(&parts).with_context(|| "MACSWEEP_SCAN_CATEGORIES")?;
        }
    }
    if let Ok(v) = std::env::var("MACSWEEP_SCAN_EXCLUDE") {
        let parts = split_list(&v);
        if !parts.is_empty() {
            cfg.scan.exclude = parts;
        }
    }
    if let Ok(v) = std::env::var("MACSWEEP_APPS_ENABLED") {
        cfg.apps.enabled = parse_bool(&v).with_context(|| "MACSWEEP_APPS_ENABLED")?;
    }
    if let Ok(v) = std::env::var("MACSWEEP_PRIVACY_MASK_HOME") {
        cfg.privacy.mask_home = parse_bool(&v).with_context(|| "MACSWEEP_PRIVACY_MASK_HOME")?;
    }

    Ok(())
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_categories(values: &[String]) -> Result<Vec<Category>> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        let category = v.parse::<Category>().map_err(anyhow::Error::msg)?;
        if !out.contains(&category) {
            out.push(category);
        }
    }
    Ok(out)
}

pub fn validate_concurrency(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(anyhow::anyhow!("並列数は 1 以上を指定してください"));
    }
    Ok(n)
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "真偽値が不正です: {s}（true|false|1|0|yes|no|on|off を指定してください）"
        )),
    }
}
