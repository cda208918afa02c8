use anyhow::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use unicode_width::UnicodeWidthChar;

use crate::core::{AppMatchResult, Category, InstalledApp, RiskLevel, ScanItem, ScanReport};
use crate::tree::FlatTreeNode;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
    /// Home directory shown as `~`, when masking is on.
    pub mask_home: Option<PathBuf>,
}

impl UiConfig {
    pub fn display_path(&self, path: &str) -> String {
        match &self.mask_home {
            Some(home) => mask_home(path, home),
            None => path.to_string(),
        }
    }
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "エラー:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "次に:");
    let _ = writeln!(
        stderr,
        "  - 詳細を見るには `--verbose` を付けて再実行してください"
    );
    let _ = writeln!(
        stderr,
        "  - 利用可能なコマンド/オプションは `macsweep --help` を参照してください"
    );
}

pub fn print_scan_summary(report: &ScanReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "概要: 合計={}  削除候補={}  項目={}  スキップ={}  しきい値={}",
        format_bytes(report.total_bytes()),
        format_bytes(report.safe_bytes()),
        report.items.len(),
        report.skipped.len(),
        format_bytes(report.threshold_bytes)
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "カテゴリ別:");
    let label_w = Category::ALL
        .iter()
        .map(|c| visible_width_ansi(c.label()))
        .max()
        .unwrap_or(0);
    for (category, bytes) in &report.totals_by_category {
        let risk = format_risk(RiskLevel::for_category(*category), cfg.color);
        let _ = writeln!(
            out,
            "  {}  {}  {}",
            pad_end_display(category.label(), label_w),
            pad_start_display(&format_bytes(*bytes), 10),
            risk
        );
    }

    let mut items: Vec<&ScanItem> = report.items.iter().collect();
    items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.path.cmp(&b.path)));
    let rows = cfg.max_table_rows.min(items.len());

    let _ = writeln!(out);
    if items.is_empty() {
        let _ = writeln!(out, "しきい値以上の項目はありません。");
    } else {
        if items.len() > rows {
            let _ = writeln!(out, "上位の項目（{rows}件表示 / 全{}件）:", items.len());
        } else {
            let _ = writeln!(out, "上位の項目（{rows}件表示）:");
        }
        print_items_table(&mut out, &items[..rows], cfg);
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "スキップ（{}件）:", report.skipped.len());
        let shown = report.skipped.len().min(cfg.max_table_rows.max(1));
        for skipped in report.skipped.iter().take(shown) {
            let _ = writeln!(
                out,
                "- {}: {}",
                cfg.display_path(&skipped.path),
                truncate_middle(&skipped.reason, 120)
            );
        }
        if report.skipped.len() > shown {
            let _ = writeln!(out, "- ...（残り{}件）", report.skipped.len() - shown);
        }
        if !cfg.verbose {
            let _ = writeln!(
                out,
                "ヒント: フルディスクアクセスを許可すると読み取れる範囲が広がります。"
            );
        }
    }
}

fn print_items_table(out: &mut dyn Write, items: &[&ScanItem], cfg: &UiConfig) {
    let label_size = "サイズ";
    let label_risk = "リスク";
    let label_mark = "判定";
    let label_path = "パス";

    let bytes_w = items
        .iter()
        .map(|i| visible_width_ansi(&format_bytes(i.size_bytes)))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_size));
    let risk_w = visible_width_ansi(label_risk).max(8);
    let mark_w = visible_width_ansi(label_mark).max("safe,orphan".len());
    let path_w = visible_width_ansi(label_path).max(4);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        pad_end_display(label_size, bytes_w),
        pad_end_display(label_risk, risk_w),
        pad_end_display(label_mark, mark_w),
        label_path
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(bytes_w),
        "-".repeat(risk_w),
        "-".repeat(mark_w),
        "-".repeat(path_w)
    );

    for item in items {
        let size = pad_start_display(&format_bytes(item.size_bytes), bytes_w);
        let risk = pad_end_ansi(&format_risk(item.risk_level, cfg.color), risk_w);
        let mark = pad_end_display(item_marker(item.safe_to_delete, item.is_orphaned()), mark_w);
        let mut path = cfg.display_path(&item.path);
        if let Some(app) = &item.matched_app_name {
            path.push_str(&format!("（{app}）"));
        }
        let _ = writeln!(out, "{size}  {risk}  {mark}  {}", truncate_middle(&path, 160));
    }
}

fn item_marker(safe: bool, orphaned: bool) -> &'static str {
    match (safe, orphaned) {
        (true, true) => "safe,orphan",
        (true, false) => "safe",
        (false, true) => "orphan",
        (false, false) => "-",
    }
}

/// One line per row; `numbered` prefixes the 1-based selection number.
pub fn write_tree_rows(out: &mut dyn Write, rows: &[FlatTreeNode], cfg: &UiConfig, numbered: bool) {
    let num_w = rows.len().to_string().len();
    let name_w = rows
        .iter()
        .map(|r| visible_width_ansi(&r.indent) + 2 + visible_width_ansi(&r.name))
        .max()
        .unwrap_or(0)
        .min(72);
    let size_w = rows
        .iter()
        .map(|r| visible_width_ansi(&r.size_label))
        .max()
        .unwrap_or(0);

    for (i, row) in rows.iter().enumerate() {
        let mut line = String::new();
        if numbered {
            line.push_str(&pad_start_display(&(i + 1).to_string(), num_w));
            line.push_str(". ");
        }
        let label = format!(
            "{}{} {}",
            row.indent,
            row.affordance(),
            truncate_middle(&row.name, 60)
        );
        line.push_str(&pad_end_display(&label, name_w));
        line.push_str("  ");
        line.push_str(&pad_start_display(&row.size_label, size_w));

        if let Some(risk) = row.risk_level {
            line.push_str("  ");
            line.push_str(&format_risk(risk, cfg.color));
        }
        let marker = item_marker(row.safe_to_delete == Some(true), row.orphaned);
        if marker != "-" {
            line.push_str("  ");
            line.push_str(&format_marker(marker, cfg.color));
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
}

pub fn print_tree(base_path: &str, rows: &[FlatTreeNode], total_bytes: u64, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "{}  ({})",
        cfg.display_path(base_path),
        format_bytes(total_bytes)
    );
    if rows.is_empty() {
        let _ = writeln!(out, "  （項目なし）");
        return;
    }
    write_tree_rows(&mut out, rows, cfg, false);
}

pub fn print_installed_apps(apps: &[InstalledApp], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "インストール済みアプリ（{}件）:", apps.len());
    let name_w = apps
        .iter()
        .map(|a| visible_width_ansi(&a.name))
        .max()
        .unwrap_or(0)
        .min(40);
    for app in apps {
        let _ = writeln!(
            out,
            "- {}  {}  {}",
            pad_end_display(&app.name, name_w),
            app.bundle_id.as_deref().unwrap_or("-"),
            cfg.display_path(&app.path)
        );
    }
}

pub fn print_match_results(results: &[(String, AppMatchResult<'_>)], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    for (folder, result) in results {
        if result.is_installed {
            let app = result.matched_app.map(|a| a.name.as_str()).unwrap_or("?");
            let _ = writeln!(
                out,
                "{folder}: インストール済み（{app}, {}）",
                result.match_type.as_str()
            );
        } else {
            let _ = writeln!(
                out,
                "{folder}: {}",
                format_marker("orphan", cfg.color)
            );
        }
    }
}

pub fn mask_home(path: &str, home_dir: &Path) -> String {
    let Ok(stripped) = Path::new(path).strip_prefix(home_dir) else {
        return path.to_string();
    };
    let stripped = stripped.display().to_string();
    if stripped.is_empty() {
        "~".to_string()
    } else {
        format!("~/{stripped}")
    }
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

pub fn format_risk(risk: RiskLevel, color: bool) -> String {
    let s = risk.as_str();
    if !color {
        return s.to_string();
    }

    let code = match risk {
        RiskLevel::Low => "32",
        RiskLevel::Medium => "33",
        RiskLevel::High => "31",
        RiskLevel::Critical => "1;31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_marker(marker: &str, color: bool) -> String {
    if !color {
        return marker.to_string();
    }
    let code = if marker.contains("orphan") { "35" } else { "36" };
    format!("\x1b[{code}m{marker}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    pad_end_ansi(s, width)
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    if b < TB {
        return format!("{:.1} GiB", b / GB);
    }
    format!("{:.1} TiB", b / TB)
}
