use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::apps::AppMatcher;
use crate::core::{Category, ScanReport};
use crate::engine::{Engine, EngineOptions, ScanRequest};
use crate::tree::{ResultTree, build_tree, flatten_tree};
use crate::ui::UiConfig;

mod interactive;

const DEFAULT_DU_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Parser)]
#[command(
    name = "macsweep",
    version,
    about = "~/Library のキャッシュ・ログ・孤立したアプリデータを探して削除リスクを分類する（削除は行わない）"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// `du` 1回あたりのタイムアウト（秒）[既定: 30]
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 対象ディレクトリを走査してレポートを作る
    Scan(ScanArgs),
    /// 保存済みレポートをツリー表示する
    Tree(TreeArgs),
    /// インストール済みアプリの一覧と照合
    Apps(AppsArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// 走査するカテゴリ（複数指定可）
    #[arg(long)]
    pub category: Vec<String>,
    /// 記録するサイズの下限（例: 10MB, 1.5GB）
    #[arg(long)]
    pub min_size: Option<String>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// /Library 配下も対象にする
    #[arg(long)]
    pub system: bool,
    /// アプリ照合（孤立判定）を行わない
    #[arg(long)]
    pub no_apps: bool,
    #[arg(long)]
    pub no_save: bool,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    #[arg(long)]
    pub from: Option<PathBuf>,
    #[arg(long)]
    pub expand: Vec<String>,
    #[arg(long)]
    pub expand_all: bool,
    #[arg(long)]
    pub interactive: bool,
}

#[derive(Debug, Args)]
pub struct AppsArgs {
    /// このフォルダ名がインストール済みアプリに対応するか判定する（複数指定可）
    #[arg(long = "match")]
    pub folders: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Serialize)]
struct TreeJson {
    base_path: String,
    total_bytes: u64,
    rows: Vec<TreeRowJson>,
}

#[derive(Debug, Serialize)]
struct TreeRowJson {
    name: String,
    path: String,
    depth: usize,
    size_bytes: u64,
    expanded: bool,
    has_children: bool,
    is_item: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    safe_to_delete: Option<bool>,
    orphaned: bool,
}

#[derive(Debug, Serialize)]
struct MatchJson {
    folder: String,
    is_installed: bool,
    match_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_app: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os(crate::config::CONFIG_ENV).map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;
    crate::logging::init(cli.verbose, cli.quiet, stderr_is_tty && cfg.ui.color && !cli.no_color);

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
        mask_home: cfg.privacy.mask_home.then(|| home_dir.clone()),
    };

    let timeout_secs = cli
        .timeout
        .or(cfg.scan.du_timeout_secs)
        .unwrap_or(DEFAULT_DU_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(crate::exit::invalid_args(
            "--timeout は 1 以上を指定してください",
        ));
    }

    let engine = Engine::with_home_dir(
        EngineOptions {
            timeout: Duration::from_secs(timeout_secs),
            privacy_mask_home: cfg.privacy.mask_home,
        },
        home_dir.clone(),
    );

    match cli.command {
        Commands::Scan(args) => {
            let categories = if args.category.is_empty() {
                cfg.scan.categories.clone()
            } else {
                crate::config::parse_categories(&args.category)
                    .map_err(crate::exit::invalid_args_err)?
            };
            let concurrency = match args.concurrency {
                Some(n) => crate::config::validate_concurrency(n)
                    .context("--concurrency")
                    .map_err(crate::exit::invalid_args_err)?,
                None => cfg.scan.concurrency,
            };
            crate::scan::build_exclude_set(&cfg.scan.exclude)
                .map_err(crate::exit::invalid_args_err)?;

            let report = engine.scan(ScanRequest {
                categories,
                include_system: args.system || cfg.scan.include_system,
                min_size: Some(args.min_size.unwrap_or_else(|| cfg.scan.min_size.clone())),
                concurrency,
                exclude: cfg.scan.exclude.clone(),
                apps_enabled: cfg.apps.enabled && !args.no_apps,
                app_search_dirs: cfg.apps.search_dirs.iter().map(PathBuf::from).collect(),
                show_progress: stderr_is_tty && !cli.quiet && !cli.json,
            })?;

            if !args.no_save {
                match crate::store::save_report(engine.home_dir(), &report) {
                    Ok(path) => tracing::info!(path = %path.display(), "レポートを保存しました"),
                    Err(err) => tracing::warn!(error = %format!("{err:#}"), "レポートを保存できませんでした"),
                }
            }
            if let Some(path) = &args.output {
                crate::store::write_report(path, &report)?;
            }

            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_scan_summary(&report, &ui_cfg);
            }
        }
        Commands::Tree(args) => {
            if args.interactive && !(stdin_is_tty && stdout_is_tty) {
                return Err(crate::exit::invalid_args(
                    "tree --interactive は TTY 上でのみ実行できます",
                ));
            }
            if args.interactive && cli.json {
                return Err(crate::exit::invalid_args(
                    "--interactive と --json は同時に指定できません",
                ));
            }

            let path = args
                .from
                .clone()
                .unwrap_or_else(|| crate::store::default_report_path(&home_dir));
            if !path.exists() {
                return Err(crate::exit::report_unavailable(format!(
                    "レポートが見つかりません: {}（先に `macsweep scan` を実行してください）",
                    ui_cfg.display_path(&path.display().to_string())
                )));
            }
            let report =
                crate::store::load_report(&path).map_err(crate::exit::report_unavailable_err)?;
            let trees = trees_for_report(&report);

            if args.interactive {
                for tree in &trees {
                    if interactive::review(tree, &ui_cfg)? == interactive::Flow::Stop {
                        break;
                    }
                }
                return Ok(());
            }

            let mut json_trees = Vec::new();
            for tree in &trees {
                let expanded = if args.expand_all {
                    tree.expandable_paths()
                } else {
                    args.expand
                        .iter()
                        .map(|p| expand_user_path(p, &home_dir))
                        .collect()
                };
                let rows = flatten_tree(tree, &expanded);
                if cli.json {
                    json_trees.push(tree_json(tree, &rows));
                } else {
                    crate::ui::print_tree(&tree.base_path, &rows, tree.total_bytes(), &ui_cfg);
                }
            }
            if cli.json {
                write_json(&json_trees)?;
            }
        }
        Commands::Apps(args) => {
            let search_dirs: Vec<PathBuf> =
                cfg.apps.search_dirs.iter().map(PathBuf::from).collect();
            let apps = engine.installed_apps(&search_dirs)?;

            if args.folders.is_empty() {
                if cli.json {
                    write_json(&apps)?;
                } else {
                    crate::ui::print_installed_apps(&apps, &ui_cfg);
                }
                return Ok(());
            }

            let matcher = AppMatcher::new(apps);
            let results: Vec<_> = args
                .folders
                .iter()
                .map(|f| (f.clone(), matcher.match_folder(f)))
                .collect();
            if cli.json {
                let out: Vec<MatchJson> = results
                    .iter()
                    .map(|(folder, r)| MatchJson {
                        folder: folder.clone(),
                        is_installed: r.is_installed,
                        match_type: r.match_type.as_str(),
                        matched_app: r.matched_app.map(|a| a.name.clone()),
                    })
                    .collect();
                write_json(&out)?;
            } else {
                crate::ui::print_match_results(&results, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "macsweep", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: `macsweep config --show` を使用してください");
            }
        }
    }

    Ok(())
}

/// One tree per scanned target, in target order. Targets without items are dropped.
fn trees_for_report(report: &ScanReport) -> Vec<ResultTree> {
    report
        .targets
        .iter()
        .filter_map(|target| {
            let items: Vec<_> = report
                .items
                .iter()
                .filter(|i| i.parent_target_path == target.path)
                .cloned()
                .collect();
            (!items.is_empty()).then(|| build_tree(&items, &target.path))
        })
        .collect()
}

fn tree_json(tree: &ResultTree, rows: &[crate::tree::FlatTreeNode]) -> TreeJson {
    TreeJson {
        base_path: tree.base_path.clone(),
        total_bytes: tree.total_bytes(),
        rows: rows
            .iter()
            .map(|r| TreeRowJson {
                name: r.name.clone(),
                path: r.path.clone(),
                depth: r.depth,
                size_bytes: r.size_bytes,
                expanded: r.expanded,
                has_children: r.has_children,
                is_item: r.is_item,
                safe_to_delete: r.safe_to_delete,
                orphaned: r.orphaned,
            })
            .collect(),
    }
}

fn expand_user_path(p: &str, home_dir: &std::path::Path) -> String {
    let p = p.trim().trim_end_matches('/');
    if p == "~" {
        return home_dir.display().to_string();
    }
    match p.strip_prefix("~/") {
        Some(rest) => home_dir.join(rest).display().to_string(),
        None => p.to_string(),
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "未対応のシェルです: {other}（bash|zsh|fish を指定してください）"
        ))),
    }
}
