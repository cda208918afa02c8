use std::path::Path;

use crate::core::{Category, ScanTarget};

fn target(path: &Path, category: Category, guideline: &str) -> ScanTarget {
    ScanTarget::new(path.display().to_string(), category).with_guideline(guideline)
}

/// Standard Library locations, one per category, plus system-wide ones on request.
pub fn default_targets(home_dir: &Path, include_system: bool) -> Vec<ScanTarget> {
    let lib = home_dir.join("Library");
    let mut targets = vec![
        target(
            &lib.join("Caches"),
            Category::Caches,
            "キャッシュは再生成されます。アプリを終了してから削除してください。",
        ),
        target(
            &lib.join("Logs"),
            Category::Logs,
            "ログは調査に不要であれば削除できます。",
        ),
        target(
            &lib.join("Application Support"),
            Category::ApplicationSupport,
            "アプリのデータ本体を含みます。アンインストール済みアプリのフォルダのみ検討してください。",
        ),
        target(
            &lib.join("Containers"),
            Category::Containers,
            "サンドボックスアプリのデータです。アプリが残っている場合は削除しないでください。",
        ),
        target(
            &lib.join("Group Containers"),
            Category::GroupContainers,
            "複数アプリで共有されるデータです。慎重に扱ってください。",
        ),
        target(
            &lib.join("Saved Application State"),
            Category::SavedApplicationState,
            "ウィンドウ復元用の状態です。削除しても再生成されます。",
        ),
        target(
            &lib.join("Preferences"),
            Category::Preferences,
            "設定ファイルです。削除すると設定が失われます。",
        ),
        target(
            &lib.join("LaunchAgents"),
            Category::LaunchItems,
            "ログイン時の自動起動項目です。削除の前に提供元を確認してください。",
        ),
    ];

    if include_system {
        let sys = Path::new("/Library");
        targets.extend([
            target(
                &sys.join("Caches"),
                Category::Caches,
                "システム全体のキャッシュです。削除には管理者権限が必要です。",
            )
            .system(),
            target(&sys.join("Logs"), Category::Logs, "システムのログです。").system(),
            target(
                &sys.join("Application Support"),
                Category::ApplicationSupport,
                "全ユーザー共通のアプリデータです。",
            )
            .system(),
            target(
                &sys.join("Preferences"),
                Category::Preferences,
                "システム全体の設定です。",
            )
            .system(),
            target(
                &sys.join("LaunchAgents"),
                Category::LaunchItems,
                "全ユーザーの自動起動項目です。",
            )
            .system(),
            target(
                &sys.join("LaunchDaemons"),
                Category::LaunchItems,
                "システムデーモンです。提供元が不明なものに注意してください。",
            )
            .system(),
        ]);
    }

    targets
}

/// Keeps targets whose category is listed. An empty list keeps everything.
pub fn filter_by_category(targets: Vec<ScanTarget>, categories: &[Category]) -> Vec<ScanTarget> {
    if categories.is_empty() {
        return targets;
    }
    targets
        .into_iter()
        .filter(|t| categories.contains(&t.category))
        .collect()
}
