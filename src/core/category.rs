use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed classification buckets. Drives risk level, recursion and safety policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Caches,
    Logs,
    ApplicationSupport,
    Containers,
    GroupContainers,
    SavedApplicationState,
    Preferences,
    LaunchItems,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Caches,
        Category::Logs,
        Category::ApplicationSupport,
        Category::Containers,
        Category::GroupContainers,
        Category::SavedApplicationState,
        Category::Preferences,
        Category::LaunchItems,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Caches => "caches",
            Category::Logs => "logs",
            Category::ApplicationSupport => "application-support",
            Category::Containers => "containers",
            Category::GroupContainers => "group-containers",
            Category::SavedApplicationState => "saved-application-state",
            Category::Preferences => "preferences",
            Category::LaunchItems => "launch-items",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Category::Caches => "キャッシュ",
            Category::Logs => "ログ",
            Category::ApplicationSupport => "Application Support",
            Category::Containers => "コンテナ",
            Category::GroupContainers => "グループコンテナ",
            Category::SavedApplicationState => "保存されたアプリ状態",
            Category::Preferences => "環境設定",
            Category::LaunchItems => "起動項目",
        }
    }

    /// Deepest level the scanner descends to for this category.
    pub const fn max_depth(self) -> usize {
        match self {
            Category::ApplicationSupport => 4,
            _ => 3,
        }
    }

    pub const fn is_recursable(self) -> bool {
        matches!(
            self,
            Category::ApplicationSupport
                | Category::Containers
                | Category::GroupContainers
                | Category::Caches
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!(
                    "カテゴリが不正です: {s}（{} のいずれかを指定してください）",
                    names.join("|")
                )
            })
    }
}
