//! Deletion-safety rules.
//!
//! Every table below is evaluated in order and the first hit decides. Safe
//! patterns run before unsafe ones, so `Cache Data` is safe even though it also
//! ends in `data`.

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::Category;

/// Anything deeper than this below its target is never offered for deletion.
pub const MAX_SAFE_DEPTH: usize = 4;

const SAFE: &[&str] = &[
    r"(?i)cache",
    r"(?i)^logs?$",
    r"(?i)\.log$",
    r"(?i)/logs/",
    r"(?i)^(tmp|temp|temporary items)$",
    r"(?i)service ?worker",
    r"(?i)^indexeddb$",
    r"(?i)^(local|session) storage$",
    r"(?i)^blob_storage$",
    r"(?i)\.(old|bak|backup)$",
];

const UNSAFE: &[&str] = &[
    r"(?i)data$",
    r"(?i)database$",
    r"(?i)preferences$",
    r"(?i)prefs$",
    r"(?i)extensions?$",
    r"(?i)plugins?$",
    r"(?i)saved state$",
    r"(?i)\.app$",
    r"(?i)\.app/",
    r"(?i)_codesignature",
    r"(?i)coderesources$",
];

const LEAF: &[&str] = &[
    r"(?i)^caches?$",
    r"(?i)cache$",
    r"(?i)^cache",
    r"(?i)^logs?$",
    r"(?i)^history",
    r"(?i)^(tmp|temp)$",
    r"(?i)^indexeddb$",
    r"(?i)leveldb$",
    r"(?i)^service ?worker$",
    r"(?i)^blob_storage$",
    r"(?i)^(local|session) storage$",
];

const OVERRIDE_GUARD: &[&str] = &[r"(?i)preferences?", r"(?i)data$", r"(?i)user data"];

static SAFE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(SAFE));
static UNSAFE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(UNSAFE));
static LEAF_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(LEAF));
static OVERRIDE_GUARD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(OVERRIDE_GUARD));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

fn first_match(patterns: &[Regex], path: &str, name: &str) -> Option<usize> {
    patterns
        .iter()
        .position(|re| re.is_match(name) || re.is_match(path))
}

pub fn is_safe_to_delete(path: &str, name: &str, category: Category, depth: usize) -> bool {
    if depth > MAX_SAFE_DEPTH {
        return false;
    }
    if matches!(category, Category::Preferences | Category::LaunchItems) {
        return false;
    }
    if first_match(&SAFE_PATTERNS, path, name).is_some() {
        return true;
    }
    if first_match(&UNSAFE_PATTERNS, path, name).is_some() {
        return false;
    }
    if path.to_ascii_lowercase().ends_with(".db") && !is_cache_database(name) {
        return false;
    }
    matches!(
        category,
        Category::Caches | Category::SavedApplicationState
    )
}

fn is_cache_database(name: &str) -> bool {
    name.to_ascii_lowercase().contains("cache")
}

/// Directories treated as one unit: measured and recorded, never descended into.
pub fn is_leaf_cache_directory(path: &str, name: &str) -> bool {
    first_match(&LEAF_PATTERNS, path, name).is_some()
}

/// Paths the orphan override must leave alone even when their app is gone.
pub fn matches_explicit_unsafe(path: &str) -> bool {
    OVERRIDE_GUARD_PATTERNS.iter().any(|re| re.is_match(path))
}

/// Number of non-empty segments of `path` strictly below `base_path`.
/// Paths outside `base_path` have depth 0.
pub fn calculate_depth(path: &Path, base_path: &Path) -> usize {
    let Ok(rel) = path.strip_prefix(base_path) else {
        return 0;
    };
    rel.components()
        .filter(|c| matches!(c, Component::Normal(s) if !s.is_empty()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/Users/me/Library";

    fn p(rel: &str) -> String {
        format!("{BASE}/{rel}")
    }

    #[test]
    fn preferences_and_launch_items_are_never_safe() {
        for name in ["Caches", "old.bak", "anything", "logs"] {
            let path = p(&format!("Foo/{name}"));
            for depth in 0..6 {
                assert!(!is_safe_to_delete(&path, name, Category::Preferences, depth));
                assert!(!is_safe_to_delete(&path, name, Category::LaunchItems, depth));
            }
        }
    }

    #[test]
    fn caches_folder_is_safe() {
        assert!(is_safe_to_delete(
            &p("Foo/Caches"),
            "Caches",
            Category::Caches,
            1
        ));
    }

    #[test]
    fn preferences_folder_in_application_support_is_not_safe() {
        assert!(!is_safe_to_delete(
            &p("Application Support/Foo/Preferences"),
            "Preferences",
            Category::ApplicationSupport,
            1
        ));
    }

    #[test]
    fn safe_patterns_win_over_unsafe_patterns() {
        // "Cache Data" also ends in "data".
        assert!(is_safe_to_delete(
            &p("Application Support/Foo/Cache Data"),
            "Cache Data",
            Category::ApplicationSupport,
            2
        ));
        assert!(!is_safe_to_delete(
            &p("Application Support/Foo/User Data"),
            "User Data",
            Category::ApplicationSupport,
            2
        ));
    }

    #[test]
    fn too_deep_is_never_safe() {
        assert!(!is_safe_to_delete(
            &p("Caches/a/b/c/d/Cache"),
            "Cache",
            Category::Caches,
            5
        ));
    }

    #[test]
    fn backup_suffixes_are_safe() {
        assert!(is_safe_to_delete(
            &p("Application Support/Foo/state.bak"),
            "state.bak",
            Category::ApplicationSupport,
            2
        ));
        assert!(is_safe_to_delete(
            &p("Containers/x/settings.OLD"),
            "settings.OLD",
            Category::Containers,
            2
        ));
    }

    #[test]
    fn databases_are_not_safe_unless_cache() {
        assert!(!is_safe_to_delete(
            &p("Saved Application State/com.foo.savedState/windows.db"),
            "windows.db",
            Category::SavedApplicationState,
            2
        ));
        assert!(is_safe_to_delete(
            &p("Saved Application State/com.foo.savedState/cache.db"),
            "cache.db",
            Category::SavedApplicationState,
            2
        ));
    }

    #[test]
    fn category_default_applies_after_tables() {
        assert!(is_safe_to_delete(
            &p("Saved Application State/com.foo.savedState"),
            "com.foo.savedState",
            Category::SavedApplicationState,
            1
        ));
        assert!(!is_safe_to_delete(
            &p("Application Support/Foo"),
            "Foo",
            Category::ApplicationSupport,
            1
        ));
    }

    #[test]
    fn app_bundles_and_extensions_are_unsafe() {
        assert!(!is_safe_to_delete(
            &p("Application Support/Foo/Helper.app"),
            "Helper.app",
            Category::ApplicationSupport,
            2
        ));
        assert!(!is_safe_to_delete(
            &p("Application Support/Foo/Extensions"),
            "Extensions",
            Category::ApplicationSupport,
            2
        ));
    }

    #[test]
    fn leaf_cache_directory_detection() {
        assert!(is_leaf_cache_directory(&p("Foo/Cache"), "Cache"));
        assert!(is_leaf_cache_directory(&p("Foo/GPUCache"), "GPUCache"));
        assert!(is_leaf_cache_directory(&p("Foo/IndexedDB"), "IndexedDB"));
        assert!(is_leaf_cache_directory(&p("Foo/leveldb"), "leveldb"));
        assert!(!is_leaf_cache_directory(&p("Foo/MyAppData"), "MyAppData"));
        assert!(!is_leaf_cache_directory(&p("Caches/com.foo"), "com.foo"));
    }

    #[test]
    fn override_guard_patterns() {
        assert!(matches_explicit_unsafe(&p("Application Support/Foo/User Data")));
        assert!(matches_explicit_unsafe(&p("Application Support/Foo/Preference")));
        assert!(!matches_explicit_unsafe(&p("Application Support/OldApp")));
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(SAFE_PATTERNS.len(), SAFE.len());
        assert_eq!(UNSAFE_PATTERNS.len(), UNSAFE.len());
        assert_eq!(LEAF_PATTERNS.len(), LEAF.len());
        assert_eq!(OVERRIDE_GUARD_PATTERNS.len(), OVERRIDE_GUARD.len());
    }

    #[test]
    fn webkit_folder_in_application_support_is_not_safe() {
        assert!(!is_safe_to_delete(
            "/lib/Application Support/WebKit",
            "WebKit",
            Category::ApplicationSupport,
            1
        ));
    }

    #[test]
    fn depth_counts_segments_below_base() {
        let base = Path::new("/Users/me/Library/Caches");
        assert_eq!(calculate_depth(base, base), 0);
        assert_eq!(calculate_depth(&base.join("a"), base), 1);
        assert_eq!(calculate_depth(&base.join("a/b/c"), base), 3);
        assert_eq!(calculate_depth(Path::new("/tmp/x"), base), 0);
    }
}
