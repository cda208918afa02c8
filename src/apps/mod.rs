//! Installed-application matching.
//!
//! Folder names under `~/Library/Application Support` rarely match the app
//! name exactly, so the matcher tries a fixed ladder of strategies from strict
//! to loose. The first one that hits wins. A folder nothing matches belongs to
//! an app that is no longer installed.

use std::collections::HashMap;

use crate::core::{AppMatchResult, InstalledApp, MatchType};

const MIN_CONTAINED_NAME_LEN: usize = 4;
const MIN_BUNDLE_FRAGMENT_LEN: usize = 4;
const MIN_SIGNIFICANT_WORD_LEN: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct AppMatcher {
    apps: Vec<InstalledApp>,
    by_name: HashMap<String, usize>,
    by_bundle_id: HashMap<String, usize>,
}

impl AppMatcher {
    pub fn new(apps: Vec<InstalledApp>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_bundle_id = HashMap::new();
        for (idx, app) in apps.iter().enumerate() {
            let name = normalize(&app.name);
            if !name.is_empty() {
                by_name.entry(name).or_insert(idx);
            }
            if let Some(bundle_id) = app.bundle_id.as_deref() {
                let bundle_id = bundle_id.trim().to_lowercase();
                if !bundle_id.is_empty() {
                    by_bundle_id.entry(bundle_id).or_insert(idx);
                }
            }
        }
        Self {
            apps,
            by_name,
            by_bundle_id,
        }
    }

    pub fn match_folder(&self, folder_name: &str) -> AppMatchResult<'_> {
        let folder_lower = folder_name.trim().to_lowercase();
        let folder_norm = normalize(folder_name);
        if folder_lower.is_empty() || self.apps.is_empty() {
            return AppMatchResult::orphaned();
        }

        if let Some(&idx) = self.by_name.get(&folder_norm) {
            return AppMatchResult::found(&self.apps[idx], MatchType::ExactName);
        }
        if let Some(&idx) = self.by_bundle_id.get(&folder_lower) {
            return AppMatchResult::found(&self.apps[idx], MatchType::BundleId);
        }

        let strategies: [(fn(&Candidate<'_>, &Folder<'_>) -> bool, MatchType); 6] = [
            (contains_literal_name, MatchType::PartialName),
            (contains_significant_words, MatchType::PartialName),
            (contains_normalized_name, MatchType::PartialName),
            (cross_contains_bundle_id, MatchType::BundleId),
            (overlaps_normalized_name, MatchType::PartialName),
            (prefix_or_stripped_equal, MatchType::PartialName),
        ];

        let folder = Folder {
            lower: &folder_lower,
            normalized: &folder_norm,
        };
        let candidates: Vec<Candidate<'_>> = self.apps.iter().map(Candidate::new).collect();
        for (strategy, match_type) in strategies {
            if let Some(c) = candidates.iter().find(|c| strategy(c, &folder)) {
                return AppMatchResult::found(c.app, match_type);
            }
        }

        AppMatchResult::orphaned()
    }
}

struct Folder<'a> {
    lower: &'a str,
    normalized: &'a str,
}

struct Candidate<'a> {
    app: &'a InstalledApp,
    name_lower: String,
    normalized: String,
    words: Vec<String>,
    bundle_id: Option<String>,
}

impl<'a> Candidate<'a> {
    fn new(app: &'a InstalledApp) -> Self {
        Self {
            app,
            name_lower: app.name.trim().to_lowercase(),
            normalized: normalize(&app.name),
            words: significant_words(&app.name),
            bundle_id: app
                .bundle_id
                .as_deref()
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty()),
        }
    }
}

fn contains_literal_name(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    !c.name_lower.is_empty() && f.lower.contains(c.name_lower.as_str())
}

fn contains_significant_words(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    !c.words.is_empty() && c.words.iter().all(|w| f.lower.contains(w.as_str()))
}

fn contains_normalized_name(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    c.normalized.chars().count() >= MIN_CONTAINED_NAME_LEN
        && f.normalized.contains(c.normalized.as_str())
}

fn cross_contains_bundle_id(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    let Some(bundle_id) = c.bundle_id.as_deref() else {
        return false;
    };

    let bundle_segments: Vec<String> = bundle_id.split('.').map(normalize).collect();
    let folder_segments: Vec<String> = f.lower.split('.').map(normalize).collect();
    if bundle_segments.len() > 1 && bundle_segments == folder_segments {
        return true;
    }

    let bundle_flat = bundle_id.replace('.', "");
    let folder_flat = f.lower.replace('.', "");
    if !bundle_flat.is_empty() && folder_flat.contains(bundle_flat.as_str()) {
        return true;
    }
    if folder_flat.chars().count() >= MIN_BUNDLE_FRAGMENT_LEN
        && bundle_flat.contains(folder_flat.as_str())
    {
        return true;
    }

    let last = bundle_id.rsplit('.').next().unwrap_or_default();
    last.chars().count() >= MIN_BUNDLE_FRAGMENT_LEN && f.lower.contains(last)
}

fn overlaps_normalized_name(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    let a: Vec<char> = f.normalized.chars().collect();
    let b: Vec<char> = c.normalized.chars().collect();
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return false;
    }
    longest_common_run(&a, &b) >= MIN_CONTAINED_NAME_LEN.min(shorter)
}

fn longest_common_run(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for &ca in a {
        let mut row = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}

fn prefix_or_stripped_equal(c: &Candidate<'_>, f: &Folder<'_>) -> bool {
    if c.normalized.is_empty() || f.normalized.is_empty() {
        return false;
    }
    if f.normalized.starts_with(c.normalized.as_str())
        || c.normalized.starts_with(f.normalized)
    {
        return true;
    }

    let compact: String = c.name_lower.split_whitespace().collect();
    let stripped = compact.strip_suffix("app").unwrap_or(&compact);
    let folder_compact: String = f.lower.split_whitespace().collect();
    !stripped.is_empty() && stripped == folder_compact
}

/// Lowercase and keep only alphanumerics.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercased words of an app name longer than two characters.
/// `BreakTimer` gives `break`, `timer`; `HTMLEditor Pro` gives `html`, `editor`, `pro`.
pub fn significant_words(name: &str) -> Vec<String> {
    name.split_whitespace()
        .flat_map(split_camel_case)
        .filter(|w| w.chars().count() >= MIN_SIGNIFICANT_WORD_LEN)
        .map(|w| w.to_lowercase())
        .collect()
}

fn split_camel_case(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(apps: &[(&str, Option<&str>)]) -> AppMatcher {
        AppMatcher::new(
            apps.iter()
                .map(|(name, bundle)| {
                    let app = InstalledApp::new(*name, format!("/Applications/{name}.app"));
                    match bundle {
                        Some(b) => app.with_bundle_id(*b),
                        None => app,
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn exact_name_match() {
        let m = matcher(&[("Notion", Some("notion.id"))]);
        let r = m.match_folder("Notion");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::ExactName);
        assert_eq!(r.matched_app.map(|a| a.name.as_str()), Some("Notion"));
    }

    #[test]
    fn exact_name_ignores_case_and_punctuation() {
        let m = matcher(&[("Visual Studio Code", None)]);
        let r = m.match_folder("visual-studio-code");
        assert_eq!(r.match_type, MatchType::ExactName);
    }

    #[test]
    fn bundle_id_folder_matches() {
        let m = matcher(&[("Notion", Some("notion.id"))]);
        let r = m.match_folder("Notion.ID");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::BundleId);
    }

    #[test]
    fn shipit_folder_matches_non_exact() {
        let m = matcher(&[("BreakTimer", None)]);
        let r = m.match_folder("com.tomjwatson.breaktimer.ShipIt");
        assert!(r.is_installed);
        assert_ne!(r.match_type, MatchType::ExactName);
        assert_ne!(r.match_type, MatchType::None);
    }

    #[test]
    fn significant_words_match_across_separators() {
        let m = matcher(&[("Break Timer Pro", None)]);
        let r = m.match_folder("timer-break-pro-data");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::PartialName);
    }

    #[test]
    fn bundle_prefix_folder_matches() {
        let m = matcher(&[("Slack", Some("com.tinyspeck.slackmacgap"))]);
        let r = m.match_folder("com.tinyspeck.slackmacgap.ShipIt");
        assert!(r.is_installed);
        // literal-name containment runs before bundle cross-containment
        assert_eq!(r.match_type, MatchType::PartialName);

        let m = matcher(&[("Messenger", Some("com.facebook.archon"))]);
        let r = m.match_folder("com.facebook.archon.helper");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::BundleId);
    }

    #[test]
    fn folder_shorter_than_app_name_matches_by_overlap() {
        let m = matcher(&[("Visual Studio Code", None)]);
        let r = m.match_folder("Code");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::PartialName);
    }

    #[test]
    fn no_apps_means_everything_is_orphaned() {
        let m = AppMatcher::new(vec![]);
        for name in ["Notion", "com.apple.Safari", "Code", ""] {
            let r = m.match_folder(name);
            assert!(!r.is_installed);
            assert_eq!(r.match_type, MatchType::None);
            assert!(r.matched_app.is_none());
        }
    }

    #[test]
    fn unrelated_folder_is_orphaned() {
        let m = matcher(&[("Notion", Some("notion.id")), ("Slack", Some("com.tinyspeck.slackmacgap"))]);
        let r = m.match_folder("Zoom");
        assert!(!r.is_installed);
        assert_eq!(r.match_type, MatchType::None);
    }

    #[test]
    fn first_registration_wins_on_collision() {
        let m = AppMatcher::new(vec![
            InstalledApp::new("Foo", "/Applications/Foo.app"),
            InstalledApp::new("foo", "/Users/me/Applications/foo.app"),
        ]);
        let r = m.match_folder("FOO");
        assert_eq!(
            r.matched_app.map(|a| a.path.as_str()),
            Some("/Applications/Foo.app")
        );
    }

    fn app(name: &str, bundle: Option<&str>) -> InstalledApp {
        let app = InstalledApp::new(name, format!("/Applications/{name}.app"));
        match bundle {
            Some(b) => app.with_bundle_id(b),
            None => app,
        }
    }

    fn hits(
        strategy: fn(&Candidate<'_>, &Folder<'_>) -> bool,
        app: &InstalledApp,
        folder: &str,
    ) -> bool {
        let lower = folder.trim().to_lowercase();
        let normalized = normalize(folder);
        strategy(
            &Candidate::new(app),
            &Folder {
                lower: &lower,
                normalized: &normalized,
            },
        )
    }

    #[test]
    fn normalized_containment_needs_four_characters() {
        let figma = app("Fi-g-ma", None);
        assert!(hits(contains_normalized_name, &figma, "figma_helper"));
        assert!(!hits(contains_normalized_name, &app("A-b-c", None), "abc_helper"));

        let m = AppMatcher::new(vec![figma]);
        let r = m.match_folder("figma_helper");
        assert_eq!(r.match_type, MatchType::PartialName);
        assert_eq!(r.matched_app.map(|a| a.name.as_str()), Some("Fi-g-ma"));
    }

    #[test]
    fn bundle_final_segment_matches_folder() {
        let suite = app("Acme Suite", Some("com.acme.widgetpro"));
        assert!(hits(cross_contains_bundle_id, &suite, "WidgetPro Helper"));

        let m = AppMatcher::new(vec![suite]);
        let r = m.match_folder("WidgetPro Helper");
        assert!(r.is_installed);
        assert_eq!(r.match_type, MatchType::BundleId);
    }

    #[test]
    fn short_bundle_final_segment_is_ignored() {
        let xyz = app("Acme Suite", Some("com.acme.xyz"));
        assert!(!hits(cross_contains_bundle_id, &xyz, "xyz-tools"));
    }

    #[test]
    fn bundle_segments_compare_after_normalizing() {
        let suite = app("Acme Suite", Some("com.acme.widget-pro"));
        assert!(hits(cross_contains_bundle_id, &suite, "com.acme.WidgetPro"));

        let m = AppMatcher::new(vec![suite]);
        let r = m.match_folder("com.acme.WidgetPro");
        assert_eq!(r.match_type, MatchType::BundleId);
    }

    #[test]
    fn overlap_needs_four_shared_characters_between_long_names() {
        let xyzw = app("Xyzw", None);
        assert!(!hits(overlaps_normalized_name, &xyzw, "abxyzc"));
        assert!(hits(overlaps_normalized_name, &xyzw, "abxyzwc"));
        // a name shorter than four only has to overlap in full
        assert!(hits(overlaps_normalized_name, &app("Kit", None), "mykitbox"));

        let m = AppMatcher::new(vec![xyzw]);
        let r = m.match_folder("abxyzc");
        assert!(!r.is_installed);
        assert_eq!(r.match_type, MatchType::None);
    }

    #[test]
    fn prefix_and_app_suffix_stripping() {
        assert!(hits(prefix_or_stripped_equal, &app("Note", None), "Notebook Sync"));
        assert!(hits(prefix_or_stripped_equal, &app("Zed App", None), "zed"));
        assert!(!hits(prefix_or_stripped_equal, &app("Zed App", None), "zen"));
        assert!(!hits(prefix_or_stripped_equal, &app("App", None), "Files"));
    }

    #[test]
    fn first_bundle_id_registration_wins() {
        let m = AppMatcher::new(vec![
            app("Tool", Some("com.acme.tool")),
            app("Tool Beta", Some("COM.ACME.TOOL")),
        ]);
        let r = m.match_folder("com.acme.tool");
        assert_eq!(r.match_type, MatchType::BundleId);
        assert_eq!(r.matched_app.map(|a| a.name.as_str()), Some("Tool"));
    }

    #[test]
    fn camel_case_splitting() {
        assert_eq!(significant_words("BreakTimer"), vec!["break", "timer"]);
        assert_eq!(
            significant_words("HTMLEditor Pro"),
            vec!["html", "editor", "pro"]
        );
        assert_eq!(significant_words("Go 2 IT"), Vec::<String>::new());
    }
}
