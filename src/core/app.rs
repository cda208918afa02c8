use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    pub path: String,
}

impl InstalledApp {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bundle_id: None,
            path: path.into(),
        }
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    ExactName,
    BundleId,
    PartialName,
    None,
}

impl MatchType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MatchType::ExactName => "exact-name",
            MatchType::BundleId => "bundle-id",
            MatchType::PartialName => "partial-name",
            MatchType::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMatchResult<'a> {
    pub is_installed: bool,
    pub matched_app: Option<&'a InstalledApp>,
    pub match_type: MatchType,
}

impl<'a> AppMatchResult<'a> {
    pub fn found(app: &'a InstalledApp, match_type: MatchType) -> Self {
        Self {
            is_installed: true,
            matched_app: Some(app),
            match_type,
        }
    }

    pub fn orphaned() -> Self {
        Self {
            is_installed: false,
            matched_app: None,
            match_type: MatchType::None,
        }
    }
}
