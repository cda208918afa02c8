use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub const fn for_category(category: Category) -> Self {
        match category {
            Category::Caches => RiskLevel::Low,
            Category::Logs => RiskLevel::Low,
            Category::SavedApplicationState => RiskLevel::Low,
            Category::ApplicationSupport => RiskLevel::Medium,
            Category::Containers => RiskLevel::High,
            Category::GroupContainers => RiskLevel::High,
            Category::Preferences => RiskLevel::High,
            Category::LaunchItems => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
