mod app;
mod category;
mod item;
mod report;
mod risk;
mod target;

pub use app::{AppMatchResult, InstalledApp, MatchType};
pub use category::Category;
pub use item::{EntryType, ScanItem};
pub use report::{CategoryTotals, ScanReport, SkippedEntry};
pub use risk::RiskLevel;
pub use target::ScanTarget;
