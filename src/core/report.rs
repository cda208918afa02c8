use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Category, ScanItem, ScanTarget};

pub type CategoryTotals = BTreeMap<Category, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub threshold_bytes: u64,
    pub targets: Vec<ScanTarget>,
    pub items: Vec<ScanItem>,
    pub totals_by_category: CategoryTotals,
    pub skipped: Vec<SkippedEntry>,
}

impl ScanReport {
    /// Every category gets a key, even with no items.
    pub fn totals_for(items: &[ScanItem]) -> CategoryTotals {
        let mut totals: CategoryTotals = Category::ALL.iter().map(|c| (*c, 0)).collect();
        for item in items {
            let acc = totals.entry(item.category).or_insert(0);
            *acc = acc.saturating_add(item.size_bytes);
        }
        totals
    }

    pub fn total_bytes(&self) -> u64 {
        self.totals_by_category.values().sum()
    }

    pub fn safe_bytes(&self) -> u64 {
        self.items
            .iter()
            .filter(|i| i.safe_to_delete)
            .map(|i| i.size_bytes)
            .sum()
    }
}
