use serde::{Deserialize, Serialize};

use crate::core::{Category, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryType {
    pub fn from_file_type(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            EntryType::Symlink
        } else if ft.is_dir() {
            EntryType::Directory
        } else if ft.is_file() {
            EntryType::File
        } else {
            EntryType::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanItem {
    pub name: String,
    pub path: String,
    pub category: Category,
    pub size_kb: u64,
    pub size_bytes: u64,
    pub modified_at: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub risk_level: RiskLevel,
    pub safe_to_delete: bool,
    pub parent_target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_app_name: Option<String>,
}

impl ScanItem {
    pub fn is_orphaned(&self) -> bool {
        self.app_installed == Some(false)
    }
}
