use serde::{Deserialize, Serialize};

use crate::extract::ExtractStats;

/// Output record of one converted document. Field names are consumed by the
/// retrieval and compliance stages and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub section: String,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub title: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub clause: String,
    pub query: String,
}

impl Item {
    pub fn new(disclosure_number: &str, letter: char, query: String) -> Self {
        Self {
            clause: format!("{disclosure_number} {letter}"),
            query,
        }
    }
}

impl Group {
    pub fn new(disclosure_number: &str, title: &str, items: Vec<Item>) -> Self {
        let title = if title.is_empty() {
            disclosure_number.to_string()
        } else {
            format!("{disclosure_number} {title}")
        };

        Self { title, items }
    }
}

impl Document {
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|group| group.items.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownEntry {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<MarkdownEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptionsSnapshot {
    pub recovery_passes: bool,
    pub subitem_separator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: String,
    pub sha256: String,
    pub output: Option<String>,
    pub section: String,
    pub section_source: String,
    pub group_count: usize,
    pub item_count: usize,
    pub stats: ExtractStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertCounts {
    pub document_count: usize,
    pub converted_count: usize,
    pub failed_count: usize,
    pub groups_total: usize,
    pub items_total: usize,
    pub unknown_section_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub input_directory: String,
    pub output_directory: String,
    pub options: ConvertOptionsSnapshot,
    pub counts: ConvertCounts,
    pub documents: Vec<DocumentReport>,
    pub warnings: Vec<String>,
}
