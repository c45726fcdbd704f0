//! Disclosure-structure extraction.
//!
//! Turns a converted standards document (markdown with OCR text inlined as
//! recovered-text blocks) into `section → groups → items`. Lettered clauses
//! become items; roman-numeral sub-clauses are folded into their clause text.
//!
//! [`DisclosureParser`] only holds compiled patterns and can be shared between
//! threads. Every call to [`DisclosureParser::parse`] builds its own scan
//! context and accumulator, so documents never share state.

use anyhow::Result;
use tracing::debug;

mod classify;
mod clause;
mod document;
mod group;
mod recovered;
mod section;
mod text;


pub use classify::{Classification, LetterSet, LineClassifier, MarkerPosition, RomanNumeral};
pub use document::ExtractStats;
pub use section::{SectionSource, UNKNOWN_SECTION};

use clause::ClausePatterns;
use document::DocumentPatterns;
use group::GroupPatterns;
use recovered::BlockPatterns;
use section::SectionIdentifier;

pub const DEFAULT_SUBITEM_SEPARATOR: &str = "、";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Backward rescan at the compilation-requirements marker and the
    /// forward f–h pass. Both only ever add items.
    pub recovery_passes: bool,
    pub subitem_separator: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            recovery_passes: true,
            subitem_separator: DEFAULT_SUBITEM_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct DisclosureParser {
    classifier: LineClassifier,
    sections: SectionIdentifier,
    clauses: ClausePatterns,
    groups: GroupPatterns,
    blocks: BlockPatterns,
    document: DocumentPatterns,
}

impl DisclosureParser {
    pub fn new() -> Result<Self> {
        let parser = Self {
            classifier: LineClassifier::new()?,
            sections: SectionIdentifier::new()?,
            clauses: ClausePatterns::new()?,
            groups: GroupPatterns::new()?,
            blocks: BlockPatterns::new()?,
            document: DocumentPatterns::new()?,
        };

        debug!(
            line_strategies = ?LineClassifier::strategy_order(),
            section_strategies = ?section::STRATEGY_ORDER.map(SectionSource::as_str),
            merge_anchors = ?parser.clauses.anchor_order(),
            "compiled extraction patterns"
        );

        Ok(parser)
    }

    pub fn identify_section(&self, content: &str) -> (String, SectionSource) {
        self.sections.identify(content)
    }
}

/// Per-document view shared by the group, clause and block extractors.
struct Scan<'a> {
    parser: &'a DisclosureParser,
    lines: &'a [&'a str],
    section: &'a str,
    options: &'a ExtractOptions,
}

impl Scan<'_> {
    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).copied()
    }

    fn section_prefix(&self) -> String {
        format!("{}-", self.section)
    }
}
