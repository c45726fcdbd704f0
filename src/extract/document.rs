use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::Classification;
use super::group::GroupScan;
use super::{DisclosureParser, ExtractOptions, Scan};
use crate::model::{Document, Group};

/// Non-blank lines after a bare "NNN-N Title" line searched for a
/// requirements cue.
const MIXED_FORMAT_LOOKAHEAD: usize = 5;

/// Counters describing how a document was parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub section_source: String,
    pub headers_seen: usize,
    pub header_groups: usize,
    pub recovered_groups: usize,
    pub empty_headers: Vec<String>,
    pub recovered_blocks: usize,
    pub items_total: usize,
    pub rescued_backward: usize,
    pub rescued_forward: usize,
}

#[derive(Debug)]
pub struct DocumentPatterns {
    bare_header: Regex,
}

impl DocumentPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bare_header: Regex::new(r"^(?P<number>\d+-\d+)\s+(?P<title>\S.*)$")
                .context("failed to compile bare disclosure header regex")?,
        })
    }
}

#[derive(Debug, Default)]
struct DocumentAccumulator {
    groups: Vec<Group>,
    stats: ExtractStats,
}

impl DocumentAccumulator {
    fn push_header_group(&mut self, number: &str, title: &str, scan: GroupScan) {
        self.stats.headers_seen += 1;
        self.stats.rescued_backward += scan.rescued_backward;
        self.stats.rescued_forward += scan.rescued_forward;

        if scan.items.is_empty() {
            debug!(disclosure = number, stop = ?scan.stop, "disclosure header without items");
            self.stats.empty_headers.push(number.to_string());
        } else {
            self.stats.header_groups += 1;
            self.groups.push(Group::new(number, title, scan.items));
        }

        self.push_recovered_groups(scan.recovered_groups);
    }

    fn push_recovered_groups(&mut self, groups: Vec<Group>) {
        self.stats.recovered_groups += groups.len();
        self.groups.extend(groups);
    }

    fn finish(mut self, section: String) -> (Document, ExtractStats) {
        let document = Document {
            section,
            groups: self.groups,
        };
        self.stats.items_total = document.item_count();
        (document, self.stats)
    }
}

impl DisclosureParser {
    pub fn parse(&self, text: &str, options: &ExtractOptions) -> Document {
        self.parse_with_stats(text, options).0
    }

    pub fn parse_with_stats(&self, text: &str, options: &ExtractOptions) -> (Document, ExtractStats) {
        let (section, section_source) = self.identify_section(text);
        let lines = text.lines().collect::<Vec<&str>>();
        let scan = Scan {
            parser: self,
            lines: &lines,
            section: &section,
            options,
        };

        let mut accumulator = DocumentAccumulator::default();
        accumulator.stats.section_source = section_source.as_str().to_string();

        let mut index = 0;
        while let Some(line) = scan.line(index) {
            let next_index = match self.classifier.classify(line) {
                Classification::DisclosureHeader { number, title } => {
                    let group_scan = scan.extract_group(index + 1, &number);
                    let next_index = group_scan.next_index;
                    accumulator.push_header_group(&number, &title, group_scan);
                    next_index
                }
                Classification::RecoveredTextBlockStart => {
                    accumulator.stats.recovered_blocks += 1;
                    let (groups, next_index) = scan.extract_from_block(index);
                    accumulator.push_recovered_groups(groups);
                    next_index
                }
                Classification::RequirementsStart
                | Classification::CompilationRequirements
                | Classification::ClauseMarker { .. }
                | Classification::RomanSubMarker { .. }
                | Classification::StrongSectionEnd
                | Classification::Plain => match scan.mixed_format_header(index) {
                    Some((number, title)) => {
                        debug!(disclosure = %number, line = index, "bare disclosure header");
                        let group_scan = scan.extract_group(index + 1, &number);
                        let next_index = group_scan.next_index;
                        accumulator.push_header_group(&number, &title, group_scan);
                        next_index
                    }
                    None => index + 1,
                },
            };

            index = next_index.max(index + 1);
        }

        let (document, stats) = accumulator.finish(section);
        debug!(
            section = %document.section,
            groups = document.groups.len(),
            items = stats.items_total,
            empty_headers = stats.empty_headers.len(),
            "parsed document"
        );

        (document, stats)
    }
}

impl Scan<'_> {
    /// A bare "NNN-N Title" line of this section counts as a disclosure header
    /// when a requirements cue follows within a few non-blank lines.
    pub(super) fn mixed_format_header(&self, index: usize) -> Option<(String, String)> {
        let captures = self
            .parser
            .document
            .bare_header
            .captures(self.line(index)?.trim())?;
        let number = captures.name("number")?.as_str();
        if !number.starts_with(&self.section_prefix()) {
            return None;
        }

        let cue_follows = self.lines[index + 1..]
            .iter()
            .filter(|line| !line.trim().is_empty())
            .take(MIXED_FORMAT_LOOKAHEAD)
            .any(|line| matches!(self.parser.classifier.classify(line), Classification::RequirementsStart));
        if !cue_follows {
            return None;
        }

        let title = super::text::clean_text(captures.name("title")?.as_str());
        Some((number.to_string(), title))
    }
}
