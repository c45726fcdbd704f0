use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, trace};

use super::Scan;
use super::classify::{Classification, LetterSet};
use super::text::clean_text;
use crate::model::{Group, Item};

/// How far back the compilation-requirements rescan may reach.
pub const RESCAN_WINDOW: usize = 30;

/// How far past the group start the f–h pass looks.
pub const LATE_LETTER_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NewDisclosure,
    StrongSectionEnd,
    CompilationRequirements,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    SeekingRequirements,
    InRequirements,
    Done(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    Advance,
    RecoverBlock,
    ExtractItem,
    RescanAndStop,
    Stop(StopReason),
}

impl ScanState {
    pub fn transition(self, classification: &Classification) -> (Self, ScanAction) {
        match (self, classification) {
            (Self::Done(reason), _) => (self, ScanAction::Stop(reason)),
            (_, Classification::DisclosureHeader { .. }) => (
                Self::Done(StopReason::NewDisclosure),
                ScanAction::Stop(StopReason::NewDisclosure),
            ),
            (_, Classification::RequirementsStart) => (Self::InRequirements, ScanAction::Advance),
            (_, Classification::RecoveredTextBlockStart) => (self, ScanAction::RecoverBlock),
            (Self::InRequirements, Classification::CompilationRequirements) => (
                Self::Done(StopReason::CompilationRequirements),
                ScanAction::RescanAndStop,
            ),
            (Self::InRequirements, Classification::StrongSectionEnd) => (
                Self::Done(StopReason::StrongSectionEnd),
                ScanAction::Stop(StopReason::StrongSectionEnd),
            ),
            (
                Self::InRequirements,
                Classification::ClauseMarker { .. }
                | Classification::RomanSubMarker { .. }
                | Classification::Plain,
            ) => (self, ScanAction::ExtractItem),
            (Self::SeekingRequirements, _) => (self, ScanAction::Advance),
        }
    }
}

/// Items of one group in extraction order; a clause key is kept only once.
#[derive(Debug, Default)]
pub struct ItemList {
    items: Vec<Item>,
    seen: HashSet<String>,
}

impl ItemList {
    pub fn push(&mut self, item: Item) -> bool {
        if !self.seen.insert(item.clause.clone()) {
            trace!(clause = %item.clause, "dropping duplicate clause");
            return false;
        }

        self.items.push(item);
        true
    }

    pub fn contains(&self, clause: &str) -> bool {
        self.seen.contains(clause)
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

#[derive(Debug)]
pub struct GroupScan {
    pub items: Vec<Item>,
    pub recovered_groups: Vec<Group>,
    pub next_index: usize,
    pub stop: StopReason,
    pub rescued_backward: usize,
    pub rescued_forward: usize,
}

#[derive(Debug)]
pub struct GroupPatterns {
    deep_main: Regex,
    bold_roman_token: Regex,
    late_letter_markers: [Regex; 3],
    late_letter_boundary: Regex,
}

impl GroupPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            deep_main: Regex::new(r"^(.+?)[：:]\s*\*\*([a-e])\.\*\*\s*$")
                .context("failed to compile deep-indented clause regex")?,
            bold_roman_token: Regex::new(r"\*\*[ivx]+\.\*\*")
                .context("failed to compile bold roman token regex")?,
            late_letter_markers: [
                Regex::new(r"^-\s*\*\*([f-h])\.\*\*\s*(.*)$")
                    .context("failed to compile bulleted late letter regex")?,
                Regex::new(r"^\*\*([f-h])\.\*\*\s*(.*)$")
                    .context("failed to compile bold late letter regex")?,
                Regex::new(r"^([f-h])\.\s*(.*)$")
                    .context("failed to compile plain late letter regex")?,
            ],
            late_letter_boundary: Regex::new(r"^#+\s*(?:\*\*)?\s*(?:指引|背景|(?i:guidance|background))")
                .context("failed to compile late letter boundary regex")?,
        })
    }
}

impl Scan<'_> {
    /// Collects the clauses of the disclosure whose header precedes `start`.
    pub(super) fn extract_group(&self, start: usize, disclosure_number: &str) -> GroupScan {
        let classifier = &self.parser.classifier;
        let mut state = ScanState::SeekingRequirements;
        let mut items = ItemList::default();
        let mut recovered_groups = Vec::new();
        let mut item_lines = HashSet::new();
        let mut rescued_backward = 0;
        let mut index = start;

        let stop = loop {
            let Some(raw_line) = self.line(index) else {
                break StopReason::EndOfInput;
            };
            if self.mixed_format_header(index).is_some() {
                break StopReason::NewDisclosure;
            }

            let classification = classifier.classify(raw_line);
            let (next_state, action) = state.transition(&classification);
            trace!(line = index, kind = classification.kind(), action = ?action, "group scan step");
            state = next_state;

            match action {
                ScanAction::Advance => index += 1,
                ScanAction::Stop(reason) => break reason,
                ScanAction::RecoverBlock => {
                    let (groups, next_index) = self.extract_from_block(index);
                    recovered_groups.extend(groups);
                    index = next_index.max(index + 1);
                }
                ScanAction::ExtractItem => {
                    let (item, next_index) = if self.is_deep_indented_item(index) {
                        self.extract_deep_indented_item(index, disclosure_number)
                    } else {
                        self.extract_item(index, disclosure_number, LetterSet::Primary)
                    };

                    if let Some(item) = item {
                        item_lines.insert(index);
                        items.push(item);
                    }
                    index = next_index.max(index + 1);
                }
                ScanAction::RescanAndStop => {
                    if self.options.recovery_passes {
                        rescued_backward =
                            self.rescan_backward(start, index, disclosure_number, &item_lines, &mut items);
                    }
                    break StopReason::CompilationRequirements;
                }
            }
        };

        let rescued_forward = if self.options.recovery_passes {
            self.recover_late_letters(start, disclosure_number, &mut items)
        } else {
            0
        };

        debug!(
            disclosure = disclosure_number,
            stop = ?stop,
            rescued_backward,
            rescued_forward,
            recovered_groups = recovered_groups.len(),
            "finished disclosure scan"
        );

        GroupScan {
            items: items.into_items(),
            recovered_groups,
            next_index: index,
            stop,
            rescued_backward,
            rescued_forward,
        }
    }

    /// A colon-terminated bold-letter line whose next line is an indented
    /// bold roman sub-clause.
    fn is_deep_indented_item(&self, index: usize) -> bool {
        let patterns = &self.parser.groups;
        let Some(line) = self.line(index) else {
            return false;
        };
        if !patterns.deep_main.is_match(line.trim()) {
            return false;
        }

        self.line(index + 1).is_some_and(|next_line| {
            next_line.starts_with('\t') && patterns.bold_roman_token.is_match(next_line.trim())
        })
    }

    fn extract_deep_indented_item(&self, index: usize, disclosure_number: &str) -> (Option<Item>, usize) {
        let Some(captures) = self
            .line(index)
            .and_then(|line| self.parser.groups.deep_main.captures(line.trim()))
        else {
            return (None, index + 1);
        };
        let Some(letter) = captures[2].chars().next() else {
            return (None, index + 1);
        };

        let main = clean_text(&captures[1]);
        self.finish_indented_item(index, disclosure_number, letter, main)
    }

    /// Re-reads the lines just before the compilation marker with the wider
    /// a–h letter set.
    fn rescan_backward(
        &self,
        start: usize,
        trigger: usize,
        disclosure_number: &str,
        item_lines: &HashSet<usize>,
        items: &mut ItemList,
    ) -> usize {
        let from = trigger.saturating_sub(RESCAN_WINDOW).max(start);
        let mut rescued = 0;

        for index in from..trigger {
            if item_lines.contains(&index) {
                continue;
            }
            let Some(raw_line) = self.line(index) else {
                break;
            };
            let classification = self
                .parser
                .classifier
                .classify_with(raw_line, LetterSet::Recovery);
            if !matches!(classification, Classification::ClauseMarker { .. }) {
                continue;
            }

            let (item, _) = self.extract_item(index, disclosure_number, LetterSet::Recovery);
            if let Some(item) = item {
                let clause = item.clause.clone();
                if items.push(item) {
                    debug!(clause = %clause, line = index, "rescued clause before compilation requirements");
                    rescued += 1;
                }
            }
        }

        rescued
    }

    /// Looks for f–h clauses the primary patterns never accept.
    fn recover_late_letters(&self, start: usize, disclosure_number: &str, items: &mut ItemList) -> usize {
        let patterns = &self.parser.groups;
        let end = (start + LATE_LETTER_WINDOW).min(self.lines.len());
        let mut rescued = 0;

        for index in start..end {
            let line = self.lines[index].trim();
            if self.parser.classifier.is_disclosure_header(line)
                || patterns.late_letter_boundary.is_match(line)
                || self.mixed_format_header(index).is_some()
            {
                break;
            }

            let Some(captures) = patterns
                .late_letter_markers
                .iter()
                .find_map(|pattern| pattern.captures(line))
            else {
                continue;
            };
            let Some(letter) = captures[1].chars().next() else {
                continue;
            };

            let item = Item::new(disclosure_number, letter, clean_text(&captures[2]));
            if item.query.is_empty() || items.contains(&item.clause) {
                continue;
            }

            debug!(clause = %item.clause, line = index, "recovered late clause");
            items.push(item);
            rescued += 1;
        }

        rescued
    }
}
