use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::Scan;
use super::classify::LetterSet;
use super::text::{char_len, char_window, clean_text, trim_fragment_punctuation};
use crate::model::{Group, Item};

pub const UNKNOWN_TITLE: &str = "Unknown disclosure";

/// Lines above a block searched for the disclosure header it belongs to.
const CONTEXT_WINDOW: usize = 10;

/// Characters after an embedded disclosure number treated as its text.
const EMBEDDED_SLICE_CHARS: usize = 1000;

const CUE_CHARS_BEFORE: usize = 50;
const CUE_CHARS_AFTER: usize = 500;
const NUMBER_CONTEXT_CHARS: usize = 100;

const MIN_LETTERED_CHARS: usize = 10;
const MIN_SEGMENT_CHARS: usize = 20;
const MIN_FRAGMENT_CHARS: usize = 15;
const MAX_FRAGMENTS: usize = 5;
const MIN_TITLE_CHARS: usize = 3;

#[derive(Debug)]
pub struct BlockPatterns {
    requirement_cue: Regex,
    report_cue: Regex,
    generic_cue: Regex,
    stop_cue: Regex,
    disclosure_number: Regex,
    letter_marker: Regex,
    line_item: Regex,
    /// Split strategies tried after letter markers, in order.
    separators: [Regex; 3],
    sentence_break: Regex,
}

impl BlockPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            requirement_cue: Regex::new(r"要求|(?i:\brequirements?\b)")
                .context("failed to compile block requirement cue regex")?,
            report_cue: Regex::new(
                r"報導組織應報導以下資訊|(?i:\breports?\s+the\s+following\s+information)",
            )
            .context("failed to compile block report cue regex")?,
            generic_cue: Regex::new(
                r"報導組織應報導|應報導以下|(?i:organi[sz]ation\s+shall\s+report|shall\s+report\s+the\s+following)",
            )
            .context("failed to compile generic requirement cue regex")?,
            stop_cue: Regex::new(
                r"指引|建議|背景|例如[:：]|揭露項目|(?i:\bguidance\b|\brecommendations?\b|\bbackground\b|\bfor example\b)",
            )
            .context("failed to compile block stop cue regex")?,
            disclosure_number: Regex::new(r"\b(\d+-\d+)")
                .context("failed to compile block disclosure number regex")?,
            letter_marker: Regex::new(
                r"(?:^|[\s：:;；。，,])(?:\*\*)?(?P<letter>[a-h])[.．](?:\*\*)?",
            )
            .context("failed to compile inline letter marker regex")?,
            line_item: Regex::new(r"^(?:[-•]\s*)?(?:\*\*)?(?P<letter>[a-e])[.．](?:\*\*)?\s*(?P<body>.+)$")
                .context("failed to compile block line item regex")?,
            separators: [
                Regex::new(r"[；;]\s*").context("failed to compile semicolon split regex")?,
                Regex::new(r"。\s*|\.\s+").context("failed to compile period split regex")?,
                Regex::new(r"[：:]\s*").context("failed to compile colon split regex")?,
            ],
            sentence_break: Regex::new(r"[；;。]\s*|\.\s+")
                .context("failed to compile sentence split regex")?,
        })
    }

    /// Letter-marked fragments of `text`, keeping only markers whose letters
    /// strictly increase so "e.g." and stray letters inside prose are skipped.
    fn split_lettered(&self, text: &str, letters: LetterSet) -> Vec<(char, String)> {
        let mut markers = Vec::new();
        let mut previous = None;

        for captures in self.letter_marker.captures_iter(text) {
            let (Some(whole), Some(token)) = (captures.get(0), captures.name("letter")) else {
                continue;
            };
            let Some(letter) = token.as_str().chars().next() else {
                continue;
            };
            if !letters.contains(letter) || previous.is_some_and(|last| letter <= last) {
                continue;
            }

            // "a.b" is an abbreviation, "a. text" and "a.內容" are markers.
            let follows_marker = text[whole.end()..]
                .chars()
                .next()
                .is_some_and(|next| next.is_whitespace() || !next.is_ascii());
            if !follows_marker {
                continue;
            }

            previous = Some(letter);
            markers.push((letter, whole.start(), whole.end()));
        }

        markers
            .iter()
            .enumerate()
            .map(|(position, (letter, _, body_start))| {
                let body_end = markers
                    .get(position + 1)
                    .map(|(_, next_start, _)| *next_start)
                    .unwrap_or(text.len());
                (*letter, self.clean_fragment(&text[*body_start..body_end]))
            })
            .collect()
    }

    /// Cuts a fragment at the first guidance or example cue and tidies it.
    fn clean_fragment(&self, fragment: &str) -> String {
        let kept = match self.stop_cue.find(fragment) {
            Some(cue) => &fragment[..cue.start()],
            None => fragment,
        };
        let cleaned = clean_text(kept);
        let cleaned = cleaned.trim_start_matches("**").trim_end_matches("**");
        trim_fragment_punctuation(cleaned).to_string()
    }

    /// Requirement text following the first cue in `window`, up to the next
    /// guidance heading.
    fn requirements_slice<'t>(&self, window: &'t str) -> Option<&'t str> {
        let cue = self
            .report_cue
            .find(window)
            .or_else(|| self.requirement_cue.find(window))?;
        let rest = &window[cue.end()..];
        let end = self.stop_cue.find(rest).map(|stop| stop.start()).unwrap_or(rest.len());
        Some(&rest[..end])
    }

    /// Letter items from a requirements slice, falling back to sentences.
    fn slice_items(&self, slice: &str, disclosure_number: &str) -> Vec<Item> {
        let lettered = self
            .split_lettered(slice, LetterSet::Primary)
            .into_iter()
            .filter(|(_, body)| char_len(body) > MIN_LETTERED_CHARS)
            .map(|(letter, body)| Item::new(disclosure_number, letter, body))
            .collect::<Vec<Item>>();
        if !lettered.is_empty() {
            return lettered;
        }

        self.sentence_break
            .split(slice)
            .map(clean_text)
            .filter(|segment| char_len(segment) > MIN_SEGMENT_CHARS)
            .take(MAX_FRAGMENTS)
            .zip('a'..='e')
            .map(|(segment, letter)| Item::new(disclosure_number, letter, segment))
            .collect()
    }

    /// Fragments of a generic requirement window. Letter markers are tried
    /// first, then each separator in turn; the first strategy that yields a
    /// long enough fragment wins.
    fn window_fragments(&self, window: &str) -> Vec<String> {
        let lettered = self
            .split_lettered(window, LetterSet::Primary)
            .into_iter()
            .map(|(_, body)| body)
            .filter(|body| char_len(body) > MIN_FRAGMENT_CHARS)
            .take(MAX_FRAGMENTS)
            .collect::<Vec<String>>();
        if !lettered.is_empty() {
            return lettered;
        }

        for separator in &self.separators {
            let segments = separator.split(window).collect::<Vec<&str>>();
            if segments.len() < 2 {
                continue;
            }

            // The text before the first separator is the lead-in, not a fragment.
            let fragments = segments[1..]
                .iter()
                .map(|segment| self.clean_fragment(segment))
                .filter(|segment| char_len(segment) > MIN_FRAGMENT_CHARS)
                .take(MAX_FRAGMENTS)
                .collect::<Vec<String>>();
            if !fragments.is_empty() {
                return fragments;
            }
        }

        Vec::new()
    }
}

impl Scan<'_> {
    /// Extracts groups from the recovered-text block whose sentinel sits at
    /// `start`. Returns the groups and the index of the first line after the
    /// block body.
    pub(super) fn extract_from_block(&self, start: usize) -> (Vec<Group>, usize) {
        let body_start = start + 1;
        let mut body_end = body_start;
        while self.line(body_end).is_some_and(|line| !line.trim().is_empty()) {
            body_end += 1;
        }

        let body_lines = self.lines[body_start..body_end]
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<&str>>();
        if body_lines.is_empty() {
            return (Vec::new(), body_end);
        }
        let merged = body_lines.join(" ");

        let groups = if let Some(group) = self.structured_block(start, &body_lines, &merged) {
            debug!(line = start, stage = "structured", "recovered block parsed");
            vec![group]
        } else if let Some(group) = self.simple_letter_list(start, &body_lines) {
            debug!(line = start, stage = "letter_list", "recovered block parsed");
            vec![group]
        } else {
            let embedded = self.embedded_disclosures(&body_lines, &merged);
            if !embedded.is_empty() {
                debug!(line = start, stage = "embedded_numbers", groups = embedded.len(), "recovered block parsed");
                embedded
            } else if let Some(group) = self.generic_requirements(start, &body_lines, &merged) {
                debug!(line = start, stage = "generic_cues", "recovered block parsed");
                vec![group]
            } else {
                debug!(line = start, "recovered block has no recoverable structure");
                Vec::new()
            }
        };

        (groups, body_end)
    }

    /// Body that reads like a full requirements section.
    fn structured_block(&self, start: usize, body_lines: &[&str], merged: &str) -> Option<Group> {
        let patterns = &self.parser.blocks;
        if !patterns.requirement_cue.is_match(merged) || !patterns.report_cue.is_match(merged) {
            return None;
        }

        let context = self.context_header(start);
        let disclosure_number = self
            .section_number(merged)
            .or_else(|| context.as_ref().map(|(number, _)| number.clone()))
            .unwrap_or_else(|| self.unknown_disclosure());

        let items = patterns
            .split_lettered(merged, LetterSet::Primary)
            .into_iter()
            .filter(|(_, body)| char_len(body) > MIN_LETTERED_CHARS)
            .map(|(letter, body)| Item::new(&disclosure_number, letter, body))
            .collect::<Vec<Item>>();
        if items.is_empty() {
            return None;
        }

        let title = self
            .title_from_lines(body_lines, &disclosure_number)
            .or_else(|| context_title(context, &disclosure_number))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        Some(Group::new(&disclosure_number, &title, items))
    }

    /// One "x. text" item per body line.
    fn simple_letter_list(&self, start: usize, body_lines: &[&str]) -> Option<Group> {
        let patterns = &self.parser.blocks;
        let mut seen = HashSet::new();
        let entries = body_lines
            .iter()
            .filter_map(|line| patterns.line_item.captures(line))
            .filter_map(|captures| {
                let letter = captures.name("letter")?.as_str().chars().next()?;
                let body = clean_text(captures.name("body")?.as_str());
                (char_len(&body) > MIN_LETTERED_CHARS && seen.insert(letter)).then_some((letter, body))
            })
            .collect::<Vec<(char, String)>>();
        if entries.is_empty() {
            return None;
        }

        let (disclosure_number, title) = self
            .context_header(start)
            .unwrap_or_else(|| (self.unknown_disclosure(), UNKNOWN_TITLE.to_string()));
        let items = entries
            .into_iter()
            .map(|(letter, body)| Item::new(&disclosure_number, letter, body))
            .collect();

        Some(Group::new(&disclosure_number, &title, items))
    }

    /// One group per distinct disclosure number of this section mentioned in
    /// the body.
    fn embedded_disclosures(&self, body_lines: &[&str], merged: &str) -> Vec<Group> {
        let patterns = &self.parser.blocks;
        let prefix = self.section_prefix();
        let mut seen = HashSet::new();
        let mut groups = Vec::new();

        for captures in patterns.disclosure_number.captures_iter(merged) {
            let Some(number) = captures.get(1) else {
                continue;
            };
            let disclosure_number = number.as_str();
            if !disclosure_number.starts_with(&prefix) || !seen.insert(disclosure_number) {
                continue;
            }

            let window = char_window(merged, number.start(), number.end(), 0, EMBEDDED_SLICE_CHARS);
            let Some(slice) = patterns.requirements_slice(window) else {
                continue;
            };
            let items = patterns.slice_items(slice, disclosure_number);
            if items.is_empty() {
                continue;
            }

            let title = self
                .title_from_lines(body_lines, disclosure_number)
                .unwrap_or_default();
            groups.push(Group::new(disclosure_number, &title, items));
        }

        groups
    }

    /// Last resort: split the text around a generic "shall report" phrase.
    fn generic_requirements(&self, start: usize, body_lines: &[&str], merged: &str) -> Option<Group> {
        let patterns = &self.parser.blocks;

        patterns.generic_cue.find_iter(merged).find_map(|cue| {
            let window = char_window(merged, cue.start(), cue.end(), CUE_CHARS_BEFORE, CUE_CHARS_AFTER);
            let fragments = patterns.window_fragments(window);
            if fragments.is_empty() {
                return None;
            }

            let context = self.context_header(start);
            let nearby = char_window(
                merged,
                cue.start(),
                cue.end(),
                NUMBER_CONTEXT_CHARS,
                NUMBER_CONTEXT_CHARS,
            );
            let disclosure_number = self
                .section_number(nearby)
                .or_else(|| context.as_ref().map(|(number, _)| number.clone()))
                .unwrap_or_else(|| self.unknown_disclosure());
            let title = self
                .title_from_lines(body_lines, &disclosure_number)
                .or_else(|| context_title(context, &disclosure_number))
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

            let items = fragments
                .into_iter()
                .zip('a'..='e')
                .map(|(fragment, letter)| Item::new(&disclosure_number, letter, fragment))
                .collect();

            Some(Group::new(&disclosure_number, &title, items))
        })
    }

    /// Nearest preceding disclosure header of this section.
    fn context_header(&self, start: usize) -> Option<(String, String)> {
        let prefix = self.section_prefix();
        let from = start.saturating_sub(CONTEXT_WINDOW);

        (from..start.min(self.lines.len())).rev().find_map(|index| {
            self.parser
                .classifier
                .disclosure_header(self.lines[index])
                .filter(|(number, _)| number.starts_with(&prefix))
        })
    }

    /// First disclosure number in `text` that belongs to this section.
    fn section_number(&self, text: &str) -> Option<String> {
        let prefix = self.section_prefix();
        self.parser
            .blocks
            .disclosure_number
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .map(|number| number.as_str())
            .find(|number| number.starts_with(&prefix))
            .map(ToOwned::to_owned)
    }

    /// Text after the disclosure number on the first body line that names it,
    /// up to any requirements, reporting or guidance cue.
    fn title_from_lines(&self, body_lines: &[&str], disclosure_number: &str) -> Option<String> {
        body_lines
            .iter()
            .find_map(|line| self.title_from_line(line, disclosure_number))
    }

    fn title_from_line(&self, line: &str, disclosure_number: &str) -> Option<String> {
        let patterns = &self.parser.blocks;
        let position = line.find(disclosure_number)?;
        let rest = &line[position + disclosure_number.len()..];

        let end = [
            &patterns.requirement_cue,
            &patterns.report_cue,
            &patterns.generic_cue,
            &patterns.stop_cue,
        ]
        .into_iter()
        .filter_map(|cue| cue.find(rest).map(|found| found.start()))
        .min()
        .unwrap_or(rest.len());

        let title = clean_text(&rest[..end]);
        let title = trim_fragment_punctuation(&title);
        (char_len(title) > MIN_TITLE_CHARS).then(|| title.to_string())
    }

    fn unknown_disclosure(&self) -> String {
        format!("{}?", self.section_prefix())
    }
}

fn context_title(context: Option<(String, String)>, disclosure_number: &str) -> Option<String> {
    context
        .filter(|(number, _)| number == disclosure_number)
        .map(|(_, title)| title)
}
