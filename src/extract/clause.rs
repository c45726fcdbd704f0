use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use tracing::trace;

use super::Scan;
use super::classify::{Classification, LetterSet, MarkerPosition};
use super::text::{char_len, clean_text, is_indented, join_with_colon};
use crate::model::Item;

/// Disclosure 403-8 lists its main clauses as "- description: **a.**" with
/// tab-indented "description; **i.**" sub-clauses underneath.
pub const COMPOUND_FORM_DISCLOSURE: &str = "403-8";

/// Clause bodies this short are marker noise, not requirement text.
const MIN_CLAUSE_CHARS: usize = 5;

/// Indented sub-clauses follow their main clause after a full-width colon,
/// whatever the script of the clause text.
const INDENTED_JOIN: char = '：';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indentation {
    Any,
    Required,
}

impl Indentation {
    fn accepts(self, raw_line: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Required => is_indented(raw_line),
        }
    }
}

#[derive(Debug)]
enum AnchorRule {
    Replace {
        pattern: Regex,
        prefix: &'static str,
        suffix: &'static str,
    },
    TrailingColon,
}

/// One sentence shape that says where sub-clauses belong in the clause text.
#[derive(Debug)]
struct MergeAnchor {
    name: &'static str,
    rule: AnchorRule,
}

impl MergeAnchor {
    fn replace(
        name: &'static str,
        pattern: &str,
        prefix: &'static str,
        suffix: &'static str,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("failed to compile merge anchor regex: {name}"))?;
        Ok(Self {
            name,
            rule: AnchorRule::Replace {
                pattern,
                prefix,
                suffix,
            },
        })
    }

    fn apply(&self, main: &str, joined: &str) -> Option<String> {
        match &self.rule {
            AnchorRule::Replace {
                pattern,
                prefix,
                suffix,
            } => {
                if !pattern.is_match(main) {
                    return None;
                }
                let replacement = format!("{prefix}{joined}{suffix}");
                Some(pattern.replacen(main, 1, NoExpand(&replacement)).into_owned())
            }
            AnchorRule::TrailingColon => {
                if let Some(stripped) = main.strip_suffix('：') {
                    return Some(format!("{stripped}：{joined}"));
                }
                main.strip_suffix(':')
                    .map(|stripped| format!("{stripped}: {joined}"))
            }
        }
    }
}

#[derive(Debug)]
pub struct ClausePatterns {
    compound_main: Regex,
    anchors: Vec<MergeAnchor>,
}

impl ClausePatterns {
    pub fn new() -> Result<Self> {
        let anchors = vec![
            MergeAnchor::replace(
                "by_source",
                r"(?i)\bby (?:the following )?sources?\b[^.。]*",
                "by ",
                "",
            )?,
            MergeAnchor::replace("by_source_zh", r"並按以下來源[^。]*", "並按", "")?,
            MergeAnchor::replace(
                "by_destination",
                r"(?i)\bby (?:the following )?destination categor(?:y|ies)\b[^.。]*",
                "by ",
                "",
            )?,
            MergeAnchor::replace("by_destination_zh", r"並按以下終點類別[^。]*", "並按", "")?,
            MergeAnchor::replace("including", r"(?i)\bincluding\s*[:：]", "including ", "")?,
            MergeAnchor::replace("including_zh", r"包括[：:]", "包括", "")?,
            MergeAnchor::replace(
                "including_whether",
                r"(?i)\bincluding whether\s*[:：]?\s*$",
                "including whether ",
                "",
            )?,
            MergeAnchor::replace("including_whether_zh", r"包括是否[：:]?\s*$", "包括是否", "")?,
            MergeAnchor {
                name: "trailing_colon",
                rule: AnchorRule::TrailingColon,
            },
            MergeAnchor::replace(
                "breakdown",
                r"(?i)\ba breakdown of (?:this|the) total\b",
                "a breakdown of this total by ",
                "",
            )?,
            MergeAnchor::replace("breakdown_zh", r"細分總量", "按", "細分總量")?,
        ];

        Ok(Self {
            compound_main: Regex::new(r"^-\s*(.+?)[：:]\s*\*\*([a-e])\.\*\*\s*$")
                .context("failed to compile compound clause regex")?,
            anchors,
        })
    }

    pub fn anchor_order(&self) -> Vec<&'static str> {
        self.anchors.iter().map(|anchor| anchor.name).collect()
    }

    /// Splices sub-clauses into the clause text at the first matching anchor.
    pub fn merge(&self, main: &str, sub_clauses: &[String], separator: &str) -> String {
        if sub_clauses.is_empty() {
            return main.to_string();
        }

        let joined = sub_clauses.join(separator);
        if let Some(merged) = self
            .anchors
            .iter()
            .find_map(|anchor| anchor.apply(main, &joined))
        {
            return merged;
        }

        if let Some(stripped) = main.strip_suffix('。') {
            return format!("{stripped}，包括{joined}。");
        }
        if let Some(stripped) = main.strip_suffix('.') {
            return format!("{stripped}, including {joined}.");
        }

        join_with_colon(main, &joined)
    }
}

impl Scan<'_> {
    /// Extracts the clause starting at `index` together with its sub-clauses.
    ///
    /// Returns the index of the first line not consumed.
    pub(super) fn extract_item(
        &self,
        index: usize,
        disclosure_number: &str,
        letters: LetterSet,
    ) -> (Option<Item>, usize) {
        let Some(raw_line) = self.line(index) else {
            return (None, index + 1);
        };
        let line = raw_line.trim();
        if line.is_empty() {
            return (None, index + 1);
        }

        if disclosure_number == COMPOUND_FORM_DISCLOSURE {
            if let Some(captures) = self.parser.clauses.compound_main.captures(line) {
                let Some(letter) = captures[2].chars().next() else {
                    return (None, index + 1);
                };
                let main = clean_text(&captures[1]);
                return self.finish_indented_item(index, disclosure_number, letter, main);
            }
        }

        let (letter, body, position) = match self.parser.classifier.classify_with(line, letters) {
            Classification::ClauseMarker {
                letter,
                body,
                position,
            } => (letter, body, position),
            _ => return (None, index + 1),
        };

        if position == MarkerPosition::Heading {
            trace!(disclosure = disclosure_number, letter = %letter, "heading-style clause");
            return (Some(Item::new(disclosure_number, letter, body)), index + 1);
        }

        if char_len(&body) <= MIN_CLAUSE_CHARS {
            return (None, index + 1);
        }

        let (sub_clauses, next_index) = self.collect_sub_clauses(index + 1, Indentation::Any);
        let query = self
            .parser
            .clauses
            .merge(&body, &sub_clauses, &self.options.subitem_separator);

        trace!(
            disclosure = disclosure_number,
            letter = %letter,
            sub_clauses = sub_clauses.len(),
            "extracted clause"
        );

        (Some(Item::new(disclosure_number, letter, query)), next_index)
    }

    /// Main clause whose sub-clauses must be indented below it.
    pub(super) fn finish_indented_item(
        &self,
        index: usize,
        disclosure_number: &str,
        letter: char,
        main: String,
    ) -> (Option<Item>, usize) {
        let (sub_clauses, next_index) = self.collect_sub_clauses(index + 1, Indentation::Required);
        let query = if sub_clauses.is_empty() {
            main
        } else {
            format!(
                "{main}{INDENTED_JOIN}{}",
                sub_clauses.join(&self.options.subitem_separator)
            )
        };

        trace!(
            disclosure = disclosure_number,
            letter = %letter,
            sub_clauses = sub_clauses.len(),
            "extracted indented clause"
        );

        (Some(Item::new(disclosure_number, letter, query)), next_index)
    }

    /// Collects roman-numeral sub-clauses from `start` onwards.
    ///
    /// Blank lines and ordinary prose are skipped. The scan stops at a new
    /// clause or disclosure (bare headers included), a strong section end,
    /// the compilation marker or a recovered-text block.
    pub(super) fn collect_sub_clauses(
        &self,
        start: usize,
        indentation: Indentation,
    ) -> (Vec<String>, usize) {
        let mut sub_clauses = Vec::new();
        let mut cursor = start;

        while let Some(raw_line) = self.line(cursor) {
            if raw_line.trim().is_empty() {
                cursor += 1;
                continue;
            }
            if self.mixed_format_header(cursor).is_some() {
                break;
            }

            match self.parser.classifier.classify(raw_line) {
                Classification::RomanSubMarker { numeral, body, .. }
                    if indentation.accepts(raw_line) =>
                {
                    trace!(numeral = numeral.as_str(), indented = is_indented(raw_line), "sub-clause");
                    sub_clauses.push(body);
                }
                Classification::ClauseMarker { .. }
                | Classification::DisclosureHeader { .. }
                | Classification::StrongSectionEnd
                | Classification::CompilationRequirements
                | Classification::RecoveredTextBlockStart => break,
                Classification::RomanSubMarker { .. }
                | Classification::RequirementsStart
                | Classification::Plain => {}
            }

            cursor += 1;
        }

        (sub_clauses, cursor)
    }
}
