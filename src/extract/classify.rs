use anyhow::{Context, Result};
use regex::{Captures, Regex};

use super::text::{clean_text, trim_sub_clause_terminator};

pub const RECOVERED_TEXT_SENTINELS: [&str; 2] = ["[RECOVERED TEXT FROM IMAGE]", "[從圖片提取的文字]"];

const DISCLOSURE_KEYWORD: &str = r"(?:揭露項目|(?i:disclosure)(?:\s+(?i:item))?)";

/// Which clause letters a marker may carry.
///
/// The forward pass only trusts a–e; recovery passes widen the set to a–h.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterSet {
    Primary,
    Recovery,
}

impl LetterSet {
    pub fn contains(self, letter: char) -> bool {
        match self {
            Self::Primary => ('a'..='e').contains(&letter),
            Self::Recovery => ('a'..='h').contains(&letter),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPosition {
    Leading,
    Trailing,
    Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomanNumeral {
    I,
    Ii,
    Iii,
    Iv,
    V,
}

impl RomanNumeral {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "i" => Some(Self::I),
            "ii" => Some(Self::Ii),
            "iii" => Some(Self::Iii),
            "iv" => Some(Self::Iv),
            "v" => Some(Self::V),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::I => "i",
            Self::Ii => "ii",
            Self::Iii => "iii",
            Self::Iv => "iv",
            Self::V => "v",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    DisclosureHeader {
        number: String,
        title: String,
    },
    RequirementsStart,
    CompilationRequirements,
    ClauseMarker {
        letter: char,
        body: String,
        position: MarkerPosition,
    },
    RomanSubMarker {
        numeral: RomanNumeral,
        body: String,
        position: MarkerPosition,
    },
    RecoveredTextBlockStart,
    StrongSectionEnd,
    Plain,
}

impl Classification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DisclosureHeader { .. } => "disclosure_header",
            Self::RequirementsStart => "requirements_start",
            Self::CompilationRequirements => "compilation_requirements",
            Self::ClauseMarker { .. } => "clause_marker",
            Self::RomanSubMarker { .. } => "roman_sub_marker",
            Self::RecoveredTextBlockStart => "recovered_block_start",
            Self::StrongSectionEnd => "strong_section_end",
            Self::Plain => "plain",
        }
    }
}

type Strategy = fn(&LineClassifier, &str, LetterSet) -> Option<Classification>;

/// Classification strategies in precedence order; the first match wins.
const STRATEGIES: [(&str, Strategy); 7] = [
    ("recovered_block_start", LineClassifier::match_block_start),
    ("disclosure_header", LineClassifier::match_disclosure_header),
    ("strong_section_end", LineClassifier::match_strong_section_end),
    (
        "compilation_requirements",
        LineClassifier::match_compilation_requirements,
    ),
    ("clause_marker", LineClassifier::match_clause_marker),
    ("roman_sub_marker", LineClassifier::match_roman_sub_marker),
    ("requirements_start", LineClassifier::match_requirements_start),
];

#[derive(Debug)]
pub struct LineClassifier {
    disclosure_header: Regex,
    bold_number_header: Regex,
    strong_end_heading: Regex,
    strong_end_disclosure: Regex,
    compilation_heading: Regex,
    clause_heading: Regex,
    clause_leading: Regex,
    clause_trailing: Regex,
    clause_colon_trailing: Regex,
    roman_leading: Regex,
    roman_trailing: Regex,
    requirements_cue: Regex,
    bold_clause_token: Regex,
}

impl LineClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            disclosure_header: Regex::new(&format!(
                r"^(?:#+\s*)?(?:\*\*\s*)?{DISCLOSURE_KEYWORD}\s*(?:\*\*\s*)?(?P<number>\d+-\d+)\s*(?:\*\*)?\s*(?P<title>.+)$"
            ))
            .context("failed to compile disclosure header regex")?,
            bold_number_header: Regex::new(r"^\*\*(?P<number>\d+-\d+)\*\*\s+(?P<title>\S.*)$")
                .context("failed to compile bold disclosure number regex")?,
            strong_end_heading: Regex::new(
                r"^#+\s*(?:\*\*)?\s*(?:建議|指引|背景|(?i:recommendations?|guidance|background))",
            )
            .context("failed to compile strong section end regex")?,
            strong_end_disclosure: Regex::new(&format!(r"^#.*{DISCLOSURE_KEYWORD}.*\d+-\d+"))
                .context("failed to compile disclosure heading end regex")?,
            compilation_heading: Regex::new(
                r"^#+\s*(?:\*\*)?\s*(?:彙編要求|(?i:compilation\s+requirements?))",
            )
            .context("failed to compile compilation requirements regex")?,
            clause_heading: Regex::new(r"^#+\s*\*\*(?P<bold>[a-h])\.\*\*\s*(?P<body>.+)$")
                .context("failed to compile heading clause regex")?,
            clause_leading: Regex::new(
                r"^(?:[-•]\s*)?(?:\*\*(?P<bold>[a-h])\.\*\*|(?P<plain>[a-h])\.)\s+(?P<body>.+)$",
            )
            .context("failed to compile leading clause regex")?,
            clause_trailing: Regex::new(
                r"^(?:[-•]\s*)?(?P<body>.+?)\s+(?:\*\*(?P<bold>[a-h])\.\*\*|(?P<plain>[a-h])\.)\s*$",
            )
            .context("failed to compile trailing clause regex")?,
            clause_colon_trailing: Regex::new(
                r"^(?:[-•]\s*)?(?:#+\s*)?(?P<body>.+?)[：:]\s*(?:\*\*(?P<bold>[a-h])\.\*\*|(?P<plain>[a-h])\.)\s*$",
            )
            .context("failed to compile colon clause regex")?,
            roman_leading: Regex::new(
                r"^(?:[-•]\s*)?(?:\*\*(?P<bold>[ivx]+)[.．]\*\*|(?P<plain>[ivx]+)[.．])\s+(?P<body>.+)$",
            )
            .context("failed to compile leading roman regex")?,
            roman_trailing: Regex::new(
                r"^(?:[-•]\s*)?(?P<body>.+?)[\s;；]+(?:\*\*(?P<bold>[ivx]+)[.．]\*\*|(?P<plain>[ivx]+)[.．])\s*[;；]?$",
            )
            .context("failed to compile trailing roman regex")?,
            requirements_cue: Regex::new(
                r"要求|報導組織應報導以下資訊|(?i:\brequirements?\b|report the following information)",
            )
            .context("failed to compile requirements cue regex")?,
            bold_clause_token: Regex::new(r"\*\*[a-e]\.\*\*")
                .context("failed to compile bold clause token regex")?,
        })
    }

    /// Forward-pass classification with the primary a–e letter set.
    pub fn classify(&self, line: &str) -> Classification {
        self.classify_with(line, LetterSet::Primary)
    }

    pub fn classify_with(&self, line: &str, letters: LetterSet) -> Classification {
        let line = line.trim();
        if line.is_empty() {
            return Classification::Plain;
        }

        STRATEGIES
            .iter()
            .find_map(|(_, strategy)| strategy(self, line, letters))
            .unwrap_or(Classification::Plain)
    }

    pub fn strategy_order() -> Vec<&'static str> {
        STRATEGIES.iter().map(|(name, _)| *name).collect()
    }

    pub fn disclosure_header(&self, line: &str) -> Option<(String, String)> {
        match self.match_disclosure_header(line.trim(), LetterSet::Primary)? {
            Classification::DisclosureHeader { number, title } => Some((number, title)),
            _ => None,
        }
    }

    pub fn is_disclosure_header(&self, line: &str) -> bool {
        self.disclosure_header(line).is_some()
    }

    fn match_block_start(&self, line: &str, _letters: LetterSet) -> Option<Classification> {
        RECOVERED_TEXT_SENTINELS
            .iter()
            .any(|sentinel| line.contains(sentinel))
            .then_some(Classification::RecoveredTextBlockStart)
    }

    fn match_disclosure_header(&self, line: &str, _letters: LetterSet) -> Option<Classification> {
        let captures = self
            .disclosure_header
            .captures(line)
            .or_else(|| self.bold_number_header.captures(line))?;

        let number = captures.name("number")?.as_str().to_string();
        let title = clean_text(captures.name("title")?.as_str());
        if title.is_empty() {
            return None;
        }

        Some(Classification::DisclosureHeader { number, title })
    }

    fn match_strong_section_end(&self, line: &str, _letters: LetterSet) -> Option<Classification> {
        (self.strong_end_heading.is_match(line) || self.strong_end_disclosure.is_match(line))
            .then_some(Classification::StrongSectionEnd)
    }

    fn match_compilation_requirements(
        &self,
        line: &str,
        _letters: LetterSet,
    ) -> Option<Classification> {
        self.compilation_heading
            .is_match(line)
            .then_some(Classification::CompilationRequirements)
    }

    fn match_clause_marker(&self, line: &str, letters: LetterSet) -> Option<Classification> {
        if let Some(captures) = self.clause_heading.captures(line) {
            // Heading-style markers keep the full a–h range in every pass.
            return clause_from_captures(&captures, LetterSet::Recovery, MarkerPosition::Heading);
        }

        if let Some(captures) = self.clause_leading.captures(line) {
            return clause_from_captures(&captures, letters, MarkerPosition::Leading);
        }

        self.clause_trailing
            .captures(line)
            .or_else(|| self.clause_colon_trailing.captures(line))
            .and_then(|captures| clause_from_captures(&captures, letters, MarkerPosition::Trailing))
    }

    fn match_roman_sub_marker(&self, line: &str, _letters: LetterSet) -> Option<Classification> {
        if let Some(captures) = self.roman_leading.captures(line) {
            return roman_from_captures(&captures, MarkerPosition::Leading);
        }

        self.roman_trailing
            .captures(line)
            .and_then(|captures| roman_from_captures(&captures, MarkerPosition::Trailing))
    }

    fn match_requirements_start(&self, line: &str, _letters: LetterSet) -> Option<Classification> {
        if self.bold_clause_token.is_match(line) {
            return None;
        }

        self.requirements_cue
            .is_match(line)
            .then_some(Classification::RequirementsStart)
    }
}

fn marker_token<'h>(captures: &Captures<'h>) -> Option<&'h str> {
    captures
        .name("bold")
        .or_else(|| captures.name("plain"))
        .map(|value| value.as_str())
}

fn clause_from_captures(
    captures: &Captures<'_>,
    letters: LetterSet,
    position: MarkerPosition,
) -> Option<Classification> {
    let letter = marker_token(captures)?.chars().next()?;
    if !letters.contains(letter) {
        return None;
    }

    let body = clean_text(captures.name("body")?.as_str());
    Some(Classification::ClauseMarker {
        letter,
        body,
        position,
    })
}

fn roman_from_captures(captures: &Captures<'_>, position: MarkerPosition) -> Option<Classification> {
    let numeral = RomanNumeral::parse(marker_token(captures)?)?;
    let cleaned = clean_text(captures.name("body")?.as_str());
    let body = trim_sub_clause_terminator(&cleaned).to_string();
    if body.is_empty() {
        return None;
    }

    Some(Classification::RomanSubMarker {
        numeral,
        body,
        position,
    })
}
