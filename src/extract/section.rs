use anyhow::{Context, Result};
use regex::Regex;

pub const UNKNOWN_SECTION: &str = "000";

/// Documents whose only recoverable section hint is a bare "3" belong to
/// standard 303.
const TRUNCATED_SECTION_REMAP: (&str, &str) = ("3", "303");

pub const STRATEGY_ORDER: [SectionSource; 4] = [
    SectionSource::DisclosureHeader,
    SectionSource::StandardLabel,
    SectionSource::DisclosureNumber,
    SectionSource::FreeNumber,
];

const FREE_NUMBER_RANGE: std::ops::RangeInclusive<u32> = 200..=999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    DisclosureHeader,
    StandardLabel,
    DisclosureNumber,
    FreeNumber,
    Fallback,
}

impl SectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisclosureHeader => "disclosure_header",
            Self::StandardLabel => "standard_label",
            Self::DisclosureNumber => "disclosure_number",
            Self::FreeNumber => "free_number",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug)]
pub struct SectionIdentifier {
    disclosure_header: Regex,
    standard_label: Regex,
    disclosure_number: Regex,
    free_number: Regex,
}

impl SectionIdentifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            disclosure_header: Regex::new(
                r"(?:揭露項目|(?i:disclosure)(?:\s+(?i:item))?)\s*(?:\*\*\s*)?(\d+)-\d+",
            )
            .context("failed to compile section header regex")?,
            standard_label: Regex::new(r"\b(?:GRI|(?i:standard))\s+(\d+)\b")
                .context("failed to compile standard label regex")?,
            disclosure_number: Regex::new(r"(\d+)-\d+")
                .context("failed to compile disclosure number regex")?,
            free_number: Regex::new(r"\b(\d{3,})\b")
                .context("failed to compile free-standing number regex")?,
        })
    }

    /// Tries each strategy in priority order; the first hit wins.
    pub fn identify(&self, content: &str) -> (String, SectionSource) {
        let (section, source) = STRATEGY_ORDER
            .iter()
            .find_map(|source| {
                self.apply(*source, content)
                    .map(|section| (section, *source))
            })
            .unwrap_or_else(|| (UNKNOWN_SECTION.to_string(), SectionSource::Fallback));

        (remap_truncated_section(section), source)
    }

    fn apply(&self, source: SectionSource, content: &str) -> Option<String> {
        match source {
            SectionSource::DisclosureHeader => first_capture(&self.disclosure_header, content),
            SectionSource::StandardLabel => first_capture(&self.standard_label, content),
            SectionSource::DisclosureNumber => first_capture(&self.disclosure_number, content),
            SectionSource::FreeNumber => self.free_number_in_range(content),
            SectionSource::Fallback => None,
        }
    }

    fn free_number_in_range(&self, content: &str) -> Option<String> {
        self.free_number
            .captures_iter(content)
            .filter_map(|captures| captures.get(1))
            .map(|value| value.as_str())
            .find(|number| {
                number
                    .parse::<u32>()
                    .map(|value| FREE_NUMBER_RANGE.contains(&value))
                    .unwrap_or(false)
            })
            .map(ToOwned::to_owned)
    }
}

fn first_capture(pattern: &Regex, content: &str) -> Option<String> {
    pattern
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

fn remap_truncated_section(section: String) -> String {
    if section == TRUNCATED_SECTION_REMAP.0 {
        return TRUNCATED_SECTION_REMAP.1.to_string();
    }

    section
}
