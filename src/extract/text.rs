/// Removes paired `**` emphasis, a leading list bullet, and collapses whitespace.
pub fn clean_text(text: &str) -> String {
    let without_emphasis = strip_emphasis(text);
    let trimmed = without_emphasis.trim();
    let without_bullet = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('•'))
        .unwrap_or(trimmed);

    normalize_whitespace(without_bullet)
}

/// Drops `**` markers that form a pair; an unpaired trailing marker is kept.
pub fn strip_emphasis(text: &str) -> String {
    let parts = text.split("**").collect::<Vec<&str>>();
    let paired_markers = (parts.len() - 1) / 2 * 2;

    let mut out = String::with_capacity(text.len());
    for (index, part) in parts.iter().enumerate() {
        if index > paired_markers {
            out.push_str("**");
        }
        out.push_str(part);
    }

    out
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Tab, four-space and eight-space prefixes all count as indentation.
pub fn is_indented(raw_line: &str) -> bool {
    raw_line.starts_with('\t') || raw_line.starts_with("    ")
}

pub fn trim_sub_clause_terminator(text: &str) -> &str {
    text.trim_end_matches([';', '；']).trim_end()
}

pub fn trim_fragment_punctuation(text: &str) -> &str {
    text.trim_matches(|ch: char| matches!(ch, ' ' | ',' | '，' | '。' | '.' | ';' | '；'))
}

pub fn ends_with_ascii(text: &str) -> bool {
    text.chars().last().is_some_and(|ch| ch.is_ascii())
}

/// Byte range around `[start, end)` widened by a number of characters on each side.
pub fn char_window(text: &str, start: usize, end: usize, before: usize, after: usize) -> &str {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(before.saturating_sub(1))
        .map(|(index, _)| index)
        .unwrap_or(0);
    let window_start = if before == 0 { start } else { window_start };

    let window_end = text[end..]
        .char_indices()
        .nth(after)
        .map(|(index, _)| end + index)
        .unwrap_or(text.len());

    &text[window_start..window_end]
}

/// Joins a clause body and its sub-clauses with a colon, full-width after CJK text.
pub fn join_with_colon(main: &str, subs: &str) -> String {
    if ends_with_ascii(main) {
        format!("{main}: {subs}")
    } else {
        format!("{main}：{subs}")
    }
}
