//! Payload formats exchanged with the model.
//!
//! A codec turns a [`Batch`] into the user message of a completion request
//! and splits the raw completion back into one [`Section`] per entry. It
//! never decides whether the split is acceptable; the aligner does that.
//!
//! Bracket grammar (the default):
//!
//! ```text
//! payload   := section ( "\n" SEPARATOR "\n" section )*
//! section   := marker " " text
//! marker    := "[" digits "]"          ; local position, 0-based
//! SEPARATOR := "<<<SEP>>>"
//! ```
//!
//! On decode, whitespace around sections is ignored, a surrounding code
//! fence is removed, and a missing or malformed marker yields a section
//! with `marker: None` instead of failing. Empty sections before the first
//! or after the last separator are dropped only while the split yields more
//! sections than expected, so an empty final translation still counts.

use crate::config::CodecKind;
use super::chunker::Batch;

/// Token placed between sections of a bracket payload
pub const SECTION_SEPARATOR: &str = "<<<SEP>>>";

/// One decoded slice of a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Local position claimed by the section's marker, if any was found
    pub marker: Option<usize>,
    pub text: String,
}

/// Encodes batches and splits completions back into sections
pub trait BatchCodec: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Serialize every entry of `batch` with its local position
    fn encode(&self, batch: &Batch<'_>) -> String;

    /// Split a raw completion into sections, in response order.
    ///
    /// `expected` is the batch length; codecs may use it to resolve
    /// ambiguous framing but never to pad or drop real sections.
    fn decode_sections(&self, response: &str, expected: usize) -> Vec<Section>;

    /// Format rules appended to the instruction message
    fn format_instructions(&self, count: usize) -> String;
}

/// Factory for creating codec instances
pub struct CodecFactory;

impl CodecFactory {
    pub fn create_codec(kind: CodecKind) -> Box<dyn BatchCodec> {
        match kind {
            CodecKind::Bracket => Box::new(BracketCodec),
            CodecKind::Numbered => Box::new(NumberedListCodec),
        }
    }
}

/// `[i] text` sections joined by [`SECTION_SEPARATOR`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketCodec;

impl BatchCodec for BracketCodec {
    fn name(&self) -> &'static str {
        "bracket"
    }

    fn encode(&self, batch: &Batch<'_>) -> String {
        batch
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| format!("[{}] {}", position, entry.text.trim()))
            .collect::<Vec<_>>()
            .join(&format!("\n{}\n", SECTION_SEPARATOR))
    }

    fn decode_sections(&self, response: &str, expected: usize) -> Vec<Section> {
        let body = strip_code_fence(response);
        if body.is_empty() {
            return Vec::new();
        }
        let parts: Vec<&str> = body.split(SECTION_SEPARATOR).map(str::trim).collect();

        trim_empty_edges(&parts, expected)
            .iter()
            .map(|part| match split_bracket_marker(part) {
                Some((marker, text)) => Section { marker: Some(marker), text: text.to_string() },
                None => Section { marker: None, text: part.to_string() },
            })
            .collect()
    }

    fn format_instructions(&self, count: usize) -> String {
        format!(
            "INPUT FORMAT: {count} sections. Each section starts with its bracketed index ([0], [1], ...) \
             followed by the text. Sections are separated by a line containing only {sep}.\n\
             OUTPUT FORMAT: exactly {count} sections in the same order. Start each section with its \
             original bracketed index, then the translation. Put a line containing only {sep} between \
             sections. Do not add {sep} before the first or after the last section.",
            count = count,
            sep = SECTION_SEPARATOR,
        )
    }
}

/// One `N. text` entry per line, numbered from 1.
///
/// Kept for compatibility with older prompts. A translation that itself
/// contains a numbered line splits into an extra section, which the
/// aligner then rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberedListCodec;

impl BatchCodec for NumberedListCodec {
    fn name(&self) -> &'static str {
        "numbered"
    }

    fn encode(&self, batch: &Batch<'_>) -> String {
        batch
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let single_line = entry.text.split_whitespace().collect::<Vec<_>>().join(" ");
                format!("{}. {}", position + 1, single_line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn decode_sections(&self, response: &str, _expected: usize) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();

        for line in strip_code_fence(response).lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            match split_numbered_marker(line) {
                Some((number, text)) => sections.push(Section {
                    marker: Some(number - 1),
                    text: text.to_string(),
                }),
                None => match sections.last_mut() {
                    Some(last) => {
                        if !last.text.is_empty() {
                            last.text.push('\n');
                        }
                        last.text.push_str(line);
                    }
                    None => sections.push(Section { marker: None, text: line.to_string() }),
                },
            }
        }

        sections
    }

    fn format_instructions(&self, count: usize) -> String {
        format!(
            "INPUT FORMAT: {count} numbered lines (1., 2., ...).\n\
             OUTPUT FORMAT: exactly {count} numbered lines in the same order, \"1. [translation]\" \
             then \"2. [translation]\" and so on. Start immediately with \"1.\". Never start a line \
             with a number unless it is an entry marker.",
            count = count,
        )
    }
}

/// Remove a surrounding ``` fence, with or without a language tag
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.contains(' ') => inner.trim(),
        _ => body.trim(),
    }
}

/// Drop empty edge parts left by dangling separators, trailing side first,
/// while there are more parts than `expected`
fn trim_empty_edges<'a>(mut parts: &'a [&'a str], expected: usize) -> &'a [&'a str] {
    while parts.len() > expected {
        match parts {
            [rest @ .., last] if last.is_empty() => parts = rest,
            [first, rest @ ..] if first.is_empty() => parts = rest,
            _ => break,
        }
    }
    parts
}

/// `[12] text` -> `(12, "text")`
fn split_bracket_marker(section: &str) -> Option<(usize, &str)> {
    let inner = section.strip_prefix('[')?;
    let (digits, rest) = inner.split_once(']')?;
    let digits = digits.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let marker = digits.parse().ok()?;
    let text = rest.trim_start();
    let text = text.strip_prefix(':').unwrap_or(text);
    Some((marker, text.trim()))
}

/// `12. text` -> `(12, "text")`; zero is not a valid entry number
fn split_numbered_marker(line: &str) -> Option<(usize, &str)> {
    let digits_end = line.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let rest = line[digits_end..].strip_prefix('.')?;
    let number: usize = line[..digits_end].parse().ok()?;
    if number == 0 {
        return None;
    }
    Some((number, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleEntry;

    fn sample() -> Vec<SubtitleEntry> {
        vec![
            SubtitleEntry::new(7, 0.0, 1.0, "Wait... what?"),
            SubtitleEntry::new(8, 1.0, 2.0, "[laughs] 1. Go.\n2. Run!"),
            SubtitleEntry::new(9, 2.0, 3.0, "- Ready?\n- Yes."),
        ]
    }

    #[test]
    fn test_bracket_encode_layout() {
        let entries = sample();
        let batch = Batch { number: 0, entries: &entries[..2] };
        assert_eq!(
            BracketCodec.encode(&batch),
            "[0] Wait... what?\n<<<SEP>>>\n[1] [laughs] 1. Go.\n2. Run!"
        );
    }

    #[test]
    fn test_bracket_echo_decodes_each_section() {
        let entries = sample();
        let batch = Batch { number: 0, entries: &entries };
        let sections = BracketCodec.decode_sections(&BracketCodec.encode(&batch), 3);

        assert_eq!(sections.len(), 3);
        for (position, (section, entry)) in sections.iter().zip(&entries).enumerate() {
            assert_eq!(section.marker, Some(position));
            assert_eq!(section.text, entry.text);
        }
    }

    #[test]
    fn test_bracket_tolerates_fence_and_dangling_separators() {
        let response = "```text\n<<<SEP>>>\n[0] Prit...\n<<<SEP>>>\n[1]: Shko.\n<<<SEP>>>\n```";
        let sections = BracketCodec.decode_sections(response, 2);
        assert_eq!(
            sections,
            vec![
                Section { marker: Some(0), text: "Prit...".to_string() },
                Section { marker: Some(1), text: "Shko.".to_string() },
            ]
        );
    }

    #[test]
    fn test_bracket_missing_marker_is_kept_unmarked() {
        let sections = BracketCodec.decode_sections("[0] Po\n<<<SEP>>>\nJo\n<<<SEP>>>\n[x] Ndoshta", 3);
        assert_eq!(sections[1], Section { marker: None, text: "Jo".to_string() });
        assert_eq!(sections[2], Section { marker: None, text: "[x] Ndoshta".to_string() });
    }

    #[test]
    fn test_bracket_keeps_empty_inner_sections() {
        let sections = BracketCodec.decode_sections("[0] A\n<<<SEP>>>\n\n<<<SEP>>>\n[2] C", 3);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1], Section { marker: None, text: String::new() });
    }

    #[test]
    fn test_empty_response_has_no_sections() {
        assert!(BracketCodec.decode_sections("   \n", 1).is_empty());
        assert!(NumberedListCodec.decode_sections("", 1).is_empty());
    }

    #[test]
    fn test_bracket_keeps_empty_final_section_when_count_matches() {
        let sections = BracketCodec.decode_sections("[0] Tung.\n<<<SEP>>>\n", 2);
        assert_eq!(
            sections,
            vec![
                Section { marker: Some(0), text: "Tung.".to_string() },
                Section { marker: None, text: String::new() },
            ]
        );

        let sections = BracketCodec.decode_sections("[0] Tung.\n<<<SEP>>>\n", 1);
        assert_eq!(sections, vec![Section { marker: Some(0), text: "Tung.".to_string() }]);
    }

    #[test]
    fn test_numbered_round_trip_flattens_lines() {
        let entries = sample();
        let batch = Batch { number: 0, entries: &entries[2..] };
        let payload = NumberedListCodec.encode(&batch);
        assert_eq!(payload, "1. - Ready? - Yes.");

        let sections = NumberedListCodec.decode_sections(&payload, 1);
        assert_eq!(sections, vec![Section { marker: Some(0), text: "- Ready? - Yes.".to_string() }]);
    }

    #[test]
    fn test_numbered_sub_list_produces_extra_section() {
        let response = "1. Hapat:\n2. Shko.\n3. Vrapo!\n2. Gati?";
        let sections = NumberedListCodec.decode_sections(response, 3);
        assert_eq!(sections.len(), 4);
    }

    #[test]
    fn test_numbered_continuation_lines_join_previous() {
        let sections = NumberedListCodec.decode_sections("Here you go:\n1. Po\nvazhdim\n2. Jo", 2);
        assert_eq!(sections[0], Section { marker: None, text: "Here you go:".to_string() });
        assert_eq!(sections[1], Section { marker: Some(0), text: "Po\nvazhdim".to_string() });
        assert_eq!(sections[2].marker, Some(1));
    }

    #[test]
    fn test_marker_helpers() {
        assert_eq!(split_bracket_marker("[ 3 ] tre"), Some((3, "tre")));
        assert_eq!(split_bracket_marker("[] bosh"), None);
        assert_eq!(split_numbered_marker("12. dymbëdhjetë"), Some((12, "dymbëdhjetë")));
        assert_eq!(split_numbered_marker("0. zero"), None);
        assert_eq!(split_numbered_marker("3 pa pikë"), None);
    }

    #[test]
    fn test_factory_selects_codec() {
        assert_eq!(CodecFactory::create_codec(CodecKind::Bracket).name(), "bracket");
        assert_eq!(CodecFactory::create_codec(CodecKind::Numbered).name(), "numbered");
    }
}
