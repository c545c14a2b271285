use std::fmt;
use tracing::{debug, warn};

use crate::config::{TranslateConfig, ELLIPSIS};
use crate::error::{Result, SubtranError};
use crate::subtitle::SubtitleEntry;
use super::chunker::Batch;
use super::codec::BatchCodec;

/// Non-fatal problem corrected while decoding a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Section had no index marker; its text was accepted by position
    MissingMarker { id: u32 },
    /// Translation was empty; the source text was kept
    EmptyTranslation { id: u32 },
    /// Translation exceeded the soft cap and was cut
    Truncated { id: u32, original_chars: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMarker { id } => write!(f, "entry {}: no index marker in response", id),
            Self::EmptyTranslation { id } => write!(f, "entry {}: empty translation, kept source text", id),
            Self::Truncated { id, original_chars } => {
                write!(f, "entry {}: translation truncated from {} characters", id, original_chars)
            }
        }
    }
}

/// Translations for one batch, aligned with the batch's entries
#[derive(Debug, Clone)]
pub struct DecodedBatch {
    pub entries: Vec<SubtitleEntry>,
    pub warnings: Vec<DecodeWarning>,
}

/// Parse a completion and align it with `batch`.
///
/// Fails with [`SubtranError::Alignment`] when the section count differs
/// from the batch length or a marker names another position. Missing
/// markers, empty translations and over-long translations are corrected
/// and reported as warnings.
pub fn decode_batch(
    codec: &dyn BatchCodec,
    response: &str,
    batch: &Batch<'_>,
    settings: &TranslateConfig,
) -> Result<DecodedBatch> {
    let sections = codec.decode_sections(response, batch.len());

    if sections.len() != batch.len() {
        return Err(SubtranError::Alignment(format!(
            "expected {} sections, got {}",
            batch.len(),
            sections.len()
        )));
    }

    let mut entries = Vec::with_capacity(batch.len());
    let mut warnings = Vec::new();

    for (position, (section, source)) in sections.iter().zip(batch.entries).enumerate() {
        match section.marker {
            Some(marker) if marker != position => {
                return Err(SubtranError::Alignment(format!(
                    "section {} carries marker {}",
                    position, marker
                )));
            }
            Some(_) => {}
            None => {
                debug!("Entry {} has no marker, accepting by position", source.id);
                warnings.push(DecodeWarning::MissingMarker { id: source.id });
            }
        }

        let translation = section.text.trim();
        let text = if translation.is_empty() {
            warn!("Empty translation for entry {}, keeping original", source.id);
            warnings.push(DecodeWarning::EmptyTranslation { id: source.id });
            source.text.clone()
        } else if let Some(truncated) = truncate_translation(translation, settings) {
            let original_chars = translation.chars().count();
            warn!("Translation for entry {} truncated from {} characters", source.id, original_chars);
            warnings.push(DecodeWarning::Truncated { id: source.id, original_chars });
            truncated
        } else {
            translation.to_string()
        };

        entries.push(source.with_text(text));
    }

    Ok(DecodedBatch { entries, warnings })
}

/// Shorten `text` when it exceeds the soft cap.
///
/// The result keeps at most `hard_char_cap` characters, cut at the last
/// whitespace past `min_break_position` when there is one, followed by
/// an ellipsis. Returns `None` when no truncation is needed.
pub fn truncate_translation(text: &str, settings: &TranslateConfig) -> Option<String> {
    if text.chars().count() <= settings.soft_char_cap {
        return None;
    }

    let hard_end = text
        .char_indices()
        .nth(settings.hard_char_cap)
        .map_or(text.len(), |(idx, _)| idx);
    let head = &text[..hard_end];

    let word_break = head
        .char_indices()
        .enumerate()
        .filter(|(position, (_, c))| c.is_whitespace() && *position > settings.min_break_position)
        .map(|(_, (idx, _))| idx)
        .last();

    let cut = match word_break {
        Some(idx) => &head[..idx],
        None => head,
    };

    Some(format!("{}{}", cut.trim_end(), ELLIPSIS))
}
