use crate::config::{CompletionConfig, TranslateConfig};
use super::chunker::Batch;
use super::client::{ChatMessage, CompletionRequest};
use super::codec::BatchCodec;

/// Build the instruction message carrying the batch contract.
///
/// The payload itself only holds markers and text; count, ordering and
/// length rules travel here.
pub fn build_instructions(settings: &TranslateConfig, codec: &dyn BatchCodec, count: usize) -> String {
    format!(
        "STRICT TRANSLATION RULES - FOLLOW EXACTLY:\n\
         \n\
         1. You are translating {count} {source} subtitle entries to {target}.\n\
         2. Each entry is ONE complete subtitle and must stay together. Never split or merge entries.\n\
         3. Return exactly {count} entries, in the same order, with the same indices.\n\
         4. Keep each translation under {soft} characters in total ({lines} lines max of {width} characters each).\n\
         5. If an entry has several sentences, keep them in the SAME entry.\n\
         6. NO explanations, NO extra text, NO introductions.\n\
         \n\
         {format}\n\
         \n\
         CRITICAL: If you receive {count} entries, return exactly {count} entries.",
        count = count,
        source = settings.source_language,
        target = settings.target_language,
        soft = settings.soft_char_cap,
        lines = settings.soft_char_cap.div_ceil(settings.max_line_chars.max(1)),
        width = settings.max_line_chars,
        format = codec.format_instructions(count),
    )
}

/// Encode `batch` into a complete completion request
pub fn build_request(
    completion: &CompletionConfig,
    settings: &TranslateConfig,
    codec: &dyn BatchCodec,
    batch: &Batch<'_>,
) -> CompletionRequest {
    CompletionRequest {
        model: completion.model.clone(),
        messages: vec![
            ChatMessage::system(build_instructions(settings, codec, batch.len())),
            ChatMessage::user(codec.encode(batch)),
        ],
        temperature: completion.temperature,
        max_tokens: completion.max_tokens,
    }
}
