// Batched subtitle translation
//
// A run flows through these stages, one batch at a time:
// - chunker: split the sequence into batches
// - codec/prompt: encode a batch and its contract into a completion request
// - client: the external completion service
// - decoder: split and align the completion with the batch
// - retry: attempt state machine with fallback to the source text
// - pacing: fixed delay between batches
// - assembler: accumulate, count-check and order the results

pub mod assembler;
pub mod cancel;
pub mod chunker;
pub mod client;
pub mod codec;
pub mod decoder;
pub mod pacing;
pub mod pipeline;
pub mod prompt;
pub mod retry;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{ChatCompletionClient, ChatMessage, CompletionClient, CompletionRequest};
pub use codec::{BatchCodec, BracketCodec, CodecFactory, NumberedListCodec};
pub use pipeline::{BatchProgress, BatchTranslator, RunReport, TranslationOutcome};
