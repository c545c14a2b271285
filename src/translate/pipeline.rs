use chrono::{DateTime, Local};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{CompletionConfig, Config, TranslateConfig};
use crate::error::Result;
use crate::subtitle::SubtitleEntry;
use super::assembler::{Assembly, IntegrityWarning};
use super::cancel::CancelSignal;
use super::chunker::{chunk, Batch};
use super::client::CompletionClient;
use super::codec::{BatchCodec, CodecFactory};
use super::decoder::{decode_batch, DecodeWarning};
use super::pacing::RateLimiter;
use super::prompt::build_request;
use super::retry::{BatchOutcome, RetryController};

/// Reported after every finished batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub entries_done: usize,
    pub entries_total: usize,
}

impl BatchProgress {
    pub fn percent(&self) -> f64 {
        if self.entries_total == 0 {
            100.0
        } else {
            self.entries_done as f64 * 100.0 / self.entries_total as f64
        }
    }
}

/// What happened during a run, beyond the translated entries
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub batches: usize,
    pub succeeded: usize,
    /// Zero-based numbers of batches that kept their source text
    pub fallback_batches: Vec<usize>,
    pub attempts: u32,
    pub warnings: Vec<DecodeWarning>,
    pub integrity_warnings: Vec<IntegrityWarning>,
}

impl RunReport {
    fn new(batches: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            finished_at: None,
            batches,
            succeeded: 0,
            fallback_batches: Vec::new(),
            attempts: 0,
            warnings: Vec::new(),
            integrity_warnings: Vec::new(),
        }
    }

    pub fn log_summary(&self) {
        let elapsed = self
            .finished_at
            .map(|end| (end - self.started_at).num_seconds())
            .unwrap_or_default();
        info!(
            "Run {} finished in {}s: {}/{} batches translated, {} fell back, {} attempts, {} warnings",
            self.run_id,
            elapsed,
            self.succeeded,
            self.batches,
            self.fallback_batches.len(),
            self.attempts,
            self.warnings.len() + self.integrity_warnings.len()
        );
        if !self.fallback_batches.is_empty() {
            let numbers: Vec<String> = self.fallback_batches.iter().map(|n| (n + 1).to_string()).collect();
            warn!("Batches kept in source language: {}", numbers.join(", "));
        }
    }
}

#[derive(Debug)]
pub struct TranslationOutcome {
    pub entries: Vec<SubtitleEntry>,
    pub report: RunReport,
}

/// State carried from one batch to the next
struct RunState {
    assembly: Assembly,
    report: RunReport,
}

/// Translates a subtitle sequence batch by batch, one request at a time
pub struct BatchTranslator {
    client: Box<dyn CompletionClient>,
    codec: Box<dyn BatchCodec>,
    completion: CompletionConfig,
    settings: TranslateConfig,
    retry: RetryController,
    limiter: RateLimiter,
}

impl BatchTranslator {
    pub fn new(client: Box<dyn CompletionClient>, config: &Config) -> Result<Self> {
        let settings = config.translate.clone();
        settings.validate()?;

        Ok(Self {
            client,
            codec: CodecFactory::create_codec(settings.codec),
            completion: config.completion.clone(),
            retry: RetryController::new(settings.max_retries, settings.inter_retry_delay()),
            limiter: RateLimiter::new(settings.inter_batch_delay()),
            settings,
        })
    }

    /// Translate `entries`, returning a new verified sequence.
    ///
    /// Batch failures degrade to the source text; the run only fails on
    /// invalid input, cancellation, or a final count mismatch.
    pub async fn translate<P>(
        &self,
        entries: &[SubtitleEntry],
        cancel: &CancelSignal,
        progress: P,
    ) -> Result<TranslationOutcome>
    where
        P: Fn(BatchProgress),
    {
        let batches = chunk(entries, self.settings.batch_size)?;
        let total = batches.len();
        let mut state = RunState {
            assembly: Assembly::new(),
            report: RunReport::new(total),
        };

        info!(
            "Starting run {}: {} entries in {} batches ({} -> {}, codec: {})",
            state.report.run_id,
            entries.len(),
            total,
            self.settings.source_language,
            self.settings.target_language,
            self.codec.name()
        );

        let mut entries_done = 0;
        for batch in &batches {
            state = self.process_batch(batch, total, state, cancel).await?;
            entries_done += batch.len();

            let update = BatchProgress {
                completed: batch.number + 1,
                total,
                entries_done,
                entries_total: entries.len(),
            };
            info!(
                "Progress: batch {}/{} ({}/{} entries, {:.0}%)",
                update.completed, update.total, update.entries_done, update.entries_total, update.percent()
            );
            progress(update);

            self.limiter.pause_after(batch.number, total, cancel).await?;
        }

        let RunState { assembly, mut report } = state;
        let verified = assembly.finish(entries.len())?;

        report.integrity_warnings = verified.integrity_warnings;
        report.finished_at = Some(Local::now());
        report.log_summary();

        Ok(TranslationOutcome {
            entries: verified.entries,
            report,
        })
    }

    async fn process_batch(
        &self,
        batch: &Batch<'_>,
        total: usize,
        state: RunState,
        cancel: &CancelSignal,
    ) -> Result<RunState> {
        let RunState { assembly, mut report } = state;
        let (first_id, last_id) = batch.id_range();

        info!(
            "┌─ Translating batch {}/{} (entries {}-{}, {} lines) ────────",
            batch.number + 1, total, first_id, last_id, batch.len()
        );

        let request = build_request(&self.completion, &self.settings, self.codec.as_ref(), batch);
        let outcome = self
            .retry
            .run(
                batch,
                self.client.as_ref(),
                &request,
                |response| decode_batch(self.codec.as_ref(), response, batch, &self.settings),
                cancel,
            )
            .await?;

        report.attempts += outcome.attempts();

        let assembly = match outcome {
            BatchOutcome::Translated { decoded, attempts } => {
                info!("└─ Batch {} translated after {} attempt(s)", batch.number + 1, attempts);
                for warning in &decoded.warnings {
                    warn!("  {}", warning);
                }
                report.succeeded += 1;
                report.warnings.extend(decoded.warnings);
                assembly.with_batch(decoded.entries)
            }
            BatchOutcome::Fallback { entries, attempts, last_error } => {
                warn!(
                    "└─ Batch {} failed after {} attempts ({}), keeping original text",
                    batch.number + 1, attempts, last_error
                );
                report.fallback_batches.push(batch.number);
                assembly.with_batch(entries)
            }
        };

        Ok(RunState { assembly, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubtranError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::translate::cancel::cancel_pair;
    use crate::translate::client::{CompletionRequest, MockCompletionClient};
    use crate::translate::codec::{BracketCodec, SECTION_SEPARATOR};

    /// Decodes the request payload and answers with dictionary translations
    struct EchoTranslator {
        dictionary: HashMap<&'static str, &'static str>,
        calls: Arc<AtomicUsize>,
        /// Zero-based call numbers that answer with a dropped section
        misaligned_calls: Vec<usize>,
    }

    impl EchoTranslator {
        fn albanian() -> Self {
            Self {
                dictionary: HashMap::from([
                    ("Hello.", "Përshëndetje."),
                    ("How are you?", "Si je?"),
                    ("Goodbye.", "Mirupafshim."),
                ]),
                calls: Arc::new(AtomicUsize::new(0)),
                misaligned_calls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for EchoTranslator {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let payload = &request.messages[1].content;
            let mut sections: Vec<String> = BracketCodec
                .decode_sections(payload, payload.matches(SECTION_SEPARATOR).count() + 1)
                .into_iter()
                .map(|section| {
                    let text = self.dictionary.get(section.text.as_str()).copied().unwrap_or("???");
                    format!("[{}] {}", section.marker.unwrap_or_default(), text)
                })
                .collect();
            if self.misaligned_calls.contains(&call) {
                sections.pop();
            }
            Ok(sections.join(&format!("\n{}\n", SECTION_SEPARATOR)))
        }
    }

    fn source() -> Vec<SubtitleEntry> {
        vec![
            SubtitleEntry::new(1, 1.0, 2.0, "Hello."),
            SubtitleEntry::new(2, 2.5, 4.0, "How are you?"),
            SubtitleEntry::new(3, 5.0, 6.0, "Goodbye."),
        ]
    }

    fn config(batch_size: usize) -> Config {
        let mut config = Config::default();
        config.translate.batch_size = batch_size;
        config.translate.inter_batch_delay_secs = 0;
        config.translate.inter_retry_delay_secs = 0;
        config
    }

    #[tokio::test]
    async fn test_end_to_end_three_entries_two_batches() {
        let input = source();
        let client = EchoTranslator::albanian();
        let calls = client.calls.clone();
        let translator = BatchTranslator::new(Box::new(client), &config(2)).unwrap();

        let outcome = translator.translate(&input, &CancelSignal::never(), |_| {}).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.entries.len(), 3);
        let texts: Vec<&str> = outcome.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Përshëndetje.", "Si je?", "Mirupafshim."]);
        for (out, src) in outcome.entries.iter().zip(&input) {
            assert_eq!(out.id, src.id);
            assert_eq!(out.start_time, src.start_time);
            assert_eq!(out.end_time, src.end_time);
        }
        assert_eq!(outcome.report.batches, 2);
        assert_eq!(outcome.report.succeeded, 2);
        assert!(outcome.report.fallback_batches.is_empty());
        assert!(outcome.report.integrity_warnings.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_batch_keeps_source_text() {
        let input = source();
        let mut client = EchoTranslator::albanian();
        // First batch misaligns on all three attempts, second batch succeeds
        client.misaligned_calls = vec![0, 1, 2];
        let calls = client.calls.clone();
        let translator = BatchTranslator::new(Box::new(client), &config(2)).unwrap();

        let outcome = translator.translate(&input, &CancelSignal::never(), |_| {}).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let texts: Vec<&str> = outcome.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello.", "How are you?", "Mirupafshim."]);
        assert_eq!(outcome.report.fallback_batches, vec![0]);
        assert_eq!(outcome.report.attempts, 4);
    }

    #[tokio::test]
    async fn test_service_errors_never_abort_run() {
        let input = source();
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(6)
            .returning(|_| Err(SubtranError::Completion("connection reset".to_string())));
        let translator = BatchTranslator::new(Box::new(client), &config(2)).unwrap();

        let outcome = translator.translate(&input, &CancelSignal::never(), |_| {}).await.unwrap();
        assert_eq!(outcome.entries, input);
        assert_eq!(outcome.report.fallback_batches, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_progress_reported_per_batch() {
        let input = source();
        let translator = BatchTranslator::new(Box::new(EchoTranslator::albanian()), &config(2)).unwrap();
        let seen = Mutex::new(Vec::new());

        translator
            .translate(&input, &CancelSignal::never(), |update| seen.lock().unwrap().push(update))
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!((seen[0].completed, seen[0].entries_done), (1, 2));
        assert_eq!((seen[1].completed, seen[1].total), (2, 2));
        assert_eq!(seen[1].percent(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_batch_delay_between_batches_only() {
        let input = source();
        let mut config = config(1);
        config.translate.inter_batch_delay_secs = 12;
        let translator = BatchTranslator::new(Box::new(EchoTranslator::albanian()), &config).unwrap();

        let started = tokio::time::Instant::now();
        translator.translate(&input, &CancelSignal::never(), |_| {}).await.unwrap();
        // Two pauses for three batches
        assert_eq!(started.elapsed().as_secs(), 24);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_inter_batch_delay() {
        let input = source();
        let mut config = config(1);
        config.translate.inter_batch_delay_secs = 12;
        let client = EchoTranslator::albanian();
        let calls = client.calls.clone();
        let translator = BatchTranslator::new(Box::new(client), &config).unwrap();

        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.cancel();
        });

        let result = translator.translate(&input, &signal, |_| {}).await;
        assert!(matches!(result, Err(SubtranError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_requests() {
        let mut client = MockCompletionClient::new();
        client.expect_complete().times(0);
        let translator = BatchTranslator::new(Box::new(client), &config(25)).unwrap();

        let outcome = translator.translate(&[], &CancelSignal::never(), |_| {}).await.unwrap();
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.report.batches, 0);
    }

    #[tokio::test]
    async fn test_unordered_input_is_rejected() {
        let mut input = source();
        input.reverse();
        let translator = BatchTranslator::new(Box::new(EchoTranslator::albanian()), &config(2)).unwrap();

        let result = translator.translate(&input, &CancelSignal::never(), |_| {}).await;
        assert!(matches!(result, Err(SubtranError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_settings_rejected_at_construction() {
        let mut config = config(2);
        config.translate.max_retries = 0;
        let result = BatchTranslator::new(Box::new(EchoTranslator::albanian()), &config);
        assert!(matches!(result, Err(SubtranError::Config(_))));
    }
}
