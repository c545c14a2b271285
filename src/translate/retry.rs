use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{Result, SubtranError};
use crate::subtitle::SubtitleEntry;
use super::cancel::CancelSignal;
use super::chunker::Batch;
use super::client::{CompletionClient, CompletionRequest};
use super::decoder::DecodedBatch;

/// Lifecycle of one batch
#[derive(Debug, Clone)]
pub enum BatchState {
    Pending,
    Attempting { attempt: u32 },
    Succeeded { decoded: DecodedBatch, attempts: u32 },
    /// All attempts failed; the batch's source entries stand in for the translation
    ExhaustedFallback { entries: Vec<SubtitleEntry>, attempts: u32, last_error: String },
}

impl BatchState {
    /// Pending -> Attempting(1)
    pub fn dispatch(self) -> Self {
        match self {
            Self::Pending => Self::Attempting { attempt: 1 },
            other => other,
        }
    }

    /// Attempting -> Succeeded
    pub fn succeed(self, decoded: DecodedBatch) -> Self {
        match self {
            Self::Attempting { attempt } => Self::Succeeded { decoded, attempts: attempt },
            other => other,
        }
    }

    /// Attempting(n) -> Attempting(n + 1), or ExhaustedFallback once `max_retries` attempts are spent
    pub fn fail(self, error: &str, max_retries: u32, batch: &Batch<'_>) -> Self {
        match self {
            Self::Attempting { attempt } if attempt < max_retries => {
                Self::Attempting { attempt: attempt + 1 }
            }
            Self::Attempting { attempt } => Self::ExhaustedFallback {
                entries: batch.entries.to_vec(),
                attempts: attempt,
                last_error: error.to_string(),
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::ExhaustedFallback { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting { attempt } => *attempt,
            Self::Succeeded { attempts, .. } | Self::ExhaustedFallback { attempts, .. } => *attempts,
        }
    }
}

/// Terminal result of a batch, as handed back by [`RetryController::run`]
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Translated { decoded: DecodedBatch, attempts: u32 },
    Fallback { entries: Vec<SubtitleEntry>, attempts: u32, last_error: String },
}

impl BatchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Translated { attempts, .. } | Self::Fallback { attempts, .. } => *attempts,
        }
    }
}

/// Drives a batch through its attempts with a fixed delay between them
#[derive(Debug, Clone)]
pub struct RetryController {
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryController {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Run `batch` to a terminal state.
    ///
    /// Only cancellation escapes as an error; every other failure is
    /// retried and finally absorbed into [`BatchOutcome::Fallback`].
    pub async fn run<D>(
        &self,
        batch: &Batch<'_>,
        client: &dyn CompletionClient,
        request: &CompletionRequest,
        decode: D,
        cancel: &CancelSignal,
    ) -> Result<BatchOutcome>
    where
        D: Fn(&str) -> Result<DecodedBatch>,
    {
        let mut state = BatchState::Pending;

        loop {
            let attempt = match state {
                BatchState::Pending => {
                    state = BatchState::Pending.dispatch();
                    continue;
                }
                BatchState::Attempting { attempt } => attempt,
                BatchState::Succeeded { decoded, attempts } => {
                    return Ok(BatchOutcome::Translated { decoded, attempts });
                }
                BatchState::ExhaustedFallback { entries, attempts, last_error } => {
                    return Ok(BatchOutcome::Fallback { entries, attempts, last_error });
                }
            };
            info!("│ Attempt {}/{}", attempt, self.max_retries);

            let outcome = match cancel.guard(client.complete(request)).await? {
                Ok(response) => decode(&response),
                Err(e) => Err(e),
            };

            state = match outcome {
                Ok(decoded) => state.succeed(decoded),
                Err(SubtranError::Cancelled) => return Err(SubtranError::Cancelled),
                Err(e) => {
                    if e.is_transient() {
                        warn!("│ Attempt {} failed: {}", attempt, e);
                    } else {
                        error!("│ Attempt {} failed with non-transient error: {}", attempt, e);
                    }
                    let next = state.fail(&e.to_string(), self.max_retries, batch);
                    if matches!(next, BatchState::Attempting { .. }) {
                        info!("│ Retrying in {}s", self.retry_delay.as_secs());
                        cancel.sleep(self.retry_delay).await?;
                    }
                    next
                }
            };
        }
    }
}
