use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, SubtranError};
use crate::subtitle::{read_srt, renumber, write_srt};
use crate::translate::{
    BatchProgress, BatchTranslator, CancelSignal, ChatCompletionClient, CompletionClient, RunReport,
};

pub struct Workflow {
    translator: BatchTranslator,
    renumber_input: bool,
}

impl Workflow {
    /// Build a workflow that talks to the configured completion endpoint
    pub fn new(config: Config) -> Result<Self> {
        let client = ChatCompletionClient::from_env(&config.completion)?;
        Self::with_client(Box::new(client), config)
    }

    pub fn with_client(client: Box<dyn CompletionClient>, config: Config) -> Result<Self> {
        Ok(Self {
            translator: BatchTranslator::new(client, &config)?,
            renumber_input: false,
        })
    }

    /// Rewrite input ids to 1..n before translating
    pub fn renumber_input(mut self, enabled: bool) -> Self {
        self.renumber_input = enabled;
        self
    }

    /// Translate one subtitle file into another
    pub async fn translate_file<P, Q, F>(
        &self,
        input_path: P,
        output_path: Q,
        cancel: &CancelSignal,
        progress: F,
    ) -> Result<RunReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: Fn(BatchProgress),
    {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!("Translating subtitle file: {}", input_path.display());

        if !input_path.is_file() {
            return Err(SubtranError::FileNotFound(input_path.display().to_string()));
        }

        let mut entries = read_srt(input_path).await?;
        if self.renumber_input {
            entries = renumber(&entries);
        }

        let outcome = self.translator.translate(&entries, cancel, progress).await?;

        write_srt(output_path, &outcome.entries).await?;
        info!("Translated subtitles written to {}", output_path.display());

        Ok(outcome.report)
    }
}
