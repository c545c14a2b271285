use std::fmt;
use tracing::{info, warn};

use crate::error::{Result, SubtranError};
use crate::subtitle::SubtitleEntry;

/// Id found where the contiguous sequence expected another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub expected: u32,
    pub found: u32,
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected id {} at this position, found {}", self.expected, self.found)
    }
}

/// Accumulated batch output, threaded by value from one batch to the next
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    entries: Vec<SubtitleEntry>,
}

/// Output that passed the final count check
#[derive(Debug, Clone)]
pub struct VerifiedOutput {
    pub entries: Vec<SubtitleEntry>,
    pub integrity_warnings: Vec<IntegrityWarning>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch's results in dispatch order
    pub fn with_batch(mut self, results: Vec<SubtitleEntry>) -> Self {
        self.entries.extend(results);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the total count, sort by id and report numbering gaps.
    ///
    /// A count mismatch is fatal; non-contiguous ids are only reported.
    pub fn finish(self, expected_count: usize) -> Result<VerifiedOutput> {
        if self.entries.len() != expected_count {
            return Err(SubtranError::AlignmentFailure {
                expected: expected_count,
                actual: self.entries.len(),
            });
        }

        let mut entries = self.entries;
        entries.sort_by_key(|entry| entry.id);

        let integrity_warnings: Vec<IntegrityWarning> = entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let expected = (idx + 1) as u32;
                (entry.id != expected).then_some(IntegrityWarning { expected, found: entry.id })
            })
            .collect();

        if integrity_warnings.is_empty() {
            info!("Verified {} entries with contiguous ids", entries.len());
        } else {
            warn!(
                "Subtitle ids are not contiguous: {} of {} positions differ",
                integrity_warnings.len(),
                entries.len()
            );
            for issue in integrity_warnings.iter().take(10) {
                warn!("  {}", issue);
            }
        }

        Ok(VerifiedOutput { entries, integrity_warnings })
    }
}
