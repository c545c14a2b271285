use crate::error::{Result, SubtranError};
use crate::subtitle::SubtitleEntry;

/// A contiguous run of entries sent to the model as one request.
///
/// Entries are addressed by their local position `0..len()` inside the
/// batch; the global subtitle id stays on the entry itself.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Zero-based position of this batch in the run
    pub number: usize,
    pub entries: &'a [SubtitleEntry],
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the first and last entry, for log lines
    pub fn id_range(&self) -> (u32, u32) {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => (first.id, last.id),
            _ => (0, 0),
        }
    }
}

/// Split `entries` into batches of at most `batch_size`, preserving order.
///
/// Fails when `batch_size` is zero or when ids are not strictly increasing.
pub fn chunk(entries: &[SubtitleEntry], batch_size: usize) -> Result<Vec<Batch<'_>>> {
    if batch_size == 0 {
        return Err(SubtranError::InvalidInput("batch size must be at least 1".to_string()));
    }

    if let Some(pair) = entries.windows(2).find(|pair| pair[0].id >= pair[1].id) {
        return Err(SubtranError::InvalidInput(format!(
            "subtitle ids out of order: {} followed by {}",
            pair[0].id, pair[1].id
        )));
    }

    Ok(entries
        .chunks(batch_size)
        .enumerate()
        .map(|(number, entries)| Batch { number, entries })
        .collect())
}
