use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, SubtranError};

/// One timed subtitle block
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub id: u32,
    pub start_time: String,
    pub end_time: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(id: u32, start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start_time: format_srt_time(start_seconds),
            end_time: format_srt_time(end_seconds),
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }

    /// Same id and timing, different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Read and parse an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleEntry>> {
    let path = path.as_ref();
    info!("Reading subtitles: {}", path.display());

    if !path.exists() {
        return Err(SubtranError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let entries = parse_srt(&content)?;

    info!("Parsed {} subtitle entries", entries.len());
    Ok(entries)
}

/// Serialize entries and write them as an SRT file
pub async fn write_srt<P: AsRef<Path>>(path: P, entries: &[SubtitleEntry]) -> Result<()> {
    let path = path.as_ref();
    info!("Writing SRT file: {}", path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, format_srt(entries)).await?;

    info!("SRT file written with {} entries", entries.len());
    Ok(())
}

/// Parse SRT text into entries, stripping a leading byte-order mark
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in normalized.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                entries.push(parse_block(&block, entries.len() + 1)?);
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    Ok(entries)
}

fn parse_block(lines: &[&str], ordinal: usize) -> Result<SubtitleEntry> {
    let id_line = lines[0].trim();
    let id: u32 = id_line.parse().map_err(|_| {
        parse_error(ordinal, format!("expected numeric index, found '{}'", id_line))
    })?;

    let timing = lines
        .get(1)
        .ok_or_else(|| parse_error(ordinal, "missing timing line".to_string()))?;
    let (start, end) = timing.split_once("-->").ok_or_else(|| {
        parse_error(ordinal, format!("malformed timing line '{}'", timing.trim()))
    })?;

    let start_seconds = parse_srt_time(start.trim())
        .ok_or_else(|| parse_error(ordinal, format!("bad start time '{}'", start.trim())))?;
    // Positioning hints may follow the end timestamp
    let end = end.split_whitespace().next().unwrap_or("");
    let end_seconds = parse_srt_time(end)
        .ok_or_else(|| parse_error(ordinal, format!("bad end time '{}'", end)))?;

    Ok(SubtitleEntry {
        id,
        start_time: format_srt_time(start_seconds),
        end_time: format_srt_time(end_seconds),
        start_seconds,
        end_seconds,
        text: lines[2..].join("\n"),
    })
}

fn parse_error(ordinal: usize, detail: String) -> SubtranError {
    SubtranError::SubtitleParse(format!("block {}: {}", ordinal, detail))
}

/// Render entries in SRT layout
pub fn format_srt(entries: &[SubtitleEntry]) -> String {
    let mut srt_content = String::new();

    for entry in entries {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            entry.id,
            entry.start_time,
            entry.end_time,
            entry.text.trim()
        ));
    }

    srt_content
}

/// Copy of `entries` with ids rewritten to 1..n
pub fn renumber(entries: &[SubtitleEntry]) -> Vec<SubtitleEntry> {
    let contiguous = entries
        .iter()
        .enumerate()
        .all(|(idx, entry)| entry.id as usize == idx + 1);
    if !contiguous {
        warn!("Subtitle ids are not contiguous from 1, renumbering {} entries", entries.len());
    }

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| SubtitleEntry {
            id: (idx + 1) as u32,
            ..entry.clone()
        })
        .collect()
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) into seconds
pub fn parse_srt_time(value: &str) -> Option<f64> {
    let (clock, millis) = value.split_once([',', '.'])?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let secs: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || secs >= 60 {
        return None;
    }
    let millis: u64 = millis.trim().parse().ok()?;
    if millis >= 1000 {
        return None;
    }

    let total_ms = hours
        .checked_mul(3_600_000)?
        .checked_add(minutes * 60_000 + secs * 1_000 + millis)?;
    Some(total_ms as f64 / 1000.0)
}
