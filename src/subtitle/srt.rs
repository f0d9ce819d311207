//! `SubRip` (.srt) serialization
//!
//! Each cue becomes one block:
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,000
//! Hello, world!
//!
//! ```
//!
//! Hours are zero-padded to two digits but never capped.

use std::fmt;

use thiserror::Error;

use super::segment::Cue;

/// Errors reading an SRT document back into cues
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SrtError {
    #[error("Invalid timestamp line: {0}")]
    InvalidTimestampLine(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm)
#[must_use]
pub fn format_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Display adapter that renders a cue list as an SRT document
pub struct Srt<'a>(pub &'a [Cue]);

impl fmt::Display for Srt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cue in self.0 {
            writeln!(f, "{}", cue.index)?;
            writeln!(
                f,
                "{} --> {}",
                format_time(cue.start_ms),
                format_time(cue.end_ms)
            )?;
            writeln!(f, "{}", cue.text)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Serialize cues to SRT. An empty cue list yields an empty string.
#[must_use]
pub fn to_srt(cues: &[Cue]) -> String {
    Srt(cues).to_string()
}

/// Parse SRT content into cues.
///
/// Blocks whose first line is not a sequence number are skipped. Multi-line
/// cue text is joined with `\n`.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>, SrtError> {
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    while lines.peek().is_some() {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        let Some(seq_line) = lines.next() else {
            break;
        };

        let Ok(index) = seq_line.trim().parse::<u32>() else {
            continue;
        };

        let Some(time_line) = lines.next() else {
            break;
        };

        let (start_ms, end_ms) = parse_timestamp_line(time_line)?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line);
        }

        cues.push(Cue {
            index,
            start_ms,
            end_ms,
            text: text_lines.join("\n"),
        });
    }

    Ok(cues)
}

/// Parse "HH:MM:SS,mmm --> HH:MM:SS,mmm"
fn parse_timestamp_line(line: &str) -> Result<(u64, u64), SrtError> {
    let Some((start, end)) = line.split_once("-->") else {
        return Err(SrtError::InvalidTimestampLine(line.to_string()));
    };

    Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

/// Parse "HH:MM:SS,mmm" to milliseconds
fn parse_timestamp(ts: &str) -> Result<u64, SrtError> {
    let invalid = || SrtError::InvalidTimestamp(ts.to_string());

    let parts: Vec<&str> = ts.split(&[',', ':'][..]).collect();
    let &[hours, minutes, seconds, millis] = parts.as_slice() else {
        return Err(invalid());
    };

    let field = |s: &str, scale: u64| {
        s.parse::<u64>()
            .ok()
            .and_then(|v| v.checked_mul(scale))
            .ok_or_else(invalid)
    };

    [
        field(hours, 3_600_000)?,
        field(minutes, 60_000)?,
        field(seconds, 1000)?,
        field(millis, 1)?,
    ]
    .into_iter()
    .try_fold(0u64, u64::checked_add)
    .ok_or_else(invalid)
}
