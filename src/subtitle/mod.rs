//! Subtitle generation: segmentation, SRT serialization and burn-in styling
//!
//! # Example
//!
//! ```rust
//! use subburn::subtitle::{segment, to_srt, Word};
//!
//! let words = vec![Word::new("hi", 0, 100)];
//! let cues = segment(&words, 5000);
//! assert_eq!(to_srt(&cues), "1\n00:00:00,000 --> 00:00:00,100\nhi\n\n");
//! ```

pub mod segment;
pub mod srt;
pub mod style;

pub use segment::{segment, segment_default, Cue, Word, DEFAULT_MAX_SEGMENT_MS};
pub use srt::{format_time, parse_srt, to_srt, Srt, SrtError};
pub use style::{resolve, resolve_color, ResolvedStyle, SubtitlePosition, SubtitleStyle};
