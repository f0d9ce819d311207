use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use subburn::subtitle::{segment, to_srt, Word};

/// Either a bare word array or an object carrying one
#[derive(Deserialize)]
#[serde(untagged)]
enum WordsFile {
    Words(Vec<Word>),
    Transcript { words: Vec<Word> },
}

pub async fn cmd_segment(path: &Path, max_ms: u64, output: Option<&Path>) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let words = match serde_json::from_str::<WordsFile>(&content)
        .with_context(|| format!("{} is not a word list", path.display()))?
    {
        WordsFile::Words(words) | WordsFile::Transcript { words } => words,
    };

    let cues = segment(&words, max_ms);
    let srt = to_srt(&cues);

    match output {
        Some(out) => {
            tokio::fs::write(out, &srt)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("📝 {} words -> {} cues: {}", words.len(), cues.len(), out.display());
        }
        None => print!("{srt}"),
    }
    Ok(())
}
