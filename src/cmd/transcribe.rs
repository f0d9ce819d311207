use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use subburn::job::TrackStatus;
use subburn::orchestrator::TranscriptionReport;
use subburn::poller::{wait_for_transcription, WaitOutcome};

use super::{open, parse_job_id};

pub async fn cmd_upload(file: &Path) -> Result<()> {
    let (_, orchestrator) = open().await?;

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", file.display()))?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    eprintln!("📤 Uploading: {} ({} bytes)", file.display(), data.len());
    let uploaded = orchestrator.ingest_video(file_name, Bytes::from(data)).await?;

    eprintln!("   URL: {}", uploaded.public_url);
    println!("{}", uploaded.video_ref);
    Ok(())
}

pub async fn cmd_transcribe(video_ref: &str, wait: bool) -> Result<()> {
    let (config, orchestrator) = open().await?;

    eprintln!("🎙️  Transcribing: {video_ref}");
    let job = orchestrator.start_transcription(video_ref).await?;
    eprintln!("   Provider job: {}", job.provider_job_id().unwrap_or("-"));
    println!("{}", job.id());

    if wait {
        let cancel = ctrl_c_token();
        let outcome = wait_for_transcription(
            &orchestrator,
            job.id(),
            config.poll.transcription_interval(),
            &cancel,
        )
        .await?;
        print_outcome(outcome, false, false)?;
    }
    Ok(())
}

pub async fn cmd_status(job_id: &str, wait: bool, srt: bool, json: bool) -> Result<()> {
    let id = parse_job_id(job_id)?;
    let (config, orchestrator) = open().await?;

    let outcome = if wait {
        let cancel = ctrl_c_token();
        wait_for_transcription(&orchestrator, id, config.poll.transcription_interval(), &cancel)
            .await?
    } else {
        WaitOutcome::Finished(orchestrator.check_transcription(id).await?)
    };

    print_outcome(outcome, srt, json)
}

fn print_outcome(outcome: WaitOutcome<TranscriptionReport>, srt: bool, json: bool) -> Result<()> {
    if let WaitOutcome::Cancelled(_) = &outcome {
        eprintln!("⏹️  Stopped waiting");
    }
    let report = outcome.into_inner();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if srt {
        print!("{}", report.srt.as_deref().unwrap_or_default());
        return Ok(());
    }

    let icon = match report.status {
        TrackStatus::Completed => "✅",
        TrackStatus::Error => "❌",
        TrackStatus::Pending | TrackStatus::Processing => "⏳",
    };
    println!("{icon} Transcription {}: {}", report.job_id, report.status);
    if let Some(url) = &report.subtitle_url {
        println!("   Cues: {}", report.cues.len());
        println!("   Subtitles: {url}");
    }
    if let Some(text) = &report.text {
        let preview: String = text.chars().take(120).collect();
        println!("   Text: {preview}");
    }
    Ok(())
}

/// Token cancelled on Ctrl-C, so `--wait` can be interrupted cleanly
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
