use anyhow::Result;
use serde_json::json;

use super::open;

pub async fn cmd_jobs(as_json: bool) -> Result<()> {
    let (_, orchestrator) = open().await?;
    let jobs = orchestrator.jobs().await?;

    if as_json {
        let rows: Vec<_> = jobs
            .iter()
            .map(|job| {
                json!({
                    "jobId": job.id(),
                    "videoRef": job.video_ref(),
                    "transcription": job.transcription_status(),
                    "render": job.render_status(),
                    "createdAt": job.created_at(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs yet");
        return Ok(());
    }

    for job in &jobs {
        let render = job
            .render_status()
            .map_or("-", subburn::job::TrackStatus::as_str);
        println!(
            "{}  {:<10}  render={:<10}  {}  {}",
            job.id(),
            job.transcription_status().as_str(),
            render,
            job.created_at().format("%Y-%m-%d %H:%M"),
            job.video_ref(),
        );
    }
    Ok(())
}
