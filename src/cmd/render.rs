use anyhow::Result;

use subburn::orchestrator::RenderReport;
use subburn::poller::{wait_for_render, WaitOutcome};
use subburn::subtitle::{resolve, SubtitleStyle};

use super::transcribe::ctrl_c_token;
use super::{open, parse_job_id};

pub async fn cmd_render(job_id: &str, style: SubtitleStyle) -> Result<()> {
    let id = parse_job_id(job_id)?;
    let (_, orchestrator) = open().await?;

    let resolved = resolve(&style);
    eprintln!("🎬 Rendering job {id}");
    eprintln!("   Style: {}", resolved.force_style());

    let cancel = ctrl_c_token();
    let job = orchestrator.begin_render(id).await?;
    let report = tokio::select! {
        report = orchestrator.run_render(&job, &style) => report?,
        () = cancel.cancelled() => {
            eprintln!("⏹️  Render cancelled");
            orchestrator.abort_render(id).await?
        }
    };

    print_report(&report);
    Ok(())
}

pub async fn cmd_render_status(job_id: &str, wait: bool) -> Result<()> {
    let id = parse_job_id(job_id)?;
    let (config, orchestrator) = open().await?;

    let report = if wait {
        let cancel = ctrl_c_token();
        match wait_for_render(&orchestrator, id, config.poll.render_interval(), &cancel).await? {
            WaitOutcome::Finished(report) => report,
            WaitOutcome::Cancelled(report) => {
                eprintln!("⏹️  Stopped waiting");
                report
            }
        }
    } else {
        orchestrator.render_status(id).await?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &RenderReport) {
    match report.status {
        Some(status) => println!("🎞️  Render {}: {status}", report.job_id),
        None => println!(
            "🎞️  Render {}: not available until transcription completes",
            report.job_id
        ),
    }
    if let Some(url) = &report.rendered_video_url {
        println!("   Video: {url}");
    }
}
