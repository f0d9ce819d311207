//! `subburn` CLI - word-timed subtitles and burned-in video from the terminal

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use subburn::subtitle::{SubtitlePosition, SubtitleStyle, DEFAULT_MAX_SEGMENT_MS};

#[derive(Parser)]
#[command(name = "subburn")]
#[command(about = "Transcribe uploaded videos into SRT subtitles and burn them in")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local video file in the videos bucket
    Upload {
        /// Video file to upload
        file: PathBuf,
    },

    /// Start transcribing a stored video
    Transcribe {
        /// Video reference inside the videos bucket (as printed by `upload`)
        video_ref: String,

        /// Poll until the transcription finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// Check a transcription job once (or until it finishes with --wait)
    Status {
        /// Job id
        job_id: String,

        /// Poll until the transcription finishes
        #[arg(short, long)]
        wait: bool,

        /// Print the SRT document instead of a summary
        #[arg(long)]
        srt: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Burn a completed job's subtitles into its video
    Render {
        /// Job id
        job_id: String,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Show the render track of a job
    RenderStatus {
        /// Job id
        job_id: String,

        /// Poll until the render finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// List known jobs, newest first
    Jobs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Segment a word-timing JSON file into SRT offline
    Segment {
        /// JSON file: an array of {text,start,end} words or a provider
        /// transcript object with a `words` field
        words: PathBuf,

        /// Close a cue once it spans at least this many milliseconds
        #[arg(short, long, default_value_t = DEFAULT_MAX_SEGMENT_MS)]
        max_ms: u64,

        /// Write the SRT here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check configuration and external tools
    Doctor,
}

/// Subtitle style flags; anything left out takes the default
#[derive(Args, Debug, Default)]
pub struct StyleArgs {
    /// Font family
    #[arg(long)]
    font: Option<String>,

    /// Font size in points
    #[arg(long)]
    font_size: Option<u32>,

    /// Text color (name, #RRGGBB)
    #[arg(long)]
    color: Option<String>,

    /// Box color, optionally with opacity (e.g. black@0.5)
    #[arg(long)]
    background: Option<String>,

    /// Outline color
    #[arg(long)]
    outline_color: Option<String>,

    /// Outline width
    #[arg(long)]
    outline_width: Option<u32>,

    /// top, center or bottom
    #[arg(long)]
    position: Option<SubtitlePosition>,
}

impl From<StyleArgs> for SubtitleStyle {
    fn from(args: StyleArgs) -> Self {
        Self {
            font_name: args.font,
            font_size: args.font_size,
            font_color: args.color,
            background_color: args.background,
            outline_color: args.outline_color,
            outline_width: args.outline_width,
            position: args.position,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Upload { file } => cmd::transcribe::cmd_upload(&file).await?,
        Commands::Transcribe { video_ref, wait } => {
            cmd::transcribe::cmd_transcribe(&video_ref, wait).await?;
        }
        Commands::Status {
            job_id,
            wait,
            srt,
            json,
        } => cmd::transcribe::cmd_status(&job_id, wait, srt, json).await?,
        Commands::Render { job_id, style } => {
            cmd::render::cmd_render(&job_id, style.into()).await?;
        }
        Commands::RenderStatus { job_id, wait } => {
            cmd::render::cmd_render_status(&job_id, wait).await?;
        }
        Commands::Jobs { json } => cmd::jobs::cmd_jobs(json).await?,
        Commands::Segment {
            words,
            max_ms,
            output,
        } => cmd::segment::cmd_segment(&words, max_ms, output.as_deref()).await?,
        Commands::Doctor => cmd::doctor::cmd_doctor().await?,
    }

    Ok(())
}
