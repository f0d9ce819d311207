//! `subburn` MCP Server - polling surface over stdio
//!
//! Exposes the four polling operations as MCP tools so agents can start a
//! transcription, poll it, trigger a render and poll that. Job records are
//! shared with the `subburn` CLI through the on-disk job store.
//!
//! # Usage
//!
//! ```bash
//! ASSEMBLYAI_API_KEY=... subburn-mcp
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::mcp_server::{server_runtime, ServerHandler};
use rust_mcp_sdk::schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, Implementation, InitializeResult,
    ListToolsRequest, ListToolsResult, RpcError, ServerCapabilities, ServerCapabilitiesTools,
    TextContent, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{tool_box, McpServer, StdioTransport, TransportOptions};
use serde::{Deserialize, Serialize};

use subburn::config::Config;
use subburn::job::{FileJobStore, JobId};
use subburn::service::PollingService;
use subburn::subtitle::{SubtitlePosition, SubtitleStyle};

fn tool_error(e: impl std::fmt::Display) -> CallToolError {
    CallToolError::from_message(e.to_string())
}

fn json_result(value: &impl Serialize) -> Result<CallToolResult, CallToolError> {
    let output = serde_json::to_string_pretty(value).map_err(tool_error)?;
    Ok(CallToolResult::text_content(vec![TextContent::from(output)]))
}

fn parse_job_id(raw: &str) -> Result<JobId, CallToolError> {
    raw.parse::<JobId>().map_err(tool_error)
}

// ============================================================================
// TOOLS
// ============================================================================

#[mcp_tool(
    name = "start_transcription",
    description = "Start transcribing a stored video.

Submits the video's public URL to the speech-to-text provider and creates a
job in `processing`.

Returns: {\"jobId\": \"...\"}",
    open_world_hint = true
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct StartTranscriptionTool {
    /// Video path inside the videos bucket (e.g. `3f2a....mp4`)
    video_ref: String,
}

impl StartTranscriptionTool {
    pub async fn run(&self, service: &PollingService) -> Result<CallToolResult, CallToolError> {
        let response = service
            .start_transcription(&self.video_ref)
            .await
            .map_err(tool_error)?;
        json_result(&response)
    }
}

#[mcp_tool(
    name = "transcription_status",
    description = "Check a transcription job once.

While the provider is still working this returns `processing`; call again
later (every few seconds). On completion the subtitles are generated and
stored in this same call.

Returns: {\"status\": \"pending|processing|completed|error\", \"text\"?, \"subtitleUrl\"?}",
    open_world_hint = true
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TranscriptionStatusTool {
    /// Job id returned by start_transcription
    job_id: String,
}

impl TranscriptionStatusTool {
    pub async fn run(&self, service: &PollingService) -> Result<CallToolResult, CallToolError> {
        let id = parse_job_id(&self.job_id)?;
        let response = service.transcription_status(id).await.map_err(tool_error)?;
        json_result(&response)
    }
}

#[mcp_tool(
    name = "start_render",
    description = "Burn a completed job's subtitles into its video.

The render runs in the background; poll render_status. Rejected with
`transcription-not-ready` before transcription completes and with
`already-in-progress` while another render of the job is running.

Colors accept names (white, black, red, green, blue, yellow, cyan, magenta)
or #RRGGBB; the background also accepts an opacity suffix like black@0.5.

Returns: {\"result\": \"accepted\", \"jobId\"} or {\"result\": \"rejected\", \"reason\"}"
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct StartRenderTool {
    /// Job id returned by start_transcription
    job_id: String,
    /// Font family (default Arial)
    #[serde(default)]
    font_name: Option<String>,
    /// Font size (default 24)
    #[serde(default)]
    font_size: Option<u32>,
    /// Text color (default white)
    #[serde(default)]
    font_color: Option<String>,
    /// Box color (default black@0.5)
    #[serde(default)]
    background_color: Option<String>,
    /// Outline color (default black)
    #[serde(default)]
    outline_color: Option<String>,
    /// Outline width (default 2)
    #[serde(default)]
    outline_width: Option<u32>,
    /// top, center or bottom (default bottom)
    #[serde(default)]
    position: Option<String>,
}

impl StartRenderTool {
    fn style(&self) -> Result<SubtitleStyle, CallToolError> {
        let position = self
            .position
            .as_deref()
            .map(str::parse::<SubtitlePosition>)
            .transpose()
            .map_err(tool_error)?;

        Ok(SubtitleStyle {
            font_name: self.font_name.clone(),
            font_size: self.font_size,
            font_color: self.font_color.clone(),
            background_color: self.background_color.clone(),
            outline_color: self.outline_color.clone(),
            outline_width: self.outline_width,
            position,
        })
    }

    pub async fn run(&self, service: &PollingService) -> Result<CallToolResult, CallToolError> {
        let id = parse_job_id(&self.job_id)?;
        let style = self.style()?;
        let response = service
            .start_render(id, style)
            .await
            .map_err(tool_error)?;
        json_result(&response)
    }
}

#[mcp_tool(
    name = "render_status",
    description = "Read the render track of a job.

`status` is null until transcription completes.

Returns: {\"status\": \"pending|processing|completed|error\"|null, \"renderedVideoUrl\"?}",
    read_only_hint = true
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RenderStatusTool {
    /// Job id returned by start_transcription
    job_id: String,
}

impl RenderStatusTool {
    pub async fn run(&self, service: &PollingService) -> Result<CallToolResult, CallToolError> {
        let id = parse_job_id(&self.job_id)?;
        let response = service.render_status(id).await.map_err(tool_error)?;
        json_result(&response)
    }
}

// Generate the tools enum
tool_box!(
    SubburnTools,
    [
        StartTranscriptionTool,
        TranscriptionStatusTool,
        StartRenderTool,
        RenderStatusTool
    ]
);

// ============================================================================
// SERVER HANDLER
// ============================================================================

pub struct SubburnHandler {
    service: Arc<PollingService>,
}

#[async_trait]
impl ServerHandler for SubburnHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: SubburnTools::tools(),
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> Result<CallToolResult, CallToolError> {
        let tool = SubburnTools::try_from(request.params)
            .map_err(|e| CallToolError::from_message(e.to_string()))?;

        match tool {
            SubburnTools::StartTranscriptionTool(t) => t.run(&self.service).await,
            SubburnTools::TranscriptionStatusTool(t) => t.run(&self.service).await,
            SubburnTools::StartRenderTool(t) => t.run(&self.service).await,
            SubburnTools::RenderStatusTool(t) => t.run(&self.service).await,
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

const INSTRUCTIONS: &str = "subburn turns stored videos into SRT subtitles and optionally \
burns them in. Start a transcription, poll transcription_status until completed, then \
start_render and poll render_status.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log to stderr so it doesn't interfere with MCP
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;
    let jobs = FileJobStore::open(config.jobs_dir()).await?;
    let orchestrator = config.build_orchestrator(Arc::new(jobs))?;
    let service = Arc::new(PollingService::new(Arc::new(orchestrator)));

    let server_details = InitializeResult {
        server_info: Implementation {
            name: "subburn".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            title: Some("subburn Subtitle Generator".into()),
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        meta: None,
        instructions: Some(INSTRUCTIONS.into()),
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    };

    let transport = StdioTransport::new(TransportOptions::default())?;

    let handler = SubburnHandler {
        service: Arc::clone(&service),
    };

    let server = server_runtime::create_server(server_details, transport, handler);

    server.start().await?;
    service.drain().await;
    Ok(())
}
