use anyhow::Result;

use subburn::collab::FfmpegRenderer;
use subburn::config::{config_path, Config, StorageBackend};

pub async fn cmd_doctor() -> Result<()> {
    let path = config_path();
    let config = Config::load()?;

    println!("🩺 subburn {}", subburn::VERSION);
    println!(
        "   Config: {} ({})",
        path.display(),
        if path.exists() { "found" } else { "defaults" }
    );
    println!("   Data dir: {}", config.data_dir().display());

    let key = if config.provider.api_key.is_some() {
        "✅ set"
    } else {
        "❌ missing (ASSEMBLYAI_API_KEY)"
    };
    println!("   AssemblyAI key: {key}");

    match config.storage.backend {
        StorageBackend::Local => {
            let root = config
                .storage
                .local_root
                .clone()
                .unwrap_or_else(|| config.data_dir().join("blobs"));
            println!("   Storage: local ({})", root.display());
        }
        StorageBackend::Supabase => {
            let ready =
                config.storage.supabase_url.is_some() && config.storage.service_key.is_some();
            println!(
                "   Storage: supabase {}",
                if ready {
                    "✅"
                } else {
                    "❌ needs SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY"
                }
            );
        }
    }

    let renderer = FfmpegRenderer::with_config(config.renderer.clone());
    let ffmpeg = if renderer.check_available().await { "✅" } else { "❌ not runnable" };
    println!("   ffmpeg: {} {ffmpeg}", renderer.config().ffmpeg_path);

    Ok(())
}
