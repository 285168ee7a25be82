// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ripserve::config::ToolPaths;
use ripserve::server::Server;

/// Self-hosted media download gateway. yt-dlp behind an HTTP endpoint,
/// with disk-aware retention.
#[derive(Parser)]
#[command(name = "ripserve", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Address to bind to; use 0.0.0.0 to allow network access
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Base directory downloaded artifacts are stored under
    #[arg(long, default_value = "downloads")]
    downloads_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    Server::new(cli.port)
        .with_bind_address(cli.bind)
        .with_storage_root(cli.downloads_dir)
        .with_tools(ToolPaths::from_env())
        .start()
        .await
}
