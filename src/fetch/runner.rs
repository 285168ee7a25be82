// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Orchestration of the external downloader process.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::config::ToolPaths;
use super::locator;
use super::types::{DownloadJob, DownloadOutcome};
use crate::types::MediaFormat;

/// Output naming template handed to the tool; the stable per-source id keeps
/// concurrent jobs for different sources from colliding on filenames.
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Runs download jobs against the configured external tool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    tools: ToolPaths,
}

impl Fetcher {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Run one job to completion.
    ///
    /// The returned outcome carries the exit code and both captured streams;
    /// a non-zero exit is a returned state, not an `Err`. `Err` means the
    /// process could not be launched at all.
    pub async fn run(&self, job: &DownloadJob) -> Result<DownloadOutcome> {
        tokio::fs::create_dir_all(&job.target_dir)
            .await
            .with_context(|| format!("failed to create {}", job.target_dir.display()))?;

        let args = self.build_args(job);
        tracing::info!(url = %job.url, format = job.format.as_str(), "starting download");

        let mut child = Command::new(&self.tools.ytdlp)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.tools.ytdlp.display()))?;

        let stdout = child
            .stdout
            .take()
            .context("downloader stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("downloader stderr was not captured")?;

        // Accumulate both streams in full while forwarding each line live to
        // the tracing subscriber. Accumulation order within a stream follows
        // delivery order.
        let stdout_task = tokio::spawn(drain_lines(stdout, StreamKind::Stdout));
        let stderr_task = tokio::spawn(drain_lines(stderr, StreamKind::Stderr));

        let status = child
            .wait()
            .await
            .context("failed to wait for downloader exit")?;

        let stdout_text = stdout_task.await.unwrap_or_default();
        let stderr_text = stderr_task.await.unwrap_or_default();

        let exit_code = status.code().unwrap_or(-1);
        let resolved_path = locator::extract(&stdout_text);

        if status.success() {
            match &resolved_path {
                Some(path) => tracing::info!(path = %path.display(), "download finished"),
                None => tracing::warn!(url = %job.url, "download finished but no artifact path was announced"),
            }
        } else {
            tracing::warn!(url = %job.url, exit_code, "downloader exited with failure");
        }

        Ok(DownloadOutcome {
            exit_code,
            stdout: stdout_text,
            stderr: stderr_text,
            resolved_path,
        })
    }

    /// Quick availability check for the health endpoint: does the configured
    /// tool run at all?
    pub async fn probe(&self) -> bool {
        Command::new(&self.tools.ytdlp)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Argument list for one job.
    fn build_args(&self, job: &DownloadJob) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = Vec::new();

        args.push(job.url.clone().into());
        args.push("-o".into());
        args.push(job.target_dir.join(OUTPUT_TEMPLATE).into());

        if let Some(browser) = &self.tools.cookies_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.into());
        }

        if let Some(ffmpeg) = &self.tools.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.into());
        }

        match job.format {
            MediaFormat::Audio => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push("mp3".into());
                args.push("--audio-quality".into());
                args.push("0".into());
            }
            MediaFormat::Video => {
                args.push("-f".into());
                args.push("mp4".into());
            }
        }

        args
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Read a child stream line by line, forwarding each line to the tracing
/// subscriber and returning the accumulated text on EOF.
async fn drain_lines<R>(reader: R, kind: StreamKind) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut accumulated = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        match kind {
            StreamKind::Stdout => tracing::info!(target: "ripserve::downloader", "{line}"),
            StreamKind::Stderr => tracing::debug!(target: "ripserve::downloader", "{line}"),
        }
        accumulated.push_str(&line);
        accumulated.push('\n');
    }

    accumulated
}
