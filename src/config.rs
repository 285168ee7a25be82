// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Environment-provided configuration for the external tools.
//!
//! Read once at startup into an explicit value; nothing in the core reads
//! the environment after that.

use std::path::PathBuf;

/// Default cookies source passed to the downloader.
const DEFAULT_COOKIES_BROWSER: &str = "brave";

/// Locations and credential settings for the external downloader/transcoder.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// The yt-dlp executable.
    pub ytdlp: PathBuf,
    /// ffmpeg override; when set it is handed to yt-dlp via
    /// `--ffmpeg-location` instead of relying on PATH lookup.
    pub ffmpeg: Option<PathBuf>,
    /// Browser whose cookie store yt-dlp reads for authenticated sources.
    /// `None` disables the flag entirely.
    pub cookies_browser: Option<String>,
}

impl ToolPaths {
    /// Resolve tool locations from the environment.
    ///
    /// - `YTDLP_PATH` — downloader executable, default `yt-dlp`
    /// - `FFMPEG_PATH` — optional transcoder override
    /// - `YTDLP_COOKIES_BROWSER` — cookies source, default `brave`;
    ///   set to an empty string to disable
    pub fn from_env() -> Self {
        let ytdlp = std::env::var_os("YTDLP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));

        let ffmpeg = std::env::var_os("FFMPEG_PATH").map(PathBuf::from);

        let cookies_browser = match std::env::var("YTDLP_COOKIES_BROWSER") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => Some(DEFAULT_COOKIES_BROWSER.to_string()),
        };

        Self {
            ytdlp,
            ffmpeg,
            cookies_browser,
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ytdlp: PathBuf::from("yt-dlp"),
            ffmpeg: None,
            cookies_browser: Some(DEFAULT_COOKIES_BROWSER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tools = ToolPaths::default();
        assert_eq!(tools.ytdlp, PathBuf::from("yt-dlp"));
        assert_eq!(tools.ffmpeg, None);
        assert_eq!(tools.cookies_browser.as_deref(), Some("brave"));
    }
}
