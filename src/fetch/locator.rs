// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Artifact path recovery from downloader output.
//!
//! yt-dlp announces where it writes in free-form progress text rather than
//! anything structured, so the path has to be fished out of captured stdout
//! after the fact. Two line shapes are recognized:
//!
//! ```text
//! [download] Destination: /srv/downloads/video/dQw4w9WgXcQ.mp4
//! [download] /srv/downloads/audio/x.mp3 has already been downloaded
//! ```
//!
//! A run that merges separate audio/video streams prints one destination per
//! intermediate stream before the final container, so the last match wins.
//!
//! The matching rules live behind this one narrow function on purpose: a
//! newer tool version with JSON-per-line output can replace them without
//! touching the orchestrator.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

static DESTINATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Destination:\s*(.+)$").expect("destination pattern is valid"));

static ALREADY_DOWNLOADED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\] (.+) has already been downloaded").expect("reuse pattern is valid"));

/// Scan captured stdout for the artifact path the tool announced.
///
/// Returns `None` when no recognizable line is present; callers must treat
/// that as "succeeded, path unknown" rather than as a failure.
pub fn extract(stdout: &str) -> Option<PathBuf> {
    let mut last: Option<PathBuf> = None;

    for line in stdout.lines() {
        if let Some(captures) = DESTINATION.captures(line) {
            last = Some(PathBuf::from(captures[1].trim()));
            continue;
        }

        if let Some(captures) = ALREADY_DOWNLOADED.captures(line) {
            last = Some(PathBuf::from(captures[1].trim()));
        }
    }

    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_destination() {
        let stdout = "[download] Destination: /d/video/a.mp4\n[download] 100% of 3.4MiB";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/video/a.mp4")));
    }

    #[test]
    fn test_last_destination_wins() {
        // Separate audio/video streams each announce a destination; only the
        // final merged container is the deliverable.
        let stdout = "\
[download] Destination: /d/video/a.mp4
[download] 100% of 10MiB
[download] Destination: /d/video/a.f2.mp4
[download] 100% of 2MiB";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/video/a.f2.mp4")));
    }

    #[test]
    fn test_already_downloaded_line() {
        let stdout = "[download] /d/audio/x.mp3 has already been downloaded";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/audio/x.mp3")));
    }

    #[test]
    fn test_reuse_after_destination_wins() {
        let stdout = "\
[download] Destination: /d/video/a.mp4
[download] /d/video/b.mp4 has already been downloaded";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/video/b.mp4")));
    }

    #[test]
    fn test_no_recognizable_line_is_none() {
        let stdout = "[youtube] dQw4w9WgXcQ: Downloading webpage\n[info] Available formats:";
        assert_eq!(extract(stdout), None);
    }

    #[test]
    fn test_empty_output_is_none() {
        assert_eq!(extract(""), None);
    }

    #[test]
    fn test_crlf_line_endings() {
        let stdout = "[download] Destination: /d/video/a.mp4\r\n[download] done\r\n";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/video/a.mp4")));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let stdout = "[download] Destination:   /d/video/spaced.mp4  ";
        assert_eq!(extract(stdout), Some(PathBuf::from("/d/video/spaced.mp4")));
    }
}
