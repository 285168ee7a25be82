// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Job and outcome types for the download pipeline.

use std::path::PathBuf;

use crate::storage::StorageRoot;
use crate::types::MediaFormat;

/// One request-driven invocation of the downloader.
///
/// Created per incoming request and discarded once its outcome is rendered.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Source media URL handed to the external tool.
    pub url: String,
    /// Requested deliverable format.
    pub format: MediaFormat,
    /// Format-specific directory the artifact lands in.
    pub target_dir: PathBuf,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, format: MediaFormat, root: &StorageRoot) -> Self {
        Self {
            url: url.into(),
            format,
            target_dir: root.dir_for(format),
        }
    }
}

/// Everything the response layer needs about a finished job.
///
/// A failing exit code is a normal returned state, not an error; callers
/// branch on [`DownloadOutcome::success`]. An unresolved path inside a
/// successful outcome means the tool finished but never announced where the
/// artifact went.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Exit code of the external process. `-1` if it died to a signal.
    pub exit_code: i32,
    /// Accumulated standard output, needed post-hoc for path resolution.
    pub stdout: String,
    /// Accumulated standard error, surfaced verbatim on failure.
    pub stderr: String,
    /// Absolute path of the produced or reused artifact, when announced.
    pub resolved_path: Option<PathBuf>,
}

impl DownloadOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_targets_format_directory() {
        let root = StorageRoot::new("/srv/downloads");

        let audio = DownloadJob::new("https://example.com/v", MediaFormat::Audio, &root);
        assert_eq!(audio.target_dir, PathBuf::from("/srv/downloads/audio"));

        let video = DownloadJob::new("https://example.com/v", MediaFormat::Video, &root);
        assert_eq!(video.target_dir, PathBuf::from("/srv/downloads/video"));
    }

    #[test]
    fn test_success_is_independent_of_path_resolution() {
        // A clean exit with no recognizable destination line is still a
        // success; the path is simply unknown.
        let outcome = DownloadOutcome {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            resolved_path: None,
        };
        assert!(outcome.success());
        assert!(outcome.resolved_path.is_none());
    }

    #[test]
    fn test_nonzero_exit_is_not_success() {
        let outcome = DownloadOutcome {
            exit_code: 1,
            stdout: "partial output".to_string(),
            stderr: "ERROR: unavailable".to_string(),
            resolved_path: None,
        };
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 1);
    }
}
