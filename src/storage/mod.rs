// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Storage layout and space-aware retention for downloaded media.
//!
//! Artifacts live under a single storage root with one flat subdirectory
//! per media format:
//!
//! ```text
//! downloads/
//! ├── audio/   <- mp3 extractions
//! └── video/   <- mp4 containers
//! ```
//!
//! The root is an explicitly passed value, never ambient global state, so
//! tests can point it at a temporary directory.

pub mod retention;
pub mod usage;

use std::path::{Path, PathBuf};

use crate::types::MediaFormat;

pub use retention::{list_stored_files, reclaim, StoredFile, LOW_SPACE_TRIGGER, RECLAIM_TARGET};
pub use usage::VolumeUsage;

/// The base downloads directory and the per-format layout beneath it.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    base: PathBuf,
}

impl StorageRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.dir_for(MediaFormat::Audio)
    }

    pub fn video_dir(&self) -> PathBuf {
        self.dir_for(MediaFormat::Video)
    }

    /// Target directory for artifacts of the given format.
    pub fn dir_for(&self, format: MediaFormat) -> PathBuf {
        self.base.join(format.subdir())
    }

    /// Every subdirectory a reclaim pass scans.
    pub fn media_dirs(&self) -> Vec<PathBuf> {
        vec![self.audio_dir(), self.video_dir()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let root = StorageRoot::new("/srv/downloads");

        assert_eq!(root.audio_dir(), PathBuf::from("/srv/downloads/audio"));
        assert_eq!(root.video_dir(), PathBuf::from("/srv/downloads/video"));
        assert_eq!(root.dir_for(MediaFormat::Audio), root.audio_dir());
        assert_eq!(root.dir_for(MediaFormat::Video), root.video_dir());
        assert_eq!(root.media_dirs(), vec![root.audio_dir(), root.video_dir()]);
    }
}
