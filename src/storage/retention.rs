// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Disk-space-aware retention for downloaded artifacts.
//!
//! Before each accepted job the server runs one reclaim pass over the
//! storage root. If the hosting volume drops below [`LOW_SPACE_TRIGGER`],
//! previously downloaded files are evicted oldest-first until the free
//! ratio climbs back above [`RECLAIM_TARGET`] or the inventory runs out.
//!
//! The two thresholds are deliberately apart: once space is merely adequate
//! a pass must not re-trigger on every request, and reclaiming up to the
//! higher mark buys headroom before the next low-space episode.
//!
//! Failures inside a pass are never escalated. An unreadable volume makes
//! the pass a no-op, and a file that cannot be deleted is skipped. The
//! triggering job proceeds either way.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::usage::{self, VolumeUsage};
use super::StorageRoot;

/// Free-ratio below which a reclaim pass starts evicting.
pub const LOW_SPACE_TRIGGER: f64 = 0.20;

/// Free-ratio at which an eviction loop stops.
pub const RECLAIM_TARGET: f64 = 0.50;

/// One downloaded file found while scanning the storage subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Run one reclaim pass over the storage root.
///
/// Called once before each job is accepted. Never blocks or fails the
/// incoming job: every failure mode degrades to doing less, not erroring.
pub fn reclaim(root: &StorageRoot) {
    let base = root.base().to_path_buf();
    let files = list_stored_files(&root.media_dirs());

    let deleted = reclaim_with(
        || usage::probe(&base),
        |path| std::fs::remove_file(path),
        files,
    );

    if deleted > 0 {
        tracing::info!(deleted, root = %root.base().display(), "evicted stale downloads to reclaim disk space");
    }
}

/// Enumerate regular files across the given directories, non-recursively.
///
/// Missing directories are skipped, as are entries whose metadata cannot be
/// read. The result is unsorted; [`reclaim_with`] orders it.
pub fn list_stored_files(dirs: &[PathBuf]) -> Vec<StoredFile> {
    let mut files = Vec::new();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            files.push(StoredFile {
                path: entry.path(),
                modified,
            });
        }
    }

    files
}

/// The eviction loop, with the usage probe and delete primitive injected.
///
/// Returns the number of files actually deleted. The probe is re-run before
/// every deletion; an unknown reading stops the loop rather than guessing.
fn reclaim_with<U, D>(mut probe: U, mut delete: D, mut files: Vec<StoredFile>) -> usize
where
    U: FnMut() -> Option<VolumeUsage>,
    D: FnMut(&Path) -> io::Result<()>,
{
    let Some(initial) = probe() else {
        return 0;
    };
    if initial.free_ratio() >= LOW_SPACE_TRIGGER {
        return 0;
    }

    files.sort_by_key(|file| file.modified);

    let mut deleted = 0;
    for file in files {
        match probe() {
            Some(current) if current.free_ratio() < RECLAIM_TARGET => {}
            _ => break,
        }

        match delete(&file.path) {
            Ok(()) => deleted += 1,
            Err(err) => {
                // Permission denied or already gone; the next file may still free space.
                tracing::debug!(path = %file.path.display(), %err, "skipping file that could not be evicted");
            }
        }
    }

    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    fn stored(path: &str, mtime_secs: u64) -> StoredFile {
        StoredFile {
            path: PathBuf::from(path),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs),
        }
    }

    fn usage(free_bytes: u64) -> VolumeUsage {
        VolumeUsage {
            free_bytes,
            total_bytes: 1000,
        }
    }

    #[test]
    fn test_healthy_volume_is_left_alone() {
        let probes = Cell::new(0u32);
        let deleted = RefCell::new(Vec::new());

        let count = reclaim_with(
            || {
                probes.set(probes.get() + 1);
                Some(usage(200)) // exactly at the trigger, still healthy
            },
            |path| {
                deleted.borrow_mut().push(path.to_path_buf());
                Ok(())
            },
            vec![stored("/d/audio/a.mp3", 1), stored("/d/video/b.mp4", 2)],
        );

        assert_eq!(count, 0);
        assert!(deleted.borrow().is_empty());
        assert_eq!(probes.get(), 1);
    }

    #[test]
    fn test_unknown_usage_is_a_noop() {
        let deleted = RefCell::new(Vec::new());

        let count = reclaim_with(
            || None,
            |path| {
                deleted.borrow_mut().push(path.to_path_buf());
                Ok(())
            },
            vec![stored("/d/audio/a.mp3", 1)],
        );

        assert_eq!(count, 0);
        assert!(deleted.borrow().is_empty());
    }

    #[test]
    fn test_eviction_stops_once_target_is_restored() {
        // Free space starts at 10% and climbs 200 bytes per deletion, so the
        // third file must survive: the loop sees 50% before reaching it.
        let deleted = RefCell::new(Vec::new());

        let count = reclaim_with(
            || Some(usage(100 + 200 * deleted.borrow().len() as u64)),
            |path| {
                deleted.borrow_mut().push(path.to_path_buf());
                Ok(())
            },
            vec![
                stored("/d/audio/f1.mp3", 1),
                stored("/d/audio/f2.mp3", 2),
                stored("/d/video/f3.mp4", 3),
            ],
        );

        assert_eq!(count, 2);
        assert_eq!(
            *deleted.borrow(),
            vec![PathBuf::from("/d/audio/f1.mp3"), PathBuf::from("/d/audio/f2.mp3")]
        );
    }

    #[test]
    fn test_oldest_files_go_first_regardless_of_scan_order() {
        let deleted = RefCell::new(Vec::new());

        reclaim_with(
            || Some(usage(50)),
            |path| {
                deleted.borrow_mut().push(path.to_path_buf());
                Ok(())
            },
            vec![
                stored("/d/video/newest.mp4", 30),
                stored("/d/audio/oldest.mp3", 10),
                stored("/d/audio/middle.mp3", 20),
            ],
        );

        assert_eq!(
            *deleted.borrow(),
            vec![
                PathBuf::from("/d/audio/oldest.mp3"),
                PathBuf::from("/d/audio/middle.mp3"),
                PathBuf::from("/d/video/newest.mp4"),
            ]
        );
    }

    #[test]
    fn test_loop_stops_when_usage_becomes_unknown() {
        let probes = Cell::new(0u32);
        let deleted = RefCell::new(Vec::new());

        let count = reclaim_with(
            || {
                probes.set(probes.get() + 1);
                match probes.get() {
                    1 | 2 => Some(usage(100)),
                    _ => None, // volume went away mid-pass; stop, do not guess
                }
            },
            |path| {
                deleted.borrow_mut().push(path.to_path_buf());
                Ok(())
            },
            vec![
                stored("/d/audio/f1.mp3", 1),
                stored("/d/audio/f2.mp3", 2),
                stored("/d/audio/f3.mp3", 3),
            ],
        );

        assert_eq!(count, 1);
        assert_eq!(*deleted.borrow(), vec![PathBuf::from("/d/audio/f1.mp3")]);
    }

    #[test]
    fn test_failed_deletion_is_skipped_and_loop_continues() {
        let attempted = RefCell::new(Vec::new());

        let count = reclaim_with(
            || Some(usage(50)),
            |path| {
                attempted.borrow_mut().push(path.to_path_buf());
                if path.ends_with("f1.mp3") {
                    Err(io::Error::new(io::ErrorKind::NotFound, "already gone"))
                } else {
                    Ok(())
                }
            },
            vec![
                stored("/d/audio/f1.mp3", 1),
                stored("/d/audio/f2.mp3", 2),
            ],
        );

        assert_eq!(count, 1);
        assert_eq!(attempted.borrow().len(), 2);
    }

    #[test]
    fn test_list_exhaustion_ends_the_pass() {
        // Usage never improves; every file is deleted and the pass ends.
        let deleted = Cell::new(0usize);

        let count = reclaim_with(
            || Some(usage(10)),
            |_| {
                deleted.set(deleted.get() + 1);
                Ok(())
            },
            vec![
                stored("/d/audio/f1.mp3", 1),
                stored("/d/audio/f2.mp3", 2),
                stored("/d/video/f3.mp4", 3),
            ],
        );

        assert_eq!(count, 3);
        assert_eq!(deleted.get(), 3);
    }

    #[test]
    fn test_list_stored_files_scans_flat_and_skips_missing_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let audio = dir.path().join("audio");
        let video = dir.path().join("video");
        std::fs::create_dir_all(&audio).expect("mkdir audio");
        std::fs::create_dir_all(&video).expect("mkdir video");

        std::fs::write(audio.join("a.mp3"), b"a").expect("write a");
        std::fs::write(video.join("b.mp4"), b"b").expect("write b");

        // Nested directories are not descended into.
        std::fs::create_dir_all(video.join("nested")).expect("mkdir nested");
        std::fs::write(video.join("nested").join("c.mp4"), b"c").expect("write c");

        let missing = dir.path().join("does-not-exist");
        let files = list_stored_files(&[audio.clone(), video.clone(), missing]);

        let mut names: Vec<String> = files
            .iter()
            .filter_map(|f| f.path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.mp3", "b.mp4"]);
    }

    #[test]
    fn test_reclaim_on_empty_root_has_no_side_effects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = StorageRoot::new(dir.path());

        // Nothing to delete and (on any sane CI machine) plenty of space.
        reclaim(&root);

        assert!(dir.path().exists());
    }
}
