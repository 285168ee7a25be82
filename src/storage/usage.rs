// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Volume capacity probing for the storage root.

use std::path::Path;

/// A point-in-time reading of the volume hosting the storage root.
///
/// Readings are recomputed on every probe and never cached across decisions.
/// An unobtainable reading is represented as `None` at the probe site, never
/// as a zeroed-out value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeUsage {
    /// Bytes available to the calling user.
    pub free_bytes: u64,
    /// Total capacity of the volume in bytes. Always non-zero.
    pub total_bytes: u64,
}

impl VolumeUsage {
    /// Fraction of the volume that is free, in `0.0..=1.0`.
    pub fn free_ratio(&self) -> f64 {
        self.free_bytes as f64 / self.total_bytes as f64
    }
}

/// Query free and total capacity of the volume containing `root`.
///
/// Returns `None` when the query fails or the reported total capacity is
/// zero. Callers must treat `None` as "unknown, skip cleanup this cycle",
/// never as "full".
pub fn probe(root: &Path) -> Option<VolumeUsage> {
    let total_bytes = fs2::total_space(root).ok()?;
    let free_bytes = fs2::available_space(root).ok()?;

    if total_bytes == 0 {
        return None;
    }

    Some(VolumeUsage {
        free_bytes,
        total_bytes,
    })
}
