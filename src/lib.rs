// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! ripserve - Self-hosted media download gateway library
//!
//! yt-dlp behind an HTTP endpoint, with disk-aware retention.
//!
//! A request names a source URL and a deliverable format; ripserve drives
//! the external downloader, keeps the storage volume from filling up by
//! evicting the oldest artifacts first, and streams the result back or
//! reports a structured status.
//!
//! # Core Modules
//!
//! - [`storage`] - Storage layout, volume usage probing, and space-aware retention
//! - [`fetch`] - Download orchestration and artifact path recovery
//! - [`server`] - HTTP server exposing the pipeline
//! - [`config`] - Environment-provided external tool locations
//! - [`types`] - Canonical types shared across modules

pub mod config;
pub mod fetch;
pub mod server;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::ToolPaths;
pub use fetch::{DownloadJob, DownloadOutcome, Fetcher};
pub use server::Server;
pub use storage::{StorageRoot, StoredFile, VolumeUsage, LOW_SPACE_TRIGGER, RECLAIM_TARGET};
pub use types::MediaFormat;
