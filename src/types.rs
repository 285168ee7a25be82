// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Canonical types used across ripserve.
//!
//! This module provides unified type definitions to avoid duplication.

/// The two deliverable formats a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    /// Audio extraction, delivered as mp3.
    Audio,
    /// Video download, delivered as an mp4 container.
    Video,
}

impl MediaFormat {
    /// Parse the request-parameter spelling. Anything other than `mp3` or
    /// `mp4` is rejected.
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Audio),
            "mp4" => Some(Self::Video),
            _ => None,
        }
    }

    /// The request-parameter spelling of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Name of the storage subdirectory artifacts of this format land in.
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Content type used when streaming an artifact of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Audio => "audio/mpeg",
            Self::Video => "video/mp4",
        }
    }
}
