//! Artifact selection and labelling
//!
//! After the extractor has written into a workspace, the primary artifact is
//! the largest file with a known audio container extension (the extractor may
//! also leave thumbnails or subtitle sidecars behind). If nothing matches, any
//! file in the workspace is considered.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::extractor::{ExtractError, ExtractionInfo};

/// Audio container extensions in preference order
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "m4a", "webm", "mp4", "opus", "mp3", "ogg", "wav", "flac", "aac",
];

const FALLBACK_TITLE: &str = "audio";
const FALLBACK_EXTENSION: &str = "m4a";
const OCTET_STREAM: &str = "application/octet-stream";

/// Audio encodings a client may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
    Flac,
    Aac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Aac => "audio/aac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The file chosen as the response body, with its client-facing labels
#[derive(Debug, Clone)]
pub struct ExtractedArtifact {
    pub path: PathBuf,
    pub display_name: String,
    pub media_type: String,
    pub size_bytes: u64,
}

impl ExtractedArtifact {
    /// Select the artifact in `dir` and derive its display name and media type.
    pub fn from_workspace(
        dir: &Path,
        info: &ExtractionInfo,
        desired_format: Option<AudioFormat>,
    ) -> Result<Self, ExtractError> {
        let (path, size_bytes) = select_artifact(dir)?;
        let display_name = display_name(info.title.as_deref(), &path);
        let media_type = media_type_for(&path, desired_format);

        debug!(
            artifact = %path.display(),
            size_bytes,
            media_type = %media_type,
            "Artifact selected"
        );

        Ok(Self {
            path,
            display_name,
            media_type,
            size_bytes,
        })
    }
}

/// Pick the largest candidate file in `dir`. Ties keep the earlier candidate.
pub fn select_artifact(dir: &Path) -> Result<(PathBuf, u64), ExtractError> {
    let files = workspace_files(dir)?;

    let matching: Vec<(PathBuf, u64)> = AUDIO_EXTENSIONS
        .iter()
        .flat_map(|ext| {
            files
                .iter()
                .filter(move |(path, _)| extension_of(path).as_deref() == Some(*ext))
        })
        .cloned()
        .collect();

    let candidates = if matching.is_empty() { files } else { matching };

    let mut best: Option<(PathBuf, u64)> = None;
    for candidate in candidates {
        if best.as_ref().is_none_or(|(_, size)| candidate.1 > *size) {
            best = Some(candidate);
        }
    }

    best.ok_or(ExtractError::NoArtifactFound)
}

/// Regular files directly in `dir` or one level below, in name order.
fn workspace_files(dir: &Path) -> Result<Vec<(PathBuf, u64)>, ExtractError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(2).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let err = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("workspace is not readable"));
                return Err(err.into());
            }
            Err(e) => {
                debug!(error = %e, "Skipping unreadable workspace entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => files.push((entry.into_path(), metadata.len())),
            Err(e) => debug!(error = %e, "Skipping workspace entry without metadata"),
        }
    }

    Ok(files)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// `{title}.{ext}` with the title made safe for use as a single path segment.
pub fn display_name(title: Option<&str>, path: &Path) -> String {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(FALLBACK_TITLE);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(FALLBACK_EXTENSION);

    format!("{}.{}", sanitize_title(title), ext)
}

fn sanitize_title(title: &str) -> String {
    let separated = title.replace(['/', '\\'], "-");
    let options = sanitize_filename::Options {
        windows: true,
        truncate: true,
        replacement: "-",
    };
    let sanitized = sanitize_filename::sanitize_with_options(separated, options);

    if sanitized.trim_matches(['-', ' ']).is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        sanitized
    }
}

/// Content type for the artifact: the container mapping for the formats the
/// extractor produces, then a guessed `audio/*` type, then the requested
/// format, then a generic binary type.
pub fn media_type_for(path: &Path, desired_format: Option<AudioFormat>) -> String {
    let container = match extension_of(path).as_deref() {
        Some("m4a") | Some("mp4") => Some("audio/mp4"),
        Some("webm") | Some("opus") => Some("audio/webm"),
        Some("ogg") => Some("audio/ogg"),
        _ => None,
    };
    if let Some(media_type) = container {
        return media_type.to_string();
    }

    if let Some(guess) = mime_guess::from_path(path).first()
        && guess.type_().as_str() == "audio"
    {
        return guess.essence_str().to_string();
    }

    desired_format
        .map(AudioFormat::mime_type)
        .unwrap_or(OCTET_STREAM)
        .to_string()
}
