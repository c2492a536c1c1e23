//! Audio extraction endpoint
//!
//! POST /extract-audio with `{"url": "...", "audio_format": "m4a"}`.
//!
//! Each request gets its own workspace. The extractor runs on the blocking
//! pool with the workspace and an extraction slot moved into the worker, so a
//! cancelled request still releases both once the worker returns. Failures
//! remove the workspace before the error is reported; on success the response
//! body owns the workspace until it has been streamed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::AppState;
use crate::api::ApiError;
use crate::services::{
    ArtifactStream, AudioFormat, ExtractError, ExtractedArtifact, ExtractionJob, Extractor,
    Workspace,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractRequest {
    /// Locator of the video to extract audio from
    pub url: String,
    /// Only used as a content-type hint; no transcoding happens
    #[serde(default)]
    pub audio_format: Option<AudioFormat>,
}

/// Parse and check the locator: an absolute http(s) URL with a host.
pub fn parse_locator(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ApiError::InvalidLocator(format!("{} ({})", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidLocator(format!(
            "{} (unsupported scheme '{}')",
            raw,
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ApiError::InvalidLocator(format!("{} (missing host)", raw)));
    }

    Ok(url)
}

async fn extract_audio(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let locator = parse_locator(&request.url)?;

    let span = info_span!(
        "extract_audio",
        request_id = %Uuid::new_v4(),
        locator = %locator,
    );

    handle_extraction(&state, locator, request.audio_format)
        .instrument(span)
        .await
}

/// Run one extraction and build the streaming response.
pub async fn handle_extraction(
    state: &AppState,
    locator: Url,
    desired_format: Option<AudioFormat>,
) -> Result<Response, ApiError> {
    let permit = state
        .extraction_slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("extraction pool is closed".to_string()))?;

    let workspace = Workspace::create_async(
        state.config.workspace_root.clone(),
        state.config.workspace_prefix.clone(),
    )
    .await
    .map_err(|e| ApiError::Internal(format!("failed to create workspace: {}", e)))?;

    info!(workspace = %workspace.path().display(), "Starting extraction");

    let job = ExtractionJob::new(locator, workspace.path(), state.config.title_max_bytes);
    let extractor = state.extractor.clone();
    let span = Span::current();

    let (workspace, outcome) = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let _entered = span.enter();
        // Unwinding must not drop the workspace here, the error path closes it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_extraction(extractor.as_ref(), &job, desired_format)
        }))
        .unwrap_or_else(|payload| Err(ExtractError::ExtractionFailed(panic_message(&*payload))));
        (workspace, outcome)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("extraction task failed: {}", e)))?;

    let artifact = match outcome {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(error = %e, "Extraction failed");
            workspace.close().await;
            return Err(e.into());
        }
    };

    let stream = match ArtifactStream::open(&artifact, workspace).await {
        Ok(stream) => stream,
        Err((e, workspace)) => {
            workspace.close().await;
            return Err(ApiError::Internal(format!(
                "failed to open {}: {}",
                artifact.path.display(),
                e
            )));
        }
    };

    info!(
        filename = %artifact.display_name,
        media_type = %artifact.media_type,
        size_bytes = artifact.size_bytes,
        "Streaming artifact"
    );

    Ok(file_response(&artifact, Body::from_stream(stream)))
}

/// Blocking part of the flow: extractor call plus artifact selection.
fn run_extraction(
    extractor: &dyn Extractor,
    job: &ExtractionJob,
    desired_format: Option<AudioFormat>,
) -> Result<ExtractedArtifact, ExtractError> {
    let info = extractor.extract(job)?.ok_or_else(|| {
        ExtractError::ExtractionFailed("Failed to extract info for the provided URL.".to_string())
    })?;

    ExtractedArtifact::from_workspace(&job.output_dir, &info, desired_format)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let reason = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("extractor panicked: {}", reason)
}

fn file_response(artifact: &ExtractedArtifact, body: Body) -> Response {
    let headers = [
        (header::CONTENT_TYPE, artifact.media_type.clone()),
        (header::CONTENT_LENGTH, artifact.size_bytes.to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.display_name),
        ),
    ];
    (StatusCode::OK, headers, body).into_response()
}

/// `attachment` disposition with an ASCII `filename` and, when the name is
/// not plain ASCII, an RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            ' ' => ' ',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{}\"", name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(name)
        )
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/extract-audio", post(extract_audio))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_locator_accepts_http_urls() {
        let url = parse_locator(" https://www.youtube.com/watch?v=abc123 ").unwrap();
        assert_eq!(url.host_str(), Some("www.youtube.com"));
        assert!(parse_locator("http://example.com/video").is_ok());
    }

    #[test]
    fn test_parse_locator_rejects_invalid() {
        assert_matches!(parse_locator("not a url"), Err(ApiError::InvalidLocator(_)));
        assert_matches!(parse_locator(""), Err(ApiError::InvalidLocator(_)));
        assert_matches!(parse_locator("file:///etc/passwd"), Err(ApiError::InvalidLocator(_)));
        assert_matches!(parse_locator("ftp://example.com/a.mp3"), Err(ApiError::InvalidLocator(_)));
    }

    #[test]
    fn test_request_deserialization() {
        let request: ExtractRequest =
            serde_json::from_str(r#"{"url": "https://example.com/v"}"#).unwrap();
        assert!(request.audio_format.is_none());

        let request: ExtractRequest =
            serde_json::from_str(r#"{"url": "https://example.com/v", "audio_format": "flac"}"#)
                .unwrap();
        assert_eq!(request.audio_format, Some(AudioFormat::Flac));

        assert!(
            serde_json::from_str::<ExtractRequest>(
                r#"{"url": "https://example.com/v", "audio_format": "ogg"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(panic_message(&*payload), "extractor panicked: boom");

        let payload = panic::catch_unwind(|| -> u8 { panic!("code {}", 7) }).unwrap_err();
        assert_eq!(panic_message(&*payload), "extractor panicked: code 7");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "extractor panicked: unknown panic");
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("Artist-Title (Live).m4a"),
            "attachment; filename=\"Artist-Title (Live).m4a\""
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("Café \"Live\".webm");
        assert!(value.starts_with("attachment; filename=\"Caf_ _Live_.webm\"; filename*=UTF-8''"));
        assert!(value.contains("Caf%C3%A9"));
        assert!(value.is_ascii());
    }
}
