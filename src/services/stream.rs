//! Response body that keeps its workspace alive
//!
//! The artifact file lives inside the request workspace, so the workspace must
//! outlive the streaming read. [`ArtifactStream`] owns both the open file and
//! the [`Workspace`]; the workspace is released as soon as the file has been
//! read to the end, or when the body is dropped early (client disconnect).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::artifact::ExtractedArtifact;
use super::workspace::Workspace;

pub struct ArtifactStream {
    inner: ReaderStream<File>,
    workspace: Option<Workspace>,
}

impl ArtifactStream {
    /// Open the artifact for streaming, taking ownership of its workspace.
    ///
    /// On failure the workspace is handed back so the caller can close it.
    pub async fn open(
        artifact: &ExtractedArtifact,
        workspace: Workspace,
    ) -> Result<Self, (io::Error, Workspace)> {
        match File::open(&artifact.path).await {
            Ok(file) => Ok(Self {
                inner: ReaderStream::new(file),
                workspace: Some(workspace),
            }),
            Err(e) => Err((e, workspace)),
        }
    }
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(None) = poll {
            // Fully read; dropping the workspace schedules its removal.
            self.workspace.take();
        }
        poll
    }
}
