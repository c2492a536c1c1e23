//! Audio extraction backend
//!
//! The extractor is an opaque, blocking collaborator: it receives a locator
//! and an output template confined to the request workspace, downloads the
//! best available audio into that directory, and reports metadata. The
//! production implementation shells out to `yt-dlp`. Callers are expected to
//! run [`Extractor::extract`] on a blocking thread.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Failures of the extraction pipeline below the HTTP layer
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extractor could not resolve or download the resource
    #[error("{0}")]
    ExtractionFailed(String),

    /// Extraction reported success but left nothing in the workspace
    #[error("No downloaded file found.")]
    NoArtifactFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options handed to the extractor for every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorOptions {
    /// Format selection expression
    pub format_selector: String,
    /// Never expand playlists
    pub single_item_only: bool,
    pub quiet: bool,
    /// Restrict output names to ASCII without spaces
    pub strict_filenames: bool,
    /// Abort on the first download error
    pub fail_on_error: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            format_selector: "bestaudio/best".to_string(),
            single_item_only: true,
            quiet: true,
            strict_filenames: false,
            fail_on_error: true,
        }
    }
}

impl ExtractorOptions {
    fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-f".into(), self.format_selector.clone().into()];

        args.push(if self.single_item_only {
            "--no-playlist".into()
        } else {
            "--yes-playlist".into()
        });

        if self.quiet {
            args.extend(["--quiet", "--no-warnings", "--no-progress"].map(OsString::from));
        }

        if self.strict_filenames {
            args.push("--restrict-filenames".into());
        }

        args.push(if self.fail_on_error {
            "--abort-on-error".into()
        } else {
            "--ignore-errors".into()
        });

        args
    }
}

/// A single extraction: what to fetch and where to put it
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub locator: Url,
    /// Workspace directory that receives the download
    pub output_dir: PathBuf,
    /// Output path template, always inside `output_dir`
    pub output_template: PathBuf,
    pub options: ExtractorOptions,
}

impl ExtractionJob {
    pub fn new(locator: Url, output_dir: &Path, title_max_bytes: usize) -> Self {
        let output_template =
            output_dir.join(format!("%(title).{}B-%(id)s.%(ext)s", title_max_bytes));

        Self {
            locator,
            output_dir: output_dir.to_path_buf(),
            output_template,
            options: ExtractorOptions::default(),
        }
    }
}

/// Metadata reported by the extractor for the downloaded item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub ext: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub webpage_url: Option<String>,
}

/// Blocking extraction backend
pub trait Extractor: Send + Sync {
    /// Download the job's locator into its output directory.
    ///
    /// `Ok(None)` means the extractor finished without producing metadata.
    fn extract(&self, job: &ExtractionJob) -> Result<Option<ExtractionInfo>, ExtractError>;

    /// Whether the backend can currently be invoked
    fn is_available(&self) -> bool {
        true
    }
}

/// `yt-dlp` command-line extractor
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: String,
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command_args(job: &ExtractionJob) -> Vec<OsString> {
        let mut args = job.options.to_args();
        args.push("-o".into());
        args.push(job.output_template.clone().into_os_string());
        // Print the info JSON on stdout while still downloading
        args.push("--dump-single-json".into());
        args.push("--no-simulate".into());
        args.push("--".into());
        args.push(job.locator.as_str().into());
        args
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl Extractor for YtDlpExtractor {
    fn extract(&self, job: &ExtractionJob) -> Result<Option<ExtractionInfo>, ExtractError> {
        debug!(
            program = %self.program,
            locator = %job.locator,
            output_dir = %job.output_dir.display(),
            "Running extractor"
        );

        let output = Command::new(&self.program)
            .args(Self::command_args(job))
            .current_dir(&job.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ExtractError::ExtractionFailed(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                locator = %job.locator,
                status = %output.status,
                "Extractor exited with failure"
            );
            return Err(ExtractError::ExtractionFailed(failure_message(
                &stderr,
                output.status,
            )));
        }

        parse_info(&output.stdout)
    }

    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Parse the info JSON printed by the extractor. Empty output or `null`
/// means no metadata was produced.
pub fn parse_info(stdout: &[u8]) -> Result<Option<ExtractionInfo>, ExtractError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Option<ExtractionInfo>>(text)
        .map_err(|e| ExtractError::ExtractionFailed(format!("unreadable extractor metadata: {}", e)))
}

/// Human-readable failure from the extractor's stderr: the last line that
/// carries an error, without its `ERROR:` tag.
fn failure_message(stderr: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| format!("extractor exited with {}", status))
}
