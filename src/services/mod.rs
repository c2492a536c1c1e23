//! Extraction pipeline services

pub mod artifact;
pub mod extractor;
pub mod stream;
pub mod workspace;

pub use artifact::{AudioFormat, ExtractedArtifact};
pub use extractor::{ExtractError, ExtractionInfo, ExtractionJob, Extractor, ExtractorOptions, YtDlpExtractor};
pub use stream::ArtifactStream;
pub use workspace::Workspace;
