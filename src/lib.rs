use std::path::PathBuf;

pub mod audio;
pub mod batch;
pub mod cli;
pub mod utils;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid sample rate: {0}")]
    InvalidRate(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Why a single file failed, tagged with the pipeline stage that failed.
///
/// Carries the rendered cause rather than the `AudioError` itself so it can be
/// cloned into progress events and the batch outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("resample error: {0}")]
    Resample(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl FailureKind {
    pub fn stage(&self) -> &'static str {
        match self {
            FailureKind::Decode(_) => "decode",
            FailureKind::Resample(_) => "resample",
            FailureKind::Encode(_) => "encode",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FailureKind::Decode(m) | FailureKind::Resample(m) | FailureKind::Encode(m) => m,
        }
    }
}

// Re-exports for convenience
pub use audio::buffer::AudioBuffer;
pub use audio::codec::{CodecAdapter, OutputFormat, SampleDepth, SymphoniaCodec};
pub use audio::resampler::{ResampleQuality, Resampler};
pub use batch::job::{BatchJob, BatchOutcome, CancellationToken, JobHandle, JobState};
pub use batch::progress::{
    ChannelSink, ConsoleSink, LogSink, ProgressEvent, ProgressMessage, ProgressOutcome,
    ProgressSink,
};
pub use batch::spec::{ConversionJobSpec, ConversionMode, FileTask};
pub use utils::file_ops::FileEnumerator;
pub use utils::naming::derive_output_name;
