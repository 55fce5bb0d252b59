use std::collections::BTreeSet;
use std::path::{Path, PathBuf};


use crate::audio::codec::OutputFormat;
use crate::utils::file_ops::{same_location, FileEnumerator};
use crate::utils::naming::derive_output_name;
use crate::{AudioError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    Resample { target_rate: u32, tag_filename: bool },
    ToFlac,
    ToWav,
}

impl ConversionMode {
    /// Extensions picked up when the caller gives no explicit list. FLAC
    /// sources are left out of FLAC compression.
    pub fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            ConversionMode::ToFlac => &["wav", "aif"],
            ConversionMode::Resample { .. } | ConversionMode::ToWav => &["wav", "aif", "flac"],
        }
    }

    /// Container written for a given source. Resampling keeps the source's own container.
    pub fn output_format(&self, source: &Path) -> Result<OutputFormat> {
        match self {
            ConversionMode::ToFlac => Ok(OutputFormat::Flac),
            ConversionMode::ToWav => Ok(OutputFormat::Wav),
            ConversionMode::Resample { .. } => OutputFormat::from_path(source).ok_or_else(|| {
                AudioError::UnsupportedFormat(format!("no encoder for {}", source.display()))
            }),
        }
    }

    pub fn target_rate(&self) -> Option<u32> {
        match self {
            ConversionMode::Resample { target_rate, .. } => Some(*target_rate),
            _ => None,
        }
    }
}

/// Parses a user-supplied rate. Anything but a positive integer is rejected.
pub fn parse_target_rate(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let rate: i64 = trimmed
        .parse()
        .map_err(|_| AudioError::InvalidRate(format!("'{trimmed}' is not an integer")))?;
    if rate <= 0 {
        return Err(AudioError::InvalidRate(format!("{rate} Hz is not positive")));
    }
    u32::try_from(rate).map_err(|_| AudioError::InvalidRate(format!("{rate} Hz is out of range")))
}

/// Everything one batch run needs. Built once and not changed during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJobSpec {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: ConversionMode,
    pub extension_allowlist: BTreeSet<String>,
}

impl ConversionJobSpec {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        mode: ConversionMode,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            extension_allowlist: normalize_extensions(mode.default_extensions().iter().copied()),
            mode,
        }
    }

    /// Replaces the allow-list. Entries are lower-cased and stripped of a leading dot.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extension_allowlist = normalize_extensions(extensions);
        self
    }

    /// Directory-level checks that must pass before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(AudioError::NotFound(self.input_dir.clone()));
        }
        if !self.output_dir.is_dir() {
            return Err(AudioError::NotFound(self.output_dir.clone()));
        }
        if self.extension_allowlist.is_empty() {
            return Err(AudioError::InvalidConfig("extension allow-list is empty".into()));
        }
        if let ConversionMode::Resample { target_rate, tag_filename } = self.mode {
            if target_rate == 0 {
                return Err(AudioError::InvalidRate("target rate must be positive".into()));
            }
            if !tag_filename && same_location(&self.input_dir, &self.output_dir) {
                return Err(AudioError::InvalidConfig(
                    "resampling into the input directory without rate tagging \
                     would overwrite the sources"
                        .into(),
                ));
            }
        }
        Ok(())
    }

    /// Enumerates the input directory and pairs every match with its output path.
    pub fn tasks(&self) -> Result<Vec<FileTask>> {
        let sources = FileEnumerator::enumerate(&self.input_dir, &self.extension_allowlist)?;
        Ok(sources
            .into_iter()
            .enumerate()
            .map(|(i, source_path)| {
                let name = source_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let derived_output_path =
                    self.output_dir.join(derive_output_name(&name, &self.mode));
                FileTask { index: i + 1, source_path, derived_output_path }
            })
            .collect())
    }
}

fn normalize_extensions<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// One file to convert. `index` is its 1-based position in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub index: usize,
    pub source_path: PathBuf,
    pub derived_output_path: PathBuf,
}

impl FileTask {
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
