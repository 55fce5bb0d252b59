use std::path::Path;

use crate::batch::spec::ConversionMode;

/// Output file name for `input_name` under `mode`.
///
/// Resampling without rate tagging returns the input name unchanged; keeping
/// that from overwriting the source is up to the caller's choice of output
/// directory.
pub fn derive_output_name(input_name: &str, mode: &ConversionMode) -> String {
    let path = Path::new(input_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_name.to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    match mode {
        ConversionMode::Resample { target_rate, tag_filename: true } => {
            format!("{stem}_{target_rate}Hz{extension}")
        }
        ConversionMode::Resample { tag_filename: false, .. } => input_name.to_string(),
        ConversionMode::ToFlac => format!("{stem}.flac"),
        ConversionMode::ToWav => format!("{stem}.wav"),
    }
}
