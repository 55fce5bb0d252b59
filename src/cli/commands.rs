use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::audio::codec::SampleDepth;
use crate::audio::resampler::ResampleQuality;
use crate::batch::spec::{parse_target_rate, ConversionJobSpec, ConversionMode};
use crate::Result;

#[derive(Parser)]
#[command(name = "ez-decimator")]
#[command(version)]
#[command(
    about = "Batch resampler and WAV/FLAC converter for folders of audio files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub options: GlobalOptions,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Extensions to pick up, comma separated (default depends on the command)
    #[arg(long = "ext", global = true, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Output PCM bit depth (16 or 24)
    #[arg(long, global = true, default_value_t = 16)]
    pub bits: u16,

    /// Worker threads for resampling (default: all logical CPUs)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Write a CSV report of the run to this path
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resample every audio file in a folder to a new sample rate
    Resample {
        /// Folder containing the source files
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Existing folder to write resampled files to
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Target sample rate in Hz
        #[arg(short = 'r', long = "rate")]
        rate: String,

        /// Append the rate to output names, e.g. take_44100Hz.wav
        #[arg(short = 't', long = "tag-rate")]
        tag_rate: bool,

        /// Resampling filter quality
        #[arg(short = 'q', long, value_enum, default_value_t = ResampleQuality::High)]
        quality: ResampleQuality,
    },

    /// Compress WAV/AIFF files to FLAC
    Flac {
        /// Folder containing the source files
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Existing folder to write FLAC files to (default: the input folder)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Convert audio files to WAV
    Wav {
        /// Folder containing the source files
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Existing folder to write WAV files to
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
}

impl Commands {
    /// Builds the job spec. A rate that is not a positive integer fails here,
    /// before anything is enumerated.
    pub fn job_spec(&self, extensions: Option<&[String]>) -> Result<ConversionJobSpec> {
        let spec = match self {
            Commands::Resample { input, output, rate, tag_rate, .. } => {
                let mode = ConversionMode::Resample {
                    target_rate: parse_target_rate(rate)?,
                    tag_filename: *tag_rate,
                };
                ConversionJobSpec::new(input, output, mode)
            }
            Commands::Flac { input, output } => {
                let output = output.as_ref().unwrap_or(input);
                ConversionJobSpec::new(input, output, ConversionMode::ToFlac)
            }
            Commands::Wav { input, output } => {
                ConversionJobSpec::new(input, output, ConversionMode::ToWav)
            }
        };
        Ok(match extensions {
            Some(list) => spec.with_extensions(list),
            None => spec,
        })
    }

    pub fn quality(&self) -> ResampleQuality {
        match self {
            Commands::Resample { quality, .. } => *quality,
            _ => ResampleQuality::default(),
        }
    }
}

impl GlobalOptions {
    pub fn depth(&self) -> Result<SampleDepth> {
        SampleDepth::from_bits(self.bits)
    }
}
