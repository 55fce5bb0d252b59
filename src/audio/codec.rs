use std::fs;
use std::path::Path;

use flacenc::component::BitRepr;
use flacenc::error::Verify;
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::aiff;
use crate::audio::buffer::AudioBuffer;
use crate::utils::file_ops::write_atomically;
use crate::{AudioError, Result};

const FLAC_MAX_CHANNELS: u16 = 8;
const FLAC_MAX_SAMPLE_RATE: u32 = 655_350;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Wav,
    Flac,
    Aiff,
}

impl OutputFormat {
    /// Container matching a file extension, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "wav" => Some(OutputFormat::Wav),
            "flac" => Some(OutputFormat::Flac),
            "aif" | "aiff" => Some(OutputFormat::Aiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "WAV",
            OutputFormat::Flac => "FLAC",
            OutputFormat::Aiff => "AIFF",
        }
    }
}

/// Integer PCM depth written by the encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleDepth {
    #[default]
    Sixteen,
    TwentyFour,
}

impl SampleDepth {
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleDepth::Sixteen),
            24 => Ok(SampleDepth::TwentyFour),
            other => Err(AudioError::InvalidConfig(format!(
                "unsupported bit depth {other}, expected 16 or 24"
            ))),
        }
    }

    pub fn bits(&self) -> u16 {
        match self {
            SampleDepth::Sixteen => 16,
            SampleDepth::TwentyFour => 24,
        }
    }

    fn full_scale(&self) -> f32 {
        match self {
            SampleDepth::Sixteen => i16::MAX as f32,
            SampleDepth::TwentyFour => 8_388_607.0,
        }
    }

    /// Clamps to [-1, 1] and rounds to the nearest integer code.
    pub fn quantize(&self, sample: f32) -> i32 {
        (sample.clamp(-1.0, 1.0) * self.full_scale()).round() as i32
    }
}

/// Boundary to the codec library: file to PCM and PCM to file.
pub trait CodecAdapter: Send + Sync {
    /// Decodes at the file's native sample rate. Never resamples.
    fn decode(&self, path: &Path) -> Result<AudioBuffer>;

    /// Writes `buffer` at `buffer.sample_rate()` in `format`.
    fn encode(&self, buffer: AudioBuffer, path: &Path, format: OutputFormat) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaCodec {
    depth: SampleDepth,
}

impl SymphoniaCodec {
    pub fn new(depth: SampleDepth) -> Self {
        Self { depth }
    }

    pub fn depth(&self) -> SampleDepth {
        self.depth
    }

    fn encode_wav(&self, buffer: &AudioBuffer, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: buffer.channel_count(),
            sample_rate: buffer.sample_rate(),
            bits_per_sample: self.depth.bits(),
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).map_err(hound_error)?;
        for &sample in buffer.samples() {
            let code = self.depth.quantize(sample);
            match self.depth {
                SampleDepth::Sixteen => writer.write_sample(code as i16),
                SampleDepth::TwentyFour => writer.write_sample(code),
            }
            .map_err(hound_error)?;
        }
        writer.finalize().map_err(hound_error)
    }

    fn encode_flac(&self, buffer: &AudioBuffer, path: &Path) -> Result<()> {
        if buffer.channel_count() > FLAC_MAX_CHANNELS {
            return Err(AudioError::UnsupportedFormat(format!(
                "FLAC supports at most {} channels, got {}",
                FLAC_MAX_CHANNELS,
                buffer.channel_count()
            )));
        }
        if buffer.sample_rate() > FLAC_MAX_SAMPLE_RATE {
            return Err(AudioError::UnsupportedFormat(format!(
                "FLAC cannot store a sample rate of {} Hz",
                buffer.sample_rate()
            )));
        }

        let codes: Vec<i32> = buffer.samples().iter().map(|&s| self.depth.quantize(s)).collect();
        let config = flacenc::config::Encoder::default()
            .into_verified()
            .map_err(|(_, e)| {
                AudioError::UnsupportedFormat(format!("FLAC encoder config: {e:?}"))
            })?;
        let source = flacenc::source::MemSource::from_samples(
            &codes,
            buffer.channel_count() as usize,
            self.depth.bits() as usize,
            buffer.sample_rate() as usize,
        );
        let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
            .map_err(|e| AudioError::UnsupportedFormat(format!("FLAC encoding failed: {e:?}")))?;

        let mut sink = flacenc::bitsink::ByteSink::new();
        stream
            .write(&mut sink)
            .map_err(|_| {
                AudioError::UnsupportedFormat("FLAC stream could not be serialized".into())
            })?;
        fs::write(path, sink.as_slice())?;
        Ok(())
    }
}

impl CodecAdapter for SymphoniaCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer> {
        let file = fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(symphonia_error)?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!("no audio track in {}", path.display()))
            })?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channel_count = track.codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(symphonia_error)?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(symphonia_error(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channel_count.get_or_insert(spec.channels.count());
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                }
                Err(e) => return Err(symphonia_error(e)),
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| {
            AudioError::UnsupportedFormat(format!("unknown sample rate in {}", path.display()))
        })?;
        let channel_count = channel_count
            .and_then(|c| u16::try_from(c).ok())
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!(
                    "unknown channel layout in {}",
                    path.display()
                ))
            })?;

        let mut sanitized = 0usize;
        for sample in samples.iter_mut().filter(|s| !s.is_finite()) {
            *sample = 0.0;
            sanitized += 1;
        }
        if sanitized > 0 {
            warn!("Replaced {} non-finite samples in {}", sanitized, path.display());
        }

        let buffer = AudioBuffer::new(samples, channel_count, sample_rate)?;
        debug!(
            "Decoded {} ({} Hz, {} channels, {:.2}s)",
            path.display(),
            buffer.sample_rate(),
            buffer.channel_count(),
            buffer.duration_secs()
        );
        Ok(buffer)
    }

    fn encode(&self, buffer: AudioBuffer, path: &Path, format: OutputFormat) -> Result<()> {
        debug!(
            "Encoding {} as {} ({} Hz, {} channels, {}-bit)",
            path.display(),
            format.as_str(),
            buffer.sample_rate(),
            buffer.channel_count(),
            self.depth.bits()
        );
        write_atomically(path, |tmp| match format {
            OutputFormat::Wav => self.encode_wav(&buffer, tmp),
            OutputFormat::Flac => self.encode_flac(&buffer, tmp),
            OutputFormat::Aiff => aiff::write(&buffer, self.depth, tmp),
        })
    }
}

fn symphonia_error(err: SymphoniaError) -> AudioError {
    match err {
        SymphoniaError::IoError(e) => AudioError::Io(e),
        other => AudioError::UnsupportedFormat(other.to_string()),
    }
}

fn hound_error(err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(e) => AudioError::Io(e),
        other => AudioError::UnsupportedFormat(other.to_string()),
    }
}
