use crate::{AudioError, Result};

/// Decoded audio held in memory as channel-interleaved `f32` samples.
///
/// `samples.len()` is always a multiple of `channel_count`, and both the
/// channel count and the sample rate are non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channel_count: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Result<Self> {
        if channel_count == 0 {
            return Err(AudioError::UnsupportedFormat("channel count must be positive".into()));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidRate("sample rate must be positive".into()));
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channel_count
            )));
        }
        Ok(Self { samples, channel_count, sample_rate })
    }

    /// Builds a buffer from one `Vec` per channel. All channels must have the same length.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let channel_count = u16::try_from(channels.len())
            .map_err(|_| AudioError::UnsupportedFormat(format!("{} channels", channels.len())))?;
        let frames = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::UnsupportedFormat("channels differ in length".into()));
        }

        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            for channel in &channels {
                samples.push(channel[frame]);
            }
        }
        Self::new(samples, channel_count, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channel_count as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channel_count as usize)
            .copied()
    }

    pub fn to_planar(&self) -> Vec<Vec<f32>> {
        (0..self.channel_count as usize)
            .map(|c| self.channel(c).collect())
            .collect()
    }
}
