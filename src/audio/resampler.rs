//! Band-limited sample rate conversion.
//!
//! Each output sample is a windowed-sinc interpolation of the input at the
//! output instant. The sinc cutoff sits just below the lower of the two
//! Nyquist frequencies, so downsampling low-passes before decimating and
//! upsampling interpolates without imaging. Kernels are precomputed per
//! polyphase phase from the reduced `target / source` ratio.

use crate::audio::buffer::AudioBuffer;
use crate::{AudioError, Result};
use log::debug;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Upper bound on precomputed phases. Ratios that reduce to more phases
/// than this snap the output instant to the nearest of `MAX_PHASES`.
const MAX_PHASES: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResampleQuality {
    Fast,
    Balanced,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy)]
struct KernelParams {
    zero_crossings: usize,
    kaiser_beta: f64,
    rolloff: f64,
}

impl ResampleQuality {
    fn params(self) -> KernelParams {
        match self {
            ResampleQuality::Fast => KernelParams {
                zero_crossings: 8,
                kaiser_beta: 6.0,
                rolloff: 0.90,
            },
            ResampleQuality::Balanced => KernelParams {
                zero_crossings: 16,
                kaiser_beta: 8.0,
                rolloff: 0.92,
            },
            ResampleQuality::High => KernelParams {
                zero_crossings: 32,
                kaiser_beta: 10.0,
                rolloff: 0.945,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Resampler {
    quality: ResampleQuality,
}

impl Resampler {
    pub fn new(quality: ResampleQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> ResampleQuality {
        self.quality
    }

    /// Converts `buffer` to `target_rate`.
    ///
    /// The result keeps the channel count and holds
    /// `round(frames * target_rate / source_rate)` frames per channel.
    /// When the rates already match the buffer is returned untouched.
    pub fn resample(&self, buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
        if target_rate == 0 {
            return Err(AudioError::InvalidRate("target rate must be positive".into()));
        }
        let source_rate = buffer.sample_rate();
        if source_rate == target_rate {
            return Ok(buffer);
        }

        let ratio = Ratio::new(source_rate, target_rate);
        let out_frames = ratio.output_frames(buffer.frames());
        let bank = FilterBank::design(ratio, self.quality.params());
        debug!(
            "Resampling {} -> {} Hz ({} phases, {} taps, {} -> {} frames)",
            source_rate,
            target_rate,
            bank.phases,
            bank.taps,
            buffer.frames(),
            out_frames
        );

        let channels: Vec<Vec<f32>> = buffer
            .to_planar()
            .par_iter()
            .map(|channel| bank.apply(channel, out_frames))
            .collect();

        AudioBuffer::from_planar(channels, target_rate)
    }
}

/// `target / source` reduced to lowest terms: `up` output samples per `down` input samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ratio {
    up: u64,
    down: u64,
}

impl Ratio {
    fn new(source_rate: u32, target_rate: u32) -> Self {
        let g = gcd(source_rate as u64, target_rate as u64);
        Self { up: target_rate as u64 / g, down: source_rate as u64 / g }
    }

    /// Rounds half up, in integers so large inputs stay exact.
    fn output_frames(self, frames: usize) -> usize {
        let (up, down) = (self.up as u128, self.down as u128);
        ((2 * frames as u128 * up + down) / (2 * down)) as usize
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

struct FilterBank {
    ratio: Ratio,
    phases: usize,
    /// Zero-crossing span on each side of the output instant, in input samples.
    half: usize,
    taps: usize,
    /// `phases * taps` coefficients, phase-major.
    coefficients: Vec<f32>,
}

impl FilterBank {
    fn design(ratio: Ratio, params: KernelParams) -> Self {
        // Cutoff as a fraction of the input Nyquist.
        let cutoff = params.rolloff * (ratio.up as f64 / ratio.down as f64).min(1.0);
        let width = params.zero_crossings as f64 / cutoff;
        let half = width.ceil() as usize;
        let taps = 2 * half;
        let phases = ratio.up.min(MAX_PHASES) as usize;
        let i0_beta = bessel_i0(params.kaiser_beta);

        let mut coefficients = Vec::with_capacity(phases * taps);
        for phase in 0..phases {
            let frac = phase as f64 / phases as f64;
            let start = coefficients.len();
            // Tap j sits at input index i + 1 - half + j, so its distance
            // from the output instant i + frac is frac + half - 1 - j.
            for j in 0..taps {
                let x = frac + half as f64 - 1.0 - j as f64;
                coefficients.push(kernel(x, cutoff, width, params.kaiser_beta, i0_beta));
            }
            let sum: f64 = coefficients[start..].iter().sum();
            for c in &mut coefficients[start..] {
                *c /= sum;
            }
        }

        Self {
            ratio,
            phases,
            half,
            taps,
            coefficients: coefficients.into_iter().map(|c| c as f32).collect(),
        }
    }

    fn apply(&self, input: &[f32], out_frames: usize) -> Vec<f32> {
        // Zero padding on both sides keeps every tap window in bounds.
        let mut padded = vec![0.0f64; input.len() + 2 * self.half + 2];
        for (slot, &x) in padded[self.half..].iter_mut().zip(input) {
            *slot = x as f64;
        }

        let mut output = Vec::with_capacity(out_frames);
        for n in 0..out_frames as u64 {
            let position = n * self.ratio.down;
            let mut index = (position / self.ratio.up) as usize;
            let remainder = position % self.ratio.up;
            let mut phase = if self.phases as u64 == self.ratio.up {
                remainder as usize
            } else {
                ((remainder * self.phases as u64 + self.ratio.up / 2) / self.ratio.up) as usize
            };
            if phase == self.phases {
                phase = 0;
                index += 1;
            }

            // Padded offset of input index `index + 1 - half` is `index + 1`.
            let window = &padded[index + 1..index + 1 + self.taps];
            let kernel = &self.coefficients[phase * self.taps..(phase + 1) * self.taps];
            let acc: f64 = window.iter().zip(kernel).map(|(&x, &h)| x * h as f64).sum();
            output.push(acc as f32);
        }
        output
    }
}

/// Kaiser-windowed sinc with cutoff `cutoff` (fraction of input Nyquist), zero outside `width`.
fn kernel(x: f64, cutoff: f64, width: f64, beta: f64, i0_beta: f64) -> f64 {
    if x.abs() >= width {
        return 0.0;
    }
    let r = x / width;
    let window = bessel_i0(beta * (1.0 - r * r).sqrt()) / i0_beta;
    cutoff * sinc(cutoff * x) * window
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Zeroth-order modified Bessel function of the first kind, by power series.
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    while term > sum * 1e-12 {
        term *= (half / k) * (half / k);
        sum += term;
        k += 1.0;
    }
    sum
}
