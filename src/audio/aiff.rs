//! Minimal AIFF writer: big-endian integer PCM in FORM/COMM/SSND chunks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::audio::buffer::AudioBuffer;
use crate::audio::codec::SampleDepth;
use crate::{AudioError, Result};

pub fn write(buffer: &AudioBuffer, depth: SampleDepth, path: &Path) -> Result<()> {
    let bytes_per_sample = depth.bits() as usize / 8;
    let data_len = buffer.samples().len() * bytes_per_sample;
    let pad = data_len % 2;
    let frames = u32::try_from(buffer.frames())
        .map_err(|_| AudioError::UnsupportedFormat("too many frames for AIFF".into()))?;
    let ssnd_len = u32::try_from(8 + data_len)
        .map_err(|_| AudioError::UnsupportedFormat("audio data too large for AIFF".into()))?;
    // "AIFF" + COMM chunk (8 + 18) + SSND chunk header (8) + body.
    let form_len = 4 + 26 + 8 + ssnd_len + pad as u32;

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(b"FORM")?;
    out.write_all(&form_len.to_be_bytes())?;
    out.write_all(b"AIFF")?;

    out.write_all(b"COMM")?;
    out.write_all(&18u32.to_be_bytes())?;
    out.write_all(&buffer.channel_count().to_be_bytes())?;
    out.write_all(&frames.to_be_bytes())?;
    out.write_all(&depth.bits().to_be_bytes())?;
    out.write_all(&extended_sample_rate(buffer.sample_rate()))?;

    out.write_all(b"SSND")?;
    out.write_all(&ssnd_len.to_be_bytes())?;
    out.write_all(&0u32.to_be_bytes())?; // offset
    out.write_all(&0u32.to_be_bytes())?; // block size
    for &sample in buffer.samples() {
        let code = depth.quantize(sample).to_be_bytes();
        out.write_all(&code[4 - bytes_per_sample..])?;
    }
    if pad == 1 {
        out.write_all(&[0])?;
    }
    out.flush()?;
    Ok(())
}

/// IEEE 754 80-bit extended encoding of a positive integer rate.
fn extended_sample_rate(rate: u32) -> [u8; 10] {
    let mut bytes = [0u8; 10];
    if rate == 0 {
        return bytes;
    }
    let value = rate as u64;
    let shift = value.leading_zeros();
    let exponent = 16383 + 63 - shift as u16;
    bytes[..2].copy_from_slice(&exponent.to_be_bytes());
    bytes[2..].copy_from_slice(&(value << shift).to_be_bytes());
    bytes
}
