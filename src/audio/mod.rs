pub mod aiff;
pub mod buffer;
pub mod codec;
pub mod resampler;
