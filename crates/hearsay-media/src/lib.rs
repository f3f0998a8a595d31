//! Audio handling — waveform model, WAV I/O, transcoding, noise reduction.

pub mod denoise;
pub mod transcode;
pub mod wav;

pub use transcode::{AudioConverter, FfmpegTranscoder};
pub use wav::Waveform;
