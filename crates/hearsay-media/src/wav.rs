//! Waveform model and WAV container I/O.

use std::path::Path;

use hearsay_core::error::{HearsayError, Result};

/// Uncompressed audio held in memory as interleaved f32 samples in [-1, 1].
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Average interleaved channels down to mono. A mono input is cloned.
    pub fn to_mono(&self) -> Waveform {
        if self.channels <= 1 {
            return self.clone();
        }
        let ch = self.channels as usize;
        let mono: Vec<f32> = self
            .samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Waveform::new(mono, self.sample_rate, 1)
    }
}

/// Read a WAV file into a [`Waveform`].
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| HearsayError::Validation(format!("cannot read WAV {}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| HearsayError::Validation(format!("bad WAV samples: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| HearsayError::Validation(format!("bad WAV samples: {e}")))?
        }
    };

    Ok(Waveform::new(samples, spec.sample_rate, spec.channels))
}

/// Write a [`Waveform`] as 16-bit PCM WAV.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: waveform.channels,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| HearsayError::Validation(format!("cannot write WAV {}: {e}", path.display())))?;
    for &sample in &waveform.samples {
        let clamped = (sample * 32768.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| HearsayError::Validation(format!("WAV write failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| HearsayError::Validation(format!("WAV finalize failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..1600)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let original = Waveform::new(samples, 16_000, 1);
        write_wav(&path, &original).unwrap();

        let back = read_wav(&path).unwrap();
        assert_eq!(back.sample_rate, 16_000);
        assert_eq!(back.channels, 1);
        assert_eq!(back.samples.len(), original.samples.len());
        for (a, b) in original.samples.iter().zip(back.samples.iter()) {
            assert!((a - b).abs() < 1.0 / 16384.0, "{a} vs {b}");
        }
    }

    #[test]
    fn test_to_mono_averages_channels() {
        // L = 0.5, R = -0.5 everywhere: mono should be 0
        let interleaved: Vec<f32> = (0..100)
            .flat_map(|_| [0.5f32, -0.5f32])
            .collect();
        let stereo = Waveform::new(interleaved, 16_000, 2);
        let mono = stereo.to_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples.len(), 100);
        assert!(mono.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_to_mono_on_mono_is_identity() {
        let mono = Waveform::new(vec![0.1, 0.2, 0.3], 16_000, 1);
        let out = mono.to_mono();
        assert_eq!(out.samples, mono.samples);
    }

    #[test]
    fn test_duration() {
        let wave = Waveform::new(vec![0.0; 32_000], 16_000, 2);
        assert!((wave.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_missing_file_is_validation_error() {
        let err = read_wav(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
