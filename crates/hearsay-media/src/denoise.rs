//! Spectral-subtraction noise suppression.
//!
//! The leading second of the signal is treated as a noise-only profile; its
//! average magnitude spectrum is subtracted from every frame of the full
//! signal, and the result is rebuilt by overlap-add. Best effort: the
//! function cannot fail, and the pipeline treats it as optional polish.

use std::f32::consts::PI;

use crate::wav::Waveform;

/// Analysis frame length in samples (power of two).
const FRAME_SIZE: usize = 512;
/// Hop between frames; half-overlap keeps Hann windows summing to one.
const HOP_SIZE: usize = FRAME_SIZE / 2;
/// Fraction of the original magnitude kept as a spectral floor, which
/// avoids the musical-noise artifacts of subtracting to zero.
const NOISE_FLOOR: f32 = 0.05;

/// Suppress stationary background noise in `input`.
///
/// Stereo input is averaged to mono first. Inputs shorter than one analysis
/// frame pass through unchanged; inputs shorter than one second use whatever
/// samples exist as the noise profile. The output always has the same
/// number of samples as the (mono) input.
pub fn denoise(input: &Waveform) -> Waveform {
    let mono = input.to_mono();
    if mono.samples.len() < FRAME_SIZE {
        return mono;
    }

    let profile_len = (mono.sample_rate as usize)
        .max(FRAME_SIZE)
        .min(mono.samples.len());
    let noise_mag = average_noise_spectrum(&mono.samples[..profile_len]);
    let cleaned = spectral_subtraction(&mono.samples, &noise_mag);

    Waveform::new(cleaned, mono.sample_rate, 1)
}

fn hann(n: usize) -> f32 {
    0.5 * (1.0 - (2.0 * PI * n as f32 / FRAME_SIZE as f32).cos())
}

/// Average magnitude spectrum of the noise-only segment, one value per bin.
fn average_noise_spectrum(profile: &[f32]) -> Vec<f32> {
    let mut sum = vec![0.0f32; FRAME_SIZE];
    let mut frames = 0usize;

    let mut start = 0;
    while start + FRAME_SIZE <= profile.len() {
        let mut re = [0.0f32; FRAME_SIZE];
        let mut im = [0.0f32; FRAME_SIZE];
        for (n, slot) in re.iter_mut().enumerate() {
            *slot = profile[start + n] * hann(n);
        }
        fft(&mut re, &mut im, false);
        for bin in 0..FRAME_SIZE {
            sum[bin] += (re[bin] * re[bin] + im[bin] * im[bin]).sqrt();
        }
        frames += 1;
        start += FRAME_SIZE;
    }

    if frames > 0 {
        for value in &mut sum {
            *value /= frames as f32;
        }
    }
    sum
}

/// Subtract the noise magnitude from every frame of `samples`, preserving
/// phase, and rebuild the signal by overlap-add.
fn spectral_subtraction(samples: &[f32], noise_mag: &[f32]) -> Vec<f32> {
    let len = samples.len();
    let mut out = vec![0.0f32; len + FRAME_SIZE];
    let mut window_sum = vec![0.0f32; len + FRAME_SIZE];

    let mut start = 0;
    while start < len {
        let mut re = [0.0f32; FRAME_SIZE];
        let mut im = [0.0f32; FRAME_SIZE];
        let avail = (len - start).min(FRAME_SIZE);
        for n in 0..avail {
            re[n] = samples[start + n] * hann(n);
        }
        fft(&mut re, &mut im, false);

        for bin in 0..FRAME_SIZE {
            let mag = (re[bin] * re[bin] + im[bin] * im[bin]).sqrt();
            if mag > 0.0 {
                let cleaned = (mag - noise_mag[bin]).max(NOISE_FLOOR * mag);
                let scale = cleaned / mag;
                re[bin] *= scale;
                im[bin] *= scale;
            }
        }

        fft(&mut re, &mut im, true);
        for n in 0..FRAME_SIZE {
            out[start + n] += re[n];
            window_sum[start + n] += hann(n);
        }

        start += HOP_SIZE;
    }

    // Normalize by the accumulated window weight; the frame edges only see
    // a single window and would otherwise taper.
    out.truncate(len);
    for (n, value) in out.iter_mut().enumerate() {
        if window_sum[n] > 1e-6 {
            *value /= window_sum[n];
        }
    }
    out
}

/// In-place iterative radix-2 Cooley-Tukey FFT over split real/imaginary
/// buffers. `inverse` applies the conjugate transform and 1/N scaling.
fn fft(re: &mut [f32], im: &mut [f32], inverse: bool) {
    let n = re.len();
    debug_assert!(n.is_power_of_two());

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    let sign = if inverse { 1.0f32 } else { -1.0f32 };
    let mut len = 2usize;
    while len <= n {
        let angle = sign * 2.0 * PI / len as f32;
        let (step_re, step_im) = (angle.cos(), angle.sin());
        for block in (0..n).step_by(len) {
            let (mut w_re, mut w_im) = (1.0f32, 0.0f32);
            for k in 0..len / 2 {
                let a = block + k;
                let b = block + k + len / 2;
                let t_re = re[b] * w_re - im[b] * w_im;
                let t_im = re[b] * w_im + im[b] * w_re;
                re[b] = re[a] - t_re;
                im[b] = im[a] - t_im;
                re[a] += t_re;
                im[a] += t_im;
                let next_re = w_re * step_re - w_im * step_im;
                w_im = w_re * step_im + w_im * step_re;
                w_re = next_re;
            }
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as f32;
        for value in re.iter_mut() {
            *value *= scale;
        }
        for value in im.iter_mut() {
            *value *= scale;
        }
    }
}
