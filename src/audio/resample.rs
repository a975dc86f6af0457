//! Sample-rate conversion and channel layout for the output device.
//!
//! Synthesised speech is 24 kHz mono.  Most output devices accept that rate
//! directly, but some only run at 44.1 / 48 kHz and with two or more
//! channels.  The output layer prepares a voice once, before start, with:
//!
//! 1. [`resample`]: linear interpolation from the source to the device rate.
//! 2. [`mono_to_interleaved`]: copy the mono signal to every device channel.

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz using linear
/// interpolation.
///
/// * Equal rates return the input unchanged (no interpolation performed).
/// * Empty input, or a zero rate on either side, returns an empty vector.
///
/// The output length is `ceil(samples.len() * target_rate / source_rate)`.
///
/// # Example
///
/// ```rust
/// use reading_aid::audio::resample;
///
/// // 24 kHz → 48 kHz doubles the length
/// let out = resample(&vec![0.25_f32; 240], 24_000, 48_000);
/// assert_eq!(out.len(), 480);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// mono_to_interleaved
// ---------------------------------------------------------------------------

/// Duplicate a mono signal across `channels` interleaved channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use reading_aid::audio::mono_to_interleaved;
///
/// assert_eq!(mono_to_interleaved(&[0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
/// ```
pub fn mono_to_interleaved(mono: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => mono.to_vec(),
        n => mono
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(n as usize))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- resample ----------------------------------------------------------

    #[test]
    fn same_rate_is_noop() {
        let input: Vec<f32> = (0..240).map(|i| i as f32 / 240.0).collect();
        assert_eq!(resample(&input, 24_000, 24_000), input);
    }

    #[test]
    fn empty_input() {
        assert!(resample(&[], 24_000, 48_000).is_empty());
    }

    #[test]
    fn zero_rate_yields_empty() {
        assert!(resample(&[0.1, 0.2], 0, 48_000).is_empty());
        assert!(resample(&[0.1, 0.2], 24_000, 0).is_empty());
    }

    #[test]
    fn upsample_24k_to_48k_length() {
        let out = resample(&vec![0.0_f32; 24_000], 24_000, 48_000);
        assert_eq!(out.len(), 48_000);
    }

    #[test]
    fn upsample_24k_to_44100_length() {
        let out = resample(&vec![0.0_f32; 24_000], 24_000, 44_100);
        assert!(out.len().abs_diff(44_100) <= 1, "got {}", out.len());
    }

    #[test]
    fn constant_signal_preserves_amplitude() {
        let out = resample(&vec![0.5_f32; 240], 24_000, 48_000);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn interpolates_between_neighbours() {
        let out = resample(&[0.0, 1.0], 24_000, 48_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    // ---- mono_to_interleaved -----------------------------------------------

    #[test]
    fn mono_passthrough() {
        assert_eq!(mono_to_interleaved(&[0.3, -0.3], 1), vec![0.3, -0.3]);
    }

    #[test]
    fn zero_channels_is_empty() {
        assert!(mono_to_interleaved(&[0.3], 0).is_empty());
    }

    #[test]
    fn four_channel_layout() {
        let out = mono_to_interleaved(&[0.5, -0.5], 4);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5, -0.5]);
    }
}
