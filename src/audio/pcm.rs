//! Signed 16-bit little-endian PCM → normalised `f32` audio.
//!
//! The speech provider returns raw PCM with no container header.
//! [`decode_pcm16`] splits the interleaved samples into one `Vec<f32>` per
//! channel and scales them by `1 / 32768`, so `i16::MIN` maps to exactly
//! `-1.0` and `i16::MAX` to `0.99997`.
//!
//! # Example
//!
//! ```rust
//! use reading_aid::audio::decode_pcm16;
//!
//! // Two mono frames: 0x4000 (16384) and 0xC000 (-16384)
//! let audio = decode_pcm16(&[0x00, 0x40, 0x00, 0xC0], 24_000, 1).unwrap();
//! assert_eq!(audio.frame_count(), 2);
//! assert_eq!(audio.channel(0), &[0.5, -0.5]);
//! ```

use std::time::Duration;

use thiserror::Error;

/// Divisor that maps the `i16` range onto `[-1.0, 1.0)`.
const I16_SCALE: f32 = 32_768.0;

// ---------------------------------------------------------------------------
// MalformedAudio
// ---------------------------------------------------------------------------

/// Structural problems that make a PCM buffer undecodable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedAudio {
    /// The byte count cannot be split into whole 16-bit samples.
    #[error("PCM payload has odd length {len}; expected whole 16-bit samples")]
    OddByteLength { len: usize },

    /// A channel count of zero was requested.
    #[error("PCM channel count must be at least 1")]
    ZeroChannels,

    /// A sample rate of zero was requested.
    #[error("PCM sample rate must be positive")]
    ZeroSampleRate,
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// A decoded, immutable audio buffer, one sample vector per channel.
///
/// Every channel holds exactly [`frame_count`](Self::frame_count) samples in
/// `[-1.0, 1.0]`.  The struct has no mutating methods; share it behind an
/// `Arc` rather than cloning the sample data.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    channel_data: Vec<Vec<f32>>,
    sample_rate: u32,
    frame_count: usize,
}

impl DecodedAudio {
    /// A buffer of `frame_count` zero samples on each of `channels` channels.
    ///
    /// # Errors
    ///
    /// The same format errors as [`decode_pcm16`]: zero channels or a zero
    /// sample rate.
    pub fn silence(
        frame_count: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, MalformedAudio> {
        validate_format(sample_rate, channels)?;
        Ok(Self {
            channel_data: vec![vec![0.0; frame_count]; channels as usize],
            sample_rate,
            frame_count,
        })
    }

    /// All channels, in device order.
    pub fn channel_data(&self) -> &[Vec<f32>] {
        &self.channel_data
    }

    /// Samples of channel `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.channels()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channel_data[index]
    }

    pub fn channels(&self) -> u16 {
        self.channel_data.len() as u16
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// `true` when the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Playback length at the buffer's own sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / self.sample_rate as f64)
    }

    /// Average all channels into one mono signal.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channel_data.len() {
            0 => Vec::new(),
            1 => self.channel_data[0].clone(),
            n => (0..self.frame_count)
                .map(|i| self.channel_data.iter().map(|ch| ch[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// decode_pcm16
// ---------------------------------------------------------------------------

/// Decode interleaved signed 16-bit little-endian PCM.
///
/// * `frame_count = (bytes.len() / 2) / channels`; samples belonging to a
///   trailing partial frame are dropped without error.
/// * Each sample is divided by `32768.0`.
///
/// # Errors
///
/// * [`MalformedAudio::OddByteLength`] when `bytes.len()` is odd.
/// * [`MalformedAudio::ZeroChannels`] / [`MalformedAudio::ZeroSampleRate`]
///   for degenerate format parameters.
pub fn decode_pcm16(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<DecodedAudio, MalformedAudio> {
    if bytes.len() % 2 != 0 {
        return Err(MalformedAudio::OddByteLength { len: bytes.len() });
    }
    validate_format(sample_rate, channels)?;

    let channels = channels as usize;
    let sample_count = bytes.len() / 2;
    let frame_count = sample_count / channels;

    if sample_count % channels != 0 {
        log::debug!(
            "pcm: dropping {} trailing sample(s) of a partial frame",
            sample_count % channels
        );
    }

    let mut channel_data: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(frame_count))
        .collect();

    for frame in bytes.chunks_exact(2 * channels).take(frame_count) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channel_data[ch].push(value as f32 / I16_SCALE);
        }
    }

    Ok(DecodedAudio {
        channel_data,
        sample_rate,
        frame_count,
    })
}

fn validate_format(sample_rate: u32, channels: u16) -> Result<(), MalformedAudio> {
    if channels == 0 {
        return Err(MalformedAudio::ZeroChannels);
    }
    if sample_rate == 0 {
        return Err(MalformedAudio::ZeroSampleRate);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    // ---- Frame accounting --------------------------------------------------

    #[test]
    fn one_second_of_silence_at_24k() {
        let audio = decode_pcm16(&vec![0u8; 48_000], 24_000, 1).unwrap();

        assert_eq!(audio.frame_count(), 24_000);
        assert_eq!(audio.sample_rate(), 24_000);
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.channel(0).len(), 24_000);
        assert!(audio.channel(0).iter().all(|s| s.abs() < 1e-9));
        assert_eq!(audio.duration(), Duration::from_secs(1));
    }

    #[test]
    fn stereo_is_deinterleaved() {
        let bytes = pcm(&[100, -100, 200, -200, 300, -300]);
        let audio = decode_pcm16(&bytes, 24_000, 2).unwrap();

        assert_eq!(audio.frame_count(), 3);
        assert_eq!(audio.channel(0), &[100.0 / 32768.0, 200.0 / 32768.0, 300.0 / 32768.0]);
        assert_eq!(audio.channel(1), &[-100.0 / 32768.0, -200.0 / 32768.0, -300.0 / 32768.0]);
    }

    #[test]
    fn frame_count_matches_bytes_over_channels() {
        for channels in 1..=4u16 {
            let bytes = vec![0u8; 2 * 12 * channels as usize];
            let audio = decode_pcm16(&bytes, 24_000, channels).unwrap();
            assert_eq!(audio.frame_count(), bytes.len() / 2 / channels as usize);
            for ch in audio.channel_data() {
                assert_eq!(ch.len(), audio.frame_count());
            }
        }
    }

    #[test]
    fn partial_trailing_frame_is_truncated() {
        // 5 samples, 2 channels → 2 whole frames, last sample dropped
        let bytes = pcm(&[1, 2, 3, 4, 5]);
        let audio = decode_pcm16(&bytes, 24_000, 2).unwrap();
        assert_eq!(audio.frame_count(), 2);
        assert_eq!(audio.channel(0).len(), 2);
        assert_eq!(audio.channel(1).len(), 2);
    }

    #[test]
    fn empty_input_is_zero_frames() {
        let audio = decode_pcm16(&[], 24_000, 1).unwrap();
        assert!(audio.is_empty());
        assert_eq!(audio.channel(0).len(), 0);
    }

    // ---- Normalisation -----------------------------------------------------

    #[test]
    fn extremes_are_normalised() {
        let audio = decode_pcm16(&pcm(&[i16::MIN, i16::MAX, 0]), 24_000, 1).unwrap();
        let ch = audio.channel(0);
        assert_eq!(ch[0], -1.0);
        assert!((ch[1] - 0.999_969_5).abs() < 1e-6);
        assert_eq!(ch[2], 0.0);
    }

    #[test]
    fn every_sample_is_in_range() {
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        let audio = decode_pcm16(&pcm(&samples), 24_000, 1).unwrap();
        assert!(audio.channel(0).iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    // ---- Failures ----------------------------------------------------------

    #[test]
    fn odd_length_is_malformed() {
        for len in [1usize, 3, 47_999] {
            let err = decode_pcm16(&vec![0u8; len], 24_000, 1).unwrap_err();
            assert_eq!(err, MalformedAudio::OddByteLength { len });
        }
    }

    #[test]
    fn zero_channels_rejected() {
        assert_eq!(
            decode_pcm16(&[0, 0], 24_000, 0).unwrap_err(),
            MalformedAudio::ZeroChannels
        );
    }

    #[test]
    fn zero_sample_rate_rejected() {
        assert_eq!(
            decode_pcm16(&[0, 0], 0, 1).unwrap_err(),
            MalformedAudio::ZeroSampleRate
        );
    }

    // ---- Helpers -----------------------------------------------------------

    #[test]
    fn to_mono_averages_channels() {
        let audio = decode_pcm16(&pcm(&[16_384, -16_384, 16_384, 16_384]), 24_000, 2).unwrap();
        assert_eq!(audio.to_mono(), vec![0.0, 0.5]);
    }

    #[test]
    fn silence_constructor_shape() {
        let audio = DecodedAudio::silence(10, 24_000, 2).unwrap();
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frame_count(), 10);
        assert!(audio.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn silence_rejects_degenerate_format() {
        assert_eq!(
            DecodedAudio::silence(10, 0, 1).unwrap_err(),
            MalformedAudio::ZeroSampleRate
        );
        assert_eq!(
            DecodedAudio::silence(10, 24_000, 0).unwrap_err(),
            MalformedAudio::ZeroChannels
        );
    }

    #[test]
    fn silence_duration() {
        let audio = DecodedAudio::silence(12_000, 24_000, 1).unwrap();
        assert_eq!(audio.duration(), Duration::from_millis(500));
    }
}
