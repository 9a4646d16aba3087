//! PCM frame math: loudness metering and volume processing
//!
//! Audio travels as fixed-size frames of raw little-endian signed
//! 16-bit mono PCM at 16 kHz. These helpers are pure functions over
//! frame byte slices; the pipeline applies volume before playback and
//! feeds the post-volume frame to the meter.

/// Sample rate for call audio in Hz
pub const SAMPLE_RATE: u32 = 16000;

/// Number of audio channels (mono)
pub const CHANNELS: u16 = 1;

/// Samples per audio frame
pub const SAMPLES_PER_FRAME: usize = 1024;

/// Bytes per audio frame (16-bit samples)
pub const BYTES_PER_FRAME: usize = SAMPLES_PER_FRAME * 2;

/// RMS value treated as full intensity by the meter
///
/// Typical speech peaks well below full scale; this ceiling makes the
/// indicator reach its maximum at a loud-but-ordinary speaking level.
pub const METER_RMS_CEILING: f64 = 2000.0;

/// Indicator color at silence (neutral grey)
pub const METER_COLOR_IDLE: (u8, u8, u8) = (0xcc, 0xcc, 0xcc);

/// Compute RMS loudness of a PCM frame
///
/// `sqrt(mean(sample^2))` over every complete 16-bit sample in the
/// slice. An empty slice yields 0.0; a trailing odd byte is ignored.
pub fn rms(frame: &[u8]) -> f64 {
    let count = frame.len() / 2;
    if count == 0 {
        return 0.0;
    }

    let sum_squares: f64 = frame
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
            sample * sample
        })
        .sum();

    (sum_squares / count as f64).sqrt()
}

/// Map an RMS value to a meter level in 0.0..=1.0
///
/// Linear up to [`METER_RMS_CEILING`], clamped above it. Purely a
/// presentation signal; nothing in the engine branches on it.
pub fn meter_level(rms: f64) -> f32 {
    (rms / METER_RMS_CEILING).clamp(0.0, 1.0) as f32
}

/// Map a meter level to an indicator color
///
/// Interpolates from neutral grey at silence toward full green at
/// maximum level.
pub fn indicator_color(level: f32) -> (u8, u8, u8) {
    let ratio = level.clamp(0.0, 1.0);
    let r = (204.0 * (1.0 - ratio)) as u8;
    let g = (204.0 + 51.0 * ratio) as u8;
    let b = (204.0 * (1.0 - ratio)) as u8;
    (r, g, b)
}

/// Apply the local volume state to a PCM frame before playback
///
/// Muted output is silence of identical length. A gain of exactly 1.0
/// is a byte-exact passthrough. Any other gain scales every sample,
/// clamping to the 16-bit signed range rather than wrapping.
pub fn apply_volume(frame: &[u8], gain: f32, muted: bool) -> Vec<u8> {
    if muted {
        return vec![0u8; frame.len()];
    }
    if gain == 1.0 {
        return frame.to_vec();
    }

    let mut out = Vec::with_capacity(frame.len());
    let chunks = frame.chunks_exact(2);
    let remainder = chunks.remainder();
    for pair in chunks {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let scaled = (sample as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
    }
    out.extend_from_slice(remainder);
    out
}
