use crate::{AudioError, CoreResult, audio::cpal_capture::downmix, audio::resampler::resample};

use std::{io::Cursor, panic::Location, sync::Arc};

use error_location::ErrorLocation;
use hound::{SampleFormat, WavReader};
use tracing::debug;

/// Source rates accepted from a WAV header.
const SOURCE_RATE_RANGE: std::ops::RangeInclusive<u32> = 1_000..=384_000;

/// Longest clip the decoder will produce.
const MAX_DECODED_SECS: u64 = 600;

/// Mono samples at the engine's output rate.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Decoded samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Rate the samples are stored at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }
}

/// Decodes a WAV container and converts it to mono at `output_rate`.
#[track_caller]
pub(crate) fn decode_wav(data: &[u8], output_rate: u32) -> CoreResult<DecodedBuffer> {
    if data.is_empty() {
        return Err(decode_error("Recording contains no data".to_string()));
    }

    let reader = WavReader::new(Cursor::new(data))
        .map_err(|e| decode_error(format!("Invalid WAV container: {}", e)))?;
    let spec = reader.spec();
    if !SOURCE_RATE_RANGE.contains(&spec.sample_rate) {
        return Err(decode_error(format!(
            "Unsupported sample rate: {} Hz",
            spec.sample_rate
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(format!("Corrupt sample data: {}", e)))?,
        SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(decode_error(format!(
                    "Unsupported bit depth: {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_error(format!("Corrupt sample data: {}", e)))?
        }
    };

    let mono = downmix(&interleaved, spec.channels);
    if mono.is_empty() {
        return Err(decode_error("Recording contains no samples".to_string()));
    }

    let decoded_len = mono.len() as u64 * u64::from(output_rate) / u64::from(spec.sample_rate);
    if decoded_len > MAX_DECODED_SECS * u64::from(output_rate) {
        return Err(decode_error(format!(
            "Recording longer than {} seconds",
            MAX_DECODED_SECS
        )));
    }

    let samples = resample(&mono, spec.sample_rate, output_rate)?;

    debug!(
        source_rate = spec.sample_rate,
        output_rate,
        channels = spec.channels,
        sample_count = samples.len(),
        "Recording decoded"
    );

    Ok(DecodedBuffer {
        samples: samples.into(),
        sample_rate: output_rate,
    })
}

#[track_caller]
fn decode_error(reason: String) -> AudioError {
    AudioError::DecodeFailure {
        reason,
        location: ErrorLocation::from(Location::caller()),
    }
}
