use crate::{AudioError, CoreResult};

use std::panic::Location;

use audioadapter_buffers::direct::InterleavedSlice;
use error_location::ErrorLocation;
use rubato::{Fft, FixedSync, Resampler as RubatoResampler};
use tracing::{debug, instrument};

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts a whole mono clip from `input_rate` to `output_rate`.
///
/// Equal rates return the input unchanged. The resampler's delay is
/// removed, so the output is aligned with the input and exactly
/// `len * output_rate / input_rate` samples long.
#[track_caller]
#[instrument(skip(samples), fields(sample_count = samples.len()))]
pub(crate) fn resample(samples: &[f32], input_rate: u32, output_rate: u32) -> CoreResult<Vec<f32>> {
    if input_rate == output_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if input_rate == 0 || output_rate == 0 {
        return Err(resampling_error(format!(
            "Cannot resample {} Hz to {} Hz",
            input_rate, output_rate
        )));
    }

    let mut resampler = Fft::<f32>::new(
        input_rate as usize,
        output_rate as usize,
        CHUNK_FRAMES,
        SUB_CHUNKS,
        1, // mono
        FixedSync::Input,
    )
    .map_err(|e| resampling_error(format!("Failed to create resampler: {}", e)))?;

    let expected_len = (samples.len() as f64 * output_rate as f64 / input_rate as f64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + resampler.output_frames_max());

    let mut input_chunk = vec![0.0f32; resampler.input_frames_max()];
    let mut output_chunk = vec![0.0f32; resampler.output_frames_max()];
    let mut position = 0;

    // Keep feeding zeros past the end until the delayed tail is flushed.
    while output.len() < expected_len + delay {
        let needed = resampler.input_frames_next();
        let available = samples.len().saturating_sub(position).min(needed);
        input_chunk[..available].copy_from_slice(&samples[position..position + available]);
        input_chunk[available..needed].fill(0.0);
        position += available;

        let input_adapter = InterleavedSlice::new(&input_chunk[..needed], 1, needed)
            .map_err(|e| resampling_error(format!("Failed to create input adapter: {}", e)))?;

        let output_frames = output_chunk.len();
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_chunk, 1, output_frames)
            .map_err(|e| resampling_error(format!("Failed to create output adapter: {}", e)))?;

        let (_consumed, written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| resampling_error(format!("Resampling failed: {}", e)))?;

        if written == 0 {
            break;
        }
        output.extend_from_slice(&output_chunk[..written]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);

    debug!(
        input_rate,
        output_rate,
        output_len = output.len(),
        "Clip resampled"
    );

    Ok(output)
}

#[track_caller]
fn resampling_error(reason: String) -> AudioError {
    AudioError::EngineError {
        reason,
        location: ErrorLocation::from(Location::caller()),
    }
}
