use crate::{
    Analyser, CaptureDevice, CpalCaptureDevice, WAV_MEDIA_TYPE,
    audio::cpal_capture::{CHUNK_BYTES, InputFanout, MAX_CAPTURE_SAMPLES, downmix, encode_wav},
};

use std::io::Cursor;

/// WHAT: Interleaved stereo frames average to mono
/// WHY: Recordings and taps are mono regardless of the device
#[test]
fn given_stereo_frames_when_downmixing_then_channel_average() {
    let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
    assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
    assert_eq!(downmix(&stereo, 1), stereo.to_vec());
}

/// WHAT: Callbacks feed both the capture buffer and attached taps
/// WHY: The recording analyser shows what is being recorded
#[test]
#[allow(clippy::unwrap_used)]
fn given_capture_and_tap_when_dispatching_then_both_receive_mono() {
    // Given: A fan-out with an active capture and one tap
    let mut fanout = InputFanout::default();
    fanout.start_capture(0);
    let analyser = Analyser::new(32).unwrap();
    fanout.attach(&analyser);

    // When: A stereo callback arrives
    fanout.dispatch(&[0.2, 0.4, 0.2, 0.4], 2);

    // Then: The capture holds the mix as 16-bit PCM and the tap got floats
    let captured = fanout.captured().unwrap();
    assert_eq!(captured, &[9830, 9830]);
    let window = analyser.time_domain_data();
    assert!((window[31] - 0.3).abs() < 1e-6);
}

/// WHAT: Dropped taps are pruned on the next callback
/// WHY: Discarded analysers must not be fed forever
#[test]
#[allow(clippy::unwrap_used)]
fn given_dropped_tap_when_dispatching_then_tap_removed() {
    let mut fanout = InputFanout::default();
    let kept = Analyser::new(32).unwrap();
    let dropped = Analyser::new(32).unwrap();
    fanout.attach(&kept);
    fanout.attach(&dropped);
    drop(dropped);

    fanout.dispatch(&[0.1; 8], 1);

    assert_eq!(fanout.analyser_count(), 1);
}

/// WHAT: Captured samples stop growing at the bound and the overflow is flagged once
/// WHY: A forgotten capture must not exhaust memory, and the loss must be visible
#[test]
#[allow(clippy::unwrap_used)]
fn given_full_capture_buffer_when_dispatching_then_samples_dropped_and_capped() {
    // Given: A capture filled to just under the bound
    let mut fanout = InputFanout::default();
    fanout.start_capture(0);
    let block = vec![0.0f32; MAX_CAPTURE_SAMPLES / 4 + 1];
    for _ in 0..3 {
        fanout.dispatch(&block, 1);
    }
    assert!(!fanout.is_capped());

    // When: More input than fits arrives
    fanout.dispatch(&block, 1);
    fanout.dispatch(&block, 1);

    // Then: The buffer stops at the bound and the overflow was recorded
    assert_eq!(fanout.captured().unwrap().len(), MAX_CAPTURE_SAMPLES);
    assert!(fanout.is_capped());

    // When: The next capture starts
    let abandoned = fanout.start_capture(0);

    // Then: The flag is cleared for it
    assert!(abandoned);
    assert!(!fanout.is_capped());
    assert_eq!(fanout.captured().unwrap().len(), 0);
}

/// WHAT: Encoded captures are valid mono 16-bit WAV
/// WHY: The playback side decodes the concatenated chunks as a container
#[test]
#[allow(clippy::unwrap_used)]
fn given_samples_when_encoding_wav_then_header_and_samples_readable() {
    // Given: A clip longer than one chunk
    let samples: Vec<f32> = (0..20_000).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();

    // When: Encoding and splitting as the device does
    let bytes = encode_wav(&samples, 44_100).unwrap();
    let chunks: Vec<&[u8]> = bytes.chunks(CHUNK_BYTES).collect();

    // Then: Chunks rejoin into a readable container
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.len() <= CHUNK_BYTES));
    let joined = chunks.concat();
    let reader = hound::WavReader::new(Cursor::new(joined)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

/// WHAT: The cpal device reports WAV as its container
/// WHY: Recordings carry the media type needed to decode them
#[test]
fn given_cpal_device_when_querying_media_type_then_audio_wav() {
    assert_eq!(CpalCaptureDevice::new().media_type(), WAV_MEDIA_TYPE);
    assert_eq!(WAV_MEDIA_TYPE, "audio/wav");
}

/// WHAT: A real microphone stream can be acquired
/// WHY: Validates the cpal input path end to end
#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
#[allow(clippy::unwrap_used)]
async fn given_system_microphone_when_acquiring_stream_then_live_input_opened() {
    let device = CpalCaptureDevice::new();

    let stream = device.acquire_stream().await.unwrap();

    assert!(stream.sample_rate() > 0);
    assert!(stream.channels() > 0);
}
