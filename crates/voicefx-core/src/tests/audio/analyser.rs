use crate::{Analyser, AudioError, DEFAULT_FFT_SIZE};

use std::f32::consts::PI;

/// WHAT: Transform sizes outside powers of two in 32..=32768 are rejected
/// WHY: The FFT window and bin count depend on a valid size
#[test]
fn given_invalid_fft_sizes_when_creating_analyser_then_error() {
    for size in [0, 16, 100, 65536] {
        assert!(matches!(
            Analyser::new(size),
            Err(AudioError::InvalidAnalyserSize { fft_size, .. }) if fft_size == size
        ));
    }
}

/// WHAT: Default tap has 256 samples and 128 bins
/// WHY: Visualizers size their bars from the bin count
#[test]
#[allow(clippy::unwrap_used)]
fn given_default_analyser_when_querying_sizes_then_256_and_128() {
    let analyser = Analyser::with_default_size().unwrap();
    assert_eq!(analyser.fft_size(), DEFAULT_FFT_SIZE);
    assert_eq!(analyser.frequency_bin_count(), 128);
    assert_eq!(analyser.time_domain_data().len(), 256);
    assert_eq!(analyser.byte_frequency_data().len(), 128);
}

/// WHAT: Time domain data returns the latest window oldest first
/// WHY: Waveform drawings must not wrap around mid-frame
#[test]
#[allow(clippy::unwrap_used)]
fn given_more_samples_than_window_when_reading_time_domain_then_latest_in_order() {
    // Given: A 32-sample tap
    let analyser = Analyser::new(32).unwrap();

    // When: Writing 40 increasing samples in two blocks
    let samples: Vec<f32> = (0..40).map(|i| i as f32).collect();
    analyser.write_samples(&samples[..25]);
    analyser.write_samples(&samples[25..]);

    // Then: The window holds samples 8..40 in order
    let expected: Vec<f32> = (8..40).map(|i| i as f32).collect();
    assert_eq!(analyser.time_domain_data(), expected);
}

/// WHAT: Silence maps to 128 in byte time domain data
/// WHY: Byte waveforms are centred on the midpoint
#[test]
#[allow(clippy::unwrap_used)]
fn given_silence_when_reading_byte_time_domain_then_all_128() {
    let analyser = Analyser::new(64).unwrap();
    assert!(analyser.byte_time_domain_data().iter().all(|&b| b == 128));
    assert!(analyser.rms().abs() < f32::EPSILON);
}

/// WHAT: A sine wave peaks in its own frequency bin
/// WHY: Frequency bars must reflect the played pitch
#[test]
#[allow(clippy::unwrap_used)]
fn given_sine_in_bin_16_when_reading_frequency_data_then_peak_at_bin_16() {
    // Given: A 256-sample tap fed a sine that completes 16 cycles per window
    let analyser = Analyser::new(256).unwrap();
    let sine: Vec<f32> = (0..256)
        .map(|i| (2.0 * PI * 16.0 * i as f32 / 256.0).sin())
        .collect();
    analyser.write_samples(&sine);

    // When: Reading the spectrum
    let spectrum = analyser.frequency_data();

    // Then: Bin 16 is the maximum
    let peak = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 16);
    assert!(analyser.byte_frequency_data()[16] > 0);
}

/// WHAT: RMS of a constant signal equals its magnitude
/// WHY: The level meter relies on RMS
#[test]
#[allow(clippy::unwrap_used)]
fn given_constant_signal_when_reading_rms_then_magnitude() {
    let analyser = Analyser::new(32).unwrap();
    analyser.write_samples(&[-0.5; 32]);
    assert!((analyser.rms() - 0.5).abs() < 1e-6);
}

/// WHAT: Weak handles stop resolving once every strong handle is gone
/// WHY: Producers must stop feeding discarded taps
#[test]
#[allow(clippy::unwrap_used)]
fn given_dropped_analyser_when_upgrading_weak_then_none() {
    // Given: A tap and a weak handle
    let analyser = Analyser::new(32).unwrap();
    let weak = analyser.downgrade();
    assert!(weak.upgrade().is_some_and(|a| a.ptr_eq(&analyser)));

    // When: Dropping the tap
    drop(analyser);

    // Then: The weak handle is dead
    assert!(weak.upgrade().is_none());
}
