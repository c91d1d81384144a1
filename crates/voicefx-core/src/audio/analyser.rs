use crate::{AudioError, CoreResult};

use std::{
    f32::consts::PI,
    fmt,
    panic::Location,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use error_location::ErrorLocation;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use tracing::error;

/// Transform window used by every tap this crate creates.
pub const DEFAULT_FFT_SIZE: usize = 256;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;
const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Analysis tap exposing the most recent time and frequency domain data.
///
/// The producer side (render graph or capture thread) calls
/// [`Analyser::write_samples`]; the consumer polls the getters at frame
/// cadence. Clones share the same window.
#[derive(Clone)]
pub struct Analyser {
    inner: Arc<Mutex<AnalyserState>>,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
}

/// Non-owning reference to an [`Analyser`].
///
/// Producers hold these so a tap discarded by its consumer stops being fed.
#[derive(Clone)]
pub struct WeakAnalyser {
    inner: Weak<Mutex<AnalyserState>>,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
}

struct AnalyserState {
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyser {
    /// Creates a tap with the given transform size.
    ///
    /// # Errors
    ///
    /// Returns error unless `fft_size` is a power of two in 32..=32768.
    #[track_caller]
    pub fn new(fft_size: usize) -> CoreResult<Self> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AudioError::InvalidAnalyserSize {
                fft_size,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

        // Blackman window
        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Ok(Self {
            inner: Arc::new(Mutex::new(AnalyserState {
                ring: vec![0.0; fft_size],
                write_pos: 0,
                window,
                smoothed: vec![0.0; fft_size / 2],
            })),
            fft,
            fft_size,
        })
    }

    /// Creates a tap with [`DEFAULT_FFT_SIZE`].
    pub fn with_default_size() -> CoreResult<Self> {
        Self::new(DEFAULT_FFT_SIZE)
    }

    /// Transform window length in samples.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins, half the transform size.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends samples to the analysis window, discarding the oldest.
    pub fn write_samples(&self, samples: &[f32]) {
        let mut state = self.lock();
        let len = state.ring.len();
        let skip = samples.len().saturating_sub(len);
        for &sample in &samples[skip..] {
            let pos = state.write_pos;
            state.ring[pos] = sample;
            state.write_pos = (pos + 1) % len;
        }
    }

    /// Current window, oldest sample first.
    pub fn time_domain_data(&self) -> Vec<f32> {
        let state = self.lock();
        state.ordered()
    }

    /// Current window as unsigned bytes centred on 128.
    pub fn byte_time_domain_data(&self) -> Vec<u8> {
        self.time_domain_data()
            .into_iter()
            .map(|x| (128.0 + 128.0 * x).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Smoothed magnitude spectrum in decibels.
    ///
    /// Each call advances the smoothing state, so poll once per frame.
    pub fn frequency_data(&self) -> Vec<f32> {
        let mut state = self.lock();

        let mut buffer: Vec<Complex<f32>> = state
            .ordered()
            .iter()
            .zip(state.window.iter())
            .map(|(x, w)| Complex::new(x * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let smoothed = &mut state.smoothed;
        for (bin, value) in smoothed.iter_mut().zip(buffer.iter()) {
            let magnitude = value.norm() * scale;
            *bin = SMOOTHING_TIME_CONSTANT * *bin + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
        }

        smoothed
            .iter()
            .map(|&m| {
                if m > 0.0 {
                    20.0 * m.log10()
                } else {
                    f32::NEG_INFINITY
                }
            })
            .collect()
    }

    /// Smoothed spectrum mapped from [-100, -30] dB onto 0..=255.
    pub fn byte_frequency_data(&self) -> Vec<u8> {
        let range = MAX_DECIBELS - MIN_DECIBELS;
        self.frequency_data()
            .into_iter()
            .map(|db| (((db - MIN_DECIBELS) / range) * 255.0).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Root mean square of the current window.
    pub fn rms(&self) -> f32 {
        let state = self.lock();
        let sum: f32 = state.ring.iter().map(|x| x * x).sum();
        (sum / state.ring.len() as f32).sqrt()
    }

    /// Weak handle that does not keep the tap alive.
    pub fn downgrade(&self) -> WeakAnalyser {
        WeakAnalyser {
            inner: Arc::downgrade(&self.inner),
            fft: Arc::clone(&self.fft),
            fft_size: self.fft_size,
        }
    }

    /// Whether two handles refer to the same tap.
    pub fn ptr_eq(&self, other: &Analyser) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, AnalyserState> {
        self.inner.lock().unwrap_or_else(|e| {
            error!("Analyser lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .finish_non_exhaustive()
    }
}

impl WeakAnalyser {
    /// Upgrades to a strong handle if the tap is still alive.
    pub fn upgrade(&self) -> Option<Analyser> {
        self.inner.upgrade().map(|inner| Analyser {
            inner,
            fft: Arc::clone(&self.fft),
            fft_size: self.fft_size,
        })
    }
}

impl AnalyserState {
    fn ordered(&self) -> Vec<f32> {
        let len = self.ring.len();
        (0..len)
            .map(|i| self.ring[(self.write_pos + i) % len])
            .collect()
    }
}
