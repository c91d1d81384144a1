use crate::{Analyser, AudioError, CaptureDevice, CaptureEvent, CoreResult, audio::WeakAnalyser};

use std::{
    io::Cursor,
    panic::Location,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use error_location::ErrorLocation;
use hound::{SampleFormat, WavSpec, WavWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Media type of the containers produced by [`CpalCaptureDevice`].
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

/// Largest chunk emitted on the capture event channel.
pub(crate) const CHUNK_BYTES: usize = 16 * 1024;

/// Upper bound on captured mono samples (5 minutes at 48kHz).
///
/// Samples arriving after the bound are dropped rather than growing the
/// buffer further. Recordings are short clips.
pub(crate) const MAX_CAPTURE_SAMPLES: usize = 48_000 * 60 * 5;

/// How often the input thread checks whether its stream was released.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Microphone capture through the default cpal input device.
///
/// Each acquired stream runs on its own thread because `cpal::Stream` is
/// `!Send`. Captures are buffered as mono 16-bit PCM and wrapped in a WAV
/// container when they end, since the header needs the final length.
#[derive(Debug, Default)]
pub struct CpalCaptureDevice;

/// Open microphone stream. The device stays open while any clone is alive.
#[derive(Clone)]
pub struct LiveInput {
    inner: Arc<LiveInputInner>,
}

struct LiveInputInner {
    sample_rate: u32,
    channels: u16,
    fanout: Arc<Mutex<InputFanout>>,
    shutdown: Arc<AtomicBool>,
}

/// One capture in progress on a [`LiveInput`].
pub struct CpalCapture {
    input: LiveInput,
    events: mpsc::UnboundedSender<CaptureEvent>,
}

/// Routes input callbacks to the active capture and any attached taps.
#[derive(Default)]
pub(crate) struct InputFanout {
    capture: Option<Vec<i16>>,
    capped: bool,
    analysers: Vec<WeakAnalyser>,
}

struct OpenedInput {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

impl CpalCaptureDevice {
    /// Creates the adapter. No device is opened until a stream is acquired.
    pub fn new() -> Self {
        Self
    }
}

impl LiveInput {
    /// Device sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    /// Device channel count before down-mixing.
    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    fn fanout(&self) -> MutexGuard<'_, InputFanout> {
        lock_fanout(&self.inner.fanout)
    }
}

impl Drop for LiveInputInner {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl CaptureDevice for CpalCaptureDevice {
    type Stream = LiveInput;
    type Capture = CpalCapture;

    fn media_type(&self) -> &'static str {
        WAV_MEDIA_TYPE
    }

    #[instrument(skip(self))]
    async fn acquire_stream(&self) -> CoreResult<LiveInput> {
        let fanout = Arc::new(Mutex::new(InputFanout::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_fanout = Arc::clone(&fanout);
        let thread_shutdown = Arc::clone(&shutdown);
        thread::Builder::new()
            .name("voicefx-input".to_string())
            .spawn(move || run_input_thread(thread_fanout, thread_shutdown, ready_tx))
            .map_err(|e| AudioError::DeviceUnavailable {
                reason: format!("Failed to spawn input thread: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let (sample_rate, channels) =
            ready_rx.await.map_err(|_| AudioError::DeviceUnavailable {
                reason: "Input thread exited before opening the device".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })??;

        info!(sample_rate, channels, "Microphone stream acquired");

        Ok(LiveInput {
            inner: Arc::new(LiveInputInner {
                sample_rate,
                channels,
                fanout,
                shutdown,
            }),
        })
    }

    fn begin_capture(
        &self,
        stream: &LiveInput,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> CoreResult<CpalCapture> {
        // Typical clips are well under 30 seconds
        let abandoned = stream
            .fanout()
            .start_capture(stream.sample_rate() as usize * 30);
        if abandoned {
            warn!("Discarded capture buffer left by an abandoned capture");
        }

        debug!(sample_rate = stream.sample_rate(), "Capture started");

        Ok(CpalCapture {
            input: stream.clone(),
            events,
        })
    }

    fn end_capture(&self, capture: CpalCapture) {
        let samples = capture.input.fanout().take_capture();
        let sample_rate = capture.input.sample_rate();
        let events = capture.events;

        debug!(sample_count = samples.len(), "Capture ended, encoding");

        // Encoding happens off the caller so the stop event stays asynchronous.
        let spawned = thread::Builder::new()
            .name("voicefx-encode".to_string())
            .spawn(move || {
                match encode_pcm16(&samples, sample_rate) {
                    Ok(bytes) => {
                        for chunk in bytes.chunks(CHUNK_BYTES) {
                            let _ = events.send(CaptureEvent::Chunk(chunk.to_vec()));
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to encode capture"),
                }
                let _ = events.send(CaptureEvent::Stopped);
            });

        if let Err(e) = spawned {
            // Dropping the sender closes the channel, which the session
            // treats as a stop.
            error!(error = %e, "Failed to spawn encoder thread");
        }
    }

    fn attach_analyser(&self, stream: &LiveInput, analyser: &Analyser) -> CoreResult<()> {
        stream.fanout().analysers.push(analyser.downgrade());
        debug!(fft_size = analyser.fft_size(), "Analyser attached to input");
        Ok(())
    }
}

impl InputFanout {
    pub(crate) fn dispatch(&mut self, data: &[f32], channels: u16) {
        let mono = downmix(data, channels);

        if let Some(buf) = self.capture.as_mut() {
            let room = MAX_CAPTURE_SAMPLES.saturating_sub(buf.len());
            if mono.len() > room && !self.capped {
                self.capped = true;
                warn!(
                    max_samples = MAX_CAPTURE_SAMPLES,
                    "Capture buffer full, dropping further input"
                );
            }
            buf.extend(mono.iter().take(room).map(|&sample| to_pcm16(sample)));
        }

        self.analysers.retain(|weak| match weak.upgrade() {
            Some(analyser) => {
                analyser.write_samples(&mono);
                true
            }
            None => false,
        });
    }

    /// Starts a fresh capture buffer. Returns whether one was left over.
    pub(crate) fn start_capture(&mut self, capacity: usize) -> bool {
        self.capped = false;
        self.capture.replace(Vec::with_capacity(capacity)).is_some()
    }

    fn take_capture(&mut self) -> Vec<i16> {
        self.capture.take().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn captured(&self) -> Option<&[i16]> {
        self.capture.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn is_capped(&self) -> bool {
        self.capped
    }

    #[cfg(test)]
    pub(crate) fn attach(&mut self, analyser: &Analyser) {
        self.analysers.push(analyser.downgrade());
    }

    #[cfg(test)]
    pub(crate) fn analyser_count(&self) -> usize {
        self.analysers.len()
    }
}

/// Averages interleaved frames down to one channel.
pub(crate) fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 | 1 => data.to_vec(),
        n => data
            .chunks(n as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect(),
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Wraps mono 16-bit samples in a WAV container.
pub(crate) fn encode_pcm16(samples: &[i16], sample_rate: u32) -> hound::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Encodes float samples the way a capture would.
#[cfg(test)]
pub(crate) fn encode_wav(samples: &[f32], sample_rate: u32) -> hound::Result<Vec<u8>> {
    let pcm: Vec<i16> = samples.iter().map(|&sample| to_pcm16(sample)).collect();
    encode_pcm16(&pcm, sample_rate)
}

fn run_input_thread(
    fanout: Arc<Mutex<InputFanout>>,
    shutdown: Arc<AtomicBool>,
    ready: oneshot::Sender<CoreResult<(u32, u16)>>,
) {
    let opened = match open_input_stream(fanout) {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "Microphone unavailable");
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok((opened.sample_rate, opened.channels))).is_err() {
        debug!("Stream requester went away, closing input");
        return;
    }

    while !shutdown.load(Ordering::Acquire) {
        thread::park_timeout(SHUTDOWN_POLL);
    }

    drop(opened.stream);
    info!("Microphone stream released");
}

#[track_caller]
fn open_input_stream(fanout: Arc<Mutex<InputFanout>>) -> CoreResult<OpenedInput> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(AudioError::DeviceUnavailable {
            reason: "No microphone found".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let config = device
        .default_input_config()
        .map_err(|e| AudioError::PermissionDenied {
            reason: format!("Failed to get config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let channels = config.channels();
    let sample_rate = config.sample_rate();
    let stream_config: cpal::StreamConfig = config.into();

    info!(
        device_id = ?device.id(),
        sample_rate,
        channels,
        "Opening microphone"
    );

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                lock_fanout(&fanout).dispatch(data, channels);
            },
            |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::PermissionDenied {
            reason: format!("Failed to build stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    stream.play().map_err(|e| AudioError::PermissionDenied {
        reason: format!("Failed to start stream: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(OpenedInput {
        stream,
        sample_rate,
        channels,
    })
}

fn lock_fanout(fanout: &Mutex<InputFanout>) -> MutexGuard<'_, InputFanout> {
    // A poisoned lock still holds valid sample data.
    fanout.lock().unwrap_or_else(|e| {
        error!("Input fan-out lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
