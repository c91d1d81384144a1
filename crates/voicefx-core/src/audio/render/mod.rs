//! Software implementation of [`SignalEngine`].
//!
//! Nodes live in a [`RenderGraph`] shared with the output callback. The
//! output device is opened lazily by [`SignalEngine::ensure_running`] on a
//! dedicated thread, since `cpal::Stream` is `!Send`.

mod decoder;
pub(crate) mod dsp;
mod graph;

pub use {decoder::DecodedBuffer, graph::RenderGraph};

use crate::{
    Analyser, AudioError, CoreResult,
    audio::{NodeId, NodeSpec, PlayerState, SignalEngine},
};
use decoder::decode_wav;
use dsp::{Player, Tap, processor_for};
use graph::{NodeKind, Target};

use std::{
    panic::Location,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use error_location::ErrorLocation;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument};

/// Rate used until an output device reports its own.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// How often the output thread checks whether the engine was dropped.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Node-graph engine rendering in software to the default output device.
pub struct RenderEngine {
    graph: Arc<Mutex<RenderGraph>>,
    output: tokio::sync::Mutex<Option<OutputHandle>>,
    next_id: AtomicU64,
    offline: bool,
}

struct OutputHandle {
    shutdown: Arc<AtomicBool>,
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl RenderEngine {
    /// Engine that plays through the default output device.
    pub fn new() -> Self {
        Self::with_mode(DEFAULT_SAMPLE_RATE, false)
    }

    /// Engine without an output device; blocks are pulled with [`RenderEngine::render`].
    pub fn offline(sample_rate: u32) -> Self {
        Self::with_mode(sample_rate, true)
    }

    fn with_mode(sample_rate: u32, offline: bool) -> Self {
        Self {
            graph: Arc::new(Mutex::new(RenderGraph::new(sample_rate))),
            output: tokio::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
            offline,
        }
    }

    /// Current output rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.graph().sample_rate()
    }

    /// Number of nodes currently allocated.
    pub fn node_count(&self) -> usize {
        self.graph().node_count()
    }

    /// Renders the next mono block, as the output callback would.
    pub fn render(&self, out: &mut [f32]) {
        self.graph().render(out);
    }

    fn graph(&self) -> MutexGuard<'_, RenderGraph> {
        lock_graph(&self.graph)
    }

    fn allocate(&self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.graph().insert(id, kind);
        id
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine for RenderEngine {
    type Buffer = DecodedBuffer;

    #[instrument(skip(self))]
    async fn ensure_running(&self) -> CoreResult<()> {
        if self.offline {
            return Ok(());
        }

        let mut output = self.output.lock().await;
        if output.is_some() {
            return Ok(());
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let graph = Arc::clone(&self.graph);
        let thread_shutdown = Arc::clone(&shutdown);
        thread::Builder::new()
            .name("voicefx-output".to_string())
            .spawn(move || run_output_thread(graph, thread_shutdown, ready_tx))
            .map_err(|e| AudioError::EngineError {
                reason: format!("Failed to spawn output thread: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let (sample_rate, channels) = ready_rx.await.map_err(|_| AudioError::EngineError {
            reason: "Output thread exited before opening the device".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })??;

        info!(sample_rate, channels, "Audio output running");

        *output = Some(OutputHandle { shutdown });

        Ok(())
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn decode(&self, data: &[u8]) -> CoreResult<DecodedBuffer> {
        let bytes = data.to_vec();
        let output_rate = self.sample_rate();

        tokio::task::spawn_blocking(move || decode_wav(&bytes, output_rate))
            .await
            .map_err(|e| AudioError::EngineError {
                reason: format!("Decode task failed: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?
    }

    fn create_player(&self, buffer: DecodedBuffer, playback_rate: f32) -> CoreResult<NodeId> {
        let id = self.allocate(NodeKind::Player(Player::new(
            buffer.shared_samples(),
            playback_rate,
        )));
        debug!(node = %id, playback_rate, duration_secs = buffer.duration_secs(), "Player created");
        Ok(id)
    }

    #[track_caller]
    fn create_node(&self, spec: &NodeSpec) -> CoreResult<NodeId> {
        let processor =
            processor_for(spec, self.sample_rate()).ok_or_else(|| AudioError::EngineError {
                reason: format!("{:?} must be created with create_analyser", spec),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let id = self.allocate(NodeKind::Stage(processor));
        debug!(node = %id, spec = ?spec, "Node created");
        Ok(id)
    }

    fn create_analyser(&self, fft_size: usize) -> CoreResult<(NodeId, Analyser)> {
        let analyser = Analyser::new(fft_size)?;
        let id = self.allocate(NodeKind::Stage(Box::new(Tap::new(analyser.clone()))));
        debug!(node = %id, fft_size, "Analyser created");
        Ok((id, analyser))
    }

    fn connect(&self, from: NodeId, to: NodeId) -> CoreResult<()> {
        self.graph().connect(from, Target::Node(to))
    }

    fn connect_to_output(&self, node: NodeId) -> CoreResult<()> {
        self.graph().connect(node, Target::Output)
    }

    fn start(&self, player: NodeId) -> CoreResult<()> {
        self.graph().start(player)
    }

    fn stop(&self, player: NodeId) {
        self.graph().stop(player);
    }

    fn player_state(&self, player: NodeId) -> PlayerState {
        self.graph().player_state(player)
    }

    fn dispose(&self, node: NodeId) {
        if self.graph().remove(node) {
            debug!(node = %node, "Node disposed");
        }
    }
}

fn run_output_thread(
    graph: Arc<Mutex<RenderGraph>>,
    shutdown: Arc<AtomicBool>,
    ready: oneshot::Sender<CoreResult<(u32, u16)>>,
) {
    let (stream, sample_rate, channels) = match open_output_stream(graph) {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "Failed to open audio output");
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok((sample_rate, channels))).is_err() {
        debug!("Engine went away before output was ready");
        return;
    }

    while !shutdown.load(Ordering::Acquire) {
        thread::park_timeout(SHUTDOWN_POLL);
    }

    drop(stream);
    info!("Audio output stopped");
}

#[track_caller]
fn open_output_stream(graph: Arc<Mutex<RenderGraph>>) -> CoreResult<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or(AudioError::DeviceUnavailable {
            reason: "No output device found".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::EngineError {
            reason: format!("Failed to get output config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let channels = config.channels();
    let sample_rate = config.sample_rate();
    let stream_config: cpal::StreamConfig = config.into();

    // Decoding after this point targets the device rate.
    lock_graph(&graph).set_sample_rate(sample_rate);

    let frame_width = usize::from(channels.max(1));
    let mut mono = Vec::new();

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mono.resize(data.len() / frame_width, 0.0);
                lock_graph(&graph).render(&mut mono);
                for (frame, &sample) in data.chunks_mut(frame_width).zip(mono.iter()) {
                    frame.fill(sample.clamp(-1.0, 1.0));
                }
            },
            |err| {
                error!("Audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::EngineError {
            reason: format!("Failed to build output stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    stream.play().map_err(|e| AudioError::EngineError {
        reason: format!("Failed to start output stream: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!(device_id = ?device.id(), sample_rate, channels, "Output device opened");

    Ok((stream, sample_rate, channels))
}

fn lock_graph(graph: &Mutex<RenderGraph>) -> MutexGuard<'_, RenderGraph> {
    graph.lock().unwrap_or_else(|e| {
        error!("Render graph lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
