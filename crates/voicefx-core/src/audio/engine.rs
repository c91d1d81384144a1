//! Contract for the audio graph engine that renders playback.

use crate::{Analyser, CoreResult};

use std::{fmt, future::Future};

/// Handle to a node owned by a [`SignalEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Playback status reported for a source player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Producing audio.
    Started,
    /// Not started, stopped, or reached the end of its buffer.
    Stopped,
}

/// Declarative description of one processing stage.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Constant gain.
    Gain {
        /// Linear gain factor.
        gain: f32,
    },
    /// Frequency shift without tempo change.
    PitchShift {
        /// Shift in semitones, negative lowers the pitch.
        semitones: f32,
    },
    /// Delay line that feeds its output back into itself.
    FeedbackDelay {
        /// Delay time in seconds.
        delay_secs: f32,
        /// Fraction of the delayed signal fed back, 0.0..1.0.
        feedback: f32,
        /// Wet fraction of the output mix.
        wet: f32,
    },
    /// Room reverberation.
    Reverb {
        /// Time for the tail to decay by 60dB, in seconds.
        decay_secs: f32,
        /// Wet fraction of the output mix.
        wet: f32,
    },
    /// Non-mutating analysis tap.
    Analyser {
        /// Transform window in samples.
        fft_size: usize,
    },
}

impl NodeSpec {
    /// Wet fraction for stages that mix processed and dry signal.
    pub fn wet(&self) -> Option<f32> {
        match self {
            NodeSpec::FeedbackDelay { wet, .. } | NodeSpec::Reverb { wet, .. } => Some(*wet),
            _ => None,
        }
    }
}

/// Node-graph audio engine with a shared processing context.
///
/// Every node is owned by the engine and addressed by [`NodeId`]. Nodes
/// not connected to anything produce no output; disposed nodes release
/// their resources immediately.
pub trait SignalEngine: Send + Sync + 'static {
    /// Decoded, engine-ready sample data.
    type Buffer: Send + 'static;

    /// Starts the processing context if it is suspended.
    fn ensure_running(&self) -> impl Future<Output = CoreResult<()>> + Send;

    /// Decodes a compressed container into a sample buffer.
    fn decode(&self, data: &[u8]) -> impl Future<Output = CoreResult<Self::Buffer>> + Send;

    /// Creates a source player over `buffer`.
    fn create_player(&self, buffer: Self::Buffer, playback_rate: f32) -> CoreResult<NodeId>;

    /// Creates a processing node. Analysers go through [`SignalEngine::create_analyser`].
    fn create_node(&self, spec: &NodeSpec) -> CoreResult<NodeId>;

    /// Creates an analysis tap node and the handle used to read it.
    fn create_analyser(&self, fft_size: usize) -> CoreResult<(NodeId, Analyser)>;

    /// Routes the output of `from` into `to`.
    fn connect(&self, from: NodeId, to: NodeId) -> CoreResult<()>;

    /// Routes the output of `node` into the output mix.
    fn connect_to_output(&self, node: NodeId) -> CoreResult<()>;

    /// Starts a player from the beginning of its buffer.
    fn start(&self, player: NodeId) -> CoreResult<()>;

    /// Stops a player. No-op for unknown nodes.
    fn stop(&self, player: NodeId);

    /// Current status of a player; unknown nodes report stopped.
    fn player_state(&self, player: NodeId) -> PlayerState;

    /// Disconnects and releases a node. No-op for unknown nodes.
    fn dispose(&self, node: NodeId);
}
