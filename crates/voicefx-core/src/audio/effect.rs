//! Effect identifiers and their processing topologies.
//!
//! The mapping is pure: an [`Effect`] always yields the same [`Topology`],
//! which the playback controller wires up mechanically.

use crate::audio::{DEFAULT_FFT_SIZE, NodeSpec};

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tempo used to resolve note-relative delay times.
pub const DEFAULT_BPM: f32 = 120.0;

const CHIPMUNK_RATE: f32 = 1.3;
const MONSTER_RATE: f32 = 0.8;
const PITCH_SEMITONES: f32 = 8.0;
const ECHO_FEEDBACK: f32 = 0.5;
const ECHO_DELAY_WET: f32 = 0.4;
const ECHO_REVERB_DECAY_SECS: f32 = 1.0;
const ECHO_REVERB_WET: f32 = 0.3;
const ECHO_OUTPUT_GAIN: f32 = 2.0;

/// Playback effect applied to a recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Unprocessed playback.
    #[default]
    None,
    /// Faster and higher.
    Chipmunk,
    /// Slower and lower.
    Monster,
    /// Feedback delay into reverb.
    Echo,
}

impl Effect {
    /// Every effect, in menu order.
    pub const ALL: [Effect; 4] = [Effect::None, Effect::Chipmunk, Effect::Monster, Effect::Echo];

    /// Lowercase identifier.
    pub fn name(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Chipmunk => "chipmunk",
            Effect::Monster => "monster",
            Effect::Echo => "echo",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown effect name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown effect '{0}' (expected none, chipmunk, monster or echo)")]
pub struct ParseEffectError(String);

impl FromStr for Effect {
    type Err = ParseEffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Effect::ALL
            .into_iter()
            .find(|effect| effect.name() == lowered)
            .ok_or_else(|| ParseEffectError(s.to_string()))
    }
}

/// Connection endpoint inside a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The source player.
    Source,
    /// Index into [`Topology::nodes`].
    Node(usize),
    /// The engine's output mix.
    Output,
}

/// Graph description for one effect: node list plus connections.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    /// Effect this topology realises.
    pub effect: Effect,
    /// Source player rate; 1.0 is original speed.
    pub playback_rate: f32,
    /// Processing stages, ending with the analysis tap and output gain.
    pub nodes: Vec<NodeSpec>,
    /// Directed connections from source to output.
    pub edges: Vec<(Endpoint, Endpoint)>,
}

impl Topology {
    /// Builds the topology for `effect`.
    pub fn for_effect(effect: Effect) -> Self {
        let (playback_rate, stages, output_gain) = match effect {
            Effect::None => (1.0, Vec::new(), 1.0),
            Effect::Chipmunk => (
                CHIPMUNK_RATE,
                vec![NodeSpec::PitchShift {
                    semitones: PITCH_SEMITONES,
                }],
                1.0,
            ),
            Effect::Monster => (
                MONSTER_RATE,
                vec![NodeSpec::PitchShift {
                    semitones: -PITCH_SEMITONES,
                }],
                1.0,
            ),
            Effect::Echo => (
                1.0,
                vec![
                    NodeSpec::FeedbackDelay {
                        delay_secs: eighth_note_secs(DEFAULT_BPM),
                        feedback: ECHO_FEEDBACK,
                        wet: ECHO_DELAY_WET,
                    },
                    NodeSpec::Reverb {
                        decay_secs: ECHO_REVERB_DECAY_SECS,
                        wet: ECHO_REVERB_WET,
                    },
                ],
                // Compensates for the wet/dry attenuation
                ECHO_OUTPUT_GAIN,
            ),
        };

        let mut nodes = stages;
        nodes.push(NodeSpec::Analyser {
            fft_size: DEFAULT_FFT_SIZE,
        });
        nodes.push(NodeSpec::Gain { gain: output_gain });

        // Single chain: source -> nodes[0] -> ... -> nodes[n-1] -> output
        let mut edges = Vec::with_capacity(nodes.len() + 1);
        let mut previous = Endpoint::Source;
        for index in 0..nodes.len() {
            edges.push((previous, Endpoint::Node(index)));
            previous = Endpoint::Node(index);
        }
        edges.push((previous, Endpoint::Output));

        Self {
            effect,
            playback_rate,
            nodes,
            edges,
        }
    }

    /// Gain applied just before the output mix.
    pub fn output_gain(&self) -> f32 {
        self.nodes
            .iter()
            .rev()
            .find_map(|node| match node {
                NodeSpec::Gain { gain } => Some(*gain),
                _ => None,
            })
            .unwrap_or(1.0)
    }

    /// Pitch shift stage, if the effect has one.
    pub fn pitch_semitones(&self) -> Option<f32> {
        self.nodes.iter().find_map(|node| match node {
            NodeSpec::PitchShift { semitones } => Some(*semitones),
            _ => None,
        })
    }

    /// Wet fractions of the mixing stages, in chain order.
    pub fn wet_mixes(&self) -> Vec<f32> {
        self.nodes.iter().filter_map(NodeSpec::wet).collect()
    }

    /// Index of the analysis tap in [`Topology::nodes`].
    pub fn analyser_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| matches!(node, NodeSpec::Analyser { .. }))
    }
}

/// Length of an eighth note at `bpm`, in seconds.
pub fn eighth_note_secs(bpm: f32) -> f32 {
    60.0 / bpm / 2.0
}
