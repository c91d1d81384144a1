use crate::{
    Analyser, AudioError, CoreResult, Recording, RecordingId,
    audio::{Effect, Endpoint, NodeId, NodeSpec, PlayerState, SignalEngine, Topology},
};

use std::{panic::Location, sync::Arc};

use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument};

/// Owns the single active playback graph.
///
/// Starting a playback always tears down the previous graph first, so at
/// most one player exists at any time.
pub struct PlaybackController<E: SignalEngine> {
    engine: Arc<E>,
    active: Option<ActiveGraph>,
    analyser: Option<Analyser>,
}

struct ActiveGraph {
    player: NodeId,
    nodes: Vec<NodeId>,
    effect: Effect,
    recording_id: RecordingId,
}

struct BuiltGraph {
    player: NodeId,
    nodes: Vec<NodeId>,
    analyser: Analyser,
}

impl<E: SignalEngine> PlaybackController<E> {
    /// Creates a controller with nothing playing.
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            active: None,
            analyser: None,
        }
    }

    /// Plays `recording` from the start through the `effect` chain.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::DecodeFailure`] for undecodable audio, or the
    /// engine's error if the context cannot start or the graph cannot be
    /// built. On error no player is left active and no node stays allocated.
    #[instrument(skip(self, recording), fields(recording_id = %recording.id()))]
    pub async fn play_with_effect(&mut self, recording: &Recording, effect: Effect) -> CoreResult<()> {
        self.stop_playback();

        self.engine.ensure_running().await?;

        let buffer = match self.engine.decode(recording.audio_data()).await {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(error = %e, media_type = recording.media_type(), "Failed to decode recording");
                return Err(e);
            }
        };

        let topology = Topology::for_effect(effect);
        let graph = self.build_graph(buffer, &topology)?;

        if let Err(e) = self.engine.start(graph.player) {
            self.release(graph.player, &graph.nodes);
            return Err(e);
        }

        info!(
            effect = %effect,
            playback_rate = topology.playback_rate,
            output_gain = topology.output_gain(),
            stage_count = graph.nodes.len(),
            "Playback started"
        );

        self.active = Some(ActiveGraph {
            player: graph.player,
            nodes: graph.nodes,
            effect,
            recording_id: recording.id(),
        });
        self.analyser = Some(graph.analyser);

        Ok(())
    }

    /// Stops and releases the active graph. No-op when nothing plays.
    #[instrument(skip(self))]
    pub fn stop_playback(&mut self) {
        if let Some(graph) = self.active.take() {
            self.release(graph.player, &graph.nodes);
            info!(
                recording_id = %graph.recording_id,
                effect = %graph.effect,
                "Playback stopped"
            );
        }
        self.analyser = None;
    }

    /// Whether the active player is producing audio.
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|graph| self.engine.player_state(graph.player) == PlayerState::Started)
    }

    /// Analysis tap of the active graph.
    pub fn get_analyser(&self) -> Option<Analyser> {
        self.analyser.clone()
    }

    /// Effect of the active graph.
    pub fn current_effect(&self) -> Option<Effect> {
        self.active.as_ref().map(|graph| graph.effect)
    }

    fn build_graph(&self, buffer: E::Buffer, topology: &Topology) -> CoreResult<BuiltGraph> {
        let mut created = Vec::with_capacity(topology.nodes.len() + 1);

        match self.wire(buffer, topology, &mut created) {
            Ok(graph) => Ok(graph),
            Err(e) => {
                error!(error = %e, node_count = created.len(), "Failed to build playback graph");
                for node in created.into_iter().rev() {
                    self.engine.dispose(node);
                }
                Err(e)
            }
        }
    }

    fn wire(
        &self,
        buffer: E::Buffer,
        topology: &Topology,
        created: &mut Vec<NodeId>,
    ) -> CoreResult<BuiltGraph> {
        let player = self.engine.create_player(buffer, topology.playback_rate)?;
        created.push(player);

        let mut analyser = None;
        let mut stages = Vec::with_capacity(topology.nodes.len());
        for spec in &topology.nodes {
            let id = match spec {
                NodeSpec::Analyser { fft_size } => {
                    let (id, tap) = self.engine.create_analyser(*fft_size)?;
                    analyser = Some(tap);
                    id
                }
                other => self.engine.create_node(other)?,
            };
            created.push(id);
            stages.push(id);
        }

        for &(from, to) in &topology.edges {
            let from = resolve(from, player, &stages)?;
            match to {
                Endpoint::Output => self.engine.connect_to_output(from)?,
                to => self.engine.connect(from, resolve(to, player, &stages)?)?,
            }
        }

        let analyser = analyser.ok_or_else(|| AudioError::EngineError {
            reason: format!("Topology for '{}' has no analysis tap", topology.effect),
            location: ErrorLocation::from(Location::caller()),
        })?;

        debug!(player = %player, stages = ?stages, "Playback graph wired");

        Ok(BuiltGraph {
            player,
            nodes: stages,
            analyser,
        })
    }

    fn release(&self, player: NodeId, nodes: &[NodeId]) {
        self.engine.stop(player);
        self.engine.dispose(player);
        for &node in nodes {
            self.engine.dispose(node);
        }
    }
}

impl<E: SignalEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.stop_playback();
    }
}

#[track_caller]
fn resolve(endpoint: Endpoint, player: NodeId, stages: &[NodeId]) -> CoreResult<NodeId> {
    match endpoint {
        Endpoint::Source => Ok(player),
        Endpoint::Node(index) => stages.get(index).copied().ok_or(AudioError::EngineError {
            reason: format!("Topology references missing node {}", index),
            location: ErrorLocation::from(Location::caller()),
        }),
        Endpoint::Output => Err(AudioError::EngineError {
            reason: "Output mix cannot feed another node".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
