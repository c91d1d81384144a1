use crate::{
    AudioError, CoreResult,
    audio::{
        NodeId, PlayerState,
        render::dsp::{Player, Processor},
    },
};

use std::{
    collections::{BTreeMap, VecDeque},
    panic::Location,
};

use dasp_graph::{Buffer, Input, NodeData};
use error_location::ErrorLocation;
use petgraph::{
    Direction,
    algo::has_path_connecting,
    stable_graph::{NodeIndex, StableGraph},
};

type Graph = StableGraph<NodeData<NodeKind>, ()>;

/// Where a node sends its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Node(NodeId),
    Output,
}

pub(crate) enum NodeKind {
    Player(Player),
    Stage(Box<dyn Processor>),
    /// Sums its inputs. The graph's output node is the only one.
    Mix,
}

impl dasp_graph::Node for NodeKind {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        let Some(out) = output.first_mut() else {
            return;
        };
        match self {
            NodeKind::Player(player) => player.read(out),
            NodeKind::Stage(stage) => {
                sum_inputs(inputs, out);
                stage.process(out);
            }
            NodeKind::Mix => sum_inputs(inputs, out),
        }
    }
}

fn sum_inputs(inputs: &[Input], out: &mut Buffer) {
    out.silence();
    for buffer in inputs.iter().flat_map(|input| input.buffers()) {
        for (mixed, sample) in out.iter_mut().zip(buffer.iter()) {
            *mixed += sample;
        }
    }
}

/// Node storage and block rendering for the software engine.
///
/// Each node has at most one downstream target; connecting again replaces
/// it. Blocks of [`Buffer::LEN`] samples are pulled from the output mix
/// node, so only chains that reach the output are processed.
pub struct RenderGraph {
    sample_rate: u32,
    graph: Graph,
    indices: BTreeMap<NodeId, NodeIndex>,
    output: NodeIndex,
    pending: VecDeque<f32>,
}

impl RenderGraph {
    pub(crate) fn new(sample_rate: u32) -> Self {
        let mut graph = Graph::default();
        let output = graph.add_node(NodeData::new1(NodeKind::Mix));
        Self {
            sample_rate,
            graph,
            indices: BTreeMap::new(),
            output,
            pending: VecDeque::with_capacity(Buffer::LEN),
        }
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Number of live nodes, not counting the output mix.
    pub fn node_count(&self) -> usize {
        self.indices.len()
    }

    pub(crate) fn insert(&mut self, id: NodeId, kind: NodeKind) {
        let index = self.graph.add_node(NodeData::new1(kind));
        if let Some(replaced) = self.indices.insert(id, index) {
            self.graph.remove_node(replaced);
        }
    }

    #[track_caller]
    pub(crate) fn connect(&mut self, from: NodeId, target: Target) -> CoreResult<()> {
        let source = self.index(from)?;
        let destination = match target {
            Target::Output => self.output,
            Target::Node(to) => {
                if to == from {
                    return Err(engine_error(format!("Cannot connect {} to itself", from)));
                }
                let destination = self.index(to)?;
                if matches!(self.graph[destination].node, NodeKind::Player(_)) {
                    return Err(engine_error(format!("Player {} has no input", to)));
                }
                if has_path_connecting(&self.graph, destination, source, None) {
                    return Err(engine_error(format!(
                        "Connecting {} to {} would create a cycle",
                        from, to
                    )));
                }
                destination
            }
        };

        let previous: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(source, Direction::Outgoing)
            .collect();
        for neighbour in previous {
            if let Some(edge) = self.graph.find_edge(source, neighbour) {
                self.graph.remove_edge(edge);
            }
        }
        self.graph.add_edge(source, destination, ());
        Ok(())
    }

    #[track_caller]
    pub(crate) fn start(&mut self, id: NodeId) -> CoreResult<()> {
        let index = self.index(id)?;
        match &mut self.graph[index].node {
            NodeKind::Player(player) => {
                player.start();
                Ok(())
            }
            _ => Err(engine_error(format!("{} is not a player", id))),
        }
    }

    pub(crate) fn stop(&mut self, id: NodeId) {
        if let Some(NodeKind::Player(player)) = self.node_mut(id) {
            player.stop();
        }
    }

    pub(crate) fn player_state(&self, id: NodeId) -> PlayerState {
        let node = self
            .indices
            .get(&id)
            .and_then(|index| self.graph.node_weight(*index));
        match node {
            Some(NodeData {
                node: NodeKind::Player(player),
                ..
            }) => player.state(),
            _ => PlayerState::Stopped,
        }
    }

    /// Removes a node and every connection into or out of it.
    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        match self.indices.remove(&id) {
            Some(index) => self.graph.remove_node(index).is_some(),
            None => false,
        }
    }

    /// Renders one mono block of any length into `out`.
    pub fn render(&mut self, out: &mut [f32]) {
        // The processor borrows input buffers through raw pointers, which
        // keeps it off the shared graph.
        let mut processor = dasp_graph::Processor::with_capacity(self.graph.node_count());

        for sample in out.iter_mut() {
            if self.pending.is_empty() {
                processor.process(&mut self.graph, self.output);
                if let Some(mixed) = self.graph[self.output].buffers.first() {
                    self.pending.extend(mixed.iter().copied());
                }
            }
            *sample = self.pending.pop_front().unwrap_or(0.0);
        }
    }

    #[track_caller]
    fn index(&self, id: NodeId) -> CoreResult<NodeIndex> {
        self.indices
            .get(&id)
            .copied()
            .ok_or_else(|| engine_error(format!("Unknown node {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        let index = *self.indices.get(&id)?;
        self.graph.node_weight_mut(index).map(|data| &mut data.node)
    }
}

#[track_caller]
fn engine_error(reason: String) -> AudioError {
    AudioError::EngineError {
        reason,
        location: ErrorLocation::from(Location::caller()),
    }
}
