use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::param::{ParamName, Parameter};

/*
Graph Description
=================

An AudioGraph is an ordered, acyclic set of nodes with directed edges, one
entry (fed by the looping source) and one terminal sink. Nodes may fan out
to several children (a dry/wet split); the sink receives the sum.

Edges carry their destination as a port:

  Port::Input(node)        audio flows into the node
  Port::Param(node, name)  the edge modulates a named parameter

Parameter ports are what let both supported tremolo topologies be data
rather than code branches: oscillator -> depth gain -> Param(tremolo, gain)
for the depth-staged variant, oscillator -> Param(tremolo, gain) for the
direct-coupled one.
*/

/// The fixed set of processing-stage kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Gain,
    LowpassFilter,
    Delay,
    WaveShaper,
    Compressor,
    Oscillator,
    AmplitudeModulator,
}

impl NodeKind {
    /// The parameters a kind owns: (name, default, min, max).
    pub fn params(&self) -> &'static [(ParamName, f32, f32, f32)] {
        match self {
            NodeKind::Gain => &[(ParamName::Gain, 1.0, 0.0, 2.0)],
            NodeKind::LowpassFilter => &[(ParamName::Cutoff, 8_000.0, 20.0, 20_000.0)],
            NodeKind::Delay => &[(ParamName::DelayTime, 0.1, 0.0, 1.0)],
            NodeKind::WaveShaper => &[(ParamName::Amount, 5.0, 0.0, 100.0)],
            NodeKind::Compressor => &[
                (ParamName::Threshold, -30.0, -100.0, 0.0),
                (ParamName::Knee, 20.0, 0.0, 40.0),
                (ParamName::Ratio, 3.0, 1.0, 20.0),
                (ParamName::Attack, 0.003, 0.0, 1.0),
                (ParamName::Release, 0.25, 0.0, 1.0),
            ],
            NodeKind::Oscillator => &[(ParamName::Frequency, 0.25, 0.01, 20.0)],
            NodeKind::AmplitudeModulator => &[(ParamName::Gain, 0.95, 0.0, 1.0)],
        }
    }

    pub fn has_param(&self, name: ParamName) -> bool {
        self.params().iter().any(|(p, _, _, _)| *p == name)
    }
}

/// Index of a node within its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One stage of the signal-processing graph.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    label: String,
    params: Vec<Parameter>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, label: impl Into<String>) -> Self {
        let params = kind
            .params()
            .iter()
            .map(|&(name, default, min, max)| Parameter::new(name, default, min, max))
            .collect();
        Self {
            id,
            kind,
            label: label.into(),
            params,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, name: ParamName) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn param_mut(&mut self, name: ParamName) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }
}

/// Edge destination: an audio input or a modulated parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    Input(NodeId),
    Param(NodeId, ParamName),
}

impl Port {
    pub fn node(&self) -> NodeId {
        match self {
            Port::Input(id) => *id,
            Port::Param(id, _) => *id,
        }
    }
}

/// A directed connection between two nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: Port,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no stages")]
    Empty,
    #[error("duplicate stage label `{0}`")]
    DuplicateLabel(String),
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("stage `{stage}` ({kind:?}) has no parameter `{param}`")]
    UnknownParam {
        stage: String,
        kind: NodeKind,
        param: ParamName,
    },
    #[error("stage `{0}` is fed from the source but never reaches the sink")]
    DeadEnd(String),
    #[error("stage `{0}` is neither on the audio path nor a modulator")]
    Disconnected(String),
    #[error("entry stage `{0}` does not reach the sink")]
    EntryCutOff(String),
}

/// The complete, validated description of an effect chain.
#[derive(Clone, Debug)]
pub struct AudioGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entry: NodeId,
    sink: NodeId,
}

impl AudioGraph {
    pub(crate) fn new(nodes: Vec<Node>, edges: Vec<Edge>, entry: NodeId, sink: NodeId) -> Self {
        Self {
            nodes,
            edges,
            entry,
            sink,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn sink(&self) -> NodeId {
        self.sink
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Look a node up by its profile stage label.
    pub fn find(&self, label: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn find_id(&self, label: &str) -> Option<NodeId> {
        self.find(label).map(|n| n.id)
    }

    /// Check the structural invariants.
    ///
    /// Every node fed (transitively) from the entry must reach the sink, and
    /// every node off the audio path must be part of a modulator branch that
    /// terminates in a parameter port. Parameter ports must name parameters
    /// their target kind actually owns.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        for edge in &self.edges {
            if let Port::Param(id, param) = edge.to {
                let node = self.node(id);
                if !node.kind.has_param(param) {
                    return Err(GraphError::UnknownParam {
                        stage: node.label.clone(),
                        kind: node.kind,
                        param,
                    });
                }
            }
        }

        let forward = self.reach_forward(self.entry);
        let backward = self.reach_backward(self.sink);

        if !forward[self.sink.0] {
            return Err(GraphError::EntryCutOff(
                self.node(self.entry).label.clone(),
            ));
        }

        for node in &self.nodes {
            let on_path = forward[node.id.0];
            if on_path && !backward[node.id.0] {
                return Err(GraphError::DeadEnd(node.label.clone()));
            }
            if !on_path && !self.feeds_param(node.id) {
                return Err(GraphError::Disconnected(node.label.clone()));
            }
        }

        Ok(())
    }

    /// Nodes reachable from `start` along audio-input edges.
    fn reach_forward(&self, start: NodeId) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            for edge in &self.edges {
                if edge.from == id {
                    if let Port::Input(next) = edge.to {
                        stack.push(next);
                    }
                }
            }
        }
        seen
    }

    /// Nodes that reach `end` along audio-input edges.
    fn reach_backward(&self, end: NodeId) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![end];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            for edge in &self.edges {
                if let Port::Input(to) = edge.to {
                    if to == id {
                        stack.push(edge.from);
                    }
                }
            }
        }
        seen
    }

    /// Whether `id` (transitively) drives some parameter port.
    fn feeds_param(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            for edge in &self.edges {
                if edge.from == id {
                    match edge.to {
                        Port::Param(_, _) => return true,
                        Port::Input(next) => stack.push(next),
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(kinds: &[(NodeKind, &str)]) -> (Vec<Node>, Vec<Edge>) {
        let nodes: Vec<Node> = kinds
            .iter()
            .enumerate()
            .map(|(i, (kind, label))| Node::new(NodeId(i), *kind, *label))
            .collect();
        let edges = (1..nodes.len())
            .map(|i| Edge {
                from: NodeId(i - 1),
                to: Port::Input(NodeId(i)),
            })
            .collect();
        (nodes, edges)
    }

    #[test]
    fn serial_chain_validates() {
        let (nodes, edges) = chain(&[
            (NodeKind::LowpassFilter, "filter"),
            (NodeKind::Delay, "echo"),
            (NodeKind::Gain, "level"),
        ]);
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(2));
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn dead_end_branch_is_rejected() {
        let (mut nodes, mut edges) = chain(&[
            (NodeKind::LowpassFilter, "filter"),
            (NodeKind::Gain, "level"),
        ]);
        // A delay fed from the filter that never rejoins the chain.
        nodes.push(Node::new(NodeId(2), NodeKind::Delay, "orphan"));
        edges.push(Edge {
            from: NodeId(0),
            to: Port::Input(NodeId(2)),
        });
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(1));
        assert_eq!(graph.validate(), Err(GraphError::DeadEnd("orphan".into())));
    }

    #[test]
    fn modulator_branch_is_allowed() {
        let (mut nodes, mut edges) = chain(&[
            (NodeKind::LowpassFilter, "filter"),
            (NodeKind::AmplitudeModulator, "tremolo"),
            (NodeKind::Gain, "level"),
        ]);
        nodes.push(Node::new(NodeId(3), NodeKind::Oscillator, "lfo"));
        nodes.push(Node::new(NodeId(4), NodeKind::Gain, "depth"));
        edges.push(Edge {
            from: NodeId(3),
            to: Port::Input(NodeId(4)),
        });
        edges.push(Edge {
            from: NodeId(4),
            to: Port::Param(NodeId(1), ParamName::Gain),
        });
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(2));
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn floating_node_is_rejected() {
        let (mut nodes, edges) = chain(&[
            (NodeKind::LowpassFilter, "filter"),
            (NodeKind::Gain, "level"),
        ]);
        nodes.push(Node::new(NodeId(2), NodeKind::Oscillator, "lfo"));
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(1));
        assert_eq!(
            graph.validate(),
            Err(GraphError::Disconnected("lfo".into()))
        );
    }

    #[test]
    fn param_port_must_exist_on_kind() {
        let (mut nodes, mut edges) = chain(&[
            (NodeKind::LowpassFilter, "filter"),
            (NodeKind::Gain, "level"),
        ]);
        nodes.push(Node::new(NodeId(2), NodeKind::Oscillator, "lfo"));
        edges.push(Edge {
            from: NodeId(2),
            to: Port::Param(NodeId(0), ParamName::DelayTime),
        });
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(1));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::UnknownParam { .. })
        ));
    }

    #[test]
    fn fan_out_rejoin_validates() {
        // Dry/wet split: filter feeds both the delay and the mix directly.
        let mut nodes = vec![
            Node::new(NodeId(0), NodeKind::LowpassFilter, "filter"),
            Node::new(NodeId(1), NodeKind::Delay, "echo"),
            Node::new(NodeId(2), NodeKind::Gain, "mix"),
        ];
        nodes[1].param_mut(ParamName::DelayTime).unwrap().snap_to(0.2);
        let edges = vec![
            Edge {
                from: NodeId(0),
                to: Port::Input(NodeId(1)),
            },
            Edge {
                from: NodeId(0),
                to: Port::Input(NodeId(2)),
            },
            Edge {
                from: NodeId(1),
                to: Port::Input(NodeId(2)),
            },
        ];
        let graph = AudioGraph::new(nodes, edges, NodeId(0), NodeId(2));
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn kind_default_params_are_in_range() {
        for kind in [
            NodeKind::Gain,
            NodeKind::LowpassFilter,
            NodeKind::Delay,
            NodeKind::WaveShaper,
            NodeKind::Compressor,
            NodeKind::Oscillator,
            NodeKind::AmplitudeModulator,
        ] {
            for &(name, default, min, max) in kind.params() {
                assert!(min < max, "{:?}.{} has an empty range", kind, name);
                assert!(
                    default >= min && default <= max,
                    "{:?}.{} default {} outside [{}, {}]",
                    kind,
                    name,
                    default,
                    min,
                    max
                );
            }
        }
    }
}
