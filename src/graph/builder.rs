use crate::backend::{AudioBackend, BackendError};
use crate::graph::node::{AudioGraph, Edge, GraphError, Node, NodeId, Port};
use crate::io::PcmBuffer;
use crate::profile::EffectsProfile;

/*
GraphBuilder
============

Turns an EffectsProfile's stage/wire lists into a validated AudioGraph.
The builder is deliberately dumb: every topology difference between the
shipped variants (compressor or not, depth-staged or direct tremolo
coupling, inline or parallel delay) is profile data, so there is exactly
one construction path.

Construction:
  1. instantiate each stage with its kind's default parameters,
  2. apply the profile's parameter overrides,
  3. resolve name-based wires into NodeId edges (audio or param ports),
  4. validate the structural invariants.

`install` is the single place the builder side touches the external
backend: it hands over the finished description together with the decoded
source buffer.
*/

pub struct GraphBuilder;

impl GraphBuilder {
    /// Build and validate the graph a profile describes.
    pub fn build(profile: &EffectsProfile) -> Result<AudioGraph, GraphError> {
        if profile.stages.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut nodes = Vec::with_capacity(profile.stages.len());
        for (i, spec) in profile.stages.iter().enumerate() {
            if profile.stages[..i].iter().any(|s| s.name == spec.name) {
                return Err(GraphError::DuplicateLabel(spec.name.clone()));
            }
            let mut node = Node::new(NodeId(i), spec.kind, &spec.name);
            for o in &spec.params {
                let param = node
                    .param_mut(o.param)
                    .ok_or_else(|| GraphError::UnknownParam {
                        stage: spec.name.clone(),
                        kind: spec.kind,
                        param: o.param,
                    })?;
                param.snap_to(o.value);
            }
            nodes.push(node);
        }

        let find = |label: &str| -> Result<NodeId, GraphError> {
            nodes
                .iter()
                .find(|n| n.label() == label)
                .map(|n| n.id())
                .ok_or_else(|| GraphError::UnknownStage(label.to_string()))
        };

        let mut edges = Vec::with_capacity(profile.wires.len());
        for w in &profile.wires {
            let from = find(&w.from)?;
            let to = match w.param {
                Some(param) => Port::Param(find(&w.to)?, param),
                None => Port::Input(find(&w.to)?),
            };
            edges.push(Edge { from, to });
        }

        let entry = find(&profile.entry)?;
        let sink = find(&profile.sink)?;

        let graph = AudioGraph::new(nodes, edges, entry, sink);
        graph.validate()?;
        Ok(graph)
    }

    /// Wire the finished graph and its source loop into the live backend.
    pub fn install<B: AudioBackend>(
        graph: &AudioGraph,
        source: &PcmBuffer,
        backend: &mut B,
    ) -> Result<(), BackendError> {
        backend.install(graph, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeKind;
    use crate::graph::param::ParamName;
    use crate::profile::{Span, WireSpec};

    #[test]
    fn builds_the_drift_chain() {
        let graph = GraphBuilder::build(&EffectsProfile::drift()).unwrap();

        assert_eq!(graph.nodes().len(), 8);
        assert_eq!(graph.node(graph.entry()).label(), "filter");
        assert_eq!(graph.node(graph.sink()).kind(), NodeKind::Compressor);

        // Profile overrides land on the parameters.
        let level = graph.find("level").unwrap();
        assert!((level.param(ParamName::Gain).unwrap().value_at(0.0) - 0.9).abs() < 1e-6);

        // Kind defaults survive where not overridden.
        let filter = graph.find("filter").unwrap();
        assert!((filter.param(ParamName::Cutoff).unwrap().value_at(0.0) - 8_000.0).abs() < 1e-3);

        // The tremolo coupling arrives as a parameter port.
        let tremolo = graph.find_id("tremolo").unwrap();
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.to == Port::Param(tremolo, ParamName::Gain)));
    }

    #[test]
    fn builds_the_sparse_chain_with_parallel_delay() {
        let graph = GraphBuilder::build(&EffectsProfile::sparse()).unwrap();

        assert_eq!(graph.nodes().len(), 5);
        assert!(graph.find("comp").is_none());

        // Fan-out: the filter feeds both the delay and the tremolo.
        let filter = graph.find_id("filter").unwrap();
        let fan_out = graph
            .edges()
            .iter()
            .filter(|e| e.from == filter && matches!(e.to, Port::Input(_)))
            .count();
        assert_eq!(fan_out, 2);

        // Direct oscillator coupling, no depth stage in between.
        let tremolo = graph.find_id("tremolo").unwrap();
        let lfo = graph.find_id("lfo").unwrap();
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.from == lfo && e.to == Port::Param(tremolo, ParamName::Gain)));
    }

    #[test]
    fn unknown_wire_stage_fails() {
        let mut profile = EffectsProfile::drift();
        profile.wires.push(WireSpec {
            from: "reverb".into(),
            to: "level".into(),
            param: None,
        });
        assert!(matches!(
            GraphBuilder::build(&profile),
            Err(GraphError::UnknownStage(stage)) if stage == "reverb"
        ));
    }

    #[test]
    fn override_on_missing_param_fails() {
        let mut profile = EffectsProfile::drift();
        profile.stages[0]
            .params
            .push(crate::profile::ParamOverride {
                param: ParamName::DelayTime,
                value: 0.5,
            });
        assert!(matches!(
            GraphBuilder::build(&profile),
            Err(GraphError::UnknownParam { .. })
        ));
    }

    #[test]
    fn scenario_defaults_match_profile_ranges() {
        // The drift preset's declared mutation ranges sit inside the
        // parameters' valid ranges, so sampled targets never clamp.
        let graph = GraphBuilder::build(&EffectsProfile::drift()).unwrap();
        let profile = EffectsProfile::drift();
        for t in &profile.targets {
            let node = graph.find(&t.stage).unwrap();
            let param = node.param(t.param).unwrap();
            let Span { min, max } = t.range;
            assert!(min >= param.min() && max <= param.max());
        }
    }
}
