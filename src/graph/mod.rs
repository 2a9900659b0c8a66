//! Declarative description of the effect signal graph.
//!
//! Nothing in this module renders audio. The graph is data: node kinds with
//! named, ranged parameters, edges between audio inputs and parameter ports,
//! and an immutable waveshaper transfer table. The external backend consumes
//! the description and applies ramp automation sample-accurately; the engine
//! keeps this mirror so ramps always start from the value a parameter holds
//! "now".

/// EffectsProfile -> AudioGraph construction and validation.
pub mod builder;
/// Waveshaper transfer-curve synthesis.
pub mod curve;
/// Node kinds, ports, edges, and the graph container.
pub mod node;
/// Shared Parameter / RampState abstraction.
pub mod param;

pub use builder::GraphBuilder;
pub use curve::Curve;
pub use node::{AudioGraph, Edge, GraphError, Node, NodeId, NodeKind, Port};
pub use param::{ParamName, Parameter, RampState};
