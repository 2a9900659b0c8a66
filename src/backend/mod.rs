//! The consumed rendering boundary.
//!
//! The engine never touches samples. It declares a graph, starts a looped
//! source, and issues smoothed parameter automation; a backend applies all
//! of that sample-accurately at its own clock rate. Backends start
//! `Suspended` and require an explicit `resume` before anything can render
//! (platform policy: audio must not start without prior user activation).

/// Recording backend for simulation, tests, and the demo binary.
pub mod offline;

use thiserror::Error;

use crate::graph::curve::Curve;
use crate::graph::node::{AudioGraph, NodeId};
use crate::graph::param::ParamName;
use crate::io::PcmBuffer;

pub use offline::{AutomationEvent, OfflineBackend};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendState {
    /// No audio may render; `resume` required first.
    Suspended,
    Running,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend is suspended and needs a resume before playback")]
    Suspended,
    #[error("resume failed: {0}")]
    ResumeFailed(String),
    #[error("no graph installed")]
    NoGraph,
    #[error("backend error: {0}")]
    Other(String),
}

/// Declarative rendering backend.
///
/// All automation is last-writer-wins per parameter: a `ramp` call fully
/// replaces whatever automation was previously scheduled for that
/// parameter, matching the engine-side [`crate::graph::Parameter`] mirror.
pub trait AudioBackend: Send + 'static {
    fn state(&self) -> BackendState;

    /// Transition out of `Suspended`. Failure is surfaced, never retried
    /// silently.
    fn resume(&mut self) -> Result<(), BackendError>;

    /// The backend's clock, in seconds.
    fn now(&self) -> f64;

    /// Create the nodes of `graph`, connect them, and wire the looped
    /// source buffer into the entry node.
    fn install(&mut self, graph: &AudioGraph, source: &PcmBuffer) -> Result<(), BackendError>;

    /// Begin looped playback of the installed source.
    fn start(&mut self) -> Result<(), BackendError>;

    /// Stop playback. Idempotent.
    fn stop(&mut self);

    /// Schedule a linear ramp on a node parameter, replacing any automation
    /// previously pending on it.
    fn ramp(&mut self, node: NodeId, param: ParamName, target: f32, at: f64, duration: f64);

    /// Replace a waveshaper's transfer table wholesale. The previous table
    /// stays valid until the swap.
    fn set_curve(&mut self, node: NodeId, curve: Curve);

    /// Schedule a linear ramp on the source's playback rate.
    fn ramp_rate(&mut self, target: f32, at: f64, duration: f64);

    /// Disconnect and drop the installed graph. Idempotent.
    fn teardown(&mut self);
}
