use std::time::Instant;

use crate::backend::{AudioBackend, BackendError, BackendState};
use crate::graph::curve::Curve;
use crate::graph::node::{AudioGraph, NodeId};
use crate::graph::param::ParamName;
use crate::io::PcmBuffer;

/// Everything the engine asked a backend to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum AutomationEvent {
    Installed {
        nodes: usize,
        edges: usize,
    },
    Started,
    Stopped,
    Ramp {
        node: NodeId,
        param: ParamName,
        target: f32,
        at: f64,
        duration: f64,
    },
    CurveReplaced {
        node: NodeId,
        amount: f32,
        len: usize,
    },
    RateRamp {
        target: f32,
        at: f64,
        duration: f64,
    },
    Teardown,
}

/// A backend that renders nothing and records everything.
///
/// The clock is either manual (`advance`) for deterministic simulation or
/// wall-time for driving the threaded scheduler in demos. Starts
/// `Suspended` like a real platform backend.
pub struct OfflineBackend {
    state: BackendState,
    manual_clock: Option<f64>,
    epoch: Instant,
    installed: bool,
    playing: bool,
    fail_resume: bool,
    events: Vec<AutomationEvent>,
}

impl OfflineBackend {
    /// Manually clocked backend; time only moves through [`Self::advance`].
    pub fn new() -> Self {
        Self {
            state: BackendState::Suspended,
            manual_clock: Some(0.0),
            epoch: Instant::now(),
            installed: false,
            playing: false,
            fail_resume: false,
            events: Vec::new(),
        }
    }

    /// Wall-clock backend for driving the real scheduler loop.
    pub fn realtime() -> Self {
        Self {
            manual_clock: None,
            ..Self::new()
        }
    }

    /// Backend whose `resume` always fails, for the activation error path.
    pub fn with_resume_failure() -> Self {
        Self {
            fail_resume: true,
            ..Self::new()
        }
    }

    /// Advance the manual clock by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if let Some(clock) = self.manual_clock.as_mut() {
            *clock += dt;
        }
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Ramps recorded for one parameter, in issue order.
    pub fn ramps_for(&self, node: NodeId, param: ParamName) -> Vec<&AutomationEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, AutomationEvent::Ramp { node: n, param: p, .. } if *n == node && *p == param))
            .collect()
    }

    pub fn rate_ramps(&self) -> Vec<&AutomationEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, AutomationEvent::RateRamp { .. }))
            .collect()
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn state(&self) -> BackendState {
        self.state
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        if self.fail_resume {
            return Err(BackendError::ResumeFailed(
                "activation policy rejected resume".into(),
            ));
        }
        self.state = BackendState::Running;
        Ok(())
    }

    fn now(&self) -> f64 {
        match self.manual_clock {
            Some(clock) => clock,
            None => self.epoch.elapsed().as_secs_f64(),
        }
    }

    fn install(&mut self, graph: &AudioGraph, _source: &PcmBuffer) -> Result<(), BackendError> {
        if self.state == BackendState::Suspended {
            return Err(BackendError::Suspended);
        }
        self.installed = true;
        self.events.push(AutomationEvent::Installed {
            nodes: graph.nodes().len(),
            edges: graph.edges().len(),
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), BackendError> {
        if !self.installed {
            return Err(BackendError::NoGraph);
        }
        self.playing = true;
        self.events.push(AutomationEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.events.push(AutomationEvent::Stopped);
        }
    }

    fn ramp(&mut self, node: NodeId, param: ParamName, target: f32, at: f64, duration: f64) {
        self.events.push(AutomationEvent::Ramp {
            node,
            param,
            target,
            at,
            duration,
        });
    }

    fn set_curve(&mut self, node: NodeId, curve: Curve) {
        self.events.push(AutomationEvent::CurveReplaced {
            node,
            amount: curve.amount(),
            len: curve.len(),
        });
    }

    fn ramp_rate(&mut self, target: f32, at: f64, duration: f64) {
        self.events.push(AutomationEvent::RateRamp {
            target,
            at,
            duration,
        });
    }

    fn teardown(&mut self) {
        if self.installed {
            self.installed = false;
            self.playing = false;
            self.events.push(AutomationEvent::Teardown);
        }
    }
}
