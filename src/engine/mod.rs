//! Engine lifecycle: the owned context that builds the graph, starts the
//! backend, runs the scheduler, and tears everything down again.
//!
//! Everything lives in an [`AudioEngine`] with an explicit play/stop
//! lifecycle; the only shared paths are the control surface and the
//! mutex-serialized backend handle.

/// Typed snapshot of the user-facing controls.
pub mod controls;
/// Transient stutter generation.
pub mod glitch;
/// Randomized modulation: tick logic and the cancellable loop.
pub mod scheduler;
/// Decoded source loops.
pub mod track;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::backend::{AudioBackend, BackendError, BackendState};
use crate::graph::builder::GraphBuilder;
use crate::graph::curve::Curve;
use crate::graph::node::{AudioGraph, GraphError, NodeKind};
use crate::graph::param::ParamName;
use crate::io::{DecodeError, Decoder};
use crate::profile::{ControlKind, EffectsProfile, ProfileError};
use crate::CONTROL_RAMP_SECS;

pub use controls::{ControlState, ControlSurface};
pub use glitch::{GlitchEngine, GlitchEvent};
pub use scheduler::{ModulationScheduler, Mutation, SchedulerCore, SchedulerState, TickReport};
pub use track::{Track, TrackId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no track registered with id {0:?}")]
    UnknownTrack(TrackId),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One playing track: its graph mirror and its scheduler.
struct Session {
    track: TrackId,
    graph: Arc<Mutex<AudioGraph>>,
    scheduler: ModulationScheduler,
}

/// The owned audio-engine context.
///
/// Construction validates the profile; `play` resumes the backend if
/// needed, installs a fresh graph, starts the looped source, and spawns
/// exactly one scheduler; `stop` cancels the scheduler *before* the graph
/// is disconnected, so a stale tick can never mutate a torn-down graph.
pub struct AudioEngine<B: AudioBackend> {
    backend: Arc<Mutex<B>>,
    profile: EffectsProfile,
    controls: ControlSurface,
    live: Arc<AtomicUsize>,
    seed: Option<u64>,
    session: Option<Session>,
}

impl<B: AudioBackend> AudioEngine<B> {
    pub fn new(backend: B, profile: EffectsProfile) -> Result<Self, EngineError> {
        profile.validate()?;
        Ok(Self {
            backend: Arc::new(Mutex::new(backend)),
            profile,
            controls: ControlSurface::default(),
            live: Arc::new(AtomicUsize::new(0)),
            seed: None,
            session: None,
        })
    }

    /// Pin the scheduler rng for reproducible sessions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn controls(&self) -> ControlSurface {
        self.controls.clone()
    }

    pub fn backend(&self) -> Arc<Mutex<B>> {
        self.backend.clone()
    }

    pub fn profile(&self) -> &EffectsProfile {
        &self.profile
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_track(&self) -> Option<TrackId> {
        self.session.as_ref().map(|s| s.track)
    }

    /// Scheduler loops currently alive. 1 while playing, 0 when stopped.
    pub fn active_schedulers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Start (or swap to) a decoded track.
    pub fn play(&mut self, track: Track) -> Result<(), EngineError> {
        self.stop();

        let graph = GraphBuilder::build(&self.profile)?;
        {
            let mut backend = lock(&self.backend);
            if backend.state() == BackendState::Suspended {
                backend.resume()?;
            }
            GraphBuilder::install(&graph, &track.buffer, &mut *backend)?;
            backend.start()?;
        }
        log::info!(
            "playing track {:?}: {:.2}s loop through profile `{}`",
            track.id,
            track.duration(),
            self.profile.name
        );

        let graph = Arc::new(Mutex::new(graph));
        let mut scheduler = ModulationScheduler::new(self.live.clone());
        scheduler.start(
            self.profile.clone(),
            graph.clone(),
            self.backend.clone(),
            self.controls.clone(),
            self.seed,
        );
        self.session = Some(Session {
            track: track.id,
            graph,
            scheduler,
        });
        Ok(())
    }

    /// Stop playback and tear the graph down. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            // Scheduler first: after cancel returns, no tick is in flight.
            session.scheduler.cancel();
            let mut backend = lock(&self.backend);
            backend.stop();
            backend.teardown();
            log::info!("track {:?} stopped", session.track);
        }
    }

    /// Push the current control values onto their bound parameters.
    pub fn apply_controls(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let state = self.controls.snapshot();
        let mut backend = lock(&self.backend);
        let mut graph = lock(&session.graph);
        let now = backend.now();

        for binding in &self.profile.bindings {
            let value = match binding.control {
                ControlKind::Volume => state.volume,
                ControlKind::DistortionAmount => state.distortion_amount,
                ControlKind::TremoloDepth => state.tremolo_depth,
            };
            let target = binding.offset + binding.scale * value;

            let Some(id) = graph.find_id(&binding.stage) else {
                continue;
            };
            let node = graph.node_mut(id);
            let Some(param) = node.param_mut(binding.param) else {
                continue;
            };

            let ramp = param.ramp_to(target, now, CONTROL_RAMP_SECS);
            backend.ramp(id, binding.param, ramp.target, now, CONTROL_RAMP_SECS);
            if node.kind() == NodeKind::WaveShaper && binding.param == ParamName::Amount {
                backend.set_curve(id, Curve::synthesize(ramp.target));
            }
        }
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Thin external-facing owner of the track registry and the engine.
pub struct TrackController<B: AudioBackend, D: Decoder> {
    engine: AudioEngine<B>,
    decoder: D,
    library: Vec<(TrackId, Vec<u8>)>,
}

impl<B: AudioBackend, D: Decoder> TrackController<B, D> {
    pub fn new(engine: AudioEngine<B>, decoder: D) -> Self {
        Self {
            engine,
            decoder,
            library: Vec::new(),
        }
    }

    pub fn engine(&self) -> &AudioEngine<B> {
        &self.engine
    }

    pub fn controls(&self) -> ControlSurface {
        self.engine.controls()
    }

    /// Register (or replace) the encoded bytes for a track id.
    pub fn register(&mut self, id: TrackId, bytes: Vec<u8>) {
        if let Some(entry) = self.library.iter_mut().find(|(t, _)| *t == id) {
            entry.1 = bytes;
        } else {
            self.library.push((id, bytes));
        }
    }

    /// Load and play a registered track: decode, stop whatever plays, then
    /// rebuild. Decoding happens first, so a decode failure is fatal to
    /// this load only and leaves current playback untouched.
    pub fn select(&mut self, id: TrackId) -> Result<(), EngineError> {
        let bytes = self
            .library
            .iter()
            .find(|(t, _)| *t == id)
            .map(|(_, b)| b.as_slice())
            .ok_or(EngineError::UnknownTrack(id))?;
        let buffer = self.decoder.decode(bytes)?;
        self.engine.controls.select_track(id);
        self.engine.play(Track::new(id, buffer))
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// React to a control-surface push: swap tracks if the selection moved,
    /// then map the remaining control values onto their bindings.
    pub fn sync_controls(&mut self) -> Result<(), EngineError> {
        let state = self.engine.controls.snapshot();
        if self.engine.is_playing() && self.engine.current_track() != Some(state.track) {
            self.select(state.track)?;
        }
        self.engine.apply_controls();
        Ok(())
    }
}
