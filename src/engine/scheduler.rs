use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::backend::AudioBackend;
use crate::engine::controls::{ControlState, ControlSurface};
use crate::engine::glitch::{GlitchEngine, GlitchEvent};
use crate::graph::curve::Curve;
use crate::graph::node::{AudioGraph, NodeKind};
use crate::graph::param::ParamName;
use crate::profile::{ControlKind, EffectsProfile};

/*
Modulation Scheduler
====================

The scheduler is what keeps the texture alive without anyone touching a
control: on an irregular cadence it rolls a die for every modulatable
parameter the profile declares and re-targets the winners with smooth
ramps.

Two layers:

  SchedulerCore        pure tick logic. Owns the rng and the glitch
                       engine; given the graph, the backend handle, a
                       control snapshot, and "now", it performs one tick
                       and reports what it did. Deterministic under a
                       seeded rng, so every property is testable without
                       threads or clocks.

  ModulationScheduler  the cancellable loop. Idle -> Running -> Cancelled.
                       One thread, one pending wait, so ticks can never
                       overlap and a late tick can never fire into a
                       disconnected graph: `cancel` flips the flag, wakes
                       the loop through the channel, and joins the thread.
                       When it returns, no further tick can execute.

The first tick fires immediately on start, then the sampled cadence
applies.
*/

/// One parameter re-target decided by a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    pub stage: String,
    pub param: ParamName,
    pub target: f32,
    pub duration: f64,
}

/// What a single tick did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub mutations: Vec<Mutation>,
    pub glitch: Option<GlitchEvent>,
}

/// The deterministic tick state machine.
pub struct SchedulerCore {
    profile: EffectsProfile,
    rng: fastrand::Rng,
    glitch: GlitchEngine,
}

impl SchedulerCore {
    /// `seed` pins the rng for reproducible sessions; `None` seeds from
    /// entropy.
    pub fn new(profile: EffectsProfile, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let glitch = GlitchEngine::new(profile.glitch.clone());
        Self {
            profile,
            rng,
            glitch,
        }
    }

    /// Sample the next inter-tick interval in seconds.
    pub fn next_interval(&mut self) -> f64 {
        self.profile.tick_secs.sample(&mut self.rng)
    }

    /// Perform one tick: roll each declared target, issue winning ramps,
    /// regenerate the waveshaper curve when its amount moves, and maybe
    /// fire a glitch.
    pub fn tick<B: AudioBackend + ?Sized>(
        &mut self,
        graph: &mut AudioGraph,
        backend: &mut B,
        controls: &ControlState,
        now: f64,
    ) -> TickReport {
        let Self {
            profile,
            rng,
            glitch,
        } = self;

        let mut mutations = Vec::new();
        for t in &profile.targets {
            if rng.f64() >= t.chance {
                continue;
            }
            let target = t.range.sample(rng);
            let duration = t.ramp_secs.sample(rng);

            let Some(id) = graph.find_id(&t.stage) else {
                continue;
            };
            let node = graph.node_mut(id);
            let Some(param) = node.param_mut(t.param) else {
                continue;
            };

            let ramp = param.ramp_to(target, now, duration);
            backend.ramp(id, t.param, ramp.target, now, duration);

            // An amount change means a fresh transfer table, swapped
            // wholesale. The old table stays valid until the swap lands.
            if node.kind() == NodeKind::WaveShaper && t.param == ParamName::Amount {
                backend.set_curve(id, Curve::synthesize(ramp.target));
            }

            mutations.push(Mutation {
                stage: t.stage.clone(),
                param: t.param,
                target: ramp.target,
                duration,
            });
        }

        let glitch_event = glitch.maybe_trigger(rng, controls.glitch_intensity, now);
        if let Some(event) = &glitch_event {
            let half = event.duration / 2.0;
            backend.ramp_rate(event.rate_peak, event.start, half);
            backend.ramp_rate(1.0, event.midpoint(), half);

            // The gain dip rides on whatever stage the volume control is
            // bound to; both ramps return it to its pre-event baseline, so
            // the engine-side mirror is left untouched.
            if let Some(binding) = profile
                .bindings
                .iter()
                .find(|b| b.control == ControlKind::Volume)
            {
                if let Some(id) = graph.find_id(&binding.stage) {
                    if let Some(param) = graph.node(id).param(binding.param) {
                        let baseline = param.target();
                        backend.ramp(
                            id,
                            binding.param,
                            baseline * event.gain_dip,
                            event.start,
                            half,
                        );
                        backend.ramp(id, binding.param, baseline, event.midpoint(), half);
                    }
                }
            }
        }

        TickReport {
            mutations,
            glitch: glitch_event,
        }
    }
}

/// Scheduler lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Cancelled,
}

/// The cancellable tick loop driving a [`SchedulerCore`] on its own thread.
pub struct ModulationScheduler {
    state: SchedulerState,
    cancelled: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl ModulationScheduler {
    /// `live` counts loops currently running; the engine shares one counter
    /// across every scheduler it ever starts so tests can assert that
    /// start/stop cycling leaks nothing.
    pub fn new(live: Arc<AtomicUsize>) -> Self {
        Self {
            state: SchedulerState::Idle,
            cancelled: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            handle: None,
            live,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// Begin ticking. Returns false (and does nothing) unless Idle.
    pub fn start<B: AudioBackend>(
        &mut self,
        profile: EffectsProfile,
        graph: Arc<Mutex<AudioGraph>>,
        backend: Arc<Mutex<B>>,
        surface: ControlSurface,
        seed: Option<u64>,
    ) -> bool {
        if self.state != SchedulerState::Idle {
            log::warn!("scheduler start refused: state is {:?}", self.state);
            return false;
        }

        let cancelled = self.cancelled.clone();
        let live = self.live.clone();
        let (tx, rx) = bounded::<()>(1);

        live.fetch_add(1, Ordering::SeqCst);
        let handle = thread::spawn(move || {
            let mut core = SchedulerCore::new(profile, seed);
            loop {
                // Re-checked after every wakeup, before any mutation.
                if cancelled.load(Ordering::Acquire) {
                    break;
                }
                {
                    let Ok(mut backend) = backend.lock() else { break };
                    let Ok(mut graph) = graph.lock() else { break };
                    let controls = surface.snapshot();
                    let now = backend.now();
                    let report = core.tick(&mut graph, &mut *backend, &controls, now);
                    log::debug!(
                        "modulation tick at {:.2}s: {} ramp(s), glitch={}",
                        now,
                        report.mutations.len(),
                        report.glitch.is_some()
                    );
                }
                let wait = Duration::from_secs_f64(core.next_interval());
                match rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
            live.fetch_sub(1, Ordering::SeqCst);
        });

        self.stop_tx = Some(tx);
        self.handle = Some(handle);
        self.state = SchedulerState::Running;
        true
    }

    /// Cancel and join. When this returns, no further tick executes.
    /// Idempotent; cancelling an Idle scheduler just pins it Cancelled.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // Dropping the sender wakes a waiting loop immediately.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.state = SchedulerState::Cancelled;
    }
}

impl Drop for ModulationScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AutomationEvent, OfflineBackend};
    use crate::graph::GraphBuilder;
    use crate::profile::Bounds;

    fn certain_profile() -> EffectsProfile {
        let mut profile = EffectsProfile::drift();
        for t in &mut profile.targets {
            t.chance = 1.0;
        }
        profile
    }

    fn running_backend() -> OfflineBackend {
        let mut backend = OfflineBackend::new();
        backend.resume().unwrap();
        backend
    }

    #[test]
    fn forced_tick_samples_inside_declared_ranges() {
        let profile = certain_profile();
        let mut graph = GraphBuilder::build(&profile).unwrap();
        let mut backend = running_backend();
        let mut core = SchedulerCore::new(profile.clone(), Some(11));

        let report = core.tick(&mut graph, &mut backend, &ControlState::default(), 0.0);

        assert_eq!(report.mutations.len(), profile.targets.len());
        for m in &report.mutations {
            let t = profile
                .targets
                .iter()
                .find(|t| t.stage == m.stage && t.param == m.param)
                .unwrap();
            assert!(
                t.range.contains(m.target),
                "{}.{} target {} outside [{}, {}]",
                m.stage,
                m.param,
                m.target,
                t.range.min,
                t.range.max
            );
            assert!(t.ramp_secs.contains(m.duration));
        }
    }

    #[test]
    fn zero_chance_profile_never_mutates() {
        let mut profile = EffectsProfile::drift();
        for t in &mut profile.targets {
            t.chance = 0.0;
        }
        let mut graph = GraphBuilder::build(&profile).unwrap();
        let mut backend = running_backend();
        let mut core = SchedulerCore::new(profile, Some(1));

        for tick in 0..100 {
            let report = core.tick(
                &mut graph,
                &mut backend,
                &ControlState::default(),
                tick as f64,
            );
            assert!(report.mutations.is_empty());
        }
        assert!(backend
            .events()
            .iter()
            .all(|e| !matches!(e, AutomationEvent::Ramp { .. })));
    }

    #[test]
    fn same_seed_same_decisions() {
        let profile = EffectsProfile::drift();
        let mut graph_a = GraphBuilder::build(&profile).unwrap();
        let mut graph_b = GraphBuilder::build(&profile).unwrap();
        let mut backend_a = running_backend();
        let mut backend_b = running_backend();
        let mut core_a = SchedulerCore::new(profile.clone(), Some(99));
        let mut core_b = SchedulerCore::new(profile, Some(99));

        for tick in 0..50 {
            let now = tick as f64 * 25.0;
            let a = core_a.tick(&mut graph_a, &mut backend_a, &ControlState::default(), now);
            let b = core_b.tick(&mut graph_b, &mut backend_b, &ControlState::default(), now);
            assert_eq!(a, b);
        }
        assert_eq!(backend_a.events(), backend_b.events());
    }

    #[test]
    fn amount_mutation_replaces_the_curve() {
        let mut profile = EffectsProfile::drift();
        profile.targets.retain(|t| t.param == ParamName::Amount);
        profile.targets[0].chance = 1.0;
        let mut graph = GraphBuilder::build(&profile).unwrap();
        let mut backend = running_backend();
        let mut core = SchedulerCore::new(profile, Some(5));

        let report = core.tick(&mut graph, &mut backend, &ControlState::default(), 0.0);

        let amount = report.mutations[0].target;
        let shaper = graph.find_id("shaper").unwrap();
        assert!(backend.events().iter().any(|e| matches!(
            e,
            AutomationEvent::CurveReplaced { node, amount: a, len }
                if *node == shaper && *a == amount && *len == crate::CURVE_LEN
        )));
    }

    #[test]
    fn glitch_rides_the_volume_stage() {
        let mut profile = EffectsProfile::drift();
        for t in &mut profile.targets {
            t.chance = 0.0;
        }
        profile.glitch.chance = 1.0;
        let mut graph = GraphBuilder::build(&profile).unwrap();
        let mut backend = running_backend();
        let mut core = SchedulerCore::new(profile, Some(21));

        let controls = ControlState {
            glitch_intensity: 0.9,
            ..ControlState::default()
        };
        let report = core.tick(&mut graph, &mut backend, &controls, 4.0);
        let event = report.glitch.expect("glitch should fire at chance 1.0");

        // Two rate ramps out and back.
        let rates = backend.rate_ramps();
        assert_eq!(rates.len(), 2);
        assert!(matches!(
            rates[0],
            AutomationEvent::RateRamp { target, at, .. }
                if (*target - event.rate_peak).abs() < 1e-6 && *at == event.start
        ));
        assert!(matches!(
            rates[1],
            AutomationEvent::RateRamp { target, at, .. }
                if *target == 1.0 && (*at - event.midpoint()).abs() < 1e-12
        ));

        // Two gain ramps on the volume stage, ending at the baseline.
        let level = graph.find_id("level").unwrap();
        let gains = backend.ramps_for(level, ParamName::Gain);
        assert_eq!(gains.len(), 2);
        let baseline = graph
            .node(level)
            .param(ParamName::Gain)
            .unwrap()
            .target();
        assert!(matches!(
            gains[1],
            AutomationEvent::Ramp { target, at, duration, .. }
                if (*target - baseline).abs() < 1e-6
                    && (*at + *duration - event.end()).abs() < 1e-9
        ));
    }

    #[test]
    fn intervals_stay_inside_profile_bounds() {
        let mut core = SchedulerCore::new(EffectsProfile::drift(), Some(8));
        for _ in 0..1_000 {
            let interval = core.next_interval();
            assert!((20.0..30.0).contains(&interval));
        }
    }

    fn fast_profile() -> EffectsProfile {
        let mut profile = certain_profile();
        profile.tick_secs = Bounds::new(0.005, 0.01);
        profile
    }

    fn spawn_running(
        scheduler: &mut ModulationScheduler,
        backend: &Arc<Mutex<OfflineBackend>>,
    ) -> Arc<Mutex<AudioGraph>> {
        let profile = fast_profile();
        let graph = Arc::new(Mutex::new(GraphBuilder::build(&profile).unwrap()));
        let started = scheduler.start(
            profile,
            graph.clone(),
            backend.clone(),
            ControlSurface::default(),
            Some(7),
        );
        assert!(started);
        graph
    }

    #[test]
    fn start_is_refused_unless_idle() {
        let live = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Mutex::new(running_backend()));
        let mut scheduler = ModulationScheduler::new(live);
        let graph = spawn_running(&mut scheduler, &backend);

        assert!(!scheduler.start(
            fast_profile(),
            graph,
            backend,
            ControlSurface::default(),
            None
        ));
        scheduler.cancel();
        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
    }

    #[test]
    fn no_tick_executes_after_cancel_returns() {
        let live = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Mutex::new(running_backend()));
        let mut scheduler = ModulationScheduler::new(live.clone());
        let _graph = spawn_running(&mut scheduler, &backend);

        // Let a few ticks land, then cancel.
        std::thread::sleep(Duration::from_millis(50));
        scheduler.cancel();
        let frozen = backend.lock().unwrap().events().len();
        assert!(frozen > 0, "expected some automation before cancel");

        // Any further elapse of time produces nothing.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(backend.lock().unwrap().events().len(), frozen);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let live = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Mutex::new(running_backend()));
        let mut scheduler = ModulationScheduler::new(live.clone());
        let _graph = spawn_running(&mut scheduler, &backend);

        scheduler.cancel();
        scheduler.cancel();
        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
