//! Effects profiles: the data description of graph topology, parameter
//! defaults, modulation probabilities, and glitch tunables.
//!
//! Deployments differ only in constants and minor wiring, so all of that
//! drift lives here as data: a profile names its stages, wires them (audio
//! input or
//! parameter port), declares which parameters the scheduler may mutate and
//! with what odds, and configures the glitch engine. Profiles are validated
//! once at load time so tick-time sampling never sees an empty or inverted
//! range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::node::NodeKind;
use crate::graph::param::ParamName;

/// Inclusive-exclusive duration bounds in seconds. `min == max` is a fixed
/// duration, which several profiles use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Uniform sample in [min, max).
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f64 {
        self.min + rng.f64() * (self.max - self.min)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, what: &str) -> Result<(), ProfileError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max || self.min < 0.0 {
            return Err(ProfileError::BadRange {
                what: what.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Value bounds for a sampled parameter target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Uniform sample in [min, max).
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f32 {
        self.min + rng.f32() * (self.max - self.min)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, what: &str) -> Result<(), ProfileError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ProfileError::BadRange {
                what: what.to_string(),
                min: self.min as f64,
                max: self.max as f64,
            });
        }
        Ok(())
    }
}

/// One stage of the topology: a named node with optional default overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub params: Vec<ParamOverride>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamOverride {
    pub param: ParamName,
    pub value: f32,
}

/// A wire between stages. Without `param` the wire feeds the destination's
/// audio input; with it, the wire modulates the named parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub param: Option<ParamName>,
}

/// One parameter the scheduler may re-target, with its odds and bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModTarget {
    pub stage: String,
    pub param: ParamName,
    /// Probability that a given tick mutates this parameter.
    pub chance: f64,
    /// Range the new target is sampled from.
    pub range: Span,
    /// Range the ramp duration is sampled from.
    pub ramp_secs: Bounds,
}

/// Tunables for the transient stutter effect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlitchConfig {
    /// Probability per scheduler tick that a glitch fires at all.
    pub chance: f64,
    /// Below this intensity the glitch engine stays silent.
    pub min_intensity: f32,
    /// Stutter length bounds in seconds.
    pub stutter_secs: Bounds,
    /// The playback-rate excursion is `1 + intensity * u`, u in this span.
    pub rate_span: Span,
    /// Gain dip factor applied to the output baseline during the stutter.
    pub gain_dip: Span,
    /// Re-trigger suppression window after a glitch completes.
    pub cooldown_secs: f64,
}

impl Default for GlitchConfig {
    fn default() -> Self {
        Self {
            chance: 0.4,
            min_intensity: 0.05,
            stutter_secs: Bounds::new(0.05, 0.2),
            rate_span: Span::new(0.5, 2.0),
            gain_dip: Span::new(0.6, 0.7),
            cooldown_secs: 0.3,
        }
    }
}

/// Which control-surface value a binding maps from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Volume,
    DistortionAmount,
    TremoloDepth,
}

/// Affine mapping from a control value onto a stage parameter:
/// `target = offset + scale * control`. Topologies disagree on where the
/// tremolo depth lives, so the mapping is data, not engine code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlBinding {
    pub control: ControlKind,
    pub stage: String,
    pub param: ParamName,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset: f32,
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to parse profile TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("profile `{0}` declares no stages")]
    EmptyTopology(String),
    #[error("duplicate stage `{0}`")]
    DuplicateStage(String),
    #[error("{context} references unknown stage `{stage}`")]
    UnknownStage { context: String, stage: String },
    #[error("stage `{stage}` ({kind:?}) has no parameter `{param}`")]
    UnknownParam {
        stage: String,
        kind: NodeKind,
        param: ParamName,
    },
    #[error("{what}: range [{min}, {max}] is invalid")]
    BadRange { what: String, min: f64, max: f64 },
    #[error("{what}: probability {value} outside [0, 1]")]
    BadChance { what: String, value: f64 },
}

/// The full data description configuring builder, scheduler, and glitch
/// engine for one deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectsProfile {
    pub name: String,
    pub stages: Vec<StageSpec>,
    pub wires: Vec<WireSpec>,
    pub entry: String,
    pub sink: String,
    /// Inter-tick interval bounds for the modulation scheduler.
    pub tick_secs: Bounds,
    pub targets: Vec<ModTarget>,
    pub glitch: GlitchConfig,
    #[serde(default)]
    pub bindings: Vec<ControlBinding>,
}

impl EffectsProfile {
    /// The full ambient chain: serial filter -> delay -> waveshaper ->
    /// tremolo -> gain -> compressor, with an oscillator driving the
    /// tremolo gain through a depth stage. 8 kHz lowpass, 0.1 s delay,
    /// k = 5, 0.9 output gain, slow sine LFO, 20-30 s modulation cadence
    /// with 2-3 s ramps.
    pub fn drift() -> Self {
        Self {
            name: "drift".into(),
            stages: vec![
                stage("filter", NodeKind::LowpassFilter, &[]),
                stage("echo", NodeKind::Delay, &[]),
                stage("shaper", NodeKind::WaveShaper, &[]),
                stage("tremolo", NodeKind::AmplitudeModulator, &[]),
                stage("trem_depth", NodeKind::Gain, &[(ParamName::Gain, 0.05)]),
                stage("lfo", NodeKind::Oscillator, &[(ParamName::Frequency, 0.25)]),
                stage("level", NodeKind::Gain, &[(ParamName::Gain, 0.9)]),
                stage("comp", NodeKind::Compressor, &[]),
            ],
            wires: vec![
                wire("filter", "echo"),
                wire("echo", "shaper"),
                wire("shaper", "tremolo"),
                wire("tremolo", "level"),
                wire("level", "comp"),
                wire("lfo", "trem_depth"),
                param_wire("trem_depth", "tremolo", ParamName::Gain),
            ],
            entry: "filter".into(),
            sink: "comp".into(),
            tick_secs: Bounds::new(20.0, 30.0),
            targets: vec![
                target("filter", ParamName::Cutoff, 0.7, Span::new(3_000.0, 6_000.0)),
                target("echo", ParamName::DelayTime, 0.6, Span::new(0.05, 0.15)),
                target("level", ParamName::Gain, 0.5, Span::new(0.85, 0.95)),
                target("shaper", ParamName::Amount, 0.4, Span::new(2.0, 8.0)),
                target("lfo", ParamName::Frequency, 0.6, Span::new(0.1, 0.4)),
            ],
            glitch: GlitchConfig::default(),
            bindings: vec![
                binding(ControlKind::Volume, "level", ParamName::Gain, 1.0, 0.0),
                binding(
                    ControlKind::DistortionAmount,
                    "shaper",
                    ParamName::Amount,
                    1.0,
                    0.0,
                ),
                binding(
                    ControlKind::TremoloDepth,
                    "trem_depth",
                    ParamName::Gain,
                    1.0,
                    0.0,
                ),
            ],
        }
    }

    /// The simpler variant family: brighter filter, parallel dry/wet delay
    /// branch, oscillator coupled straight into the tremolo gain, no
    /// compressor, 15-30 s cadence with fixed 4 s ramps.
    pub fn sparse() -> Self {
        Self {
            name: "sparse".into(),
            stages: vec![
                stage("filter", NodeKind::LowpassFilter, &[(ParamName::Cutoff, 12_000.0)]),
                stage("echo", NodeKind::Delay, &[(ParamName::DelayTime, 0.2)]),
                stage("tremolo", NodeKind::AmplitudeModulator, &[]),
                stage("lfo", NodeKind::Oscillator, &[(ParamName::Frequency, 2.0)]),
                stage("level", NodeKind::Gain, &[]),
            ],
            wires: vec![
                // Dry path and wet (delayed) path both feed the tremolo;
                // the sink sums.
                wire("filter", "tremolo"),
                wire("filter", "echo"),
                wire("echo", "tremolo"),
                wire("tremolo", "level"),
                param_wire("lfo", "tremolo", ParamName::Gain),
            ],
            entry: "filter".into(),
            sink: "level".into(),
            tick_secs: Bounds::new(15.0, 30.0),
            targets: vec![
                target_with_ramp(
                    "filter",
                    ParamName::Cutoff,
                    0.5,
                    Span::new(2_000.0, 9_000.0),
                    Bounds::fixed(4.0),
                ),
                target_with_ramp(
                    "echo",
                    ParamName::DelayTime,
                    0.3,
                    Span::new(0.1, 0.3),
                    Bounds::fixed(4.0),
                ),
                target_with_ramp(
                    "level",
                    ParamName::Gain,
                    0.4,
                    Span::new(0.9, 1.0),
                    Bounds::fixed(4.0),
                ),
                target_with_ramp(
                    "lfo",
                    ParamName::Frequency,
                    0.6,
                    Span::new(0.5, 4.0),
                    Bounds::fixed(4.0),
                ),
            ],
            glitch: GlitchConfig {
                chance: 0.3,
                ..GlitchConfig::default()
            },
            bindings: vec![
                binding(ControlKind::Volume, "level", ParamName::Gain, 1.0, 0.0),
                // Depth 0 leaves the modulator fully open; depth 1 halves it.
                binding(
                    ControlKind::TremoloDepth,
                    "tremolo",
                    ParamName::Gain,
                    -0.5,
                    1.0,
                ),
            ],
        }
    }

    /// Parse and validate a profile from TOML.
    pub fn from_toml(text: &str) -> Result<Self, ProfileError> {
        let profile: Self = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    fn stage_kind(&self, name: &str) -> Option<NodeKind> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.kind)
    }

    fn check_param(&self, context: &str, stage: &str, param: ParamName) -> Result<(), ProfileError> {
        let kind = self
            .stage_kind(stage)
            .ok_or_else(|| ProfileError::UnknownStage {
                context: context.to_string(),
                stage: stage.to_string(),
            })?;
        if !kind.has_param(param) {
            return Err(ProfileError::UnknownParam {
                stage: stage.to_string(),
                kind,
                param,
            });
        }
        Ok(())
    }

    /// Reject configuration errors at load time so tick-time sampling only
    /// ever draws from well-formed bounds.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.stages.is_empty() {
            return Err(ProfileError::EmptyTopology(self.name.clone()));
        }
        for (i, s) in self.stages.iter().enumerate() {
            if self.stages[..i].iter().any(|other| other.name == s.name) {
                return Err(ProfileError::DuplicateStage(s.name.clone()));
            }
            for o in &s.params {
                self.check_param(&format!("stage `{}` override", s.name), &s.name, o.param)?;
            }
        }

        for label in [&self.entry, &self.sink] {
            if self.stage_kind(label).is_none() {
                return Err(ProfileError::UnknownStage {
                    context: "entry/sink".into(),
                    stage: label.clone(),
                });
            }
        }

        for w in &self.wires {
            if self.stage_kind(&w.from).is_none() {
                return Err(ProfileError::UnknownStage {
                    context: "wire source".into(),
                    stage: w.from.clone(),
                });
            }
            match w.param {
                Some(param) => self.check_param("wire target", &w.to, param)?,
                None => {
                    if self.stage_kind(&w.to).is_none() {
                        return Err(ProfileError::UnknownStage {
                            context: "wire target".into(),
                            stage: w.to.clone(),
                        });
                    }
                }
            }
        }

        self.tick_secs.check("tick_secs")?;
        if self.tick_secs.max <= 0.0 {
            return Err(ProfileError::BadRange {
                what: "tick_secs".into(),
                min: self.tick_secs.min,
                max: self.tick_secs.max,
            });
        }

        for t in &self.targets {
            let what = format!("target `{}.{}`", t.stage, t.param);
            self.check_param(&what, &t.stage, t.param)?;
            if !(0.0..=1.0).contains(&t.chance) {
                return Err(ProfileError::BadChance {
                    what,
                    value: t.chance,
                });
            }
            t.range.check(&format!("target `{}.{}` range", t.stage, t.param))?;
            t.ramp_secs
                .check(&format!("target `{}.{}` ramp", t.stage, t.param))?;
        }

        let g = &self.glitch;
        if !(0.0..=1.0).contains(&g.chance) {
            return Err(ProfileError::BadChance {
                what: "glitch chance".into(),
                value: g.chance,
            });
        }
        g.stutter_secs.check("glitch stutter_secs")?;
        g.rate_span.check("glitch rate_span")?;
        g.gain_dip.check("glitch gain_dip")?;
        if g.cooldown_secs < 0.0 || !g.cooldown_secs.is_finite() {
            return Err(ProfileError::BadRange {
                what: "glitch cooldown_secs".into(),
                min: g.cooldown_secs,
                max: g.cooldown_secs,
            });
        }

        for b in &self.bindings {
            self.check_param("control binding", &b.stage, b.param)?;
        }

        Ok(())
    }
}

fn stage(name: &str, kind: NodeKind, params: &[(ParamName, f32)]) -> StageSpec {
    StageSpec {
        name: name.into(),
        kind,
        params: params
            .iter()
            .map(|&(param, value)| ParamOverride { param, value })
            .collect(),
    }
}

fn wire(from: &str, to: &str) -> WireSpec {
    WireSpec {
        from: from.into(),
        to: to.into(),
        param: None,
    }
}

fn param_wire(from: &str, to: &str, param: ParamName) -> WireSpec {
    WireSpec {
        from: from.into(),
        to: to.into(),
        param: Some(param),
    }
}

fn target(stage: &str, param: ParamName, chance: f64, range: Span) -> ModTarget {
    target_with_ramp(stage, param, chance, range, Bounds::new(2.0, 3.0))
}

fn target_with_ramp(
    stage: &str,
    param: ParamName,
    chance: f64,
    range: Span,
    ramp_secs: Bounds,
) -> ModTarget {
    ModTarget {
        stage: stage.into(),
        param,
        chance,
        range,
        ramp_secs,
    }
}

fn binding(
    control: ControlKind,
    stage: &str,
    param: ParamName,
    scale: f32,
    offset: f32,
) -> ControlBinding {
    ControlBinding {
        control,
        stage: stage.into(),
        param,
        scale,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_presets_validate() {
        EffectsProfile::drift().validate().unwrap();
        EffectsProfile::sparse().validate().unwrap();
    }

    #[test]
    fn toml_round_trip() {
        let drift = EffectsProfile::drift();
        let text = toml::to_string(&drift).unwrap();
        let parsed = EffectsProfile::from_toml(&text).unwrap();

        assert_eq!(parsed.name, "drift");
        assert_eq!(parsed.stages.len(), drift.stages.len());
        assert_eq!(parsed.targets.len(), drift.targets.len());
        assert_eq!(parsed.tick_secs, drift.tick_secs);
    }

    #[test]
    fn inverted_target_range_is_rejected() {
        let mut p = EffectsProfile::drift();
        p.targets[0].range = Span::new(6_000.0, 3_000.0);
        assert!(matches!(p.validate(), Err(ProfileError::BadRange { .. })));
    }

    #[test]
    fn chance_above_one_is_rejected() {
        let mut p = EffectsProfile::drift();
        p.targets[1].chance = 1.5;
        assert!(matches!(p.validate(), Err(ProfileError::BadChance { .. })));
    }

    #[test]
    fn unknown_target_stage_is_rejected() {
        let mut p = EffectsProfile::drift();
        p.targets[0].stage = "reverb".into();
        assert!(matches!(
            p.validate(),
            Err(ProfileError::UnknownStage { .. })
        ));
    }

    #[test]
    fn target_param_must_exist_on_stage_kind() {
        let mut p = EffectsProfile::drift();
        p.targets[0].param = ParamName::DelayTime;
        assert!(matches!(
            p.validate(),
            Err(ProfileError::UnknownParam { .. })
        ));
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let mut p = EffectsProfile::sparse();
        p.stages.push(stage("filter", NodeKind::Gain, &[]));
        assert!(matches!(
            p.validate(),
            Err(ProfileError::DuplicateStage { .. })
        ));
    }

    #[test]
    fn fixed_bounds_sample_to_themselves() {
        let mut rng = fastrand::Rng::with_seed(7);
        let fixed = Bounds::fixed(4.0);
        for _ in 0..32 {
            assert_eq!(fixed.sample(&mut rng), 4.0);
        }
    }

    #[test]
    fn bounds_sample_stays_inside() {
        let mut rng = fastrand::Rng::with_seed(42);
        let bounds = Bounds::new(20.0, 30.0);
        let span = Span::new(3_000.0, 6_000.0);
        for _ in 0..1_000 {
            assert!(bounds.contains(bounds.sample(&mut rng)));
            assert!(span.contains(span.sample(&mut rng)));
        }
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let mut p = EffectsProfile::drift();
        p.glitch.cooldown_secs = -0.1;
        assert!(matches!(p.validate(), Err(ProfileError::BadRange { .. })));
    }
}
