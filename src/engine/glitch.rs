use crate::profile::GlitchConfig;

/*
Glitch Engine
=============

A glitch is a short stutter: the source's playback rate pitches up and the
output gain dips, both returning to baseline by the end of the event. The
ear reads it as a transient artifact rather than a discontinuity because
every excursion is a pair of ramps, out and back:

    rate:  1.0 ──→ rate_peak ──→ 1.0        (duration/2 each way)
    gain:  base ──→ base * dip ──→ base     (same timing)

Trigger gating, per scheduler tick:
  - the glitch-intensity control must exceed the configured minimum,
  - an outer probability draw must pass,
  - the cooldown window from the previous glitch must have elapsed.

The cooldown is owned here and checked inside `maybe_trigger`, so at most
one glitch is audible at a time and overlapping events cannot compound.
*/

/// An ephemeral stutter decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlitchEvent {
    pub start: f64,
    pub duration: f64,
    pub intensity: f32,
    /// Peak playback rate, `1 + intensity * u` with u from the profile span.
    pub rate_peak: f32,
    /// Factor the output baseline dips to at the midpoint.
    pub gain_dip: f32,
}

impl GlitchEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.duration / 2.0
    }
}

pub struct GlitchEngine {
    cfg: GlitchConfig,
    cooldown_until: f64,
}

impl GlitchEngine {
    pub fn new(cfg: GlitchConfig) -> Self {
        Self {
            cfg,
            cooldown_until: f64::NEG_INFINITY,
        }
    }

    pub fn config(&self) -> &GlitchConfig {
        &self.cfg
    }

    /// The largest rate excursion this configuration permits at `intensity`.
    pub fn max_rate(&self, intensity: f32) -> f32 {
        1.0 + intensity * self.cfg.rate_span.max
    }

    /// Roll for a glitch. Returns the event if all gates pass and arms the
    /// cooldown; the caller applies the paired ramps.
    pub fn maybe_trigger(
        &mut self,
        rng: &mut fastrand::Rng,
        intensity: f32,
        now: f64,
    ) -> Option<GlitchEvent> {
        if intensity <= self.cfg.min_intensity {
            return None;
        }
        if now < self.cooldown_until {
            return None;
        }
        if rng.f64() >= self.cfg.chance {
            return None;
        }

        let duration = self.cfg.stutter_secs.sample(rng);
        let rate_peak = 1.0 + intensity * self.cfg.rate_span.sample(rng);
        let gain_dip = self.cfg.gain_dip.sample(rng);
        self.cooldown_until = now + duration + self.cfg.cooldown_secs;

        Some(GlitchEvent {
            start: now,
            duration,
            intensity,
            rate_peak,
            gain_dip,
        })
    }
}
