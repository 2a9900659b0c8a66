use std::fmt;

use serde::{Deserialize, Serialize};

/*
Parameter and RampState
=======================

Every node owns a fixed set of named parameters. A parameter is a settled
value plus, at most, one in-flight linear ramp. All writers (the modulation
scheduler, the glitch engine, the control surface) mutate parameters the
same way: they issue a complete replacement ramp. Nobody read-modify-writes
a parameter, so concurrent writers resolve deterministically by whoever
issued the most recent ramp.

A replacement ramp always starts from the value the parameter holds at the
moment of the request:

  value_at(now) ──────→ target, over `duration` seconds, linearly

The settled value becomes the target immediately; `value_at` reports the
interpolated value while the ramp is in flight and the target afterwards.
This mirrors how the backend treats `ramp(..)` automation, keeping the
engine-side mirror and the rendered graph in agreement without the engine
ever touching individual samples.
*/

/// Names of the parameters a node kind can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    /// Linear amplitude of a gain or modulator stage.
    Gain,
    /// Lowpass cutoff in Hz.
    Cutoff,
    /// Delay line length in seconds.
    DelayTime,
    /// Waveshaper drive amount (the curve's `k`).
    Amount,
    /// Oscillator frequency in Hz.
    Frequency,
    /// Compressor threshold in dBFS.
    Threshold,
    /// Compressor knee width in dB.
    Knee,
    /// Compressor ratio.
    Ratio,
    /// Compressor attack in seconds.
    Attack,
    /// Compressor release in seconds.
    Release,
}

impl ParamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Gain => "gain",
            ParamName::Cutoff => "cutoff",
            ParamName::DelayTime => "delay_time",
            ParamName::Amount => "amount",
            ParamName::Frequency => "frequency",
            ParamName::Threshold => "threshold",
            ParamName::Knee => "knee",
            ParamName::Ratio => "ratio",
            ParamName::Attack => "attack",
            ParamName::Release => "release",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight smooth transition. At most one per parameter; a new
/// request overwrites the current one and redefines its own start as "now".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RampState {
    pub from: f32,
    pub target: f32,
    pub start: f64,
    pub duration: f64,
}

impl RampState {
    /// Linear interpolation, clamped to the ramp's endpoints in time.
    pub fn value_at(&self, now: f64) -> f32 {
        if now <= self.start {
            return self.from;
        }
        if self.duration <= 0.0 || now >= self.start + self.duration {
            return self.target;
        }
        let frac = ((now - self.start) / self.duration) as f32;
        self.from + (self.target - self.from) * frac
    }

    pub fn finished(&self, now: f64) -> bool {
        now >= self.start + self.duration
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A named, ranged, continuously adjustable control on a node.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: ParamName,
    /// The value the parameter settles at once any ramp completes.
    settled: f32,
    min: f32,
    max: f32,
    ramp: Option<RampState>,
}

impl Parameter {
    /// Create a parameter clamped into its valid range.
    pub fn new(name: ParamName, value: f32, min: f32, max: f32) -> Self {
        Self {
            name,
            settled: value.clamp(min, max),
            min,
            max,
            ramp: None,
        }
    }

    pub fn name(&self) -> ParamName {
        self.name
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// The value the parameter is headed toward (or already holds).
    pub fn target(&self) -> f32 {
        self.settled
    }

    pub fn ramp(&self) -> Option<&RampState> {
        self.ramp.as_ref()
    }

    /// Resolve the parameter's value at `now`, honoring any in-flight ramp.
    pub fn value_at(&self, now: f64) -> f32 {
        match &self.ramp {
            Some(ramp) => ramp.value_at(now),
            None => self.settled,
        }
    }

    /// Issue a full ramp replacement toward `target`, starting at `now`.
    ///
    /// The origin is whatever value the parameter holds at `now`, so
    /// overwriting an in-flight ramp never produces a discontinuity. The
    /// target is clamped into the parameter's valid range. Returns the ramp
    /// actually installed so callers can mirror it to the backend.
    pub fn ramp_to(&mut self, target: f32, now: f64, duration: f64) -> RampState {
        let from = self.value_at(now);
        let target = target.clamp(self.min, self.max);
        let ramp = RampState {
            from,
            target,
            start: now,
            duration: duration.max(0.0),
        };
        self.settled = target;
        self.ramp = Some(ramp);
        ramp
    }

    /// Set the settled value immediately, discarding any in-flight ramp.
    pub fn snap_to(&mut self, value: f32) {
        self.settled = value.clamp(self.min, self.max);
        self.ramp = None;
    }
}
