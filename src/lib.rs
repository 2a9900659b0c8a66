pub mod backend; // External rendering boundary + offline recording backend
pub mod engine; // Lifecycle, scheduling, glitches, control surface
pub mod graph; // Declarative effect-graph description
pub mod io;
pub mod profile; // Data-described topologies, defaults, and tunables

/// Number of samples in a waveshaper transfer table.
pub const CURVE_LEN: usize = 44_100;

/// Ramp length used when a control-surface push re-targets a parameter.
pub(crate) const CONTROL_RAMP_SECS: f64 = 0.05;
