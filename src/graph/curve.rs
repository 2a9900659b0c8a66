use std::f32::consts::PI;
use std::sync::Arc;

use crate::CURVE_LEN;

/*
Distortion Transfer Curve
=========================

The waveshaper stage distorts by table lookup: input samples in [-1, 1] are
mapped through a precomputed transfer curve. The curve comes from a single
"amount" parameter k:

    curve(x) = ((3 + k) * x * 20 * deg) / (pi + k * |x|),   deg = pi / 180

Shape properties that matter to the engine:

  - Odd: curve(-x) = -curve(x) for any k, so the distortion adds no DC
    offset.
  - curve(0) = 0 for any k.
  - Larger k grows the denominator faster with |x|, compressing loud
    samples relative to quiet ones (soft-clipping saturation).
  - k = 0 degenerates to the pure linear scale x * 60 * deg / pi.

Tables are immutable. Changing the amount synthesizes a fresh table and the
backend swaps it wholesale; the old table stays valid until the swap, so a
rendering thread never observes a half-written curve.
*/

/// An immutable sampled waveshaper transfer table.
#[derive(Clone, Debug)]
pub struct Curve {
    amount: f32,
    samples: Arc<[f32]>,
}

impl Curve {
    /// Sample the transfer function into a table of [`CURVE_LEN`] values
    /// over x in [-1, 1). Pure and deterministic.
    pub fn synthesize(amount: f32) -> Self {
        let mut samples = Vec::with_capacity(CURVE_LEN);
        for i in 0..CURVE_LEN {
            let x = 2.0 * i as f32 / CURVE_LEN as f32 - 1.0;
            samples.push(Self::transfer(amount, x));
        }
        Self {
            amount,
            samples: samples.into(),
        }
    }

    /// The transfer function itself.
    pub fn transfer(amount: f32, x: f32) -> f32 {
        const DEG: f32 = PI / 180.0;
        ((3.0 + amount) * x * 20.0 * DEG) / (PI + amount * x.abs())
    }

    /// The amount this table was synthesized from.
    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
