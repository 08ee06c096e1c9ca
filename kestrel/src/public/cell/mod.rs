//! Units of simulation state and the algebra that merges their effects.
//!
//! A [Cell] never sees two effects at one instant. Effects emitted by one task fold with
//! [EffectTrait::sequentially]; effects from different tasks at the same instant fold with
//! [EffectTrait::concurrently], and the result is applied with a single [Cell::react].

pub mod accumulator;
pub mod register;

pub use accumulator::AccumulatorCell;
pub use register::{RegisterCell, RegisterEffect};

use crate::Duration;

/// The monoid over a cell's effects.
///
/// `sequentially` must be associative, with `empty` as its identity. `concurrently` must be
/// associative too; a cell whose `concurrently` is not commutative has to flag the ambiguity
/// through [Cell::is_conflicted] rather than silently picking a winner.
pub trait EffectTrait<E> {
    fn empty(&self) -> E;
    fn sequentially(&self, prefix: &E, suffix: &E) -> E;
    fn concurrently(&self, left: &E, right: &E) -> E;
}

pub trait Cell: Clone + Send + Sync + 'static {
    type Effect: Clone + 'static;
    type EffectTrait: EffectTrait<Self::Effect>;

    fn effect_trait(&self) -> Self::EffectTrait;

    fn react(&mut self, effect: &Self::Effect);

    /// Advances the cell's own evolution between effects.
    fn step(&mut self, _elapsed: Duration) {}

    fn is_conflicted(&self) -> bool {
        false
    }

    /// Produces an independent copy for a new branch of history.
    fn duplicate(&self) -> Self {
        self.clone()
    }
}

/// Effects that sum, in any order.
#[derive(Copy, Clone, Debug, Default)]
pub struct Additive;

impl EffectTrait<f64> for Additive {
    fn empty(&self) -> f64 {
        0.0
    }

    fn sequentially(&self, prefix: &f64, suffix: &f64) -> f64 {
        prefix + suffix
    }

    fn concurrently(&self, left: &f64, right: &f64) -> f64 {
        left + right
    }
}
