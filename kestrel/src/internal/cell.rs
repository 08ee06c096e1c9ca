use crate::Duration;
use crate::public::cell::{Cell, EffectTrait};
use std::any::{Any, type_name};

/// Object-safe face of [Cell], so that one history can hold cells of many types.
///
/// Effects travel as `dyn Any` and are downcast back to the concrete cell's effect type.
/// The schema guarantees that an effect is only ever routed to the cell that produced its
/// query, so a failed downcast is an engine bug.
pub(crate) trait ErasedCell: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn duplicate_boxed(&self) -> Box<dyn ErasedCell>;
    fn react_erased(&mut self, effect: &dyn Any);
    fn step_erased(&mut self, elapsed: Duration);
    fn conflicted(&self) -> bool;
    fn clone_effect(&self, effect: &dyn Any) -> Box<dyn Any>;
    fn sequentially_erased(&self, prefix: &dyn Any, suffix: &dyn Any) -> Box<dyn Any>;
    fn concurrently_erased(&self, left: &dyn Any, right: &dyn Any) -> Box<dyn Any>;
}

fn effect_of<C: Cell>(effect: &dyn Any) -> &C::Effect {
    match effect.downcast_ref::<C::Effect>() {
        Some(effect) => effect,
        None => unreachable!("effect routed to a cell of the wrong type: {}", type_name::<C>()),
    }
}

impl<C: Cell> ErasedCell for C {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn duplicate_boxed(&self) -> Box<dyn ErasedCell> {
        Box::new(self.duplicate())
    }

    fn react_erased(&mut self, effect: &dyn Any) {
        self.react(effect_of::<C>(effect));
    }

    fn step_erased(&mut self, elapsed: Duration) {
        self.step(elapsed);
    }

    fn conflicted(&self) -> bool {
        self.is_conflicted()
    }

    fn clone_effect(&self, effect: &dyn Any) -> Box<dyn Any> {
        Box::new(effect_of::<C>(effect).clone())
    }

    fn sequentially_erased(&self, prefix: &dyn Any, suffix: &dyn Any) -> Box<dyn Any> {
        Box::new(
            self.effect_trait()
                .sequentially(effect_of::<C>(prefix), effect_of::<C>(suffix)),
        )
    }

    fn concurrently_erased(&self, left: &dyn Any, right: &dyn Any) -> Box<dyn Any> {
        Box::new(
            self.effect_trait()
                .concurrently(effect_of::<C>(left), effect_of::<C>(right)),
        )
    }
}

/// A registered cell: its label for reports and its initial state.
pub(crate) struct CellSlot {
    pub(crate) label: String,
    pub(crate) initial: Box<dyn ErasedCell>,
}

impl CellSlot {
    pub(crate) fn new<C: Cell>(label: impl Into<String>, initial: C) -> Self {
        CellSlot {
            label: label.into(),
            initial: Box::new(initial),
        }
    }
}

pub(crate) fn downcast_cell<C: Cell>(cell: &dyn ErasedCell) -> &C {
    match cell.as_any().downcast_ref::<C>() {
        Some(cell) => cell,
        None => unreachable!("query resolved to a cell of the wrong type: {}", type_name::<C>()),
    }
}
