use crate::public::cell::{Cell, EffectTrait};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A write to a [RegisterCell].
///
/// `proposals` holds every distinct value written at this instant by independent tasks;
/// `new_value` is the one that takes effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterEffect<T> {
    pub new_value: Option<T>,
    pub proposals: SmallVec<T, 2>,
}

impl<T: Clone> RegisterEffect<T> {
    pub fn set(value: T) -> Self {
        let mut proposals = SmallVec::new();
        proposals.push(value.clone());
        RegisterEffect {
            new_value: Some(value),
            proposals,
        }
    }

    pub fn none() -> Self {
        RegisterEffect {
            new_value: None,
            proposals: SmallVec::new(),
        }
    }
}

/// Effect algebra for registers.
///
/// Sequential writes replace each other. Concurrent writes keep the value from the
/// later-spawned task and remember every distinct value proposed.
#[derive(Copy, Clone, Debug, Default)]
pub struct RegisterTrait;

impl<T: Clone + PartialEq> EffectTrait<RegisterEffect<T>> for RegisterTrait {
    fn empty(&self) -> RegisterEffect<T> {
        RegisterEffect::none()
    }

    fn sequentially(
        &self,
        prefix: &RegisterEffect<T>,
        suffix: &RegisterEffect<T>,
    ) -> RegisterEffect<T> {
        if suffix.new_value.is_some() {
            suffix.clone()
        } else {
            prefix.clone()
        }
    }

    fn concurrently(&self, left: &RegisterEffect<T>, right: &RegisterEffect<T>) -> RegisterEffect<T> {
        let mut proposals = left.proposals.clone();
        for value in right.proposals.iter() {
            if !proposals.contains(value) {
                proposals.push(value.clone());
            }
        }
        RegisterEffect {
            new_value: right.new_value.clone().or_else(|| left.new_value.clone()),
            proposals,
        }
    }
}

/// A single value that tasks overwrite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterCell<T> {
    value: T,
    conflicted: bool,
}

impl<T> RegisterCell<T> {
    pub fn new(initial: T) -> Self {
        RegisterCell {
            value: initial,
            conflicted: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Cell for RegisterCell<T> {
    type Effect = RegisterEffect<T>;
    type EffectTrait = RegisterTrait;

    fn effect_trait(&self) -> RegisterTrait {
        RegisterTrait
    }

    fn react(&mut self, effect: &RegisterEffect<T>) {
        if let Some(value) = &effect.new_value {
            self.value = value.clone();
        }
        self.conflicted = effect.proposals.len() > 1;
    }

    fn is_conflicted(&self) -> bool {
        self.conflicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_distinct_values_conflict() {
        let mut cell = RegisterCell::new(0);
        let combined = RegisterTrait.concurrently(&RegisterEffect::set(1), &RegisterEffect::set(2));
        cell.react(&combined);
        assert_eq!(&2, cell.value());
        assert!(cell.is_conflicted());
    }

    #[test]
    fn concurrent_equal_values_agree() {
        let mut cell = RegisterCell::new(0);
        let combined = RegisterTrait.concurrently(&RegisterEffect::set(4), &RegisterEffect::set(4));
        cell.react(&combined);
        assert_eq!(&4, cell.value());
        assert!(!cell.is_conflicted());
    }

    #[test]
    fn sequential_write_clears_conflict() {
        let mut cell = RegisterCell::new(0);
        cell.react(&RegisterTrait.concurrently(&RegisterEffect::set(1), &RegisterEffect::set(2)));
        cell.react(&RegisterEffect::set(3));
        assert_eq!(&3, cell.value());
        assert!(!cell.is_conflicted());
    }

    #[test]
    fn empty_is_identity() {
        let t = RegisterTrait;
        let e = RegisterEffect::set("a".to_string());
        assert_eq!(e, t.sequentially(&t.empty(), &e));
        assert_eq!(e, t.sequentially(&e, &t.empty()));
        assert_eq!(e, t.concurrently(&t.empty(), &e));
    }
}
