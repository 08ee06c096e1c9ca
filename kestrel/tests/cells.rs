use kestrel::public::cell::Additive;
use kestrel::public::cell::register::RegisterTrait;
use kestrel::*;
use proptest::prelude::*;

fn register_effect() -> impl Strategy<Value = RegisterEffect<u8>> {
    prop_oneof![
        1 => Just(RegisterEffect::none()),
        4 => (0u8..4).prop_map(RegisterEffect::set),
    ]
}

proptest! {
    #[test]
    fn register_sequential_is_a_monoid(a in register_effect(), b in register_effect(), c in register_effect()) {
        let t = RegisterTrait;
        let left = t.sequentially(&t.sequentially(&a, &b), &c);
        let right = t.sequentially(&a, &t.sequentially(&b, &c));
        prop_assert_eq!(left, right);
        prop_assert_eq!(t.sequentially(&t.empty(), &a), a.clone());
        prop_assert_eq!(t.sequentially(&a, &t.empty()), a);
    }

    #[test]
    fn register_concurrent_is_associative(a in register_effect(), b in register_effect(), c in register_effect()) {
        let t = RegisterTrait;
        let left = t.concurrently(&t.concurrently(&a, &b), &c);
        let right = t.concurrently(&a, &t.concurrently(&b, &c));
        prop_assert_eq!(left.new_value, right.new_value);
        let mut left = left.proposals.to_vec();
        let mut right = right.proposals.to_vec();
        left.sort_unstable();
        right.sort_unstable();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn register_conflicts_iff_values_differ(a in 0u8..4, b in 0u8..4) {
        let t = RegisterTrait;
        let mut cell = RegisterCell::new(0u8);
        cell.react(&t.concurrently(&RegisterEffect::set(a), &RegisterEffect::set(b)));
        prop_assert_eq!(b, *cell.value());
        prop_assert_eq!(a != b, cell.is_conflicted());
    }

    #[test]
    fn accumulator_effects_commute(a in -100i32..100, b in -100i32..100) {
        let (a, b) = (a as f64, b as f64);
        prop_assert_eq!(Additive.concurrently(&a, &b), Additive.concurrently(&b, &a));
        prop_assert_eq!(Additive.sequentially(&a, &b), a + b);
        prop_assert!(!AccumulatorCell::new(0.0, a).is_conflicted());
    }

    #[test]
    fn accumulator_steps_compose(rate in -10i32..10, first in 0i64..1_000, second in 0i64..1_000) {
        let rate = rate as f64;
        let mut split = AccumulatorCell::new(5.0, rate);
        split.step(Duration::seconds(first));
        split.step(Duration::seconds(second));

        let mut whole = AccumulatorCell::new(5.0, rate);
        whole.step(Duration::seconds(first + second));
        prop_assert!((split.volume() - whole.volume()).abs() < 1e-9);
    }
}

#[test]
fn duplicated_cells_are_independent() {
    let original = RegisterCell::new(vec![1, 2]);
    let mut copy = original.duplicate();
    copy.react(&RegisterEffect::set(vec![3]));
    assert_eq!(&vec![1, 2], original.value());
    assert_eq!(&vec![3], copy.value());
}
