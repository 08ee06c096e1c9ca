mod util;

use kestrel::*;
use util::*;

#[test]
fn forks_share_their_past() -> Result<()> {
    let schema = schema()?;
    let model = schema.model();
    let mut history = schema.history();

    let origin = history.origin();
    let node = history.advance(origin, at(2));
    let node = history.emit(node, model.tank.query(), 1.5);
    let base = history.advance(node, at(4));

    let left = history.fork(base);
    let left = history.emit(left, model.mode.query(), 1.0);
    let right = history.fork(base);
    let right = history.emit(right, model.tank.query(), 1.0);

    assert_eq!(at(4), history.time(left));
    assert_eq!(Some(base), history.parent(history.parent(left).unwrap_or(origin)));

    let now = Snapshot::new(&history, left);
    assert_eq!(103.0, model.tank.volume.ask(&now));
    assert_eq!(1.0, model.mode.value.ask(&now));
    assert_eq!(1.5, model.tank.rate.ask(&now));

    let now = Snapshot::new(&history, right);
    assert_eq!(103.0, model.tank.volume.ask(&now));
    assert_eq!(0.0, model.mode.value.ask(&now));
    assert_eq!(2.5, model.tank.rate.ask(&now));
    assert_eq!(108.0, model.tank.volume.ask(&now.at(at(6))));
    Ok(())
}

#[test]
fn resources_are_memoized_per_node() -> Result<()> {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let schema = schema()?;
    let model = schema.model();
    let mut history = schema.history();

    let evaluations = Arc::new(AtomicUsize::new(0));
    let counter = evaluations.clone();
    let query = model.tank.query().clone();
    let doubled = RealResource::atom(move |now| {
        counter.fetch_add(1, Ordering::SeqCst);
        &now.ask(&query).dynamics() * 2.0
    });

    let node = history.advance(history.origin(), at(1));
    let now = Snapshot::new(&history, node);
    assert_eq!(200.0, doubled.ask(&now));
    assert_eq!(200.0, doubled.ask(&now));
    assert_eq!(1, evaluations.load(Ordering::SeqCst));

    assert_eq!(200.0, doubled.ask(&now.at(at(3))));
    assert_eq!(2, evaluations.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn sweeping_keeps_the_live_line() -> Result<()> {
    let schema = schema()?;
    let model = schema.model();
    let mut history = schema.history();

    let origin = history.origin();
    let mut live = origin;
    for second in 1..=5 {
        let base = history.advance(live, at(second));
        let dead = history.fork(base);
        history.emit(dead, model.mode.query(), -1.0);
        live = history.emit(base, model.mode.query(), second as f64);
    }
    let before = history.len();
    let removed = history.sweep(&[live]);

    assert_eq!(10, removed);
    assert_eq!(before - removed, history.len());
    assert_eq!(5.0, model.mode.value.ask(&Snapshot::new(&history, live)));
    Ok(())
}
