mod util;

use kestrel::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use util::*;

fn random_plan(seed: u64, size: usize) -> Vec<Directive> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            let start = at(rng.random_range(0..50));
            match rng.random_range(0..3) {
                0 => Directive::new(start, "SetMode").with("value", rng.random_range(0..4) as f64),
                1 => Directive::new(start, "Fill")
                    .with("rate", rng.random_range(-3..=3) as f64)
                    .with("seconds", rng.random_range(0..20)),
                _ => Directive::new(start, "WaitForLevel").with("level", rng.random_range(80..160) as f64),
            }
        })
        .collect()
}

fn run(plan: Vec<Directive>) -> Result<(SimulationResults, Vec<(Instant, f64)>)> {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let log = trace.clone();
    let schema = schema_with(move |root| {
        root.daemon("observer", move |ctx| {
            let log = log.clone();
            async move {
                while ctx.now() < at(100) {
                    log.lock().unwrap().push((ctx.now(), ctx.model().tank.volume(&ctx)));
                    ctx.delay(Duration::seconds(5)).await;
                }
                Ok(())
            }
        })?;
        Ok(())
    })?;
    let config = SimulationConfig::default().with_horizon(Duration::seconds(100));
    let results = Simulation::simulate(schema, config, plan);
    let trace = trace.lock().unwrap().clone();
    Ok((results, trace))
}

#[test]
fn same_plan_same_results() -> Result<()> {
    for seed in 0..8 {
        let (first, first_trace) = run(random_plan(seed, 40))?;
        let (second, second_trace) = run(random_plan(seed, 40))?;
        assert_eq!(first, second, "seed {seed}");
        assert_eq!(first_trace, second_trace, "seed {seed}");
        assert_eq!(20, first_trace.len());
        assert_eq!(
            serde_json::to_string(&first)?,
            serde_json::to_string(&second)?,
            "seed {seed}"
        );
    }
    Ok(())
}

#[test]
fn plan_order_does_not_change_same_instant_semantics_of_commuting_effects() -> Result<()> {
    let plan = random_plan(42, 30)
        .into_iter()
        .filter(|d| d.kind == "Fill")
        .collect::<Vec<_>>();
    let mut reversed = plan.clone();
    reversed.reverse();

    let (forward, _) = run(plan)?;
    let (backward, _) = run(reversed)?;
    for time in (0..=100).step_by(7) {
        let a = forward.profiles.real_value_at("/tank/volume", at(time));
        let b = backward.profiles.real_value_at("/tank/volume", at(time));
        match (a, b) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-6, "{a} != {b} at {time}"),
            _ => panic!("missing volume at {time}"),
        }
    }
    Ok(())
}
