mod util;

use kestrel::*;
use serde_json::json;
use util::*;

#[test]
fn past_instants_can_be_reread() -> Result<()> {
    let mut simulation = Simulation::new(schema()?, SimulationConfig::default());
    simulation
        .submit(Directive::new(at(0), "Fill").with("rate", 1.0).with("seconds", 10))
        .map_err(Error::new)?;
    simulation
        .submit(Directive::new(at(4), "SetMode").with("value", 2.0))
        .map_err(Error::new)?;
    simulation.run();

    let model = simulation.schema().model();
    assert_eq!(Some(103.0), simulation.ask_at(&model.tank.volume, at(3)));
    assert_eq!(Some(105.0), simulation.ask_at(&model.tank.volume, at(5)));
    assert_eq!(Some(110.0), simulation.ask_at(&model.tank.volume, at(10)));
    assert_eq!(None, simulation.ask_at(&model.tank.volume, at(11)));
    assert_eq!(Some(0.0), simulation.ask_at(&model.mode.value, at(3)));
    assert_eq!(Some(2.0), simulation.ask_at(&model.mode.value, at(4)));
    assert_eq!(Some(1.0), simulation.ask_at(&model.tank.rate, at(9)));
    Ok(())
}

#[test]
fn unchanged_values_are_not_repeated() -> Result<()> {
    let plan = [
        Directive::new(at(1), "SetMode").with("value", 1.0),
        Directive::new(at(2), "SetMode").with("value", 1.0),
        Directive::new(at(3), "SetMode").with("value", 5.0),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    let mode = &results.profiles.discrete["/mode/value"];
    let starts: Vec<Instant> = mode.iter().map(|s| s.start).collect();
    assert_eq!(vec![at(0), at(1), at(3)], starts);
    assert_eq!(json!(5.0), mode[2].value);

    let volume = &results.profiles.real["/tank/volume"];
    assert_eq!(1, volume.len());
    assert_eq!(Some(at(3)), volume[0].end);
    Ok(())
}

#[test]
fn secant_export_is_piecewise_linear() -> Result<()> {
    let schema = schema_with(|root| {
        root.real("ballistic", |now| {
            Polynomial::new([0.0, 0.0, 1.0]).shifted(now.now().since_origin())
        })?;
        root.daemon("tick", |ctx| async move {
            ctx.delay(Duration::seconds(7)).await;
            Ok(())
        })?;
        Ok(())
    })?;
    let config = SimulationConfig::default()
        .with_horizon(Duration::seconds(20))
        .with_approximation(Approximation::Secant {
            tolerance: 0.01,
            max_segment: Duration::seconds(5),
        });
    let results = Simulation::simulate(schema, config, []);

    let segments = &results.profiles.real["/ballistic"];
    assert!(segments.len() > 4);
    assert_eq!(at(0), segments[0].start);
    assert_eq!(Some(at(20)), segments.last().and_then(|s| s.end));
    for pair in segments.windows(2) {
        assert_eq!(pair[0].end, Some(pair[1].start));
    }
    for segment in segments {
        assert!(segment.dynamics.degree() <= 1);
        assert!(segment.end.is_some_and(|end| end - segment.start <= Duration::seconds(5)));
        let exact = segment.start.since_origin().as_seconds_f64().powi(2);
        assert!((segment.dynamics.value() - exact).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn garbage_collection_does_not_change_results() -> Result<()> {
    let plan = || {
        (0..20).map(|i| {
            Directive::new(at(i), "Fill")
                .with("rate", (i % 3) as f64)
                .with("seconds", 5)
        })
    };
    let collected = SimulationConfig {
        gc_interval: 1,
        ..SimulationConfig::default()
    };
    let hoarded = SimulationConfig {
        gc_interval: 0,
        ..SimulationConfig::default()
    };

    let mut a = Simulation::new(schema()?, collected);
    let mut b = Simulation::new(schema()?, hoarded);
    for directive in plan() {
        a.submit(directive).map_err(Error::new)?;
    }
    for directive in plan() {
        b.submit(directive).map_err(Error::new)?;
    }
    a.run();
    b.run();

    assert!(a.history_len() < b.history_len());
    assert_eq!(
        a.ask_at(&a.schema().model().tank.volume, at(12)),
        b.ask_at(&b.schema().model().tank.volume, at(12))
    );
    assert_eq!(a.finish(), b.finish());
    Ok(())
}

#[test]
fn results_carry_the_wall_clock_start() -> Result<()> {
    let start = Epoch::from_gregorian_utc_at_midnight(2030, 1, 1);
    let config = SimulationConfig::default()
        .with_start(start)
        .with_horizon(Duration::MINUTE);
    let results = Simulation::simulate(schema()?, config, []);

    assert_eq!(at(60), results.end);
    assert_eq!(start + hifitime::Duration::from_seconds(60.0), results.epoch_of(results.end));

    let value = serde_json::to_value(&results)?;
    assert_eq!(json!(60_000_000), value["end"]);
    assert!(value["start"].is_string());
    assert_eq!(json!(100.0), value["profiles"]["real"]["/tank/volume"][0]["dynamics"]["coefficients"][0]);
    Ok(())
}

fn with_phase() -> Result<std::sync::Arc<Schema<TestModel>>> {
    schema_with(|root| {
        let phase = DiscreteResource::delimited(|now| {
            if now.now() < at(5) {
                DelimitedDynamics::bounded(now.now(), at(5), "before")
            } else {
                DelimitedDynamics::persistent(now.now(), "after")
            }
        });
        root.export_discrete("phase", &phase, SerdeMapper)?;
        Ok(())
    })
}

#[test]
fn time_driven_changes_are_recorded_when_they_happen() -> Result<()> {
    let plan = [Directive::new(at(10), "SetMode").with("value", 1.0)];
    let results = Simulation::simulate(with_phase()?, SimulationConfig::default(), plan);

    let phase = &results.profiles.discrete["/phase"];
    let changes: Vec<(Instant, &serde_json::Value)> = phase.iter().map(|s| (s.start, &s.value)).collect();
    assert_eq!(vec![(at(0), &json!("before")), (at(5), &json!("after"))], changes);
    assert_eq!(Some(&json!("before")), results.profiles.discrete_value_at("/phase", at(4)));
    assert_eq!(Some(&json!("after")), results.profiles.discrete_value_at("/phase", at(6)));
    Ok(())
}

#[test]
fn time_driven_changes_after_the_last_step_reach_the_horizon() -> Result<()> {
    let config = SimulationConfig::default().with_horizon(Duration::seconds(20));
    let mut simulation = Simulation::new(with_phase()?, config);
    simulation.run();

    let starts = |profiles: &Profiles| -> Vec<Instant> {
        profiles.discrete["/phase"].iter().map(|s| s.start).collect()
    };
    assert_eq!(vec![at(0)], starts(&simulation.profiles()));

    let results = simulation.finish();
    assert_eq!(vec![at(0), at(5)], starts(&results.profiles));
    Ok(())
}
