mod util;

use kestrel::*;
use serde_json::json;
use util::*;

#[test]
fn concurrent_register_writes_conflict() -> Result<()> {
    let plan = [
        Directive::new(at(5), "SetMode").with("value", 1.0),
        Directive::new(at(5), "SetMode").with("value", 2.0),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    assert_eq!(
        vec![CellConflict {
            cell: "/mode".to_string(),
            time: at(5)
        }],
        results.report.conflicts
    );
    let profiles = &results.profiles;
    assert_eq!(Some(&json!(0.0)), profiles.discrete_value_at("/mode/value", at(0)));
    assert_eq!(Some(&json!(false)), profiles.discrete_value_at("/mode/conflicted", at(0)));
    assert_eq!(Some(&json!(2.0)), profiles.discrete_value_at("/mode/value", at(5)));
    assert_eq!(Some(&json!(true)), profiles.discrete_value_at("/mode/conflicted", at(5)));
    Ok(())
}

#[test]
fn agreeing_register_writes_do_not_conflict() -> Result<()> {
    let plan = [
        Directive::new(at(1), "SetMode").with("value", 4.0),
        Directive::new(at(1), "SetMode").with("value", 4.0),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);
    assert!(results.report.is_clean());
    assert_eq!(Some(&json!(4.0)), results.profiles.discrete_value_at("/mode/value", at(1)));
    Ok(())
}

#[test]
fn sequential_writes_in_one_task_do_not_conflict() -> Result<()> {
    let schema = schema_with(|root| {
        root.daemon("twice", |ctx| async move {
            ctx.model().mode.set(&ctx, 1.0);
            ctx.model().mode.set(&ctx, 2.0);
            assert_eq!(2.0, ctx.model().mode.get(&ctx));
            Ok(())
        })?;
        Ok(())
    })?;
    let results = Simulation::simulate(schema, SimulationConfig::default(), []);
    assert!(results.report.is_clean());
    assert_eq!(Some(&json!(2.0)), results.profiles.discrete_value_at("/mode/value", at(0)));
    Ok(())
}

#[test]
fn fill_integrates_volume() -> Result<()> {
    let plan = [Directive::new(at(0), "Fill").with("rate", 1.0).with("seconds", 10)];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    assert!(results.report.is_clean());
    assert_eq!(at(10), results.end);
    assert_eq!(Some(100.0), results.profiles.real_value_at("/tank/volume", at(0)));
    assert_eq!(Some(105.0), results.profiles.real_value_at("/tank/volume", at(5)));
    assert_eq!(Some(110.0), results.profiles.real_value_at("/tank/volume", at(10)));
    assert_eq!(Some(0.0), results.profiles.real_value_at("/tank/rate", at(10)));
    Ok(())
}

#[test]
fn concurrent_fills_add_up() -> Result<()> {
    let plan = [
        Directive::new(at(0), "Fill").with("rate", 1.0).with("seconds", 10),
        Directive::new(at(0), "Fill").with("rate", 2.0).with("seconds", 5),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    assert!(results.report.is_clean());
    assert_eq!(Some(115.0), results.profiles.real_value_at("/tank/volume", at(5)));
    assert_eq!(Some(120.0), results.profiles.real_value_at("/tank/volume", at(10)));
    Ok(())
}

#[test]
fn waiting_for_a_level() -> Result<()> {
    let plan = [
        Directive::new(at(0), "Fill").with("rate", 1.0).with("seconds", 10),
        Directive::new(at(0), "WaitForLevel").with("level", 105.0),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    assert!(results.report.is_clean());
    let mode = &results.profiles.discrete["/mode/value"];
    assert_eq!(2, mode.len());
    assert_eq!(at(5), mode[1].start);
    assert_eq!(json!(105.0), mode[1].value);
    Ok(())
}

#[test]
fn failed_tasks_keep_their_effects() -> Result<()> {
    let plan = [
        Directive::new(at(1), "Explode"),
        Directive::new(at(1), "SetMode").with("value", 3.0),
    ];
    let results = Simulation::simulate(
        schema()?,
        SimulationConfig::default().with_horizon(Duration::seconds(3)),
        plan,
    );

    let failures = &results.report.failures;
    assert_eq!(1, failures.len());
    assert_eq!("Explode", failures[0].label);
    assert_eq!(at(1), failures[0].time);
    assert!(failures[0].reason.contains("boom"));

    assert_eq!(Some(104.0), results.profiles.real_value_at("/tank/volume", at(3)));
    assert_eq!(Some(&json!(3.0)), results.profiles.discrete_value_at("/mode/value", at(3)));
    assert!(results.report.conflicts.is_empty());
    Ok(())
}

#[test]
fn unknown_argument_is_rejected_and_the_rest_runs() -> Result<()> {
    let plan = [
        Directive::new(at(0), "SetMode").with("value", 1.0).with("extra", 1),
        Directive::new(at(2), "SetMode").with("value", 2.0),
    ];
    let results = Simulation::simulate(schema()?, SimulationConfig::default(), plan);

    assert_eq!(1, results.report.rejected.len());
    assert_eq!(
        UnconstructableActivity::UnknownArgument {
            kind: "SetMode".to_string(),
            key: "extra".to_string()
        },
        results.report.rejected[0].error
    );
    assert_eq!(Some(&json!(0.0)), results.profiles.discrete_value_at("/mode/value", at(1)));
    assert_eq!(Some(&json!(2.0)), results.profiles.discrete_value_at("/mode/value", at(2)));
    Ok(())
}
