mod util;

use kestrel::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use util::*;

#[test]
fn spawned_children_see_the_joined_instant() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let schema = schema_with(move |root| {
        root.daemon("parent", move |ctx| {
            let log = log.clone();
            async move {
                ctx.model().tank.add_rate(&ctx, 1.0);
                ctx.spawn("child", move |ctx| async move {
                    log.lock().unwrap().push((ctx.now(), ctx.model().tank.rate(&ctx)));
                    Ok(())
                });
                Ok(())
            }
        })?;
        root.daemon("sibling", |ctx| async move {
            ctx.model().tank.add_rate(&ctx, 2.0);
            Ok(())
        })?;
        Ok(())
    })?;

    let results = Simulation::simulate(schema, SimulationConfig::default(), []);
    assert!(results.report.is_clean());
    assert_eq!(vec![(at(0), 3.0)], *seen.lock().unwrap());
    Ok(())
}

#[test]
fn tasks_at_one_instant_do_not_see_each_other() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let schema = schema_with(move |root| {
        root.daemon("writer", |ctx| async move {
            ctx.model().tank.add_rate(&ctx, 5.0);
            Ok(())
        })?;
        root.daemon("reader", move |ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(ctx.model().tank.rate(&ctx));
                ctx.delay(Duration::ZERO).await;
                log.lock().unwrap().push(ctx.model().tank.rate(&ctx));
                Ok(())
            }
        })?;
        Ok(())
    })?;

    Simulation::simulate(schema, SimulationConfig::default(), []);
    assert_eq!(vec![0.0, 5.0], *seen.lock().unwrap());
    Ok(())
}

#[test]
fn call_waits_for_the_child() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let schema = schema_with(move |root| {
        root.daemon("caller", move |ctx| {
            let log = log.clone();
            async move {
                let child = ctx
                    .call("sleeper", |ctx| async move {
                        ctx.delay(Duration::seconds(3)).await;
                        Ok(())
                    })
                    .await;
                log.lock().unwrap().push(ctx.now());
                ctx.wait_for(child).await;
                log.lock().unwrap().push(ctx.now());
                let doomed = ctx
                    .call("doomed", |_ctx| async move { bail!("nope") })
                    .await;
                log.lock().unwrap().push(ctx.now());
                ensure!(doomed != child, "task ids are unique");
                Ok(())
            }
        })?;
        Ok(())
    })?;

    let results = Simulation::simulate(schema, SimulationConfig::default(), []);
    assert_eq!(vec![at(3), at(3), at(3)], *seen.lock().unwrap());
    assert_eq!(1, results.report.failures.len());
    assert_eq!("doomed", results.report.failures[0].label);
    Ok(())
}

#[test]
fn misuse_fails_only_the_offending_task() -> Result<()> {
    let schema = schema_with(|root| {
        root.daemon("negative", |ctx| async move {
            ctx.delay(Duration::seconds(-1)).await;
            Ok(())
        })?;
        root.daemon("self", |ctx| async move {
            ctx.wait_for(ctx.id()).await;
            Ok(())
        })?;
        root.daemon("pending", |_ctx| async move {
            std::future::pending::<()>().await;
            Ok(())
        })?;
        root.daemon("early", |ctx| async move {
            ctx.defer(Duration::seconds(-1), "late", |_ctx| async move { Ok(()) });
            Ok(())
        })?;
        root.daemon("panics", |_ctx| async move {
            if true {
                panic!("kaboom");
            }
            Ok(())
        })?;
        root.daemon("fine", |ctx| async move {
            ctx.model().mode.set(&ctx, 1.0);
            Ok(())
        })?;
        Ok(())
    })?;

    let results = Simulation::simulate(schema, SimulationConfig::default(), []);
    let reasons: BTreeMap<_, _> = results
        .report
        .failures
        .iter()
        .map(|f| (f.label.as_str(), f.reason.as_str()))
        .collect();

    assert_eq!(5, reasons.len());
    assert!(reasons["/negative"].contains("negative"));
    assert!(reasons["/self"].contains("itself"));
    assert!(reasons["/pending"].contains("suspension"));
    assert!(reasons["late"].contains("negative"));
    assert!(reasons["/panics"].contains("kaboom"));
    assert!(results.report.unresolved.is_empty());
    assert_eq!(
        Some(&serde_json::json!(1.0)),
        results.profiles.discrete_value_at("/mode/value", at(0))
    );
    Ok(())
}

#[test]
fn horizon_is_inclusive_and_leftovers_are_reported() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let schema = schema_with(move |root| {
        root.daemon("ticker", move |ctx| {
            let log = log.clone();
            async move {
                while ctx.now() < at(1000) {
                    log.lock().unwrap().push(ctx.now());
                    ctx.delay(Duration::seconds(10)).await;
                }
                Ok(())
            }
        })?;
        Ok(())
    })?;

    let config = SimulationConfig::default().with_horizon(Duration::seconds(20));
    let results = Simulation::simulate(schema, config, []);

    assert_eq!(vec![at(0), at(10), at(20)], *seen.lock().unwrap());
    assert_eq!(at(20), results.end);
    assert_eq!(1, results.report.unresolved.len());
    assert_eq!("/ticker", results.report.unresolved[0].label);
    assert_eq!(PendingWait::Until { time: at(30) }, results.report.unresolved[0].wait);
    Ok(())
}

#[test]
fn unsatisfiable_condition_is_reported() -> Result<()> {
    let schema = schema()?;
    let plan = [Directive::new(at(0), "WaitForLevel").with("level", 1000.0)];
    let results = Simulation::simulate(schema, SimulationConfig::default(), plan);

    assert_eq!(1, results.report.unresolved.len());
    assert!(matches!(
        results.report.unresolved[0].wait,
        PendingWait::Condition { .. }
    ));
    Ok(())
}

#[test]
fn stepping_by_hand() -> Result<()> {
    let schema = schema_with(|root| {
        root.daemon("idle", |_ctx| async move { Ok(()) })?;
        Ok(())
    })?;
    let mut simulation = Simulation::new(schema, SimulationConfig::default());
    let fill = simulation
        .submit(Directive::new(at(2), "Fill").with("rate", 1.0).with("seconds", 4))
        .map_err(Error::new)?;
    let task = simulation.task_for(fill).ok_or_else(|| anyhow!("no task for {fill}"))?;
    assert_eq!(1, task.as_u64());
    assert_eq!(Some("Fill"), simulation.task_label(task));

    assert_eq!(Some(at(0)), simulation.step());
    assert_eq!(Some(at(2)), simulation.next_time());
    simulation.run_until(at(3));
    assert_eq!(at(2), simulation.now());
    assert!(matches!(
        simulation.task_state(task),
        Some(TaskState::WaitingUntil(t)) if *t == at(6)
    ));
    assert_eq!(100.0, simulation.ask(&simulation.schema().model().tank.volume));

    simulation.run();
    assert_eq!(at(6), simulation.now());
    assert!(matches!(simulation.task_state(task), Some(TaskState::Completed)));
    assert_eq!(104.0, simulation.ask(&simulation.schema().model().tank.volume));
    Ok(())
}

#[test]
fn finished_tasks_stay_queryable() -> Result<()> {
    let child = Arc::new(Mutex::new(None));
    let slot = child.clone();
    let schema = schema_with(move |root| {
        root.daemon("parent", move |ctx| {
            let slot = slot.clone();
            async move {
                let id = ctx.spawn("quick", |_ctx| async move { Ok(()) });
                *slot.lock().unwrap() = Some(id);
                ctx.delay(Duration::seconds(5)).await;
                ctx.wait_for(id).await;
                ctx.model().mode.set(&ctx, 1.0);
                Ok(())
            }
        })?;
        Ok(())
    })?;

    let mut simulation = Simulation::new(schema, SimulationConfig::default());
    simulation.run();

    let id = child.lock().unwrap().ok_or_else(|| anyhow!("child never spawned"))?;
    assert!(matches!(simulation.task_state(id), Some(TaskState::Completed)));
    assert_eq!(Some("quick"), simulation.task_label(id));
    let parent = simulation.task_parent(id).ok_or_else(|| anyhow!("child has no parent"))?;
    assert_eq!(Some("/parent"), simulation.task_label(parent));
    assert_eq!(2, simulation.tasks().count());

    assert_eq!(at(5), simulation.now());
    assert_eq!(1.0, simulation.ask(&simulation.schema().model().mode.value));
    assert!(simulation.finish().report.is_clean());
    Ok(())
}
