use clap::Parser;
use kestrel::*;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod activities;
mod model;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON array of directives; runs a built-in plan if omitted
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// JSON simulation config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Horizon in hours, if the config doesn't set one
    #[arg(long, default_value_t = 6)]
    hours: i64,

    /// Instead of printing full results, run this many variants of the plan in parallel
    /// with increasing science power and print a summary of each
    #[arg(short, long)]
    sweep: Option<usize>,
}

#[derive(Serialize)]
struct Summary {
    variant: usize,
    power_scale: f64,
    final_charge_wh: Option<f64>,
    min_charge_wh: Option<f64>,
    rejected: usize,
    conflicts: usize,
    failures: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("potato_sat=info,kestrel=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config: SimulationConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => SimulationConfig::default(),
    };
    if config.horizon.is_none() {
        config.horizon = Some(Duration::hours(args.hours));
    }
    let plan: Vec<Directive> = match &args.plan {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => model::demo_plan(),
    };
    let schema = Arc::new(model::build()?);
    info!(directives = plan.len(), horizon = ?config.horizon, "loaded plan");

    match args.sweep {
        None => {
            let results = Simulation::simulate(schema, config, plan);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Some(variants) => {
            let summaries: Vec<Summary> = (0..variants)
                .into_par_iter()
                .map(|variant| {
                    let power_scale = 1.0 + variant as f64 * 0.25;
                    let results = Simulation::simulate(schema.clone(), config.clone(), scale_power(&plan, power_scale));
                    summarize(variant, power_scale, &results)
                })
                .collect();
            for summary in summaries {
                println!("{}", serde_json::to_string(&summary)?);
            }
        }
    }
    Ok(())
}

/// Multiplies every `power_w` argument in the plan.
fn scale_power(plan: &[Directive], factor: f64) -> Vec<Directive> {
    plan.iter()
        .cloned()
        .map(|mut directive| {
            if let Some(power) = directive.arguments.get("power_w").and_then(Value::as_f64) {
                directive.arguments.insert("power_w".to_string(), Value::from(power * factor));
            }
            directive
        })
        .collect()
}

fn summarize(variant: usize, power_scale: f64, results: &SimulationResults) -> Summary {
    let charge = results.profiles.real.get("/battery/volume");
    let min_charge_wh = charge.and_then(|segments| {
        segments
            .iter()
            .flat_map(|segment| {
                let end = segment.end.unwrap_or(segment.start);
                [segment.value_at(segment.start), segment.value_at(end)]
            })
            .min_by(f64::total_cmp)
    });
    Summary {
        variant,
        power_scale,
        final_charge_wh: results.profiles.real_value_at("/battery/volume", results.end),
        min_charge_wh,
        rejected: results.report.rejected.len(),
        conflicts: results.report.conflicts.len(),
        failures: results.report.failures.len(),
    }
}
