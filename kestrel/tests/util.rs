#![allow(dead_code)]

use kestrel::models::{Accumulator, Register};
use kestrel::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct TestModel {
    pub mode: Register<f64>,
    pub tank: Accumulator,
}

/// The shared test model: a register at `/mode` and a tank at `/tank` starting at 100.
pub fn schema() -> Result<Arc<Schema<TestModel>>> {
    schema_with(|_| Ok(()))
}

/// The shared test model, plus whatever `extra` registers at the root.
pub fn schema_with(extra: impl FnOnce(&Registrar<TestModel>) -> Result<()>) -> Result<Arc<Schema<TestModel>>> {
    let builder = Builder::new();
    let root = builder.root();
    let mode = Register::create(&root.descend("mode"), 0.0)?;
    let tank = Accumulator::create(&root.descend("tank"), 100.0, 0.0)?;
    root.activity_type::<SetMode>("SetMode")?;
    root.activity_type::<Fill>("Fill")?;
    root.activity_type::<WaitForLevel>("WaitForLevel")?;
    root.activity_type::<Explode>("Explode")?;
    extra(&root)?;
    Ok(Arc::new(builder.build(TestModel { mode, tank })?))
}

pub fn at(seconds: i64) -> Instant {
    Instant::ORIGIN + Duration::seconds(seconds)
}

#[derive(Serialize, Deserialize)]
pub struct SetMode {
    pub value: f64,
}

impl Activity<TestModel> for SetMode {
    fn run(self: Box<Self>, ctx: Context<TestModel>) -> TaskFuture {
        Box::pin(async move {
            ctx.model().mode.set(&ctx, self.value);
            Ok(())
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct Fill {
    pub rate: f64,
    pub seconds: i64,
}

impl Activity<TestModel> for Fill {
    fn validate(&self) -> Vec<String> {
        if self.seconds < 0 {
            vec!["seconds must not be negative".to_string()]
        } else {
            vec![]
        }
    }

    fn run(self: Box<Self>, ctx: Context<TestModel>) -> TaskFuture {
        Box::pin(async move {
            ctx.model().tank.add_rate(&ctx, self.rate);
            ctx.delay(Duration::seconds(self.seconds)).await;
            ctx.model().tank.add_rate(&ctx, -self.rate);
            Ok(())
        })
    }
}

/// Waits for the tank to reach `level`, then records the level in the mode register.
#[derive(Serialize, Deserialize)]
pub struct WaitForLevel {
    pub level: f64,
}

impl Activity<TestModel> for WaitForLevel {
    fn run(self: Box<Self>, ctx: Context<TestModel>) -> TaskFuture {
        Box::pin(async move {
            let full = ctx.model().tank.volume.at_least(self.level);
            ctx.wait_until(full).await;
            ctx.model().mode.set(&ctx, self.level);
            Ok(())
        })
    }
}

/// Opens the tank valve, then fails.
#[derive(Serialize, Deserialize)]
pub struct Explode {}

impl Activity<TestModel> for Explode {
    fn run(self: Box<Self>, ctx: Context<TestModel>) -> TaskFuture {
        Box::pin(async move {
            ctx.model().tank.add_rate(&ctx, 2.0);
            bail!("boom")
        })
    }
}
