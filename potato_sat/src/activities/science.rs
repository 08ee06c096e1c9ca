use crate::model::{Mode, PotatoSat, RECOVERED_WH, watts};
use kestrel::*;
use serde::{Deserialize, Serialize};

const HEATER_W: f64 = 5.0;
const WARMUP: Duration = Duration::minutes(5);

/// Warms up the instrument, then observes for `minutes` at `power_w`.
///
/// Waits for enough charge before starting.
#[derive(Serialize, Deserialize)]
pub struct Science {
    pub minutes: i64,
    pub power_w: f64,
}

impl Activity<PotatoSat> for Science {
    fn validate(&self) -> Vec<String> {
        let mut failures = vec![];
        if self.minutes <= 0 {
            failures.push("observation must last at least a minute".to_string());
        }
        if self.power_w < 0.0 {
            failures.push(format!("power must not be negative, got {} W", self.power_w));
        }
        failures
    }

    fn run(self: Box<Self>, ctx: Context<PotatoSat>) -> TaskFuture {
        Box::pin(async move {
            let model = ctx.model();
            ctx.wait_until(model.battery.volume.at_least(RECOVERED_WH)).await;
            model.mode.set(&ctx, Mode::Science);

            ctx.call("warmup", |ctx: Context<PotatoSat>| async move {
                let model = ctx.model();
                model.heater.set(&ctx, true);
                model.battery.add_rate(&ctx, -watts(HEATER_W));
                ctx.delay(WARMUP).await;
                model.battery.add_rate(&ctx, watts(HEATER_W));
                model.heater.set(&ctx, false);
                Ok(())
            })
            .await;

            model.battery.add_rate(&ctx, -watts(self.power_w));
            ctx.delay(Duration::minutes(self.minutes)).await;
            model.battery.add_rate(&ctx, watts(self.power_w));

            if model.mode.get(&ctx) == Mode::Science {
                model.mode.set(&ctx, Mode::Idle);
            }
            Ok(())
        })
    }
}
