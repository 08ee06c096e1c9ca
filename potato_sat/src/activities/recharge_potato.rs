use crate::model::{PotatoSat, watts};
use kestrel::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Plugs in the ground charger until the battery has gained `amount_wh`.
#[derive(Serialize, Deserialize)]
pub struct RechargePotato {
    pub amount_wh: f64,
    pub rate_w: f64,
}

impl Activity<PotatoSat> for RechargePotato {
    fn validate(&self) -> Vec<String> {
        let mut failures = vec![];
        if self.amount_wh <= 0.0 {
            failures.push(format!("amount must be positive, got {} Wh", self.amount_wh));
        }
        if self.rate_w <= 0.0 {
            failures.push(format!("rate must be positive, got {} W", self.rate_w));
        }
        failures
    }

    fn run(self: Box<Self>, ctx: Context<PotatoSat>) -> TaskFuture {
        Box::pin(async move {
            let battery = &ctx.model().battery;
            let target = battery.volume(&ctx) + self.amount_wh;
            battery.add_rate(&ctx, watts(self.rate_w));
            ctx.wait_until(battery.volume.at_least(target)).await;
            battery.add_rate(&ctx, -watts(self.rate_w));
            info!(time = %ctx.now(), target, "recharge complete");
            Ok(())
        })
    }
}
