use crate::model::{Mode, PotatoSat, watts};
use kestrel::*;
use serde::{Deserialize, Serialize};

const TRANSMITTER_W: f64 = 12.0;

/// Transmits for `minutes` once the spacecraft is idle.
#[derive(Serialize, Deserialize)]
pub struct Downlink {
    pub minutes: i64,
}

impl Activity<PotatoSat> for Downlink {
    fn validate(&self) -> Vec<String> {
        if self.minutes > 0 {
            vec![]
        } else {
            vec!["downlink must last at least a minute".to_string()]
        }
    }

    fn run(self: Box<Self>, ctx: Context<PotatoSat>) -> TaskFuture {
        Box::pin(async move {
            let model = ctx.model();
            ctx.wait_until(model.mode.value.is(Mode::Idle)).await;
            model.mode.set(&ctx, Mode::Downlink);
            model.battery.add_rate(&ctx, -watts(TRANSMITTER_W));
            ctx.delay(Duration::minutes(self.minutes)).await;
            model.battery.add_rate(&ctx, watts(TRANSMITTER_W));
            model.mode.set(&ctx, Mode::Idle);
            Ok(())
        })
    }
}
