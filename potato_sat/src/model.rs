use crate::activities::{Downlink, RechargePotato, Science};
use kestrel::models::{Accumulator, Register, Sampled};
use kestrel::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const INITIAL_CHARGE_WH: f64 = 50.0;
pub const SOLAR_W: f64 = 30.0;
pub const IDLE_W: f64 = 4.0;
pub const LOW_WH: f64 = 10.0;
pub const RECOVERED_WH: f64 = 20.0;

/// Ninety minute orbit, sunlit for the first sixty.
pub const ORBIT: Duration = Duration::minutes(90);
pub const SUNLIT: Duration = Duration::minutes(60);

/// Daemons stop after this.
pub const MISSION_END: Instant = Instant::from_micros(Duration::hours(24 * 7).as_micros());

/// Battery rates are in watt-hours per second.
pub fn watts(w: f64) -> f64 {
    w / 3600.0
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Idle,
    Science,
    Downlink,
    Safe,
}

pub struct PotatoSat {
    pub battery: Accumulator,
    pub mode: Register<Mode>,
    pub heater: Register<bool>,
    pub sun: Sampled<bool>,
}

pub fn build() -> Result<Schema<PotatoSat>> {
    let builder = Builder::new();
    let root = builder.root();

    let battery = Accumulator::create(&root.descend("battery"), INITIAL_CHARGE_WH, -watts(IDLE_W))?;
    let mode = Register::create(&root.descend("mode"), Mode::Idle)?;
    let heater = Register::create(&root.descend("heater"), false)?;
    let sun = Sampled::create(&root.descend("sun"), true, Duration::MINUTE, |ctx| {
        ctx.now().since_origin().as_micros().rem_euclid(ORBIT.as_micros()) < SUNLIT.as_micros()
    })?;

    let net = battery.rate.scaled(3600.0);
    root.export_real("battery/net_power", &net)?;

    root.daemon("charger", |ctx: Context<PotatoSat>| async move {
        let sunlit = ctx.model().sun.register.value.is(true);
        let eclipse = ctx.model().sun.register.value.is(false);
        while ctx.now() < MISSION_END {
            ctx.wait_until(sunlit.clone()).await;
            ctx.model().battery.add_rate(&ctx, watts(SOLAR_W));
            ctx.wait_until(eclipse.clone()).await;
            ctx.model().battery.add_rate(&ctx, -watts(SOLAR_W));
        }
        Ok(())
    })?;

    root.daemon("safe_mode", |ctx: Context<PotatoSat>| async move {
        let low = ctx.model().battery.volume.less_than(LOW_WH);
        let recovered = ctx.model().battery.volume.at_least(RECOVERED_WH);
        while ctx.now() < MISSION_END {
            ctx.wait_until(low.clone()).await;
            warn!(time = %ctx.now(), "battery low, entering safe mode");
            ctx.model().mode.set(&ctx, Mode::Safe);
            ctx.wait_until(recovered.clone()).await;
            ctx.model().mode.set(&ctx, Mode::Idle);
        }
        Ok(())
    })?;

    root.activity_type::<RechargePotato>("RechargePotato")?;
    root.activity_type::<Science>("Science")?;
    root.activity_type::<Downlink>("Downlink")?;

    Ok(builder.build(PotatoSat {
        battery,
        mode,
        heater,
        sun,
    })?)
}

/// A day in the life.
pub fn demo_plan() -> Vec<Directive> {
    let at = |minutes: i64| Instant::ORIGIN + Duration::minutes(minutes);
    vec![
        Directive::new(at(10), "Science").with("minutes", 30).with("power_w", 20.0),
        Directive::new(at(15), "Downlink").with("minutes", 10),
        Directive::new(at(70), "RechargePotato").with("amount_wh", 5.0).with("rate_w", 15.0),
        Directive::new(at(120), "Science").with("minutes", 45).with("power_w", 25.0),
    ]
}
