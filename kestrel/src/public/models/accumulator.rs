use crate::public::builder::Registrar;
use crate::public::cell::AccumulatorCell;
use crate::public::context::Context;
use crate::public::resource::{Polynomial, RealResource};
use crate::public::schema::{Query, SchemaError};

/// A volume filled at a variable rate, exported as `volume` and `rate`.
#[derive(Clone, Debug)]
pub struct Accumulator {
    query: Query<f64, AccumulatorCell>,
    pub volume: RealResource,
    pub rate: RealResource,
}

impl Accumulator {
    pub fn create<M: 'static>(registrar: &Registrar<M>, volume: f64, rate: f64) -> Result<Self, SchemaError> {
        let query = registrar.model(AccumulatorCell::new(volume, rate), |delta: f64| delta)?;

        let cell = query.clone();
        let volume = registrar.real("volume", move |now| now.ask(&cell).dynamics())?;
        let cell = query.clone();
        let rate = registrar.real("rate", move |now| Polynomial::constant(now.ask(&cell).rate()))?;

        Ok(Accumulator { query, volume, rate })
    }

    /// Changes the fill rate by `delta` per second.
    pub fn add_rate<M: 'static>(&self, ctx: &Context<M>, delta: f64) {
        ctx.emit(&self.query, delta);
    }

    pub fn volume<M: 'static>(&self, ctx: &Context<M>) -> f64 {
        ctx.get(&self.volume)
    }

    pub fn rate<M: 'static>(&self, ctx: &Context<M>) -> f64 {
        ctx.get(&self.rate)
    }

    pub fn query(&self) -> &Query<f64, AccumulatorCell> {
        &self.query
    }
}
