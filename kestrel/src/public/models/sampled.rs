use crate::Duration;
use crate::public::builder::Registrar;
use crate::public::context::Context;
use crate::public::models::register::Register;
use crate::public::schema::SchemaError;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// A register refreshed every `period` by a daemon named `sample`.
///
/// The daemon writes the first sample at the origin and keeps going until the next sample
/// time would overflow, so runs using it need a horizon.
#[derive(Clone, Debug)]
pub struct Sampled<T: Clone + PartialEq + Send + Sync + 'static> {
    pub register: Register<T>,
    pub period: Duration,
}

impl<T: Clone + PartialEq + Serialize + Send + Sync + 'static> Sampled<T> {
    pub fn create<M: 'static>(
        registrar: &Registrar<M>,
        initial: T,
        period: Duration,
        sample: impl Fn(&Context<M>) -> T + Send + Sync + 'static,
    ) -> Result<Self, SchemaError> {
        let register = Register::create(registrar, initial)?;
        let sample = Arc::new(sample);

        let target = register.clone();
        registrar.daemon("sample", move |ctx| {
            let sample = sample.clone();
            let target = target.clone();
            async move {
                anyhow::ensure!(period > Duration::ZERO, "sampling period must be positive, got {period}");
                loop {
                    let value = sample(&ctx);
                    target.set(&ctx, value);
                    trace!(time = %ctx.now(), "sampled");
                    if ctx.now().checked_add(period).is_err() {
                        return Ok(());
                    }
                    ctx.delay(period).await;
                }
            }
        })?;

        Ok(Sampled { register, period })
    }

    pub fn get<M: 'static>(&self, ctx: &Context<M>) -> T {
        self.register.get(ctx)
    }
}
