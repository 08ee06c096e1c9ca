use crate::public::builder::Registrar;
use crate::public::cell::{Cell, RegisterCell, RegisterEffect};
use crate::public::context::Context;
use crate::public::resource::{DiscreteResource, SerdeMapper};
use crate::public::schema::{Query, SchemaError};
use serde::Serialize;

/// A value that tasks overwrite, exported as `value` and `conflicted`.
#[derive(Clone, Debug)]
pub struct Register<T: Clone + PartialEq + Send + Sync + 'static> {
    query: Query<T, RegisterCell<T>>,
    pub value: DiscreteResource<T>,
    pub conflicted: DiscreteResource<bool>,
}

impl<T: Clone + PartialEq + Serialize + Send + Sync + 'static> Register<T> {
    pub fn create<M: 'static>(registrar: &Registrar<M>, initial: T) -> Result<Self, SchemaError> {
        let query = registrar.model(RegisterCell::new(initial), RegisterEffect::set)?;

        let cell = query.clone();
        let value = registrar.discrete("value", move |now| now.ask(&cell).value().clone(), SerdeMapper)?;
        let cell = query.clone();
        let conflicted = registrar.discrete("conflicted", move |now| now.ask(&cell).is_conflicted(), SerdeMapper)?;

        Ok(Register {
            query,
            value,
            conflicted,
        })
    }

    pub fn set<M: 'static>(&self, ctx: &Context<M>, value: T) {
        ctx.emit(&self.query, value);
    }

    pub fn get<M: 'static>(&self, ctx: &Context<M>) -> T {
        ctx.get(&self.value)
    }

    pub fn is_conflicted<M: 'static>(&self, ctx: &Context<M>) -> bool {
        ctx.get(&self.conflicted)
    }

    pub fn query(&self) -> &Query<T, RegisterCell<T>> {
        &self.query
    }
}
