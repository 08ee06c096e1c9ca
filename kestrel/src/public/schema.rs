use crate::History;
use crate::internal::cell::CellSlot;
use crate::internal::exec::TaskFuture;
use crate::public::activity::Instantiate;
use crate::public::cell::Cell;
use crate::public::context::Context;
use crate::public::resource::discrete::DiscreteResource;
use crate::public::resource::real::RealResource;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The slot of a cell in a frozen schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    pub(crate) fn new(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => CellId(index),
            Err(_) => panic!("too many cells registered"),
        }
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A handle to a registered cell, translating events of type `E` into the cell's effects.
pub struct Query<E, C: Cell> {
    cell: CellId,
    interpreter: Arc<dyn Fn(E) -> C::Effect + Send + Sync>,
}

impl<E, C: Cell> Query<E, C> {
    pub(crate) fn new(cell: CellId, interpreter: impl Fn(E) -> C::Effect + Send + Sync + 'static) -> Self {
        Query {
            cell,
            interpreter: Arc::new(interpreter),
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn interpret(&self, event: E) -> C::Effect {
        (self.interpreter)(event)
    }
}

impl<E, C: Cell> Clone for Query<E, C> {
    fn clone(&self) -> Self {
        Query {
            cell: self.cell,
            interpreter: self.interpreter.clone(),
        }
    }
}

impl<E, C: Cell> Debug for Query<E, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Query").field(&self.cell).finish()
    }
}

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[display("`{name}` is already registered")]
    Duplicate { name: String },
    #[display("cannot register `{name}` after the schema is built")]
    Frozen { name: String },
    #[display("the schema has already been built")]
    AlreadyBuilt,
}

pub(crate) type Daemon<M> = Arc<dyn Fn(Context<M>) -> TaskFuture + Send + Sync>;

/// A frozen model definition.
///
/// Holds the cells, exported resources, daemons, and activity types registered through a
/// [Builder](crate::Builder), plus the user's model struct. A schema cannot change after
/// it is built, and can be shared between any number of simulations.
pub struct Schema<M> {
    pub(crate) model: M,
    pub(crate) cells: Arc<[CellSlot]>,
    pub(crate) real: Vec<(String, RealResource)>,
    pub(crate) discrete: Vec<(String, DiscreteResource<Value>)>,
    pub(crate) daemons: Vec<(String, Daemon<M>)>,
    pub(crate) activity_types: BTreeMap<String, Instantiate<M>>,
}

impl<M> Schema<M> {
    pub fn model(&self) -> &M {
        &self.model
    }

    /// A fresh history with every cell at its initial state.
    pub fn history(&self) -> History {
        History::new(self.cells.clone())
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_label(&self, cell: CellId) -> Option<&str> {
        self.cells.get(cell.index()).map(|slot| slot.label.as_str())
    }

    pub fn real_resource(&self, name: &str) -> Option<&RealResource> {
        self.real.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn discrete_resource(&self, name: &str) -> Option<&DiscreteResource<Value>> {
        self.discrete.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Names of exported resources, real first, in registration order.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.real
            .iter()
            .map(|(n, _)| n.as_str())
            .chain(self.discrete.iter().map(|(n, _)| n.as_str()))
    }

    pub fn daemon_ids(&self) -> impl Iterator<Item = &str> {
        self.daemons.iter().map(|(id, _)| id.as_str())
    }

    pub fn activity_types(&self) -> impl Iterator<Item = &str> {
        self.activity_types.keys().map(String::as_str)
    }

    pub(crate) fn activity_type(&self, kind: &str) -> Option<&Instantiate<M>> {
        self.activity_types.get(kind)
    }
}
