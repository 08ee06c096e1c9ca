use crate::internal::cell::CellSlot;
use crate::public::activity::{Activity, Instantiate, instantiator};
use crate::public::cell::Cell;
use crate::public::context::Context;
use crate::public::resource::discrete::DiscreteResource;
use crate::public::resource::polynomial::Polynomial;
use crate::public::resource::real::RealResource;
use crate::public::resource::{Snapshot, ValueMapper};
use crate::public::schema::{CellId, Daemon, Query, Schema, SchemaError};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

struct Registry<M> {
    cells: Vec<CellSlot>,
    names: BTreeSet<String>,
    real: Vec<(String, RealResource)>,
    discrete: Vec<(String, DiscreteResource<Value>)>,
    daemons: Vec<(String, Daemon<M>)>,
    activity_types: BTreeMap<String, Instantiate<M>>,
}

enum BuilderState<M> {
    Unbuilt(Registry<M>),
    Built,
}

/// The mutable phase of a model definition.
///
/// Registration happens through [Registrar]s handed out by [Builder::root] and
/// [Registrar::descend]. [Builder::build] consumes everything registered so far into an
/// immutable [Schema]; from then on every registrar refuses new registrations.
pub struct Builder<M> {
    state: Rc<RefCell<BuilderState<M>>>,
}

impl<M: 'static> Default for Builder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> Builder<M> {
    pub fn new() -> Self {
        Builder {
            state: Rc::new(RefCell::new(BuilderState::Unbuilt(Registry {
                cells: Vec::new(),
                names: BTreeSet::new(),
                real: Vec::new(),
                discrete: Vec::new(),
                daemons: Vec::new(),
                activity_types: BTreeMap::new(),
            }))),
        }
    }

    pub fn root(&self) -> Registrar<M> {
        Registrar {
            state: self.state.clone(),
            namespace: String::new(),
        }
    }

    /// Freezes the registrations, pairing them with the model struct.
    pub fn build(&self, model: M) -> Result<Schema<M>, SchemaError> {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), BuilderState::Built);
        match previous {
            BuilderState::Unbuilt(registry) => {
                debug!(
                    cells = registry.cells.len(),
                    real = registry.real.len(),
                    discrete = registry.discrete.len(),
                    daemons = registry.daemons.len(),
                    activity_types = registry.activity_types.len(),
                    "schema built"
                );
                Ok(Schema {
                    model,
                    cells: registry.cells.into(),
                    real: registry.real,
                    discrete: registry.discrete,
                    daemons: registry.daemons,
                    activity_types: registry.activity_types,
                })
            }
            BuilderState::Built => Err(SchemaError::AlreadyBuilt),
        }
    }
}

/// Registers things under one namespace of a [Builder].
pub struct Registrar<M> {
    state: Rc<RefCell<BuilderState<M>>>,
    namespace: String,
}

impl<M> Clone for Registrar<M> {
    fn clone(&self) -> Self {
        Registrar {
            state: self.state.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl<M: 'static> Registrar<M> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// A registrar for the child namespace `name`.
    pub fn descend(&self, name: &str) -> Registrar<M> {
        Registrar {
            state: self.state.clone(),
            namespace: self.qualify(name),
        }
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }

    fn with_registry<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Registry<M>) -> Result<T, SchemaError>,
    ) -> Result<T, SchemaError> {
        match &mut *self.state.borrow_mut() {
            BuilderState::Unbuilt(registry) => f(registry),
            BuilderState::Built => Err(SchemaError::Frozen {
                name: name.to_string(),
            }),
        }
    }

    fn claim(registry: &mut Registry<M>, name: &str) -> Result<(), SchemaError> {
        if registry.names.insert(name.to_string()) {
            Ok(())
        } else {
            Err(SchemaError::Duplicate {
                name: name.to_string(),
            })
        }
    }

    /// Adds a cell, returning the query through which tasks emit events to it.
    ///
    /// Cells are labelled by namespace; a namespace holding several cells numbers them.
    pub fn model<E: 'static, C: Cell>(
        &self,
        initial: C,
        interpreter: impl Fn(E) -> C::Effect + Send + Sync + 'static,
    ) -> Result<Query<E, C>, SchemaError> {
        let namespace = if self.namespace.is_empty() { "/" } else { &self.namespace };
        self.with_registry(namespace, |registry| {
            let id = CellId::new(registry.cells.len());
            let siblings = registry
                .cells
                .iter()
                .filter(|slot| slot.label == namespace || slot.label.starts_with(&format!("{namespace}#")))
                .count();
            let label = if siblings == 0 {
                namespace.to_string()
            } else {
                format!("{namespace}#{siblings}")
            };
            registry.cells.push(CellSlot::new(label, initial));
            Ok(Query::new(id, interpreter))
        })
    }

    /// Creates and exports a discrete resource.
    pub fn discrete<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        property: impl Fn(&Snapshot<'_>) -> T + Send + Sync + 'static,
        mapper: impl ValueMapper<T>,
    ) -> Result<DiscreteResource<T>, SchemaError> {
        let resource = DiscreteResource::atom(property);
        self.export_discrete(name, &resource, mapper)?;
        Ok(resource)
    }

    /// Exports an existing discrete resource under `name`.
    pub fn export_discrete<T: Clone + Send + Sync + 'static>(
        &self,
        name: &str,
        resource: &DiscreteResource<T>,
        mapper: impl ValueMapper<T>,
    ) -> Result<(), SchemaError> {
        let name = self.qualify(name);
        self.with_registry(&name, |registry| {
            Self::claim(registry, &name)?;
            let exported = resource.map(move |value| mapper.to_value(value));
            registry.discrete.push((name.clone(), exported));
            Ok(())
        })
    }

    /// Creates and exports a real resource.
    pub fn real(
        &self,
        name: &str,
        property: impl Fn(&Snapshot<'_>) -> Polynomial + Send + Sync + 'static,
    ) -> Result<RealResource, SchemaError> {
        let resource = RealResource::atom(property);
        self.export_real(name, &resource)?;
        Ok(resource)
    }

    pub fn export_real(&self, name: &str, resource: &RealResource) -> Result<(), SchemaError> {
        let name = self.qualify(name);
        self.with_registry(&name, |registry| {
            Self::claim(registry, &name)?;
            registry.real.push((name.clone(), resource.clone()));
            Ok(())
        })
    }

    /// Adds a task that starts at the origin of every simulation.
    pub fn daemon<F, Fut>(&self, id: &str, task: F) -> Result<(), SchemaError>
    where
        F: Fn(Context<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let name = self.qualify(id);
        self.with_registry(&name, |registry| {
            Self::claim(registry, &name)?;
            let daemon: Daemon<M> = Arc::new(move |ctx| task(ctx).boxed_local());
            registry.daemons.push((name.clone(), daemon));
            Ok(())
        })
    }

    /// Makes `A` submittable by the type name `name`. Activity types are not namespaced.
    pub fn activity_type<A>(&self, name: &str) -> Result<(), SchemaError>
    where
        A: Activity<M> + DeserializeOwned,
    {
        self.with_registry(name, |registry| {
            if registry.activity_types.contains_key(name) {
                return Err(SchemaError::Duplicate {
                    name: name.to_string(),
                });
            }
            registry
                .activity_types
                .insert(name.to_string(), instantiator::<M, A>(name));
            Ok(())
        })
    }
}
