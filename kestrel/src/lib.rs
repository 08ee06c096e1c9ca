//! # Kestrel
//!
//! A deterministic discrete-event simulation engine for spacecraft activity plans.
//!
//! A model is a set of *cells* (units of state that evolve on their own and change only in
//! response to effects), *resources* derived from those cells, and *daemons* that run for the
//! whole simulation. A plan is a list of *activities*, each a task started at a fixed instant.
//! The engine advances a single logical clock, runs every task that is due, and records how
//! each exported resource changed along the way.
//!
//! ## Concepts
//!
//! ### Cells and effects
//!
//! Every cell type defines an effect algebra: effects emitted one after another by the same
//! task combine *sequentially*, and effects emitted at the same instant by different tasks
//! combine *concurrently*. The engine folds each batch of effects into one per cell before
//! applying it, so a cell never observes two effects at the same instant, and a cell whose
//! concurrent combination is ambiguous reports a conflict instead of silently picking one.
//! [RegisterCell] and [AccumulatorCell] cover the common cases; anything implementing [Cell]
//! can be registered.
//!
//! ### History
//!
//! State lives in an append-only [History]: a tree of nodes, each holding at most one
//! committed effect. Each task at an instant writes to its own fork of the main line, and the
//! forks are joined once every task at that instant has yielded. Cell states and resource
//! values are memoized per node, so repeated reads are cheap, and any instant the run has
//! passed can be re-read with [Simulation::ask_at].
//!
//! ### Resources and conditions
//!
//! [RealResource]s carry polynomial dynamics, so they can be evaluated at any instant and
//! compared against thresholds analytically. [DiscreteResource]s carry a value and the instant
//! it stays valid until. Both combine into [Condition]s, which tasks can wait on; the engine
//! wakes the task at the first microsecond at which the condition holds.
//!
//! ### Tasks
//!
//! Task bodies are `async` blocks. They only yield at [Context::delay], [Context::wait_for],
//! and [Context::wait_until]; there is no executor and no I/O. Tasks due at the same instant
//! run in task-id order, which follows spawn order, so the same plan always produces the same
//! results.
//!
//! ## Example
//!
//! ```
//! use kestrel::models::Accumulator;
//! use kestrel::*;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Fill {
//!     rate: f64,
//! }
//!
//! impl Activity<Accumulator> for Fill {
//!     fn run(self: Box<Self>, ctx: Context<Accumulator>) -> TaskFuture {
//!         Box::pin(async move {
//!             ctx.model().add_rate(&ctx, self.rate);
//!             ctx.delay(Duration::seconds(10)).await;
//!             ctx.model().add_rate(&ctx, -self.rate);
//!             Ok(())
//!         })
//!     }
//! }
//!
//! # fn main() -> kestrel::Result<()> {
//! let builder = Builder::new();
//! let tank = Accumulator::create(&builder.root().descend("tank"), 100.0, 0.0)?;
//! builder.root().activity_type::<Fill>("Fill")?;
//! let schema = std::sync::Arc::new(builder.build(tank)?);
//!
//! let plan = [Directive::new(Instant::ORIGIN, "Fill").with("rate", 1.0)];
//! let results = Simulation::simulate(schema, SimulationConfig::default(), plan);
//! assert!(results.report.is_clean());
//! assert_eq!(Some(110.0), results.profiles.real_value_at("/tank/volume", Instant::ORIGIN + Duration::seconds(10)));
//! # Ok(())
//! # }
//! ```

pub mod internal;
pub mod public;

pub use internal::exec::TaskFuture;
pub use internal::history::{History, NodeId};
pub use public::activity::{Activity, ActivityId, Directive, UnconstructableActivity};
pub use public::builder::{Builder, Registrar};
pub use public::cell::{AccumulatorCell, Cell, EffectTrait, RegisterCell, RegisterEffect};
pub use public::condition::{Comparison, Condition, Scan, Windows};
pub use public::config::{Approximation, SimulationConfig};
pub use public::context::{Context, Suspend};
pub use public::models;
pub use public::report::{
    CellConflict, DiscreteSegment, PendingWait, Profiles, RejectedActivity, RunReport, SimulationResults,
    TaskFailure, UnresolvedWait,
};
pub use public::resource::builtins::{clock, elapsed_since};
pub use public::resource::{
    Approximator, DelimitedDynamics, DiscreteResource, Exact, Polynomial, RealResource, Resource, ResourceId,
    SecantApproximator, SerdeMapper, Snapshot, ValueMapper,
};
pub use public::schema::{CellId, Query, Schema, SchemaError};
pub use public::simulation::Simulation;
pub use public::task::{TaskId, TaskState};
pub use public::time::{Duration, Instant, TimeOverflow};

pub use anyhow::{Error, Result, anyhow, bail, ensure};
pub use hifitime::Epoch;
