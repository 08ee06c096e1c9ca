use crate::Instant;
use crate::internal::exec::TaskFuture;
use crate::public::context::Context;
use derive_more::{Display, Error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A unit of simulated behavior, deserialized from a [Directive] and run as a task.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// pub struct Heat {
///     pub seconds: i64,
/// }
///
/// impl Activity<Spacecraft> for Heat {
///     fn run(self: Box<Self>, ctx: Context<Spacecraft>) -> TaskFuture {
///         Box::pin(async move {
///             ctx.model().heater.set(&ctx, true);
///             ctx.delay(Duration::seconds(self.seconds)).await;
///             ctx.model().heater.set(&ctx, false);
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Activity<M>: 'static {
    /// Parameter problems that should keep this instance out of the simulation.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(self: Box<Self>, ctx: Context<M>) -> TaskFuture;
}

/// Sequential identifier for submitted activities, including rejected ones.
#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("activity#{_0}")]
pub struct ActivityId(u32);

impl ActivityId {
    pub(crate) fn new(id: u32) -> Self {
        ActivityId(id)
    }
}

/// A request to run one activity: when, which type, and with what arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub start: Instant,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl Directive {
    pub fn new(start: Instant, kind: impl Into<String>) -> Self {
        Directive {
            start,
            kind: kind.into(),
            arguments: Map::new(),
        }
    }

    /// Adds an argument. Values that do not serialize are stored as null.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.arguments
            .insert(key.into(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }
}

#[derive(Clone, Debug, Display, Error, PartialEq, Serialize, Deserialize)]
pub enum UnconstructableActivity {
    #[display("no activity type named `{kind}`")]
    UnknownType { kind: String },
    #[display("unknown argument `{key}` for `{kind}`")]
    UnknownArgument { kind: String, key: String },
    #[display("invalid arguments for `{kind}`: {reason}")]
    InvalidArguments { kind: String, reason: String },
    #[display("`{kind}` failed validation: {}", failures.join("; "))]
    ValidationFailed { kind: String, failures: Vec<String> },
    #[display("`{kind}` starts at {start}, before the current time {now}")]
    StartInPast {
        kind: String,
        start: Instant,
        now: Instant,
    },
}

pub(crate) type Instantiate<M> = Arc<
    dyn Fn(&Directive) -> Result<Box<dyn Activity<M>>, UnconstructableActivity> + Send + Sync,
>;

/// Builds instances of `A` from directives of one type name.
///
/// Argument keys that `A` does not read are rejected, whether or not `A` denies unknown fields.
pub(crate) fn instantiator<M, A>(kind: &str) -> Instantiate<M>
where
    M: 'static,
    A: Activity<M> + DeserializeOwned,
{
    let kind = kind.to_string();
    Arc::new(move |directive: &Directive| {
        let arguments = Value::Object(directive.arguments.clone());
        let mut ignored = None;
        let activity: A = serde_ignored::deserialize(arguments, |path| {
            ignored.get_or_insert_with(|| path.to_string());
        })
        .map_err(|e| UnconstructableActivity::InvalidArguments {
            kind: kind.clone(),
            reason: e.to_string(),
        })?;

        if let Some(key) = ignored {
            return Err(UnconstructableActivity::UnknownArgument {
                kind: kind.clone(),
                key,
            });
        }

        let failures = activity.validate();
        if !failures.is_empty() {
            return Err(UnconstructableActivity::ValidationFailed {
                kind: kind.clone(),
                failures,
            });
        }
        Ok(Box::new(activity) as Box<dyn Activity<M>>)
    })
}
