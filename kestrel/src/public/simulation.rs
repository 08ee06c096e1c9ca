use crate::internal::exec::{self, Active, Frame, Request, TaskBody};
use crate::internal::history::NodeId;
use crate::internal::profile::ProfileRecorder;
use crate::internal::task::{Program, Task};
use crate::public::activity::{Activity, ActivityId, Directive, UnconstructableActivity};
use crate::public::condition::Condition;
use crate::public::config::SimulationConfig;
use crate::public::context::Context;
use crate::public::report::{
    CellConflict, PendingWait, Profiles, RejectedActivity, RunReport, SimulationResults,
    TaskFailure, UnresolvedWait,
};
use crate::public::resource::{Resource, Snapshot};
use crate::public::schema::{CellId, Schema};
use crate::public::task::{TaskId, TaskState};
use crate::Instant;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;
use std::task::Poll;
use tracing::{debug, info, trace, warn};

/// One run of a model.
///
/// The engine owns the clock, the history, and every task. Each [Simulation::step] finds the
/// earliest instant at which some task is due, runs all tasks due then in task-id order, each
/// on its own branch of history, and joins their effects onto the main line. Tasks started or
/// woken during a step at the same instant run in a following step at that instant, and see
/// the joined state.
pub struct Simulation<M> {
    schema: Arc<Schema<M>>,
    config: SimulationConfig,
    frame: Rc<RefCell<Frame<M>>>,
    // Finished tasks stay here for the whole run: later `wait_for` calls and the task queries
    // still need their state. Only their label, parent and state are kept; the future is
    // dropped as soon as the task finishes.
    tasks: BTreeMap<TaskId, Task<M>>,
    queue: BTreeSet<(Instant, TaskId)>,
    conditions: BTreeMap<TaskId, Condition>,
    due: BTreeSet<(Instant, TaskId)>,
    waiters: BTreeMap<TaskId, Vec<TaskId>>,
    frontier: NodeId,
    timeline: BTreeMap<Instant, NodeId>,
    activities: BTreeMap<ActivityId, TaskId>,
    next_activity: u32,
    steps: u64,
    report: RunReport,
    recorder: ProfileRecorder,
}

impl<M: 'static> Simulation<M> {
    /// Prepares a run, scheduling every daemon at the origin in registration order.
    pub fn new(schema: Arc<Schema<M>>, config: SimulationConfig) -> Self {
        let history = schema.history();
        let frontier = history.origin();
        let mut recorder = ProfileRecorder::new(&schema);
        recorder.sample(&Snapshot::new(&history, frontier));

        let mut simulation = Simulation {
            schema: schema.clone(),
            config,
            frame: Rc::new(RefCell::new(Frame::new(history))),
            tasks: BTreeMap::new(),
            queue: BTreeSet::new(),
            conditions: BTreeMap::new(),
            due: BTreeSet::new(),
            waiters: BTreeMap::new(),
            frontier,
            timeline: BTreeMap::from([(Instant::ORIGIN, frontier)]),
            activities: BTreeMap::new(),
            next_activity: 0,
            steps: 0,
            report: RunReport::default(),
            recorder,
        };

        for (id, daemon) in &schema.daemons {
            let daemon = daemon.clone();
            let task = simulation.frame.borrow_mut().allocate_task();
            simulation.admit(task, id.clone(), None, Instant::ORIGIN, Box::new(move |ctx| daemon(ctx)));
        }

        info!(
            cells = schema.cell_count(),
            daemons = schema.daemons.len(),
            horizon = ?simulation.config.horizon,
            "simulation initialized"
        );
        simulation
    }

    /// Builds, runs, and finishes a simulation in one call.
    pub fn simulate(
        schema: Arc<Schema<M>>,
        config: SimulationConfig,
        directives: impl IntoIterator<Item = Directive>,
    ) -> SimulationResults {
        let mut simulation = Simulation::new(schema, config);
        for directive in directives {
            // Rejections are kept in the report.
            let _ = simulation.submit(directive);
        }
        simulation.run();
        simulation.finish()
    }

    pub fn schema(&self) -> &Arc<Schema<M>> {
        &self.schema
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.frame.borrow().clock
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Schedules an activity.
    ///
    /// A directive that cannot be turned into a runnable activity is rejected, recorded in the
    /// report, and never scheduled. The returned id is consumed either way.
    pub fn submit(&mut self, directive: Directive) -> Result<ActivityId, UnconstructableActivity> {
        let activity = ActivityId::new(self.next_activity);
        self.next_activity += 1;
        match self.instantiate(&directive) {
            Ok(instance) => {
                let task = self.frame.borrow_mut().allocate_task();
                self.admit(
                    task,
                    directive.kind.clone(),
                    None,
                    directive.start,
                    Box::new(move |ctx| instance.run(ctx)),
                );
                self.activities.insert(activity, task);
                debug!(%activity, %task, kind = %directive.kind, start = %directive.start, "activity scheduled");
                Ok(activity)
            }
            Err(error) => {
                warn!(%activity, kind = %directive.kind, %error, "activity rejected");
                self.report.rejected.push(RejectedActivity {
                    activity,
                    kind: directive.kind,
                    start: directive.start,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn instantiate(&self, directive: &Directive) -> Result<Box<dyn Activity<M>>, UnconstructableActivity> {
        let now = self.now();
        if directive.start < now {
            return Err(UnconstructableActivity::StartInPast {
                kind: directive.kind.clone(),
                start: directive.start,
                now,
            });
        }
        let instantiate = self.schema.activity_type(&directive.kind).ok_or_else(|| {
            UnconstructableActivity::UnknownType {
                kind: directive.kind.clone(),
            }
        })?;
        instantiate(directive)
    }

    /// The task running a submitted activity.
    pub fn task_for(&self, activity: ActivityId) -> Option<TaskId> {
        self.activities.get(&activity).copied()
    }

    pub fn task_state(&self, task: TaskId) -> Option<&TaskState> {
        self.tasks.get(&task).map(|t| &t.state)
    }

    pub fn task_label(&self, task: TaskId) -> Option<&str> {
        self.tasks.get(&task).map(|t| t.label.as_str())
    }

    pub fn task_parent(&self, task: TaskId) -> Option<TaskId> {
        self.tasks.get(&task).and_then(|t| t.parent)
    }

    /// Every task the engine knows about, in id order, including finished ones.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &str)> {
        self.tasks.iter().map(|(id, task)| (*id, task.label.as_str()))
    }

    fn admit(&mut self, id: TaskId, label: String, parent: Option<TaskId>, start: Instant, body: TaskBody<M>) {
        trace!(task = %id, %label, %start, "task admitted");
        self.tasks
            .insert(id, Task::new(label, parent, TaskState::WaitingUntil(start), body));
        self.queue.insert((start, id));
    }

    /// The next instant at which some task is due.
    pub fn next_time(&self) -> Option<Instant> {
        let queued = self.queue.first().map(|(time, _)| *time);
        let due = self.due.first().map(|(time, _)| *time);
        match (queued, due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs every task due at the next instant. Returns that instant, or `None` once nothing
    /// is due at or before the horizon.
    pub fn step(&mut self) -> Option<Instant> {
        let time = self.next_time()?;
        if self.config.horizon_instant().is_some_and(|horizon| time > horizon) {
            return None;
        }
        {
            let frame = self.frame.borrow();
            self.recorder
                .fill(&Snapshot::new(&frame.history, self.frontier), time);
        }
        let batch = self.take_batch(time);
        let base = {
            let mut frame = self.frame.borrow_mut();
            frame.clock = time;
            frame.history.advance(self.frontier, time)
        };
        debug!(%time, tasks = batch.len(), "step");

        let mut branches = Vec::with_capacity(batch.len());
        for task in batch {
            if let Some(tip) = self.run_task(task, base, time) {
                branches.push((task, tip));
            }
        }

        self.frontier = self.join(base, &branches, time);
        self.timeline.insert(time, self.frontier);
        {
            let frame = self.frame.borrow();
            self.recorder
                .sample(&Snapshot::new(&frame.history, self.frontier));
        }
        self.reschedule_conditions();

        self.steps += 1;
        if self.config.gc_interval > 0 && self.steps % self.config.gc_interval == 0 {
            self.collect_garbage();
        }
        Some(time)
    }

    /// Steps until nothing is due at or before the horizon.
    pub fn run(&mut self) -> &RunReport {
        while self.step().is_some() {}
        &self.report
    }

    /// Steps through every instant up to and including `until`.
    pub fn run_until(&mut self, until: Instant) {
        while self.next_time().is_some_and(|time| time <= until) {
            if self.step().is_none() {
                break;
            }
        }
    }

    fn take_batch(&mut self, time: Instant) -> Vec<TaskId> {
        let mut batch = Vec::new();
        while let Some(&(at, task)) = self.queue.first() {
            if at != time {
                break;
            }
            self.queue.pop_first();
            batch.push(task);
        }
        while let Some(&(at, task)) = self.due.first() {
            if at != time {
                break;
            }
            self.due.pop_first();
            self.conditions.remove(&task);
            batch.push(task);
        }
        batch.sort_unstable();
        batch.dedup();
        batch
    }

    /// Polls one task on a fresh branch of `base`, returning the tip of that branch.
    fn run_task(&mut self, id: TaskId, base: NodeId, time: Instant) -> Option<NodeId> {
        let program = {
            let task = self.tasks.get_mut(&id)?;
            task.state = TaskState::Runnable;
            std::mem::replace(&mut task.program, Program::Finished)
        };
        {
            let mut frame = self.frame.borrow_mut();
            let cursor = frame.history.fork(base);
            frame.active = Some(Active {
                task: id,
                cursor,
                request: None,
            });
        }

        let (poll, future) = match program {
            Program::Unstarted(body) => {
                let ctx = Context::new(id, self.frame.clone(), self.schema.clone());
                match exec::start(body, ctx) {
                    Ok(mut future) => (exec::drive(&mut future), Some(future)),
                    Err(reason) => (Poll::Ready(Err(reason)), None),
                }
            }
            Program::Started(mut future) => (exec::drive(&mut future), Some(future)),
            Program::Finished => unreachable!("{id} was resumed after finishing"),
        };

        let active = match self.frame.borrow_mut().active.take() {
            Some(active) => active,
            None => unreachable!("{id} lost its active record"),
        };
        self.absorb_spawned(time);

        match poll {
            Poll::Ready(Ok(())) => self.finish_task(id, time, None),
            Poll::Ready(Err(reason)) => self.finish_task(id, time, Some(reason)),
            Poll::Pending => {
                if let (Some(task), Some(future)) = (self.tasks.get_mut(&id), future) {
                    task.program = Program::Started(future);
                }
                self.suspend(id, active.request, time);
            }
        }
        Some(active.cursor)
    }

    fn absorb_spawned(&mut self, time: Instant) {
        let spawned = std::mem::take(&mut self.frame.borrow_mut().spawned);
        for child in spawned {
            if child.delay.is_negative() {
                let reason = format!("cannot start after a negative delay ({})", child.delay);
                self.tasks.insert(
                    child.id,
                    Task::new(child.label, Some(child.parent), TaskState::Runnable, child.body),
                );
                self.finish_task(child.id, time, Some(reason));
                continue;
            }
            match time.checked_add(child.delay) {
                Ok(start) => self.admit(child.id, child.label, Some(child.parent), start, child.body),
                Err(e) => {
                    self.tasks.insert(
                        child.id,
                        Task::new(child.label, Some(child.parent), TaskState::Runnable, child.body),
                    );
                    self.finish_task(child.id, time, Some(format!("start time {e}")));
                }
            }
        }
    }

    fn suspend(&mut self, id: TaskId, request: Option<Request>, time: Instant) {
        let state = match request {
            None => {
                return self.finish_task(
                    id,
                    time,
                    Some("task yielded outside of a suspension point".to_string()),
                );
            }
            Some(Request::Delay(duration)) if duration.is_negative() => {
                return self.finish_task(
                    id,
                    time,
                    Some(format!("cannot delay by a negative duration ({duration})")),
                );
            }
            Some(Request::Delay(duration)) => match time.checked_add(duration) {
                Ok(until) => {
                    self.queue.insert((until, id));
                    TaskState::WaitingUntil(until)
                }
                Err(e) => return self.finish_task(id, time, Some(format!("delay of {duration}: {e}"))),
            },
            Some(Request::Task(target)) if target == id => {
                return self.finish_task(id, time, Some("a task cannot wait for itself".to_string()));
            }
            Some(Request::Task(target)) => match self.tasks.get(&target).map(|t| t.state.is_finished()) {
                None => {
                    return self.finish_task(id, time, Some(format!("cannot wait for unknown {target}")));
                }
                Some(true) => {
                    self.queue.insert((time, id));
                    TaskState::Runnable
                }
                Some(false) => {
                    self.waiters.entry(target).or_default().push(id);
                    TaskState::WaitingOnChild(target)
                }
            },
            Some(Request::Condition(condition)) => {
                self.conditions.insert(id, condition.clone());
                TaskState::WaitingOnCondition(condition)
            }
        };
        if let Some(task) = self.tasks.get_mut(&id) {
            task.state = state;
        }
    }

    fn finish_task(&mut self, id: TaskId, time: Instant, failure: Option<String>) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.program = Program::Finished;
            task.state = match failure {
                None => {
                    trace!(task = %id, label = %task.label, "task completed");
                    TaskState::Completed
                }
                Some(reason) => {
                    warn!(task = %id, label = %task.label, %time, %reason, "task failed");
                    self.report.failures.push(TaskFailure {
                        task: id,
                        label: task.label.clone(),
                        time,
                        reason: reason.clone(),
                    });
                    TaskState::Failed(reason)
                }
            };
        }
        if let Some(waiters) = self.waiters.remove(&id) {
            for waiter in waiters {
                self.queue.insert((time, waiter));
                if let Some(task) = self.tasks.get_mut(&waiter) {
                    task.state = TaskState::Runnable;
                }
            }
        }
    }

    /// Folds each branch's effects per cell, combines branches in task-id order, and commits
    /// the result onto `base` one cell at a time.
    fn join(&mut self, base: NodeId, branches: &[(TaskId, NodeId)], time: Instant) -> NodeId {
        let mut frame = self.frame.borrow_mut();
        let history = &mut frame.history;

        let mut combined: BTreeMap<CellId, Box<dyn Any>> = BTreeMap::new();
        for &(_, tip) in branches {
            let mut net: BTreeMap<CellId, Box<dyn Any>> = BTreeMap::new();
            for (cell, effect) in history.commits_since(tip, base) {
                let slot = &history.cell_slot(cell).initial;
                let folded = match net.remove(&cell) {
                    Some(prefix) => slot.sequentially_erased(&*prefix, effect),
                    None => slot.clone_effect(effect),
                };
                net.insert(cell, folded);
            }
            for (cell, effect) in net {
                let slot = &history.cell_slot(cell).initial;
                let folded = match combined.remove(&cell) {
                    Some(left) => slot.concurrently_erased(&*left, &*effect),
                    None => effect,
                };
                combined.insert(cell, folded);
            }
        }

        let touched: Vec<CellId> = combined.keys().copied().collect();
        let mut node = base;
        for (cell, effect) in combined {
            node = history.commit(node, cell, effect);
        }
        for cell in touched {
            if history.state(cell, node).conflicted() {
                let label = history.cell_label(cell).to_string();
                warn!(cell = %label, %time, "concurrent effects conflict");
                self.report.conflicts.push(CellConflict { cell: label, time });
            }
        }
        node
    }

    fn reschedule_conditions(&mut self) {
        self.due.clear();
        if self.conditions.is_empty() {
            return;
        }
        let limit = self.config.horizon_instant().unwrap_or(Instant::MAX);
        let frame = self.frame.borrow();
        let now = Snapshot::new(&frame.history, self.frontier);
        for (task, condition) in &self.conditions {
            if let Some(time) = condition.next_satisfied(&now, limit) {
                trace!(task = %task, %time, "condition satisfied");
                self.due.insert((time, *task));
            }
        }
    }

    /// Drops history that no longer leads to the main line.
    pub fn collect_garbage(&mut self) -> usize {
        let frontier = self.frontier;
        let removed = self.frame.borrow_mut().history.sweep(&[frontier]);
        debug!(removed, "history swept");
        removed
    }

    pub fn history_len(&self) -> usize {
        self.frame.borrow().history.len()
    }

    /// Samples a resource at the current instant.
    pub fn ask<R: Resource>(&self, resource: &R) -> R::Value {
        let frame = self.frame.borrow();
        resource.sample(&Snapshot::new(&frame.history, self.frontier))
    }

    /// Samples a resource at an instant the run has already passed.
    pub fn ask_at<R: Resource>(&self, resource: &R, time: Instant) -> Option<R::Value> {
        if time > self.now() {
            return None;
        }
        let (_, &node) = self.timeline.range(..=time).next_back()?;
        let frame = self.frame.borrow();
        Some(resource.sample(&Snapshot::new(&frame.history, node).at(time)))
    }

    /// Exported profiles as recorded so far.
    pub fn profiles(&self) -> Profiles {
        let frame = self.frame.borrow();
        self.recorder.export(
            &Snapshot::new(&frame.history, self.frontier),
            self.now(),
            &*self.config.approximation.approximator(),
        )
    }

    fn unresolved(&self) -> Vec<UnresolvedWait> {
        let now = self.now();
        self.tasks
            .iter()
            .filter_map(|(id, task)| {
                let wait = match &task.state {
                    TaskState::WaitingUntil(time) => PendingWait::Until { time: *time },
                    TaskState::Runnable => PendingWait::Until { time: now },
                    TaskState::WaitingOnCondition(condition) => PendingWait::Condition {
                        description: format!("{condition:?}"),
                    },
                    TaskState::WaitingOnChild(child) => PendingWait::Task { task: *child },
                    TaskState::Completed | TaskState::Failed(_) => return None,
                };
                Some(UnresolvedWait {
                    task: *id,
                    label: task.label.clone(),
                    wait,
                })
            })
            .collect()
    }

    /// Ends the run, reporting every task still waiting and exporting profiles up to the
    /// horizon (or the last instant reached, without one).
    pub fn finish(mut self) -> SimulationResults {
        let now = self.now();
        let end = self
            .config
            .horizon_instant()
            .map_or(now, |horizon| horizon.max(now));
        self.report.unresolved = self.unresolved();
        for wait in &self.report.unresolved {
            warn!(task = %wait.task, label = %wait.label, wait = ?wait.wait, "wait unresolved at end of run");
        }
        let profiles = {
            let frame = self.frame.borrow();
            self.recorder.export(
                &Snapshot::new(&frame.history, self.frontier),
                end,
                &*self.config.approximation.approximator(),
            )
        };
        info!(
            steps = self.steps,
            %end,
            rejected = self.report.rejected.len(),
            conflicts = self.report.conflicts.len(),
            failures = self.report.failures.len(),
            unresolved = self.report.unresolved.len(),
            "simulation finished"
        );
        SimulationResults {
            start: self.config.start,
            end,
            profiles,
            report: self.report,
        }
    }
}
