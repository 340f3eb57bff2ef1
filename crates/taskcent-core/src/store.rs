use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use taskcent_shared::{TaskDraft, TaskPatch};
use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::error::ApiError;
use crate::task::{Task, TaskId};

/// Presentation order of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Server order; created tasks are appended.
    #[default]
    Server,
    /// Earliest due date first, undated tasks last.
    DueDate,
    /// High priority first, then by due date.
    Priority,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::DueDate => "due",
            Self::Priority => "priority",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "server" => Some(Self::Server),
            "due" | "due_date" => Some(Self::DueDate),
            "priority" => Some(Self::Priority),
            _ => None,
        }
    }

    fn apply(self, tasks: &mut [Task]) {
        match self {
            Self::Server => {}
            Self::DueDate => tasks.sort_by(compare_due),
            Self::Priority => tasks.sort_by(|a, b| {
                a.priority
                    .rank()
                    .cmp(&b.priority.rank())
                    .then_with(|| compare_due(a, b))
            }),
        }
    }
}

fn compare_due(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Default)]
struct Collection {
    tasks: Vec<Task>,
    generation: u64,
    applied: u64,
}

/// Sole owner of the client-side task collection.
///
/// Mutations are confirm-then-apply: nothing changes until the server has
/// answered, and a failed request leaves the collection exactly as it was.
/// Each response is reconciled in one critical section in the order the
/// responses arrive, so for concurrent requests on one task the response
/// that completes last wins.
///
/// [`TaskStore::reset`] starts a new generation. Responses to requests
/// issued before it are handed back to their caller but never applied.
pub struct TaskStore {
    api: Arc<dyn TaskApi>,
    order: SortOrder,
    state: Mutex<Collection>,
}

impl TaskStore {
    pub fn new(api: Arc<dyn TaskApi>, order: SortOrder) -> Self {
        Self {
            api,
            order,
            state: Mutex::new(Collection::default()),
        }
    }

    /// Copy of the collection in presentation order. Take one per render
    /// pass and navigate within it.
    pub fn snapshot(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.state
            .lock()
            .tasks
            .iter()
            .find(|task| task.id() == id)
            .cloned()
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.state
            .lock()
            .tasks
            .iter()
            .position(|task| task.id() == id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole collection with the server's current set.
    #[instrument(skip(self))]
    pub async fn load_tasks(&self) -> Result<usize, ApiError> {
        let issued = self.generation();
        let raw = self.api.list().await.inspect_err(|err| {
            warn!(kind = %err.kind(), error = %err, "list request failed");
        })?;

        let mut tasks = raw
            .into_iter()
            .map(Task::normalize)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| warn!(error = %err, "list response rejected"))?;
        self.order.apply(&mut tasks);

        let count = tasks.len();
        self.reconcile(issued, "load", |current| {
            *current = tasks;
            true
        });
        info!(count, "loaded tasks");
        Ok(count)
    }

    #[instrument(skip(self, draft), fields(title_len = draft.title.len()))]
    pub async fn add_task(&self, draft: TaskDraft) -> Result<Task, ApiError> {
        let issued = self.generation();
        let raw = self.api.create(&draft).await.inspect_err(|err| {
            warn!(kind = %err.kind(), error = %err, "create request failed");
        })?;
        let task = Task::normalize(raw)?;

        let inserted = task.clone();
        self.reconcile(issued, "create", move |tasks| {
            match tasks.iter().position(|t| t.id() == inserted.id()) {
                Some(idx) => tasks[idx] = inserted,
                None => tasks.push(inserted),
            }
            true
        });
        info!(id = %task.id(), "task created");
        Ok(task)
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    pub async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ApiError> {
        let issued = self.generation();
        let raw = self.api.update(id, &patch).await.inspect_err(|err| {
            warn!(kind = %err.kind(), error = %err, "update request failed");
        })?;
        let task = Task::normalize(raw)?;
        if task.id() != id {
            return Err(ApiError::invalid_payload(format!(
                "update of task {id} answered with task {}",
                task.id()
            )));
        }

        let replacement = task.clone();
        let applied = self.reconcile(issued, "update", move |tasks| {
            match tasks.iter().position(|t| t.id() == replacement.id()) {
                Some(idx) => {
                    tasks[idx] = replacement;
                    true
                }
                None => false,
            }
        });
        if !applied {
            debug!(id = %id, "updated task is no longer in the collection; not reinserting");
        }
        Ok(task)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        let issued = self.generation();
        self.api.delete(id).await.inspect_err(|err| {
            warn!(kind = %err.kind(), error = %err, "delete request failed");
        })?;

        self.reconcile(issued, "delete", |tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id() != id);
            tasks.len() != before
        });
        info!(id = %id, "task deleted");
        Ok(())
    }

    /// Session teardown: empties the collection and detaches every request
    /// still in flight.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.tasks.clear();
        info!(generation = state.generation, "task store reset");
    }

    fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    fn reconcile<F>(&self, issued: u64, op: &'static str, apply: F) -> bool
    where
        F: FnOnce(&mut Vec<Task>) -> bool,
    {
        let mut state = self.state.lock();
        if state.generation != issued {
            debug!(
                op,
                issued,
                current = state.generation,
                "dropping response from a previous session"
            );
            return false;
        }

        let changed = apply(&mut state.tasks);
        if changed {
            self.order.apply(&mut state.tasks);
        }
        state.applied += 1;
        debug!(op, seq = state.applied, changed, "reconciled response");
        changed
    }
}
