#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskcent_core::api::TaskApi;
use taskcent_core::error::ApiError;
use taskcent_core::task::TaskId;
use taskcent_shared::{RawId, RawTask, TaskDraft, TaskPatch};
use tokio::sync::{mpsc, oneshot};

/// A request parked until the test releases it.
pub struct Held {
    pub op: &'static str,
    pub id: Option<String>,
    release: oneshot::Sender<()>,
}

impl Held {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Default)]
struct Server {
    tasks: Vec<RawTask>,
    next_id: u64,
    calls: HashMap<&'static str, usize>,
    fail_next: Option<ApiError>,
}

/// In-memory task server. The response is computed when the request
/// arrives; delivery can be held back with [`FakeApi::hold_responses`].
#[derive(Default)]
pub struct FakeApi {
    server: Mutex<Server>,
    hold: Mutex<Option<mpsc::UnboundedSender<Held>>>,
}

impl FakeApi {
    pub fn with_tasks(tasks: Vec<RawTask>) -> Arc<Self> {
        let api = Self::default();
        api.server.lock().tasks = tasks;
        Arc::new(api)
    }

    pub fn calls(&self, op: &str) -> usize {
        self.server.lock().calls.get(op).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.server.lock().calls.values().sum()
    }

    pub fn fail_next(&self, err: ApiError) {
        self.server.lock().fail_next = Some(err);
    }

    pub fn server_titles(&self) -> Vec<String> {
        self.server.lock().tasks.iter().map(|t| t.title.clone()).collect()
    }

    /// From now on every response waits for the test to release it.
    pub fn hold_responses(&self) -> mpsc::UnboundedReceiver<Held> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.hold.lock() = Some(tx);
        rx
    }

    pub fn stop_holding(&self) {
        *self.hold.lock() = None;
    }

    fn begin(&self, op: &'static str) -> Result<(), ApiError> {
        let mut server = self.server.lock();
        *server.calls.entry(op).or_default() += 1;
        match server.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn deliver<T>(&self, op: &'static str, id: Option<&TaskId>, response: T) -> T {
        let hold = self.hold.lock().clone();
        if let Some(tx) = hold {
            let (release, released) = oneshot::channel();
            let held = Held {
                op,
                id: id.map(|id| id.to_string()),
                release,
            };
            if tx.send(held).is_ok() {
                let _ = released.await;
            }
        }
        response
    }
}

fn same_id(task: &RawTask, id: &TaskId) -> bool {
    task.object_id
        .clone()
        .or_else(|| task.id.clone())
        .map(RawId::into_string)
        .is_some_and(|value| value == id.as_str())
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn list(&self) -> Result<Vec<RawTask>, ApiError> {
        let response = self.begin("list").map(|()| self.server.lock().tasks.clone());
        self.deliver("list", None, response).await
    }

    async fn create(&self, draft: &TaskDraft) -> Result<RawTask, ApiError> {
        let response = self.begin("create").map(|()| {
            let mut server = self.server.lock();
            server.next_id += 1;
            let created = RawTask {
                object_id: Some(RawId::Text(format!("srv-{}", server.next_id))),
                title: draft.title.clone(),
                description: draft.description.clone(),
                priority: Some(draft.priority.as_str().to_string()),
                status: Some(draft.status.as_str().to_string()),
                due_date: draft.due_date.clone(),
                category: draft.category.clone(),
                ..RawTask::default()
            };
            server.tasks.push(created.clone());
            created
        });
        self.deliver("create", None, response).await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<RawTask, ApiError> {
        let response = self.begin("update").and_then(|()| {
            let mut server = self.server.lock();
            let task = server
                .tasks
                .iter_mut()
                .find(|task| same_id(task, id))
                .ok_or_else(|| ApiError::not_found("Task not found"))?;
            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = description.clone();
            }
            if let Some(status) = patch.status {
                task.status = Some(status.as_str().to_string());
            }
            if let Some(priority) = patch.priority {
                task.priority = Some(priority.as_str().to_string());
            }
            if let Some(due) = &patch.due_date {
                task.due_date = due.clone();
                task.legacy_due_date = None;
            }
            if let Some(category) = &patch.category {
                task.category = category.clone();
            }
            Ok(task.clone())
        });
        self.deliver("update", Some(id), response).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), ApiError> {
        let response = self.begin("delete").and_then(|()| {
            let mut server = self.server.lock();
            let before = server.tasks.len();
            server.tasks.retain(|task| !same_id(task, id));
            if server.tasks.len() == before {
                Err(ApiError::not_found("Task not found"))
            } else {
                Ok(())
            }
        });
        self.deliver("delete", Some(id), response).await
    }
}

pub fn raw(id: &str, title: &str) -> RawTask {
    RawTask {
        object_id: Some(RawId::Text(id.to_string())),
        title: title.to_string(),
        ..RawTask::default()
    }
}

pub fn raw_due(id: &str, title: &str, due: &str) -> RawTask {
    RawTask {
        due_date: Some(due.to_string()),
        ..raw(id, title)
    }
}

pub fn id(value: &str) -> TaskId {
    value.parse().expect("non-empty id")
}

pub fn titled(title: &str) -> TaskPatch {
    TaskPatch {
        title: Some(title.to_string()),
        ..TaskPatch::default()
    }
}
