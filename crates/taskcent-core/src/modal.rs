use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

use crate::error::ApiError;
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Escape,
    Other,
}

/// What currently holds keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    #[default]
    None,
    Button,
    TextInput,
    TextArea,
}

impl FocusTarget {
    /// Arrow keys belong to the field while the user is typing.
    pub fn is_text_entry(self) -> bool {
        matches!(self, Self::TextInput | Self::TextArea)
    }
}

/// Tracks installed global key listeners.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    active: Arc<AtomicUsize>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) -> KeyListener {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(active = now, "key listener installed");
        KeyListener {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// An installed listener. Dropping it uninstalls it.
#[derive(Debug)]
pub struct KeyListener {
    active: Arc<AtomicUsize>,
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        let before = self.active.fetch_sub(1, Ordering::SeqCst);
        trace!(active = before.saturating_sub(1), "key listener removed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Open { task: TaskId },
    ConfirmingDelete { task: TaskId },
    Deleting { task: TaskId },
}

impl ModalState {
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Self::Closed => None,
            Self::Open { task } | Self::ConfirmingDelete { task } | Self::Deleting { task } => {
                Some(task)
            }
        }
    }
}

/// Which arrow keys currently do something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyBindings {
    pub up: bool,
    pub down: bool,
}

/// 0-based index of the displayed task within `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub total: usize,
}

impl Position {
    /// `3/5` style indicator.
    pub fn label(&self) -> String {
        format!("{}/{}", self.index + 1, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Navigated(TaskId),
    DeleteCancelled,
    Closed,
}

/// Proof that the user confirmed deleting `task`. Hand it back to
/// [`ModalController::finish_delete`] with the store's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTicket {
    task: TaskId,
    session: u64,
}

impl DeleteTicket {
    pub fn task(&self) -> &TaskId {
        &self.task
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The task is gone and the modal closed.
    Deleted(TaskId),
    /// The modal was hidden or reopened while the request was in flight.
    Stale,
}

/// Detail overlay over one task of an ordered collection.
///
/// The displayed task is tracked by identifier, never by index: the
/// collection may be re-sorted between renders, so the index is derived
/// from the snapshot passed into each call. A key listener is held exactly
/// while the modal is not closed.
#[derive(Debug)]
pub struct ModalController {
    registry: ListenerRegistry,
    state: ModalState,
    listener: Option<KeyListener>,
    session: u64,
}

impl ModalController {
    pub fn new(registry: ListenerRegistry) -> Self {
        Self {
            registry,
            state: ModalState::Closed,
            listener: None,
            session: 0,
        }
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn current(&self) -> Option<&TaskId> {
        self.state.task()
    }

    pub fn is_open(&self) -> bool {
        self.state != ModalState::Closed
    }

    pub fn show(&mut self, task: TaskId) {
        if !self.is_open() {
            self.session += 1;
            self.listener = Some(self.registry.install());
        }
        debug!(task = %task, session = self.session, "modal shown");
        self.state = ModalState::Open { task };
    }

    pub fn hide(&mut self) {
        if !self.is_open() {
            return;
        }
        self.state = ModalState::Closed;
        self.listener = None;
        debug!(session = self.session, "modal hidden");
    }

    pub fn position(&self, tasks: &[Task]) -> Option<Position> {
        let current = self.current()?;
        let index = tasks.iter().position(|task| task.id() == current)?;
        Some(Position {
            index,
            total: tasks.len(),
        })
    }

    /// Bindings are only live in the `Open` state and never while the user
    /// is typing in a field.
    pub fn bindings(&self, tasks: &[Task], focus: FocusTarget) -> KeyBindings {
        if focus.is_text_entry() || !matches!(self.state, ModalState::Open { .. }) {
            return KeyBindings::default();
        }
        match self.position(tasks) {
            Some(pos) => KeyBindings {
                up: pos.index > 0,
                down: pos.index + 1 < pos.total,
            },
            None => KeyBindings::default(),
        }
    }

    pub fn handle_key(&mut self, key: Key, focus: FocusTarget, tasks: &[Task]) -> KeyOutcome {
        if self.listener.is_none() || focus.is_text_entry() {
            return KeyOutcome::Ignored;
        }

        let bindings = self.bindings(tasks, focus);
        match key {
            Key::ArrowUp if bindings.up => self.step(tasks, -1),
            Key::ArrowDown if bindings.down => self.step(tasks, 1),
            Key::Escape => match self.state {
                ModalState::ConfirmingDelete { .. } => {
                    self.cancel_delete();
                    KeyOutcome::DeleteCancelled
                }
                ModalState::Open { .. } => {
                    self.hide();
                    KeyOutcome::Closed
                }
                _ => KeyOutcome::Ignored,
            },
            _ => KeyOutcome::Ignored,
        }
    }

    /// Next task, if any. No wraparound.
    pub fn advance(&mut self, tasks: &[Task]) -> Option<TaskId> {
        navigated(self.step(tasks, 1))
    }

    /// Previous task, if any. No wraparound.
    pub fn retreat(&mut self, tasks: &[Task]) -> Option<TaskId> {
        navigated(self.step(tasks, -1))
    }

    /// Opens the confirmation gate. Refused unless plainly `Open`, so two
    /// confirmations can never overlap.
    pub fn request_delete(&mut self) -> bool {
        match &self.state {
            ModalState::Open { task } => {
                self.state = ModalState::ConfirmingDelete { task: task.clone() };
                true
            }
            _ => false,
        }
    }

    pub fn cancel_delete(&mut self) {
        if let ModalState::ConfirmingDelete { task } = &self.state {
            self.state = ModalState::Open { task: task.clone() };
        }
    }

    pub fn confirm_delete(&mut self) -> Option<DeleteTicket> {
        let ModalState::ConfirmingDelete { task } = &self.state else {
            return None;
        };
        let task = task.clone();
        self.state = ModalState::Deleting { task: task.clone() };
        Some(DeleteTicket {
            task,
            session: self.session,
        })
    }

    /// Applies the outcome of the delete request behind `ticket`.
    ///
    /// A ticket from an earlier showing of the modal is ignored. On failure
    /// the modal goes back to `Open` on the same task and the error is
    /// returned for the caller to report.
    pub fn finish_delete(
        &mut self,
        ticket: DeleteTicket,
        result: Result<(), ApiError>,
    ) -> Result<DeleteOutcome, ApiError> {
        let matches = ticket.session == self.session
            && self.state
                == ModalState::Deleting {
                    task: ticket.task.clone(),
                };
        if !matches {
            debug!(task = %ticket.task, "ignoring delete result for a detached modal");
            return Ok(DeleteOutcome::Stale);
        }

        match result {
            Ok(()) => {
                self.hide();
                Ok(DeleteOutcome::Deleted(ticket.task))
            }
            Err(err) => {
                self.state = ModalState::Open { task: ticket.task };
                Err(err)
            }
        }
    }

    fn step(&mut self, tasks: &[Task], delta: isize) -> KeyOutcome {
        if !matches!(self.state, ModalState::Open { .. }) {
            return KeyOutcome::Ignored;
        }
        let Some(pos) = self.position(tasks) else {
            return KeyOutcome::Ignored;
        };
        let Some(target) = pos.index.checked_add_signed(delta) else {
            return KeyOutcome::Ignored;
        };
        let Some(next) = tasks.get(target) else {
            return KeyOutcome::Ignored;
        };

        let id = next.id().clone();
        trace!(from = pos.index, to = target, "modal navigation");
        self.state = ModalState::Open { task: id.clone() };
        KeyOutcome::Navigated(id)
    }
}

fn navigated(outcome: KeyOutcome) -> Option<TaskId> {
    match outcome {
        KeyOutcome::Navigated(id) => Some(id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use taskcent_shared::{RawId, RawTask};

    use super::{
        DeleteOutcome, FocusTarget, Key, KeyBindings, KeyOutcome, ListenerRegistry,
        ModalController, ModalState,
    };
    use crate::error::ApiError;
    use crate::task::{Task, TaskId};

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| {
                Task::normalize(RawTask {
                    object_id: Some(RawId::Text(format!("t{i}"))),
                    title: format!("task {i}"),
                    ..RawTask::default()
                })
                .expect("valid task")
            })
            .collect()
    }

    fn id(s: &str) -> TaskId {
        s.parse().expect("valid id")
    }

    fn open_at(list: &[Task], index: usize) -> (ListenerRegistry, ModalController) {
        let registry = ListenerRegistry::new();
        let mut modal = ModalController::new(registry.clone());
        modal.show(list[index].id().clone());
        (registry, modal)
    }

    #[test]
    fn no_wraparound_at_either_end() {
        let list = tasks(3);
        let (_, mut modal) = open_at(&list, 2);
        assert_eq!(modal.advance(&list), None);
        assert_eq!(modal.current(), Some(&id("t2")));

        modal.show(id("t0"));
        assert_eq!(modal.retreat(&list), None);
        assert_eq!(modal.current(), Some(&id("t0")));
    }

    #[test]
    fn arrows_follow_the_snapshot_order() {
        let list = tasks(5);
        let (_, mut modal) = open_at(&list, 2);
        assert_eq!(
            modal.handle_key(Key::ArrowDown, FocusTarget::None, &list),
            KeyOutcome::Navigated(id("t3"))
        );
        assert_eq!(
            modal.handle_key(Key::ArrowUp, FocusTarget::Button, &list),
            KeyOutcome::Navigated(id("t2"))
        );
        assert_eq!(modal.position(&list).map(|p| p.label()), Some("3/5".to_string()));
    }

    #[test]
    fn typing_suspends_bindings() {
        let list = tasks(5);
        let (_, mut modal) = open_at(&list, 2);
        for focus in [FocusTarget::TextInput, FocusTarget::TextArea] {
            assert_eq!(modal.bindings(&list, focus), KeyBindings::default());
            assert_eq!(modal.handle_key(Key::ArrowUp, focus, &list), KeyOutcome::Ignored);
            assert_eq!(modal.handle_key(Key::Escape, focus, &list), KeyOutcome::Ignored);
        }
        assert_eq!(modal.current(), Some(&id("t2")));
    }

    #[test]
    fn bindings_depend_on_position() {
        let list = tasks(3);
        let (_, modal) = open_at(&list, 0);
        assert_eq!(
            modal.bindings(&list, FocusTarget::None),
            KeyBindings { up: false, down: true }
        );
        let (_, modal) = open_at(&list, 2);
        assert_eq!(
            modal.bindings(&list, FocusTarget::None),
            KeyBindings { up: true, down: false }
        );
    }

    #[test]
    fn identity_survives_resort() {
        let mut list = tasks(4);
        let (_, mut modal) = open_at(&list, 1);
        list.reverse();
        assert_eq!(modal.position(&list).map(|p| p.index), Some(2));
        assert_eq!(modal.advance(&list), Some(id("t0")));
    }

    #[test]
    fn missing_task_disables_navigation() {
        let list = tasks(3);
        let (_, mut modal) = open_at(&list, 1);
        let without: Vec<Task> = list.into_iter().filter(|t| t.id() != &id("t1")).collect();
        assert_eq!(modal.position(&without), None);
        assert_eq!(modal.advance(&without), None);
        assert_eq!(modal.bindings(&without, FocusTarget::None), KeyBindings::default());
    }

    #[test]
    fn listener_lives_only_while_shown() {
        let list = tasks(2);
        let (registry, mut modal) = open_at(&list, 0);
        assert_eq!(registry.active(), 1);

        modal.show(id("t1"));
        assert_eq!(registry.active(), 1);

        modal.hide();
        assert_eq!(registry.active(), 0);
        assert_eq!(
            modal.handle_key(Key::ArrowUp, FocusTarget::None, &list),
            KeyOutcome::Ignored
        );

        modal.show(id("t0"));
        assert_eq!(registry.active(), 1);
        drop(modal);
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn escape_cancels_confirmation_then_closes() {
        let list = tasks(2);
        let (registry, mut modal) = open_at(&list, 0);
        assert!(modal.request_delete());
        assert_eq!(
            modal.handle_key(Key::Escape, FocusTarget::None, &list),
            KeyOutcome::DeleteCancelled
        );
        assert_eq!(modal.state(), &ModalState::Open { task: id("t0") });
        assert_eq!(
            modal.handle_key(Key::Escape, FocusTarget::None, &list),
            KeyOutcome::Closed
        );
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn delete_gate_requires_confirmation() {
        let list = tasks(3);
        let (_, mut modal) = open_at(&list, 1);

        assert_eq!(modal.confirm_delete(), None);
        assert!(modal.request_delete());
        assert!(!modal.request_delete());
        assert_eq!(
            modal.handle_key(Key::ArrowDown, FocusTarget::None, &list),
            KeyOutcome::Ignored
        );

        modal.cancel_delete();
        assert_eq!(modal.state(), &ModalState::Open { task: id("t1") });

        assert!(modal.request_delete());
        let ticket = modal.confirm_delete().expect("ticket after confirmation");
        assert_eq!(ticket.task(), &id("t1"));
        assert!(!modal.request_delete());

        let outcome = modal.finish_delete(ticket, Ok(())).expect("delete succeeds");
        assert_eq!(outcome, DeleteOutcome::Deleted(id("t1")));
        assert!(!modal.is_open());
    }

    #[test]
    fn failed_delete_returns_to_open() {
        let list = tasks(2);
        let (_, mut modal) = open_at(&list, 0);
        modal.request_delete();
        let ticket = modal.confirm_delete().expect("ticket");
        let err = modal
            .finish_delete(ticket, Err(ApiError::transport("offline")))
            .expect_err("error handed back");
        assert_eq!(err.to_string(), "offline");
        assert_eq!(modal.state(), &ModalState::Open { task: id("t0") });
    }

    #[test]
    fn late_delete_result_after_close_is_ignored() {
        let list = tasks(2);
        let (_, mut modal) = open_at(&list, 0);
        modal.request_delete();
        let ticket = modal.confirm_delete().expect("ticket");

        modal.hide();
        modal.show(id("t0"));

        let outcome = modal
            .finish_delete(ticket, Err(ApiError::transport("late")))
            .expect("stale results are not errors");
        assert_eq!(outcome, DeleteOutcome::Stale);
        assert_eq!(modal.state(), &ModalState::Open { task: id("t0") });
    }
}
