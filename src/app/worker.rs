use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::api::{CalendarEvent, ContentUpdate, NewNote, NotesApi, StatusUpdate};
use crate::app::actions::ActionDispatcher;
use crate::app::reminder::ReminderRequest;
use crate::error::ClientResult;
use crate::model::{Note, TodoId};
use crate::store::StoreAction;

/// A backend call queued from the UI thread.
#[derive(Debug, Clone)]
pub enum Job {
    LoadWorkspace { user_id: u64 },
    LoadDeleted { user_id: u64 },
    CreateNote(NewNote),
    SaveNote { note_id: u64, update: Option<ContentUpdate> },
    DeleteNote(u64),
    RestoreNote(u64),
    SetColor { note_id: u64, color: String },
    TogglePriority(Box<Note>),
    SetStatus { note_id: u64, status: StatusUpdate },
    SetTodoDone { note_id: u64, todo_id: TodoId, is_done: bool },
    AttachTag { note_id: u64, tag_id: u64 },
    DetachTag { note_id: u64, tag_id: u64 },
    CreateTag(String),
    RenameTag { tag_id: u64, name: String },
    DeleteTag(u64),
    Share { note_id: u64, email: String },
    Unshare { note_id: u64, email: String },
    SaveReminder(ReminderRequest),
    ClearReminder { note_id: u64, reminder_id: u64 },
    CreateEvent(CalendarEvent),
}

/// Follow-up the UI performs once a job's store actions are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Select(u64),
    ReminderSaved(u64),
}

#[derive(Debug)]
pub struct Completion {
    pub actions: Vec<StoreAction>,
    pub message: Option<String>,
    pub effect: Option<Effect>,
}

impl Completion {
    fn one(action: StoreAction, message: &str) -> Self {
        Self {
            actions: vec![action],
            message: Some(message.to_string()),
            effect: None,
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub label: &'static str,
    pub result: ClientResult<Completion>,
}

impl Job {
    pub fn label(&self) -> &'static str {
        match self {
            Job::LoadWorkspace { .. } => "load notes",
            Job::LoadDeleted { .. } => "load trash",
            Job::CreateNote(_) => "create note",
            Job::SaveNote { .. } => "save note",
            Job::DeleteNote(_) => "delete note",
            Job::RestoreNote(_) => "restore note",
            Job::SetColor { .. } => "update color",
            Job::TogglePriority(_) => "update priority",
            Job::SetStatus { .. } => "update status",
            Job::SetTodoDone { .. } => "update todo item",
            Job::AttachTag { .. } => "add tag",
            Job::DetachTag { .. } => "remove tag",
            Job::CreateTag(_) => "create tag",
            Job::RenameTag { .. } => "rename tag",
            Job::DeleteTag(_) => "delete tag",
            Job::Share { .. } => "share note",
            Job::Unshare { .. } => "remove collaborator",
            Job::SaveReminder(_) => "save reminder",
            Job::ClearReminder { .. } => "remove reminder",
            Job::CreateEvent(_) => "create calendar event",
        }
    }

    pub fn run<A: NotesApi + ?Sized>(
        self,
        dispatcher: &ActionDispatcher<'_, A>,
    ) -> ClientResult<Completion> {
        let completion = match self {
            Job::LoadWorkspace { user_id } => Completion {
                actions: dispatcher.load_workspace(user_id)?,
                message: None,
                effect: None,
            },
            Job::LoadDeleted { user_id } => Completion {
                actions: vec![dispatcher.load_deleted(user_id)?],
                message: None,
                effect: None,
            },
            Job::CreateNote(body) => {
                let action = dispatcher.create_note(&body)?;
                let created = match &action {
                    StoreAction::Insert(note) => Some(note.note_id),
                    _ => None,
                };
                let completion = Completion::one(action, "Note created");
                match created {
                    Some(note_id) => completion.with_effect(Effect::Select(note_id)),
                    None => completion,
                }
            }
            Job::SaveNote { note_id, update } => {
                let action = dispatcher.save_note(note_id, update)?;
                let message = if action == StoreAction::Noop {
                    "No changes to save"
                } else {
                    "Note saved"
                };
                Completion::one(action, message)
            }
            Job::DeleteNote(note_id) => {
                Completion::one(dispatcher.delete_note(note_id)?, "Moved note to trash")
            }
            Job::RestoreNote(note_id) => {
                Completion::one(dispatcher.restore_note(note_id)?, "Note restored")
                    .with_effect(Effect::Select(note_id))
            }
            Job::SetColor { note_id, color } => {
                Completion::one(dispatcher.set_color(note_id, &color)?, "Color updated")
            }
            Job::TogglePriority(note) => {
                let message = if note.is_priority() { "Unstarred" } else { "Starred" };
                Completion::one(dispatcher.toggle_priority(&note)?, message)
            }
            Job::SetStatus { note_id, status } => {
                Completion::one(dispatcher.set_status(note_id, status)?, "Status updated")
            }
            Job::SetTodoDone {
                note_id,
                todo_id,
                is_done,
            } => Completion::one(
                dispatcher.set_todo_done(note_id, todo_id, is_done)?,
                "Todo item updated",
            ),
            Job::AttachTag { note_id, tag_id } => {
                Completion::one(dispatcher.attach_tag(note_id, tag_id)?, "Tag added")
            }
            Job::DetachTag { note_id, tag_id } => {
                Completion::one(dispatcher.detach_tag(note_id, tag_id)?, "Tag removed")
            }
            Job::CreateTag(name) => Completion::one(dispatcher.create_tag(&name)?, "Tag created"),
            Job::RenameTag { tag_id, name } => {
                Completion::one(dispatcher.rename_tag(tag_id, &name)?, "Tag renamed")
            }
            Job::DeleteTag(tag_id) => {
                Completion::one(dispatcher.delete_tag(tag_id)?, "Tag deleted")
            }
            Job::Share { note_id, email } => {
                Completion::one(dispatcher.share(note_id, &email)?, "Note shared")
            }
            Job::Unshare { note_id, email } => {
                Completion::one(dispatcher.unshare(note_id, &email)?, "Collaborator removed")
            }
            Job::SaveReminder(request) => {
                Completion::one(dispatcher.save_reminder(&request)?, "Reminder saved")
                    .with_effect(Effect::ReminderSaved(request.note_id))
            }
            Job::ClearReminder {
                note_id,
                reminder_id,
            } => Completion::one(
                dispatcher.clear_reminder(note_id, reminder_id)?,
                "Reminder removed",
            ),
            Job::CreateEvent(event) => {
                Completion::one(dispatcher.create_event(&event)?, "Event added to calendar")
            }
        };
        Ok(completion)
    }
}

/// One background thread executing jobs in submission order. Outcomes are
/// collected by the UI loop on its next tick.
pub struct Worker {
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<JobOutcome>,
    handle: Option<JoinHandle<()>>,
    in_flight: usize,
}

impl Worker {
    pub fn spawn<A>(api: Arc<A>) -> Result<Self>
    where
        A: NotesApi + Send + Sync + ?Sized + 'static,
    {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (outcome_tx, outcome_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("mynote-backend".to_string())
            .spawn(move || {
                let dispatcher = ActionDispatcher::new(api.as_ref());
                for job in job_rx.iter() {
                    let label = job.label();
                    tracing::debug!(label, "running backend job");
                    let result = job.run(&dispatcher);
                    if outcome_tx.send(JobOutcome { label, result }).is_err() {
                        break;
                    }
                }
            })
            .context("spawning backend worker thread")?;
        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
            in_flight: 0,
        })
    }

    pub fn submit(&mut self, job: Job) -> Result<()> {
        let sender = self.jobs.as_ref().context("backend worker already stopped")?;
        sender
            .send(job)
            .map_err(|_| anyhow::anyhow!("backend worker thread has exited"))?;
        self.in_flight += 1;
        Ok(())
    }

    /// Outcomes that arrived since the last call, without blocking.
    pub fn drain(&mut self) -> Vec<JobOutcome> {
        let outcomes: Vec<JobOutcome> = self.outcomes.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[cfg(test)]
    pub fn wait(&mut self, timeout: std::time::Duration) -> Option<JobOutcome> {
        let outcome = self.outcomes.recv_timeout(timeout).ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(outcome)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("backend worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::error::ClientError;
    use crate::store::testing::note;
    use assert_matches::assert_matches;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn jobs_complete_in_submission_order() -> anyhow::Result<()> {
        let api = FakeApi::with_notes(vec![note(1, "a", "2024-01-01 00:00:00")]);
        let mut worker = Worker::spawn(Arc::new(api))?;
        worker.submit(Job::LoadWorkspace { user_id: 1 })?;
        worker.submit(Job::DeleteNote(1))?;
        assert_eq!(worker.in_flight(), 2);

        let first = worker.wait(WAIT).expect("load outcome");
        assert_eq!(first.label, "load notes");
        let completion = first.result?;
        assert_matches!(
            completion.actions.as_slice(),
            [StoreAction::ReplaceNotes(notes), StoreAction::ReplaceTags(_)] if notes.len() == 1
        );

        let second = worker.wait(WAIT).expect("delete outcome");
        assert_matches!(second.result?.actions.as_slice(), [StoreAction::Remove(1)]);
        assert_eq!(worker.in_flight(), 0);
        Ok(())
    }

    #[test]
    fn failures_come_back_as_outcomes() -> anyhow::Result<()> {
        let api = FakeApi::default();
        api.fail_everything();
        let mut worker = Worker::spawn(Arc::new(api))?;
        worker.submit(Job::RestoreNote(4))?;
        let outcome = worker.wait(WAIT).expect("outcome");
        assert_matches!(outcome.result, Err(ClientError::Server { .. }));
        Ok(())
    }

    #[test]
    fn create_selects_the_new_note() -> anyhow::Result<()> {
        let mut worker = Worker::spawn(Arc::new(FakeApi::default()))?;
        worker.submit(Job::CreateNote(NewNote {
            title: "Untitled".into(),
            content: Some(String::new()),
            color: "white".into(),
            priority: 0,
            is_todo: false,
            is_all_done: false,
            todo_items: None,
        }))?;
        let completion = worker.wait(WAIT).expect("outcome").result?;
        assert_matches!(completion.effect, Some(Effect::Select(id)) if id > 1000);
        Ok(())
    }
}
