use crate::api::{CalendarEvent, ContentUpdate, NewNote, NotesApi, StatusUpdate};
use crate::app::reminder::ReminderRequest;
use crate::error::{ClientError, ClientResult};
use crate::model::{Note, Reminder, TodoId};
use crate::store::{fetch_all, CollaboratorUpdate, NotePatch, StoreAction};

/// Runs one backend call and turns its outcome into the store transition to
/// apply. Nothing here touches the store, so the same code serves the TUI
/// worker and the one-shot CLI commands.
pub struct ActionDispatcher<'a, A: NotesApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: NotesApi + ?Sized> ActionDispatcher<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn load_workspace(&self, user_id: u64) -> ClientResult<Vec<StoreAction>> {
        let notes = fetch_all(self.api, user_id)?;
        let tags = self.api.list_tags()?;
        Ok(vec![StoreAction::ReplaceNotes(notes), StoreAction::ReplaceTags(tags)])
    }

    pub fn load_deleted(&self, user_id: u64) -> ClientResult<StoreAction> {
        let notes = self.api.list_deleted_notes(user_id)?;
        Ok(StoreAction::ReplaceDeleted(notes))
    }

    pub fn create_note(&self, body: &NewNote) -> ClientResult<StoreAction> {
        let note = self.api.create_note(body)?;
        tracing::debug!(note_id = note.note_id, "note created");
        Ok(StoreAction::Insert(note))
    }

    /// `None` means the editor found nothing to send; no request is made.
    pub fn save_note(&self, note_id: u64, update: Option<ContentUpdate>) -> ClientResult<StoreAction> {
        let Some(update) = update else {
            tracing::debug!(note_id, "no changes detected, skipping update");
            return Ok(StoreAction::Noop);
        };
        let notes = self.api.update_content(note_id, &update)?;
        Ok(StoreAction::MergeEdited {
            note_id,
            notes,
            sent: update,
        })
    }

    pub fn delete_note(&self, note_id: u64) -> ClientResult<StoreAction> {
        self.api.delete_note(note_id)?;
        Ok(StoreAction::Remove(note_id))
    }

    pub fn restore_note(&self, note_id: u64) -> ClientResult<StoreAction> {
        self.api.restore_note(note_id)?;
        Ok(StoreAction::Restore(note_id))
    }

    pub fn set_color(&self, note_id: u64, color: &str) -> ClientResult<StoreAction> {
        self.api.update_color(note_id, color)?;
        Ok(patch(note_id, NotePatch::Color(color.to_string())))
    }

    pub fn toggle_priority(&self, note: &Note) -> ClientResult<StoreAction> {
        let priority = if note.is_priority() { 0 } else { 1 };
        self.api.update_priority(note.note_id, priority)?;
        Ok(patch(note.note_id, NotePatch::Priority(priority)))
    }

    pub fn set_status(&self, note_id: u64, status: StatusUpdate) -> ClientResult<StoreAction> {
        self.api.update_status(note_id, status)?;
        Ok(patch(note_id, NotePatch::Status(status)))
    }

    pub fn set_todo_done(
        &self,
        note_id: u64,
        todo_id: TodoId,
        is_done: bool,
    ) -> ClientResult<StoreAction> {
        let Some(todo_id) = todo_id.persisted() else {
            return Err(ClientError::validation(
                "Save the note before checking off new items.",
            ));
        };
        self.api.update_todo_status(note_id, todo_id, is_done)?;
        Ok(patch(note_id, NotePatch::TodoDone { todo_id, is_done }))
    }

    pub fn attach_tag(&self, note_id: u64, tag_id: u64) -> ClientResult<StoreAction> {
        self.api.add_tag_to_note(note_id, tag_id)?;
        Ok(StoreAction::TagAttached { note_id, tag_id })
    }

    pub fn detach_tag(&self, note_id: u64, tag_id: u64) -> ClientResult<StoreAction> {
        self.api.remove_tag_from_note(note_id, tag_id)?;
        Ok(StoreAction::TagDetached { note_id, tag_id })
    }

    pub fn create_tag(&self, name: &str) -> ClientResult<StoreAction> {
        let name = tag_name(name)?;
        let tag = self.api.create_tag(name)?;
        Ok(StoreAction::TagCreated(tag))
    }

    pub fn rename_tag(&self, tag_id: u64, name: &str) -> ClientResult<StoreAction> {
        let name = tag_name(name)?;
        self.api.rename_tag(tag_id, name)?;
        Ok(StoreAction::TagRenamed {
            tag_id,
            name: name.to_string(),
        })
    }

    pub fn delete_tag(&self, tag_id: u64) -> ClientResult<StoreAction> {
        self.api.delete_tag(tag_id)?;
        Ok(StoreAction::TagDeleted(tag_id))
    }

    pub fn share(&self, note_id: u64, email: &str) -> ClientResult<StoreAction> {
        let email = share_email(email)?;
        let update = match self.api.share_note(note_id, email)? {
            Some(entries) => CollaboratorUpdate::Replaced(entries),
            None => CollaboratorUpdate::Added(email.to_string()),
        };
        Ok(StoreAction::Collaborators { note_id, update })
    }

    pub fn unshare(&self, note_id: u64, email: &str) -> ClientResult<StoreAction> {
        let email = share_email(email)?;
        let update = match self.api.remove_share(note_id, email)? {
            Some(entries) => CollaboratorUpdate::Replaced(entries),
            None => CollaboratorUpdate::Removed(email.to_string()),
        };
        Ok(StoreAction::Collaborators { note_id, update })
    }

    pub fn save_reminder(&self, request: &ReminderRequest) -> ClientResult<StoreAction> {
        let saved = match request.reminder_id {
            Some(reminder_id) => self.api.update_reminder(reminder_id, &request.reminder)?,
            None => self.api.create_reminder(request.note_id, &request.reminder)?,
        };
        let saved = Reminder {
            note_id: request.note_id,
            ..saved
        };
        Ok(patch(request.note_id, NotePatch::Reminder(Some(saved))))
    }

    pub fn clear_reminder(&self, note_id: u64, reminder_id: u64) -> ClientResult<StoreAction> {
        self.api.delete_reminder(reminder_id)?;
        Ok(patch(note_id, NotePatch::Reminder(None)))
    }

    pub fn create_event(&self, event: &CalendarEvent) -> ClientResult<StoreAction> {
        self.api.create_event(event)?;
        Ok(StoreAction::Noop)
    }
}

fn patch(note_id: u64, patch: NotePatch) -> StoreAction {
    StoreAction::Patch { note_id, patch }
}

fn tag_name(raw: &str) -> ClientResult<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ClientError::validation("Tag name cannot be empty."));
    }
    Ok(name)
}

fn share_email(raw: &str) -> ClientResult<&str> {
    let email = raw.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ClientError::validation("Enter a valid email address."));
    }
    Ok(email)
}
