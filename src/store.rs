use std::cmp::Ordering;

use indexmap::IndexMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::api::{ContentUpdate, NotesApi, StatusUpdate};
use crate::error::ClientResult;
use crate::model::{Note, Reminder, SharedEmail, Tag, TodoId, TodoItem};

/// Single-field changes applied after the matching REST call succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum NotePatch {
    Color(String),
    Priority(u8),
    Status(StatusUpdate),
    TodoDone { todo_id: u64, is_done: bool },
    Reminder(Option<Reminder>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorUpdate {
    /// Full list as returned by the backend.
    Replaced(Vec<SharedEmail>),
    Added(String),
    Removed(String),
}

/// State transitions of the [`NoteStore`]. Every network-backed operation
/// resolves to one of these once the backend accepted it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    ReplaceNotes(Vec<Note>),
    ReplaceDeleted(Vec<Note>),
    ReplaceTags(Vec<Tag>),
    Insert(Note),
    /// Reconciles an edit against the full list the backend sent back.
    MergeEdited {
        note_id: u64,
        notes: Vec<Note>,
        sent: ContentUpdate,
    },
    Patch {
        note_id: u64,
        patch: NotePatch,
    },
    Remove(u64),
    Restore(u64),
    Collaborators {
        note_id: u64,
        update: CollaboratorUpdate,
    },
    TagCreated(Tag),
    TagRenamed {
        tag_id: u64,
        name: String,
    },
    TagDeleted(u64),
    TagAttached {
        note_id: u64,
        tag_id: u64,
    },
    TagDetached {
        note_id: u64,
        tag_id: u64,
    },
    Noop,
}

#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    deleted: Vec<Note>,
    tags: IndexMap<u64, Tag>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn deleted(&self) -> &[Note] {
        &self.deleted
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn tag(&self, tag_id: u64) -> Option<&Tag> {
        self.tags.get(&tag_id)
    }

    pub fn note(&self, note_id: u64) -> Option<&Note> {
        self.notes.iter().find(|note| note.note_id == note_id)
    }

    pub fn deleted_note(&self, note_id: u64) -> Option<&Note> {
        self.deleted.iter().find(|note| note.note_id == note_id)
    }

    fn note_mut(&mut self, note_id: u64) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.note_id == note_id)
    }

    pub fn apply(&mut self, action: StoreAction) {
        match action {
            StoreAction::ReplaceNotes(notes) => {
                self.notes = notes;
                self.sort();
            }
            StoreAction::ReplaceDeleted(notes) => {
                self.deleted = notes;
            }
            StoreAction::ReplaceTags(tags) => {
                self.tags = tags.into_iter().map(|tag| (tag.tag_id, tag)).collect();
            }
            StoreAction::Insert(note) => {
                self.notes.retain(|existing| existing.note_id != note.note_id);
                self.notes.push(note);
                self.sort();
            }
            StoreAction::MergeEdited {
                note_id,
                notes,
                sent,
            } => self.merge_edited(note_id, notes, sent),
            StoreAction::Patch { note_id, patch } => self.patch(note_id, patch),
            StoreAction::Remove(note_id) => {
                if let Some(idx) = self.notes.iter().position(|note| note.note_id == note_id) {
                    let mut note = self.notes.remove(idx);
                    note.deleted_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
                    self.deleted.insert(0, note);
                }
            }
            StoreAction::Restore(note_id) => {
                if let Some(idx) = self.deleted.iter().position(|note| note.note_id == note_id) {
                    let mut note = self.deleted.remove(idx);
                    note.deleted_at = None;
                    self.notes.push(note);
                    self.sort();
                }
            }
            StoreAction::Collaborators { note_id, update } => {
                self.merge_collaborators(note_id, update)
            }
            StoreAction::TagCreated(tag) => {
                self.tags.insert(tag.tag_id, tag);
            }
            StoreAction::TagRenamed { tag_id, name } => {
                if let Some(tag) = self.tags.get_mut(&tag_id) {
                    tag.tag_name = name.clone();
                }
                for note in self.notes.iter_mut().chain(self.deleted.iter_mut()) {
                    for tag in note.tags.iter_mut().filter(|tag| tag.tag_id == tag_id) {
                        tag.tag_name = name.clone();
                    }
                }
            }
            StoreAction::TagDeleted(tag_id) => {
                self.tags.shift_remove(&tag_id);
                for note in self.notes.iter_mut().chain(self.deleted.iter_mut()) {
                    note.tags.retain(|tag| tag.tag_id != tag_id);
                }
            }
            StoreAction::TagAttached { note_id, tag_id } => {
                let Some(tag) = self.tags.get_mut(&tag_id) else {
                    tracing::warn!(tag_id, "attaching unknown tag");
                    return;
                };
                if !tag.notes.contains(&note_id) {
                    tag.notes.push(note_id);
                }
                let tag_ref = tag.to_ref();
                if let Some(note) = self.note_mut(note_id) {
                    if !note.has_tag(tag_id) {
                        note.tags.push(tag_ref);
                    }
                }
            }
            StoreAction::TagDetached { note_id, tag_id } => {
                if let Some(tag) = self.tags.get_mut(&tag_id) {
                    tag.notes.retain(|id| *id != note_id);
                }
                if let Some(note) = self.note_mut(note_id) {
                    note.tags.retain(|tag| tag.tag_id != tag_id);
                }
            }
            StoreAction::Noop => {}
        }
    }

    fn patch(&mut self, note_id: u64, patch: NotePatch) {
        let Some(note) = self.note_mut(note_id) else {
            tracing::debug!(note_id, "patch for note not in store");
            return;
        };
        let resort = matches!(patch, NotePatch::Priority(_));
        match patch {
            NotePatch::Color(color) => note.color = color,
            NotePatch::Priority(priority) => note.priority = priority,
            NotePatch::Status(status) => {
                if let Some(is_todo) = status.is_todo {
                    note.is_todo = is_todo;
                }
                if let Some(is_all_done) = status.is_all_done {
                    note.is_all_done = is_all_done;
                }
            }
            NotePatch::TodoDone { todo_id, is_done } => {
                if let Some(item) = note
                    .todo_items
                    .iter_mut()
                    .find(|item| item.id == TodoId::Persisted(todo_id))
                {
                    item.is_done = is_done;
                }
            }
            NotePatch::Reminder(reminder) => note.reminder = reminder.into_iter().collect(),
        }
        if resort {
            self.sort();
        }
    }

    fn merge_edited(&mut self, note_id: u64, notes: Vec<Note>, sent: ContentUpdate) {
        let fresh = notes.into_iter().find(|note| note.note_id == note_id);
        let Some(note) = self.note_mut(note_id) else {
            return;
        };
        match fresh {
            Some(mut fresh) => {
                if fresh.shared_with.is_empty() {
                    fresh.shared_with = std::mem::take(&mut note.shared_with);
                }
                *note = fresh;
            }
            None => {
                note.title = Some(sent.title);
                if let Some(content) = sent.content {
                    note.content = Some(content);
                }
                if let Some(items) = sent.todo_items {
                    note.todo_items = items
                        .into_iter()
                        .map(|item| TodoItem {
                            is_done: item.is_done,
                            ..TodoItem::local(item.content)
                        })
                        .collect();
                }
            }
        }
        self.sort();
    }

    /// Applies a collaborator change to one note without refetching. Owner
    /// entries always survive.
    pub fn merge_collaborators(&mut self, note_id: u64, update: CollaboratorUpdate) {
        let Some(note) = self.note_mut(note_id) else {
            return;
        };
        match update {
            CollaboratorUpdate::Replaced(entries) => {
                let mut merged: Vec<SharedEmail> = note
                    .shared_with
                    .iter()
                    .filter(|entry| !entry.is_removable())
                    .filter(|owner| !entries.iter().any(|entry| entry.email == owner.email))
                    .cloned()
                    .collect();
                merged.extend(entries);
                note.shared_with = merged;
            }
            CollaboratorUpdate::Added(email) => {
                if !note.shared_with.iter().any(|entry| entry.email == email) {
                    note.shared_with.push(SharedEmail::collaborator(email));
                }
            }
            CollaboratorUpdate::Removed(email) => {
                note.shared_with
                    .retain(|entry| !(entry.is_removable() && entry.email == email));
            }
        }
    }

    fn sort(&mut self) {
        self.notes.sort_by(compare_notes);
    }
}

/// Priority first, then most recent activity; notes with no parseable
/// timestamp go last.
pub fn compare_notes(a: &Note, b: &Note) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.recency(), b.recency()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.note_id.cmp(&a.note_id))
}

/// Loads the user's notes and merges each note's collaborator list in. A
/// collaborator lookup that fails leaves that note with an empty list.
pub fn fetch_all<A: NotesApi + ?Sized>(api: &A, user_id: u64) -> ClientResult<Vec<Note>> {
    let mut notes = api.list_notes(user_id)?;
    for note in notes.iter_mut() {
        note.shared_with = match api.shared_emails(note.note_id) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(?err, note_id = note.note_id, "could not load collaborators");
                Vec::new()
            }
        };
    }
    notes.sort_by(compare_notes);
    Ok(notes)
}
