use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::model::{Note, Reminder, SharedEmail, Tag, TodoPayload, User};

pub mod client;

pub use client::BackendClient;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Body of `POST /note`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub title: String,
    pub content: Option<String>,
    pub color: String,
    pub priority: u8,
    pub is_todo: bool,
    pub is_all_done: bool,
    pub todo_items: Option<Vec<TodoPayload>>,
}

/// Body of `PUT /note/title-content/:id`: the title plus either the body or
/// the todo list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentUpdate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_items: Option<Vec<TodoPayload>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_todo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_done: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: String,
    pub end: String,
}

/// Every backend route the client uses. [`BackendClient`] is the HTTP
/// implementation; tests substitute an in-memory recorder.
pub trait NotesApi {
    fn login(&self, request: &LoginRequest) -> ClientResult<()>;
    fn register(&self, request: &RegisterRequest) -> ClientResult<()>;
    fn forgot_password(&self, email: &str) -> ClientResult<()>;
    fn reset_password(&self, request: &ResetPasswordRequest) -> ClientResult<()>;
    fn logout(&self) -> ClientResult<()>;
    fn user(&self, user_id: u64) -> ClientResult<User>;

    fn list_notes(&self, user_id: u64) -> ClientResult<Vec<Note>>;
    fn list_deleted_notes(&self, user_id: u64) -> ClientResult<Vec<Note>>;
    fn create_note(&self, note: &NewNote) -> ClientResult<Note>;
    /// Returns the user's notes as the backend sees them after the update.
    fn update_content(&self, note_id: u64, update: &ContentUpdate) -> ClientResult<Vec<Note>>;
    fn update_color(&self, note_id: u64, color: &str) -> ClientResult<()>;
    fn update_status(&self, note_id: u64, status: StatusUpdate) -> ClientResult<()>;
    fn update_priority(&self, note_id: u64, priority: u8) -> ClientResult<()>;
    fn delete_note(&self, note_id: u64) -> ClientResult<()>;
    fn restore_note(&self, note_id: u64) -> ClientResult<()>;
    fn update_todo_status(&self, note_id: u64, todo_id: u64, is_done: bool) -> ClientResult<()>;

    fn shared_emails(&self, note_id: u64) -> ClientResult<Vec<SharedEmail>>;
    /// `None` when the response omits the collaborator list.
    fn share_note(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>>;
    fn remove_share(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>>;

    fn list_tags(&self) -> ClientResult<Vec<Tag>>;
    fn create_tag(&self, name: &str) -> ClientResult<Tag>;
    fn rename_tag(&self, tag_id: u64, name: &str) -> ClientResult<()>;
    fn delete_tag(&self, tag_id: u64) -> ClientResult<()>;
    fn add_tag_to_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()>;
    fn remove_tag_from_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()>;

    fn create_reminder(&self, note_id: u64, reminder: &Reminder) -> ClientResult<Reminder>;
    fn update_reminder(&self, reminder_id: u64, reminder: &Reminder) -> ClientResult<Reminder>;
    fn delete_reminder(&self, reminder_id: u64) -> ClientResult<()>;

    fn create_event(&self, event: &CalendarEvent) -> ClientResult<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ClientError;

    /// Records every call and answers from canned data.
    #[derive(Default)]
    pub struct FakeApi {
        pub calls: Mutex<Vec<String>>,
        pub notes: Mutex<Vec<Note>>,
        pub deleted: Mutex<Vec<Note>>,
        pub tags: Mutex<Vec<Tag>>,
        pub shared: Mutex<HashMap<u64, Vec<SharedEmail>>>,
        pub failing_shares: Mutex<HashSet<u64>>,
        pub fail_all: Mutex<bool>,
        pub created_bodies: Mutex<Vec<NewNote>>,
        pub content_updates: Mutex<Vec<(u64, ContentUpdate)>>,
        pub events: Mutex<Vec<CalendarEvent>>,
        pub reminders: Mutex<Vec<(u64, Reminder)>>,
        next_id: Mutex<u64>,
    }

    impl FakeApi {
        pub fn with_notes(notes: Vec<Note>) -> Self {
            let api = Self::default();
            *api.notes.lock() = notes;
            api
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn fail_everything(&self) {
            *self.fail_all.lock() = true;
        }

        fn record(&self, call: impl Into<String>) -> ClientResult<()> {
            self.calls.lock().push(call.into());
            if *self.fail_all.lock() {
                return Err(ClientError::Server {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }

        fn next_id(&self) -> u64 {
            let mut next = self.next_id.lock();
            *next += 1;
            1000 + *next
        }
    }

    impl NotesApi for FakeApi {
        fn login(&self, request: &LoginRequest) -> ClientResult<()> {
            self.record(format!("POST /login {}", request.email))
        }

        fn register(&self, request: &RegisterRequest) -> ClientResult<()> {
            self.record(format!("POST /register {}", request.username))
        }

        fn forgot_password(&self, email: &str) -> ClientResult<()> {
            self.record(format!("POST /forgot-password {email}"))
        }

        fn reset_password(&self, _request: &ResetPasswordRequest) -> ClientResult<()> {
            self.record("POST /reset-password")
        }

        fn logout(&self) -> ClientResult<()> {
            self.record("GET /logout")
        }

        fn user(&self, user_id: u64) -> ClientResult<User> {
            self.record(format!("GET /user/{user_id}"))?;
            Ok(User {
                user_id,
                username: "tester".into(),
                email: "tester@example.com".into(),
            })
        }

        fn list_notes(&self, user_id: u64) -> ClientResult<Vec<Note>> {
            self.record(format!("GET /note/{user_id}"))?;
            Ok(self.notes.lock().clone())
        }

        fn list_deleted_notes(&self, user_id: u64) -> ClientResult<Vec<Note>> {
            self.record(format!("GET /note/deleted/{user_id}"))?;
            Ok(self.deleted.lock().clone())
        }

        fn create_note(&self, note: &NewNote) -> ClientResult<Note> {
            self.record("POST /note")?;
            self.created_bodies.lock().push(note.clone());
            let note_id = self.next_id();
            let todo_items = note
                .todo_items
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|item| crate::model::TodoItem {
                    id: crate::model::TodoId::Persisted(self.next_id()),
                    content: item.content,
                    is_done: item.is_done,
                })
                .collect();
            Ok(Note {
                note_id,
                user_id: 1,
                title: Some(note.title.clone()),
                content: note.content.clone(),
                color: note.color.clone(),
                priority: note.priority,
                is_todo: note.is_todo,
                is_all_done: note.is_all_done,
                todo_items,
                created_at: "2030-01-01T00:00:00Z".into(),
                updated_at: "2030-01-01T00:00:00Z".into(),
                deleted_at: None,
                tags: Vec::new(),
                reminder: Vec::new(),
                shared_with: Vec::new(),
            })
        }

        fn update_content(&self, note_id: u64, update: &ContentUpdate) -> ClientResult<Vec<Note>> {
            self.record(format!("PUT /note/title-content/{note_id}"))?;
            self.content_updates.lock().push((note_id, update.clone()));
            let mut notes = self.notes.lock();
            if let Some(note) = notes.iter_mut().find(|note| note.note_id == note_id) {
                note.title = Some(update.title.clone());
                if let Some(content) = &update.content {
                    note.content = Some(content.clone());
                }
                if let Some(items) = &update.todo_items {
                    note.todo_items = items
                        .iter()
                        .enumerate()
                        .map(|(idx, item)| crate::model::TodoItem {
                            id: crate::model::TodoId::Persisted(500 + idx as u64),
                            content: item.content.clone(),
                            is_done: item.is_done,
                        })
                        .collect();
                }
                note.updated_at = "2031-01-01T00:00:00Z".into();
            }
            Ok(notes.clone())
        }

        fn update_color(&self, note_id: u64, color: &str) -> ClientResult<()> {
            self.record(format!("PUT /note/color/{note_id} {color}"))
        }

        fn update_status(&self, note_id: u64, status: StatusUpdate) -> ClientResult<()> {
            self.record(format!(
                "PUT /note/status/{note_id} {}",
                serde_json::to_string(&status).unwrap_or_default()
            ))
        }

        fn update_priority(&self, note_id: u64, priority: u8) -> ClientResult<()> {
            self.record(format!("PUT /note/priority/{note_id} {priority}"))
        }

        fn delete_note(&self, note_id: u64) -> ClientResult<()> {
            self.record(format!("DELETE /note/{note_id}"))
        }

        fn restore_note(&self, note_id: u64) -> ClientResult<()> {
            self.record(format!("PUT /note/restore/{note_id}"))
        }

        fn update_todo_status(&self, note_id: u64, todo_id: u64, is_done: bool) -> ClientResult<()> {
            self.record(format!("PUT /note/{note_id}/todo/{todo_id}/status {is_done}"))
        }

        fn shared_emails(&self, note_id: u64) -> ClientResult<Vec<SharedEmail>> {
            self.record(format!("GET /note/{note_id}/shared-emails"))?;
            if self.failing_shares.lock().contains(&note_id) {
                return Err(ClientError::Server {
                    status: 500,
                    message: "Failed to retrieve shared emails".into(),
                });
            }
            Ok(self.shared.lock().get(&note_id).cloned().unwrap_or_default())
        }

        fn share_note(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>> {
            self.record(format!("POST /note/share {note_id} {email}"))?;
            let mut shared = self.shared.lock();
            let Some(entries) = shared.get_mut(&note_id) else {
                return Ok(None);
            };
            entries.push(SharedEmail::collaborator(email));
            Ok(Some(entries.clone()))
        }

        fn remove_share(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>> {
            self.record(format!("POST /note/remove-share {note_id} {email}"))?;
            let mut shared = self.shared.lock();
            let Some(entries) = shared.get_mut(&note_id) else {
                return Ok(None);
            };
            entries.retain(|entry| entry.email != email);
            Ok(Some(entries.clone()))
        }

        fn list_tags(&self) -> ClientResult<Vec<Tag>> {
            self.record("GET /tag")?;
            Ok(self.tags.lock().clone())
        }

        fn create_tag(&self, name: &str) -> ClientResult<Tag> {
            self.record(format!("POST /tag {name}"))?;
            let tag = Tag {
                tag_id: self.next_id(),
                tag_name: name.to_string(),
                user_id: 1,
                notes: Vec::new(),
            };
            self.tags.lock().push(tag.clone());
            Ok(tag)
        }

        fn rename_tag(&self, tag_id: u64, name: &str) -> ClientResult<()> {
            self.record(format!("PUT /tag/{tag_id} {name}"))
        }

        fn delete_tag(&self, tag_id: u64) -> ClientResult<()> {
            self.record(format!("DELETE /tag/{tag_id}"))
        }

        fn add_tag_to_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()> {
            self.record(format!("POST /note/add-tag {note_id} {tag_id}"))
        }

        fn remove_tag_from_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()> {
            self.record(format!("POST /note/remove-tag {note_id} {tag_id}"))
        }

        fn create_reminder(&self, note_id: u64, reminder: &Reminder) -> ClientResult<Reminder> {
            self.record(format!("POST /note/reminder/{note_id}"))?;
            self.reminders.lock().push((note_id, reminder.clone()));
            Ok(Reminder {
                reminder_id: Some(self.next_id()),
                note_id,
                ..reminder.clone()
            })
        }

        fn update_reminder(&self, reminder_id: u64, reminder: &Reminder) -> ClientResult<Reminder> {
            self.record(format!("PUT /reminder/{reminder_id}"))?;
            self.reminders.lock().push((reminder.note_id, reminder.clone()));
            Ok(Reminder {
                reminder_id: Some(reminder_id),
                ..reminder.clone()
            })
        }

        fn delete_reminder(&self, reminder_id: u64) -> ClientResult<()> {
            self.record(format!("DELETE /reminder/{reminder_id}"))
        }

        fn create_event(&self, event: &CalendarEvent) -> ClientResult<()> {
            self.record("POST /create")?;
            self.events.lock().push(event.clone());
            Ok(())
        }
    }
}
