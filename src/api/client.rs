use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{serde_as, DefaultOnNull};
use url::Url;

use super::{
    CalendarEvent, ContentUpdate, LoginRequest, NewNote, NotesApi, RegisterRequest,
    ResetPasswordRequest, StatusUpdate,
};
use crate::error::{ClientError, ClientResult};
use crate::model::{Note, Reminder, SharedEmail, Tag, User};
use crate::session::SessionCookies;

#[serde_as]
#[derive(Deserialize)]
struct NotesEnvelope {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    notes: Vec<Note>,
}

#[serde_as]
#[derive(Deserialize)]
struct DeletedNotesEnvelope {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    deleted_notes: Vec<Note>,
}

#[derive(Deserialize)]
struct NoteEnvelope {
    note: Note,
}

#[derive(Deserialize)]
struct TagEnvelope {
    tag: Tag,
}

#[derive(Deserialize)]
struct ReminderEnvelope {
    reminder: Reminder,
}

#[derive(Deserialize)]
struct SharedEmailsEnvelope {
    #[serde(default, alias = "share_emails")]
    shared_emails: Option<Vec<SharedEmail>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct NoteTagBody {
    note_id: u64,
    tag_id: u64,
}

#[derive(Serialize)]
struct ShareBody<'a> {
    note_id: u64,
    email: &'a str,
}

/// Blocking HTTP client for the myNote backend. Cookies received from the
/// backend are written into the shared jar and replayed on every request.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    origin: Url,
    cookies: Arc<RwLock<SessionCookies>>,
}

impl BackendClient {
    pub fn new(
        origin: Url,
        timeout: Duration,
        cookies: Arc<RwLock<SessionCookies>>,
    ) -> ClientResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            origin,
            cookies,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn cookies(&self) -> Arc<RwLock<SessionCookies>> {
        Arc::clone(&self.cookies)
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.origin
            .join(path)
            .map_err(|err| ClientError::Decode(format!("invalid endpoint {path}: {err}")))
    }

    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        tracing::debug!(%method, %url, "backend request");
        let mut builder = self.http.request(method, url);
        if let Some(header) = self.cookies.read().cookie_header() {
            builder = builder.header(COOKIE, header);
        }
        Ok(builder)
    }

    fn execute(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send()?;
        self.absorb_cookies(&response);
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = error_message(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), %message, "backend rejected request");
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    fn absorb_cookies(&self, response: &Response) {
        let headers = response.headers().get_all(SET_COOKIE);
        let mut jar = self.cookies.write();
        for value in headers {
            if let Ok(raw) = value.to_str() {
                jar.absorb_set_cookie(raw);
            }
        }
    }

    fn send_empty(&self, method: Method, path: &str) -> ClientResult<()> {
        self.execute(self.request(method, path)?)?;
        Ok(())
    }

    fn send_json<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> ClientResult<()> {
        self.execute(self.request(method, path)?.json(body))?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.execute(builder)?;
        let raw = response.text()?;
        serde_json::from_str(&raw).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// The backend reports failures as `{"error": "..."}`; anything else falls
/// back to the raw body or the status code.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        trimmed.to_string()
    }
}

impl NotesApi for BackendClient {
    fn login(&self, request: &LoginRequest) -> ClientResult<()> {
        self.send_json(Method::POST, "/login", request)?;
        if !self.cookies.read().is_logged_in() {
            return Err(ClientError::Auth("Login response carried no session cookie".into()));
        }
        Ok(())
    }

    fn register(&self, request: &RegisterRequest) -> ClientResult<()> {
        self.send_json(Method::POST, "/register", request)
    }

    fn forgot_password(&self, email: &str) -> ClientResult<()> {
        self.send_json(Method::POST, "/forgot-password", &json!({ "email": email }))
    }

    fn reset_password(&self, request: &ResetPasswordRequest) -> ClientResult<()> {
        self.send_json(Method::POST, "/reset-password", request)
    }

    fn logout(&self) -> ClientResult<()> {
        let result = self.send_empty(Method::GET, "/logout");
        self.cookies.write().clear();
        result
    }

    fn user(&self, user_id: u64) -> ClientResult<User> {
        self.fetch(self.request(Method::GET, &format!("/user/{user_id}"))?)
    }

    fn list_notes(&self, user_id: u64) -> ClientResult<Vec<Note>> {
        let envelope: NotesEnvelope =
            self.fetch(self.request(Method::GET, &format!("/note/{user_id}"))?)?;
        Ok(envelope.notes)
    }

    fn list_deleted_notes(&self, user_id: u64) -> ClientResult<Vec<Note>> {
        let envelope: DeletedNotesEnvelope =
            self.fetch(self.request(Method::GET, &format!("/note/deleted/{user_id}"))?)?;
        Ok(envelope.deleted_notes)
    }

    fn create_note(&self, note: &NewNote) -> ClientResult<Note> {
        let envelope: NoteEnvelope = self.fetch(self.request(Method::POST, "/note")?.json(note))?;
        Ok(envelope.note)
    }

    fn update_content(&self, note_id: u64, update: &ContentUpdate) -> ClientResult<Vec<Note>> {
        let envelope: NotesEnvelope = self.fetch(
            self.request(Method::PUT, &format!("/note/title-content/{note_id}"))?
                .json(update),
        )?;
        Ok(envelope.notes)
    }

    fn update_color(&self, note_id: u64, color: &str) -> ClientResult<()> {
        self.send_json(
            Method::PUT,
            &format!("/note/color/{note_id}"),
            &json!({ "color": color }),
        )
    }

    fn update_status(&self, note_id: u64, status: StatusUpdate) -> ClientResult<()> {
        self.send_json(Method::PUT, &format!("/note/status/{note_id}"), &status)
    }

    fn update_priority(&self, note_id: u64, priority: u8) -> ClientResult<()> {
        self.send_json(
            Method::PUT,
            &format!("/note/priority/{note_id}"),
            &json!({ "priority": priority }),
        )
    }

    fn delete_note(&self, note_id: u64) -> ClientResult<()> {
        self.send_empty(Method::DELETE, &format!("/note/{note_id}"))
    }

    fn restore_note(&self, note_id: u64) -> ClientResult<()> {
        self.send_empty(Method::PUT, &format!("/note/restore/{note_id}"))
    }

    fn update_todo_status(&self, note_id: u64, todo_id: u64, is_done: bool) -> ClientResult<()> {
        self.send_json(
            Method::PUT,
            &format!("/note/{note_id}/todo/{todo_id}/status"),
            &json!({ "is_done": is_done }),
        )
    }

    fn shared_emails(&self, note_id: u64) -> ClientResult<Vec<SharedEmail>> {
        let envelope: SharedEmailsEnvelope =
            self.fetch(self.request(Method::GET, &format!("/note/{note_id}/shared-emails"))?)?;
        Ok(envelope.shared_emails.unwrap_or_default())
    }

    fn share_note(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>> {
        let envelope: SharedEmailsEnvelope = self.fetch(
            self.request(Method::POST, "/note/share")?
                .json(&ShareBody { note_id, email }),
        )?;
        Ok(envelope.shared_emails)
    }

    fn remove_share(&self, note_id: u64, email: &str) -> ClientResult<Option<Vec<SharedEmail>>> {
        let envelope: SharedEmailsEnvelope = self.fetch(
            self.request(Method::POST, "/note/remove-share")?
                .json(&ShareBody { note_id, email }),
        )?;
        Ok(envelope.shared_emails)
    }

    fn list_tags(&self) -> ClientResult<Vec<Tag>> {
        let tags: Option<Vec<Tag>> = self.fetch(self.request(Method::GET, "/tag")?)?;
        Ok(tags.unwrap_or_default())
    }

    fn create_tag(&self, name: &str) -> ClientResult<Tag> {
        let envelope: TagEnvelope = self.fetch(
            self.request(Method::POST, "/tag")?
                .json(&json!({ "tag_name": name })),
        )?;
        Ok(envelope.tag)
    }

    fn rename_tag(&self, tag_id: u64, name: &str) -> ClientResult<()> {
        self.send_json(
            Method::PUT,
            &format!("/tag/{tag_id}"),
            &json!({ "new_tagname": name }),
        )
    }

    fn delete_tag(&self, tag_id: u64) -> ClientResult<()> {
        self.send_empty(Method::DELETE, &format!("/tag/{tag_id}"))
    }

    fn add_tag_to_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()> {
        self.send_json(Method::POST, "/note/add-tag", &NoteTagBody { note_id, tag_id })
    }

    fn remove_tag_from_note(&self, note_id: u64, tag_id: u64) -> ClientResult<()> {
        self.send_json(Method::POST, "/note/remove-tag", &NoteTagBody { note_id, tag_id })
    }

    fn create_reminder(&self, note_id: u64, reminder: &Reminder) -> ClientResult<Reminder> {
        let envelope: ReminderEnvelope = self.fetch(
            self.request(Method::POST, &format!("/note/reminder/{note_id}"))?
                .json(reminder),
        )?;
        Ok(envelope.reminder)
    }

    fn update_reminder(&self, reminder_id: u64, reminder: &Reminder) -> ClientResult<Reminder> {
        let envelope: ReminderEnvelope = self.fetch(
            self.request(Method::PUT, &format!("/reminder/{reminder_id}"))?
                .json(reminder),
        )?;
        Ok(envelope.reminder)
    }

    fn delete_reminder(&self, reminder_id: u64) -> ClientResult<()> {
        self.send_empty(Method::DELETE, &format!("/reminder/{reminder_id}"))
    }

    fn create_event(&self, event: &CalendarEvent) -> ClientResult<()> {
        self.send_json(Method::POST, "/create", event)
    }
}
