use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, NoneAsEmptyString};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

pub const DEFAULT_COLOR: &str = "white";
pub const UNTITLED: &str = "Untitled";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub note_id: u64,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub is_todo: bool,
    #[serde(default)]
    pub is_all_done: bool,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub todo_items: Vec<TodoItem>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "Tags")]
    pub tags: Vec<TagRef>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "Reminder")]
    pub reminder: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_with: Vec<SharedEmail>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Note {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn body(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn is_priority(&self) -> bool {
        self.priority > 0
    }

    /// Only the first reminder is shown or edited.
    pub fn active_reminder(&self) -> Option<&Reminder> {
        self.reminder.first()
    }

    pub fn has_tag(&self, tag_id: u64) -> bool {
        self.tags.iter().any(|tag| tag.tag_id == tag_id)
    }

    /// Unix seconds of the most recent of `updated_at` / `created_at`.
    pub fn recency(&self) -> Option<i64> {
        let updated = parse_backend_timestamp(&self.updated_at);
        let created = parse_backend_timestamp(&self.created_at);
        match (updated, created) {
            (Some(u), Some(c)) => Some(u.max(c)),
            (Some(u), None) => Some(u),
            (None, Some(c)) => Some(c),
            (None, None) => None,
        }
    }

    pub fn collaborators(&self) -> impl Iterator<Item = &SharedEmail> {
        self.shared_with
            .iter()
            .filter(|entry| entry.role == ShareRole::Shared)
    }
}

/// Backend timestamps arrive as RFC 3339 or as `YYYY-MM-DD HH:MM:SS`.
pub fn parse_backend_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(
        trimmed,
        &time::format_description::well_known::Rfc3339,
    ) {
        return Some(dt.unix_timestamp());
    }
    let plain = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(trimmed, plain)
        .ok()
        .map(|dt| dt.assume_utc().unix_timestamp())
}

/// Todo identifiers: editor-created items carry a local id until the
/// backend assigns one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TodoId {
    Local(Uuid),
    Persisted(u64),
}

impl TodoId {
    pub fn new_local() -> Self {
        TodoId::Local(Uuid::new_v4())
    }

    pub fn persisted(&self) -> Option<u64> {
        match self {
            TodoId::Persisted(id) => Some(*id),
            TodoId::Local(_) => None,
        }
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoId::Local(id) => write!(f, "local:{}", id.simple()),
            TodoId::Persisted(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireTodo", into = "WireTodo")]
pub struct TodoItem {
    pub id: TodoId,
    pub content: String,
    pub is_done: bool,
}

impl TodoItem {
    pub fn local(content: impl Into<String>) -> Self {
        Self {
            id: TodoId::new_local(),
            content: content.into(),
            is_done: false,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_done: bool,
}

impl From<WireTodo> for TodoItem {
    fn from(wire: WireTodo) -> Self {
        let id = match wire.id {
            Some(id) if id > 0 => TodoId::Persisted(id),
            _ => TodoId::new_local(),
        };
        Self {
            id,
            content: wire.content,
            is_done: wire.is_done,
        }
    }
}

impl From<TodoItem> for WireTodo {
    fn from(item: TodoItem) -> Self {
        Self {
            id: item.id.persisted(),
            content: item.content,
            is_done: item.is_done,
        }
    }
}

/// Payload form of a todo item: what gets sent and compared on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPayload {
    pub content: String,
    pub is_done: bool,
}

/// Drops items with blank content and strips identifiers.
pub fn todo_payload(items: &[TodoItem]) -> Vec<TodoPayload> {
    items
        .iter()
        .filter(|item| !item.is_blank())
        .map(|item| TodoPayload {
            content: item.content.clone(),
            is_done: item.is_done,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub tag_id: u64,
    pub tag_name: String,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub user_id: u64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<u64>,
}

impl Tag {
    pub fn to_ref(&self) -> TagRef {
        TagRef {
            tag_id: self.tag_id,
            tag_name: self.tag_name.clone(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_id: Option<u64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub note_id: u64,
    pub reminder_time: String,
    #[serde(default)]
    pub recurring: bool,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShareRole {
    Owner,
    #[serde(other)]
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEmail {
    pub email: String,
    #[serde(rename = "type")]
    pub role: ShareRole,
}

impl SharedEmail {
    pub fn collaborator(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: ShareRole::Shared,
        }
    }

    pub fn is_removable(&self) -> bool {
        self.role == ShareRole::Shared
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "id")]
    pub user_id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}
