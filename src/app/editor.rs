use bitflags::bitflags;

use crate::api::{ContentUpdate, NewNote, StatusUpdate};
use crate::app::buffer::TextBuffer;
use crate::error::{ClientError, ClientResult};
use crate::model::{todo_payload, Note, TodoItem, UNTITLED};
use crate::session::snapshot::EditorSnapshot;

bitflags! {
    /// Which parts of an existing note differ from what the editor opened with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeSet: u8 {
        const TITLE = 1;
        const CONTENT = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorField {
    Title,
    Body,
    Todos,
}

/// Values of the note when the editor was opened, compared on save.
#[derive(Debug, Clone)]
struct OriginalNote {
    title: String,
    content: String,
    todos: Vec<TodoItem>,
}

/// A persisted todo item flipped inside the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoToggle {
    pub note_id: u64,
    pub todo_id: u64,
    pub is_done: bool,
}

#[derive(Debug, Clone)]
pub struct NoteEditor {
    note_id: Option<u64>,
    pub title: TextBuffer,
    pub body: TextBuffer,
    is_todo: bool,
    todos: Vec<TodoItem>,
    todo_cursor: usize,
    color: String,
    field: EditorField,
    original: Option<OriginalNote>,
}

impl NoteEditor {
    pub fn create(default_color: &str) -> Self {
        Self {
            note_id: None,
            title: TextBuffer::default(),
            body: TextBuffer::default(),
            is_todo: false,
            todos: Vec::new(),
            todo_cursor: 0,
            color: default_color.to_string(),
            field: EditorField::Title,
            original: None,
        }
    }

    pub fn open(note: &Note) -> Self {
        Self {
            note_id: Some(note.note_id),
            title: TextBuffer::new(note.title()),
            body: TextBuffer::new(note.body()),
            is_todo: note.is_todo,
            todos: note.todo_items.clone(),
            todo_cursor: 0,
            color: note.color.clone(),
            field: EditorField::Title,
            original: Some(OriginalNote {
                title: note.title().to_string(),
                content: note.body().to_string(),
                todos: note.todo_items.clone(),
            }),
        }
    }

    /// Rebuilds an editor saved before the calendar sign-in redirect. The
    /// stored note, when still present, is the baseline for change detection.
    pub fn from_snapshot(snapshot: EditorSnapshot, stored: Option<&Note>) -> Self {
        let mut editor = match stored {
            Some(note) => Self::open(note),
            None => Self::create(&snapshot.selected_color),
        };
        if stored.is_none() {
            editor.note_id = None;
        }
        editor.title.set_text(snapshot.note_title);
        editor.body.set_text(snapshot.note_content);
        editor.is_todo = snapshot.is_todo;
        editor.todos = snapshot.todo_items;
        editor.color = snapshot.selected_color;
        editor.clamp_todo_cursor();
        editor
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            is_popup_open: true,
            current_note_id: self.note_id,
            note_title: self.title.text().to_string(),
            note_content: self.body.text().to_string(),
            is_todo: self.is_todo,
            todo_items: self.todos.clone(),
            selected_color: self.color.clone(),
        }
    }

    pub fn note_id(&self) -> Option<u64> {
        self.note_id
    }

    pub fn is_todo(&self) -> bool {
        self.is_todo
    }

    pub fn todos(&self) -> &[TodoItem] {
        &self.todos
    }

    pub fn todo_cursor(&self) -> usize {
        self.todo_cursor
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
    }

    pub fn field(&self) -> EditorField {
        self.field
    }

    pub fn content_field(&self) -> EditorField {
        if self.is_todo {
            EditorField::Todos
        } else {
            EditorField::Body
        }
    }

    pub fn cycle_field(&mut self) {
        self.field = match self.field {
            EditorField::Title => self.content_field(),
            EditorField::Body | EditorField::Todos => EditorField::Title,
        };
    }

    /// Flips the todo flag. Existing notes return the status update to send.
    pub fn toggle_todo_mode(&mut self) -> Option<StatusUpdate> {
        self.is_todo = !self.is_todo;
        if self.is_todo && self.todos.is_empty() {
            self.todos.push(TodoItem::local(""));
            self.todo_cursor = 0;
        }
        if self.field != EditorField::Title {
            self.field = self.content_field();
        }
        self.note_id.map(|_| StatusUpdate {
            is_todo: Some(self.is_todo),
            is_all_done: None,
        })
    }

    pub fn add_todo(&mut self) {
        let at = if self.todos.is_empty() {
            0
        } else {
            self.todo_cursor + 1
        };
        self.todos.insert(at, TodoItem::local(""));
        self.todo_cursor = at;
    }

    pub fn remove_todo(&mut self) -> bool {
        if self.todo_cursor >= self.todos.len() {
            return false;
        }
        self.todos.remove(self.todo_cursor);
        self.clamp_todo_cursor();
        true
    }

    pub fn select_todo(&mut self, delta: isize) {
        if self.todos.is_empty() {
            return;
        }
        let last = self.todos.len() - 1;
        self.todo_cursor = self.todo_cursor.saturating_add_signed(delta).min(last);
    }

    pub fn push_todo_char(&mut self, ch: char) {
        if self.todos.is_empty() {
            self.add_todo();
        }
        if let Some(item) = self.todos.get_mut(self.todo_cursor) {
            item.content.push(ch);
        }
    }

    pub fn pop_todo_char(&mut self) {
        if let Some(item) = self.todos.get_mut(self.todo_cursor) {
            item.content.pop();
        }
    }

    /// Flips the selected item. Items the backend already knows are
    /// returned so the change can be sent straight away.
    pub fn toggle_todo_done(&mut self) -> Option<TodoToggle> {
        let item = self.todos.get_mut(self.todo_cursor)?;
        item.is_done = !item.is_done;
        let (note_id, todo_id) = (self.note_id?, item.id.persisted()?);
        let is_done = item.is_done;
        if let Some(original) = self.original.as_mut() {
            if let Some(baseline) = original
                .todos
                .iter_mut()
                .find(|baseline| baseline.id.persisted() == Some(todo_id))
            {
                baseline.is_done = is_done;
            }
        }
        Some(TodoToggle {
            note_id,
            todo_id,
            is_done,
        })
    }

    pub fn changes(&self) -> ChangeSet {
        let Some(original) = &self.original else {
            return ChangeSet::all();
        };
        let mut changes = ChangeSet::empty();
        if self.title.text() != original.title {
            changes |= ChangeSet::TITLE;
        }
        let content_changed = if self.is_todo {
            todo_payload(&self.todos) != todo_payload(&original.todos)
        } else {
            self.body.text() != original.content
        };
        if content_changed {
            changes |= ChangeSet::CONTENT;
        }
        changes
    }

    /// Body of the create call. A todo note needs at least one item; blank
    /// items are dropped.
    pub fn new_note(&self) -> ClientResult<NewNote> {
        if self.is_todo && self.todos.is_empty() {
            return Err(ClientError::validation("Please add at least one Todo item."));
        }
        let title = self.title.text().trim();
        Ok(NewNote {
            title: if title.is_empty() {
                UNTITLED.to_string()
            } else {
                self.title.text().to_string()
            },
            content: (!self.is_todo).then(|| self.body.text().to_string()),
            color: self.color.clone(),
            priority: 0,
            is_todo: self.is_todo,
            is_all_done: false,
            todo_items: self.is_todo.then(|| todo_payload(&self.todos)),
        })
    }

    /// Body of the edit call, or `None` when nothing changed since the
    /// editor opened.
    pub fn content_update(&self) -> Option<ContentUpdate> {
        if self.changes().is_empty() {
            return None;
        }
        let (content, todo_items) = if self.is_todo {
            (None, Some(todo_payload(&self.todos)))
        } else {
            (Some(self.body.text().to_string()), None)
        };
        Some(ContentUpdate {
            title: self.title.text().to_string(),
            content,
            todo_items,
        })
    }

    fn clamp_todo_cursor(&mut self) {
        self.todo_cursor = self.todo_cursor.min(self.todos.len().saturating_sub(1));
    }
}
