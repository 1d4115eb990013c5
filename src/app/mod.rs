use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use url::Url;

use crate::api::{NotesApi, StatusUpdate};
use crate::auth::authorize_url;
use crate::calendar::{build_event, EventSource};
use crate::config::{AppConfig, ConfigPaths};
use crate::model::TodoId;
use crate::session::snapshot::{EditorSnapshot, SnapshotStore};
use crate::ui;

pub mod actions;
pub mod buffer;
pub mod editor;
pub mod reminder;
pub mod state;
pub mod worker;

pub use state::{AppState, FocusPane, OverlayState, TagManagerMode};

use self::buffer::TextBuffer;
use self::editor::{EditorField, NoteEditor};
use self::reminder::{local_now, DraftField, ReminderEditor};
use self::state::{CalendarForm, TagInputKind};
use self::worker::{Job, Worker};

const EDITOR_HINT: &str =
    "Editor: Tab field • Ctrl-s save • Ctrl-t todo • Ctrl-o color • Ctrl-r reminder • Ctrl-e calendar • Esc close";
const TODO_HINT: &str = "Todos: Enter add • ↑/↓ move • Ctrl-d done • Ctrl-x remove";
const REMINDER_HINT: &str =
    "Reminder: Tab field • space toggle • Enter save • Ctrl-d remove • Esc back";
const CALENDAR_HINT: &str =
    "Calendar: start/end as YYYY-MM-DDTHH:MM • Tab switch • Enter send • Esc back";
const TAG_HINT: &str =
    "Tags: j/k move • space attach/detach • a add • r rename • d delete • Esc close";
const SHARE_HINT: &str = "Share: type an email + Enter • ↑/↓ select • Del remove • Esc close";

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ToggleFocus,
    Refresh,
    NewNote,
    EditNote,
    DeleteNote,
    TogglePriority,
    CycleColor,
    ToggleAllDone,
    ShowTagManager,
    ShowShare,
    CycleStatusFilter,
    StartSearch,
    ToggleTrashView,
    RestoreNote,
}

fn is_plain(modifiers: KeyModifiers) -> bool {
    !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    worker: Worker,
    snapshots: SnapshotStore,
    /// Editor state saved before a calendar sign-in, reopened after the first load.
    pending_snapshot: Option<EditorSnapshot>,
    origin: Url,
}

impl App {
    pub fn new<A>(
        config: Arc<AppConfig>,
        api: Arc<A>,
        paths: &ConfigPaths,
        user_id: u64,
    ) -> Result<Self>
    where
        A: NotesApi + Send + Sync + ?Sized + 'static,
    {
        let origin = config.backend.origin_url()?;
        let state = AppState::new(
            user_id,
            config.search.debounce(),
            config.ui.palette.clone(),
            &config.ui.default_color,
        );
        let snapshots = SnapshotStore::new(&paths.state_dir);
        let pending_snapshot = match snapshots.take() {
            Ok(snapshot) => snapshot.filter(|snapshot| snapshot.is_popup_open),
            Err(err) => {
                tracing::warn!(?err, "discarding unreadable editor snapshot");
                None
            }
        };
        let worker = Worker::spawn(api).context("starting backend worker")?;
        let tick_rate = config.ui.tick_rate();

        let mut app = Self {
            config,
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate,
            worker,
            snapshots,
            pending_snapshot,
            origin,
        };
        app.submit(Job::LoadWorkspace { user_id });
        app.state.set_status_message(Some("Loading notes…"));
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            self.state.poll_search(Instant::now());
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let mut timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));
            if let Some(deadline) = self.state.search_deadline() {
                timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
            }

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        for outcome in self.worker.drain() {
            self.state.apply_outcome(outcome);
        }
        self.state.pending_jobs = self.worker.in_flight();
        self.resume_snapshot();
    }

    fn resume_snapshot(&mut self) {
        if !self.state.loaded || self.state.overlay().is_some() {
            return;
        }
        if let Some(snapshot) = self.pending_snapshot.take() {
            self.state.restore_editor(snapshot);
            self.state
                .set_status_message(Some("Restored the note you were editing"));
        }
    }

    fn submit(&mut self, job: Job) {
        let label = job.label();
        if let Err(err) = self.worker.submit(job) {
            tracing::error!(?err, label, "failed to queue backend job");
            self.state
                .set_status_message(Some(format!("Failed to {label}: worker stopped")));
        }
        self.state.pending_jobs = self.worker.in_flight();
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_search();
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char(Instant::now());
                    return;
                }
                KeyCode::Char(ch) if is_plain(key.modifiers) => {
                    self.state.push_search_char(ch, Instant::now());
                    return;
                }
                _ => {}
            }
        }

        let plain = is_plain(key.modifiers);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Tab => Some(Action::ToggleFocus),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('a') | KeyCode::Char('n') if plain => Some(Action::NewNote),
            KeyCode::Char('e') | KeyCode::Enter if plain => Some(Action::EditNote),
            KeyCode::Char('d') if plain => Some(Action::DeleteNote),
            KeyCode::Char('p') if plain => Some(Action::TogglePriority),
            KeyCode::Char('c') if plain => Some(Action::CycleColor),
            KeyCode::Char('x') if plain => Some(Action::ToggleAllDone),
            KeyCode::Char('t') if plain => Some(Action::ShowTagManager),
            KeyCode::Char('s') if plain => Some(Action::ShowShare),
            KeyCode::Char('f') if plain => Some(Action::CycleStatusFilter),
            KeyCode::Char('/') if plain => Some(Action::StartSearch),
            KeyCode::Char('T') => Some(Action::ToggleTrashView),
            KeyCode::Char('u') if plain => Some(Action::RestoreNote),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        if self.state.show_trash {
            match action {
                Action::Quit
                | Action::SelectNext
                | Action::SelectPrevious
                | Action::ToggleFocus
                | Action::Refresh
                | Action::StartSearch
                | Action::CycleStatusFilter
                | Action::ToggleTrashView
                | Action::RestoreNote => {}
                _ => {
                    self.state.set_status_message(Some(
                        "Trash is read-only: u restores, T returns to notes.",
                    ));
                    return;
                }
            }
        }
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ToggleFocus => self.state.toggle_focus(),
            Action::Refresh => self.handle_refresh(),
            Action::NewNote => {
                self.state.open_new_note();
                self.state.set_status_message(Some(EDITOR_HINT));
            }
            Action::EditNote => {
                if self.state.open_selected_note() {
                    self.state.set_status_message(Some(EDITOR_HINT));
                } else {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::DeleteNote => {
                if !self.state.open_delete_confirm() {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::TogglePriority => {
                if let Some(note) = self.state.selected_note().cloned() {
                    self.submit(Job::TogglePriority(Box::new(note)));
                }
            }
            Action::CycleColor => self.handle_cycle_color(),
            Action::ToggleAllDone => self.handle_toggle_all_done(),
            Action::ShowTagManager => {
                if self.state.open_tag_manager() {
                    self.state.set_status_message(Some(TAG_HINT));
                }
            }
            Action::ShowShare => {
                if self.state.open_share() {
                    self.state.set_status_message(Some(SHARE_HINT));
                }
            }
            Action::CycleStatusFilter => {
                let filter = self.state.cycle_status_filter();
                self.state
                    .set_status_message(Some(format!("Showing {filter} notes")));
            }
            Action::StartSearch => self.state.begin_search(),
            Action::ToggleTrashView => self.handle_toggle_trash_view(),
            Action::RestoreNote => self.handle_restore_note(),
        }
    }

    fn handle_refresh(&mut self) {
        let user_id = self.state.user_id;
        self.submit(Job::LoadWorkspace { user_id });
        if self.state.show_trash {
            self.submit(Job::LoadDeleted { user_id });
        }
        self.state.set_status_message(Some("Refreshing…"));
    }

    fn handle_toggle_trash_view(&mut self) {
        let entering = !self.state.show_trash;
        if entering {
            let user_id = self.state.user_id;
            self.submit(Job::LoadDeleted { user_id });
        }
        self.state.set_trash_view(entering);
        self.state.set_status_message(Some(if entering {
            "Showing trash (u restores, T returns)"
        } else {
            "Showing notes"
        }));
    }

    fn handle_restore_note(&mut self) {
        if !self.state.show_trash {
            self.state.set_status_message(Some(
                "Switch to the trash view (T) to restore notes.",
            ));
            return;
        }
        match self.state.selected_note_id() {
            Some(note_id) => self.submit(Job::RestoreNote(note_id)),
            None => self.state.set_status_message(Some("Trash is empty")),
        }
    }

    fn handle_cycle_color(&mut self) {
        let Some((note_id, color)) = self
            .state
            .selected_note()
            .map(|note| (note.note_id, note.color.clone()))
        else {
            return;
        };
        let Some(next) = self.state.palette.next_after(&color).map(str::to_string) else {
            return;
        };
        self.submit(Job::SetColor {
            note_id,
            color: next,
        });
    }

    fn handle_toggle_all_done(&mut self) {
        let Some(note) = self.state.selected_note() else {
            return;
        };
        if !note.is_todo {
            self.state
                .set_status_message(Some("Only todo notes can be marked done."));
            return;
        }
        let (note_id, is_all_done) = (note.note_id, !note.is_all_done);
        self.submit(Job::SetStatus {
            note_id,
            status: StatusUpdate {
                is_todo: None,
                is_all_done: Some(is_all_done),
            },
        });
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::Editor(_)) => {
                self.handle_editor_key(key);
                true
            }
            Some(OverlayState::DeleteConfirm(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => {
                        if let Some(note_id) =
                            self.state.delete_confirm_overlay().map(|overlay| overlay.note_id)
                        {
                            self.state.close_overlay();
                            self.submit(Job::DeleteNote(note_id));
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::TagManager(_)) => {
                self.handle_tag_manager_key(key);
                true
            }
            Some(OverlayState::Share(_)) => {
                self.handle_share_key(key);
                true
            }
            None => false,
        }
    }

    fn editor(&self) -> Option<&NoteEditor> {
        self.state.editor_overlay().map(|overlay| &overlay.editor)
    }

    fn editor_mut(&mut self) -> Option<&mut NoteEditor> {
        self.state
            .editor_overlay_mut()
            .map(|overlay| &mut overlay.editor)
    }

    fn with_buffer<F>(&mut self, field: EditorField, f: F) -> bool
    where
        F: FnOnce(&mut TextBuffer) -> bool,
    {
        let Some(editor) = self.editor_mut() else {
            return false;
        };
        match field {
            EditorField::Title => f(&mut editor.title),
            EditorField::Body => f(&mut editor.body),
            EditorField::Todos => false,
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.state.editor_overlay() else {
            return;
        };
        if overlay.calendar.is_some() {
            self.handle_calendar_key(key);
            return;
        }
        if overlay.reminder.is_open() {
            self.handle_reminder_key(key);
            return;
        }
        let field = overlay.editor.field();

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => {
                    self.save_editor();
                    return;
                }
                KeyCode::Char('t') => {
                    self.toggle_todo_mode();
                    return;
                }
                KeyCode::Char('o') => {
                    self.cycle_editor_color();
                    return;
                }
                KeyCode::Char('r') => {
                    self.open_reminder();
                    return;
                }
                KeyCode::Char('e') => {
                    if let Some(overlay) = self.state.editor_overlay_mut() {
                        overlay.calendar = Some(CalendarForm::default());
                    }
                    self.state.set_status_message(Some(CALENDAR_HINT));
                    return;
                }
                KeyCode::Char('a') => {
                    self.authorize_calendar();
                    return;
                }
                KeyCode::Char('z') => {
                    let message = if self.with_buffer(field, TextBuffer::undo) {
                        "Undid change"
                    } else {
                        "Nothing to undo"
                    };
                    self.state.set_status_message(Some(message));
                    return;
                }
                KeyCode::Char('y') => {
                    let message = if self.with_buffer(field, TextBuffer::redo) {
                        "Redid change"
                    } else {
                        "Nothing to redo"
                    };
                    self.state.set_status_message(Some(message));
                    return;
                }
                KeyCode::Char('d') if field == EditorField::Todos => {
                    self.toggle_todo_done();
                    return;
                }
                KeyCode::Char('x') if field == EditorField::Todos => {
                    if let Some(editor) = self.editor_mut() {
                        editor.remove_todo();
                    }
                    return;
                }
                KeyCode::Left => {
                    self.with_buffer(field, TextBuffer::move_word_left);
                    return;
                }
                KeyCode::Right => {
                    self.with_buffer(field, TextBuffer::move_word_right);
                    return;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => {
                let unsaved = self
                    .editor()
                    .map(|editor| !editor.changes().is_empty() && editor.note_id().is_some())
                    .unwrap_or(false);
                self.state.close_overlay();
                self.state.set_status_message(Some(if unsaved {
                    "Closed editor; unsaved changes discarded"
                } else {
                    "Closed editor"
                }));
            }
            KeyCode::Tab => {
                let hint = self.editor_mut().map(|editor| {
                    editor.cycle_field();
                    editor.field() == EditorField::Todos
                });
                if hint == Some(true) {
                    self.state.set_status_message(Some(TODO_HINT));
                }
            }
            _ => match field {
                EditorField::Todos => self.handle_todo_key(key),
                EditorField::Title | EditorField::Body => self.handle_text_key(field, key),
            },
        }
    }

    fn handle_text_key(&mut self, field: EditorField, key: KeyEvent) {
        match key.code {
            KeyCode::Enter if field == EditorField::Title => {
                if let Some(editor) = self.editor_mut() {
                    editor.cycle_field();
                }
            }
            KeyCode::Enter => {
                self.with_buffer(field, TextBuffer::insert_newline);
            }
            KeyCode::Backspace => {
                self.with_buffer(field, TextBuffer::backspace);
            }
            KeyCode::Delete => {
                self.with_buffer(field, TextBuffer::delete);
            }
            KeyCode::Char(ch) if is_plain(key.modifiers) => {
                self.with_buffer(field, |buffer| buffer.insert_char(ch));
            }
            KeyCode::Left => {
                self.with_buffer(field, TextBuffer::move_left);
            }
            KeyCode::Right => {
                self.with_buffer(field, TextBuffer::move_right);
            }
            KeyCode::Up => {
                self.with_buffer(field, TextBuffer::move_up);
            }
            KeyCode::Down => {
                self.with_buffer(field, TextBuffer::move_down);
            }
            KeyCode::Home => {
                self.with_buffer(field, TextBuffer::move_home);
            }
            KeyCode::End => {
                self.with_buffer(field, TextBuffer::move_end);
            }
            _ => {}
        }
    }

    fn handle_todo_key(&mut self, key: KeyEvent) {
        let plain = is_plain(key.modifiers);
        let Some(editor) = self.editor_mut() else {
            return;
        };
        match key.code {
            KeyCode::Enter => editor.add_todo(),
            KeyCode::Up => editor.select_todo(-1),
            KeyCode::Down => editor.select_todo(1),
            KeyCode::Backspace => {
                let blank = editor
                    .todos()
                    .get(editor.todo_cursor())
                    .map(|item| item.content.is_empty())
                    .unwrap_or(false);
                if blank {
                    editor.remove_todo();
                } else {
                    editor.pop_todo_char();
                }
            }
            KeyCode::Char(ch) if plain => editor.push_todo_char(ch),
            _ => {}
        }
    }

    fn save_editor(&mut self) {
        let Some(editor) = self.editor() else {
            return;
        };
        let job = match editor.note_id() {
            None => match editor.new_note() {
                Ok(body) => Job::CreateNote(body),
                Err(err) => {
                    self.state.set_status_message(Some(err.user_message()));
                    return;
                }
            },
            Some(note_id) => match editor.content_update() {
                Some(update) => Job::SaveNote {
                    note_id,
                    update: Some(update),
                },
                None => {
                    self.state.close_overlay();
                    self.state.set_status_message(Some("No changes to save"));
                    return;
                }
            },
        };
        self.state.close_overlay();
        self.submit(job);
        self.state.set_status_message(Some("Saving…"));
    }

    fn toggle_todo_mode(&mut self) {
        let Some(editor) = self.editor_mut() else {
            return;
        };
        let status = editor.toggle_todo_mode();
        let (note_id, is_todo) = (editor.note_id(), editor.is_todo());
        if let (Some(note_id), Some(status)) = (note_id, status) {
            self.submit(Job::SetStatus { note_id, status });
        }
        self.state.set_status_message(Some(if is_todo {
            "Todo list enabled"
        } else {
            "Todo list disabled"
        }));
    }

    fn cycle_editor_color(&mut self) {
        let Some(current) = self.editor().map(|editor| editor.color().to_string()) else {
            return;
        };
        let Some(next) = self.state.palette.next_after(&current).map(str::to_string) else {
            return;
        };
        let note_id = self.editor_mut().and_then(|editor| {
            editor.set_color(&next);
            editor.note_id()
        });
        if let Some(note_id) = note_id {
            self.submit(Job::SetColor {
                note_id,
                color: next.clone(),
            });
        }
        self.state.set_status_message(Some(format!("Color: {next}")));
    }

    fn toggle_todo_done(&mut self) {
        let Some(toggle) = self.editor_mut().and_then(NoteEditor::toggle_todo_done) else {
            return;
        };
        self.submit(Job::SetTodoDone {
            note_id: toggle.note_id,
            todo_id: TodoId::Persisted(toggle.todo_id),
            is_done: toggle.is_done,
        });
    }

    fn open_reminder(&mut self) {
        let Some(note_id) = self.editor().and_then(NoteEditor::note_id) else {
            self.state
                .set_status_message(Some("Save the note before adding a reminder."));
            return;
        };
        let Some(note) = self.state.store.note(note_id).cloned() else {
            self.state
                .set_status_message(Some("This note is no longer available."));
            return;
        };
        if let Some(overlay) = self.state.editor_overlay_mut() {
            overlay.reminder = ReminderEditor::open(&note, local_now());
        }
        self.state.set_status_message(Some(REMINDER_HINT));
    }

    fn handle_reminder_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('d') {
            self.clear_reminder();
            return;
        }
        let plain = is_plain(key.modifiers);
        match key.code {
            KeyCode::Esc => {
                if let Some(overlay) = self.state.editor_overlay_mut() {
                    overlay.reminder.close();
                }
                self.state.set_status_message(Some(EDITOR_HINT));
            }
            KeyCode::Enter => self.submit_reminder(),
            code => {
                let Some(draft) = self
                    .state
                    .editor_overlay_mut()
                    .and_then(|overlay| overlay.reminder.draft_mut())
                else {
                    return;
                };
                match (draft.field, code) {
                    (_, KeyCode::Tab) => draft.cycle_field(),
                    (DraftField::When, KeyCode::Backspace) => {
                        draft.when.pop();
                    }
                    (DraftField::When, KeyCode::Char(ch)) if plain => draft.when.push(ch),
                    (DraftField::Recurring, KeyCode::Char(' ')) => draft.toggle_recurring(),
                    (
                        DraftField::Frequency,
                        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right,
                    ) => draft.cycle_frequency(),
                    _ => {}
                }
            }
        }
    }

    fn submit_reminder(&mut self) {
        let Some(result) = self
            .state
            .editor_overlay()
            .map(|overlay| overlay.reminder.request(local_now()))
        else {
            return;
        };
        match result {
            Ok(request) => {
                self.submit(Job::SaveReminder(request));
                self.state.set_status_message(Some("Saving reminder…"));
            }
            Err(err) => self.state.set_status_message(Some(err.user_message())),
        }
    }

    fn clear_reminder(&mut self) {
        let target = self.state.editor_overlay().and_then(|overlay| {
            Some((overlay.reminder.note_id()?, overlay.reminder.reminder_id()?))
        });
        let Some((note_id, reminder_id)) = target else {
            self.state
                .set_status_message(Some("This note has no saved reminder."));
            return;
        };
        self.submit(Job::ClearReminder {
            note_id,
            reminder_id,
        });
        if let Some(overlay) = self.state.editor_overlay_mut() {
            overlay.reminder.close();
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        let plain = is_plain(key.modifiers);
        if key.code == KeyCode::Enter {
            self.submit_calendar_event();
            return;
        }
        let Some(overlay) = self.state.editor_overlay_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                overlay.calendar = None;
                self.state.set_status_message(Some(EDITOR_HINT));
            }
            KeyCode::Tab => {
                if let Some(form) = overlay.calendar.as_mut() {
                    form.cycle_field();
                }
            }
            KeyCode::Backspace => {
                if let Some(form) = overlay.calendar.as_mut() {
                    form.pop_char();
                }
            }
            KeyCode::Char(ch) if plain => {
                if let Some(form) = overlay.calendar.as_mut() {
                    form.push_char(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_calendar_event(&mut self) {
        let Some(overlay) = self.state.editor_overlay() else {
            return;
        };
        let Some(form) = overlay.calendar.as_ref() else {
            return;
        };
        let editor = &overlay.editor;
        let source = EventSource {
            title: editor.title.text(),
            body: if editor.is_todo() { "" } else { editor.body.text() },
            todo_items: editor.todos(),
        };
        match build_event(source, &form.window, &self.config.calendar) {
            Ok(event) => {
                if let Some(overlay) = self.state.editor_overlay_mut() {
                    overlay.calendar = None;
                }
                self.submit(Job::CreateEvent(event));
                self.state
                    .set_status_message(Some("Sending event to calendar…"));
            }
            Err(err) => self.state.set_status_message(Some(err.user_message())),
        }
    }

    fn authorize_calendar(&mut self) {
        let Some(snapshot) = self.editor().map(NoteEditor::snapshot) else {
            return;
        };
        if let Err(err) = self.snapshots.save(&snapshot) {
            tracing::error!(?err, "failed to save editor snapshot");
            self.state
                .set_status_message(Some("Failed to save editor state; see logs"));
            return;
        }
        match authorize_url(&self.origin) {
            Ok(url) => self.state.set_status_message(Some(format!(
                "Open {url} to connect your calendar; the editor reopens on next start."
            ))),
            Err(err) => {
                tracing::error!(?err, "failed to build authorize url");
                self.state.set_status_message(Some(err.user_message()));
            }
        }
    }

    fn handle_tag_manager_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.state.tag_manager_overlay() else {
            return;
        };
        let (note_id, mode) = (overlay.note_id, overlay.mode.clone());
        let plain = is_plain(key.modifiers);
        match mode {
            TagManagerMode::Browse => match key.code {
                KeyCode::Esc => {
                    self.state.close_overlay();
                    self.state.set_status_message(Some("Closed tag manager"));
                }
                KeyCode::Char('j') | KeyCode::Down => self.state.tag_manager_move_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.state.tag_manager_move_selection(-1),
                KeyCode::Char(' ') | KeyCode::Enter => self.toggle_tag_on_note(note_id),
                KeyCode::Char('a') if plain => {
                    self.set_tag_mode(TagManagerMode::Input(TagInputKind::Create), String::new());
                }
                KeyCode::Char('r') if plain => {
                    let Some(tag) = self
                        .state
                        .tag_manager_selection()
                        .and_then(|tag_id| self.state.store.tag(tag_id))
                    else {
                        return;
                    };
                    let (tag_id, name) = (tag.tag_id, tag.tag_name.clone());
                    self.set_tag_mode(TagManagerMode::Input(TagInputKind::Rename { tag_id }), name);
                }
                KeyCode::Char('d') if plain => {
                    if let Some(tag_id) = self.state.tag_manager_selection() {
                        self.set_tag_mode(TagManagerMode::ConfirmDelete { tag_id }, String::new());
                    }
                }
                _ => {}
            },
            TagManagerMode::Input(kind) => match key.code {
                KeyCode::Esc => self.set_tag_mode(TagManagerMode::Browse, String::new()),
                KeyCode::Enter => {
                    let name = self
                        .state
                        .tag_manager_overlay()
                        .map(|overlay| overlay.input.trim().to_string())
                        .unwrap_or_default();
                    if name.is_empty() {
                        self.state
                            .set_status_message(Some("Tag name cannot be empty."));
                        return;
                    }
                    let job = match kind {
                        TagInputKind::Create => Job::CreateTag(name),
                        TagInputKind::Rename { tag_id } => Job::RenameTag { tag_id, name },
                    };
                    self.submit(job);
                    self.set_tag_mode(TagManagerMode::Browse, String::new());
                }
                KeyCode::Backspace => {
                    if let Some(overlay) = self.state.tag_manager_overlay_mut() {
                        overlay.input.pop();
                    }
                }
                KeyCode::Char(ch) if plain => {
                    if let Some(overlay) = self.state.tag_manager_overlay_mut() {
                        overlay.input.push(ch);
                    }
                }
                _ => {}
            },
            TagManagerMode::ConfirmDelete { tag_id } => match key.code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.submit(Job::DeleteTag(tag_id));
                    self.set_tag_mode(TagManagerMode::Browse, String::new());
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.set_tag_mode(TagManagerMode::Browse, String::new());
                }
                _ => {}
            },
        }
    }

    fn set_tag_mode(&mut self, mode: TagManagerMode, input: String) {
        if let Some(overlay) = self.state.tag_manager_overlay_mut() {
            overlay.mode = mode;
            overlay.input = input;
        }
    }

    fn toggle_tag_on_note(&mut self, note_id: u64) {
        let Some(tag_id) = self.state.tag_manager_selection() else {
            self.state
                .set_status_message(Some("No tags yet; press a to create one"));
            return;
        };
        let attached = self
            .state
            .store
            .note(note_id)
            .map(|note| note.has_tag(tag_id))
            .unwrap_or(false);
        self.submit(if attached {
            Job::DetachTag { note_id, tag_id }
        } else {
            Job::AttachTag { note_id, tag_id }
        });
    }

    fn handle_share_key(&mut self, key: KeyEvent) {
        let Some(note_id) = self.state.share_overlay().map(|overlay| overlay.note_id) else {
            return;
        };
        let remove = key.code == KeyCode::Delete
            || (key.code == KeyCode::Char('d') && key.modifiers.contains(KeyModifiers::CONTROL));
        if remove {
            match self.state.share_selection() {
                Some(email) => self.submit(Job::Unshare { note_id, email }),
                None => self
                    .state
                    .set_status_message(Some("No collaborator selected")),
            }
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
                self.state.set_status_message(Some("Closed share dialog"));
            }
            KeyCode::Enter => {
                let email = self
                    .state
                    .share_overlay()
                    .map(|overlay| overlay.input.trim().to_string())
                    .unwrap_or_default();
                if email.is_empty() {
                    return;
                }
                self.submit(Job::Share { note_id, email });
                if let Some(overlay) = self.state.share_overlay_mut() {
                    overlay.input.clear();
                }
            }
            KeyCode::Up => self.state.share_move_selection(-1),
            KeyCode::Down => self.state.share_move_selection(1),
            KeyCode::Backspace => {
                if let Some(overlay) = self.state.share_overlay_mut() {
                    overlay.input.pop();
                }
            }
            KeyCode::Char(ch) if is_plain(key.modifiers) => {
                if let Some(overlay) = self.state.share_overlay_mut() {
                    overlay.input.push(ch);
                }
            }
            _ => {}
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::model::TodoItem;
    use crate::store::testing::{note, with_body};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    fn start(api: Arc<FakeApi>) -> anyhow::Result<(App, TempDir)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        let mut app = App::new(Arc::new(AppConfig::default()), api, &paths, 1)?;
        settle(&mut app);
        Ok((app, temp))
    }

    fn settle(app: &mut App) {
        while app.worker.in_flight() > 0 {
            let Some(outcome) = app.worker.wait(WAIT) else {
                break;
            };
            app.state.apply_outcome(outcome);
        }
        app.on_tick();
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, ch: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn plan() -> Vec<crate::model::Note> {
        vec![with_body(note(1, "Plan", "2024-01-01 00:00:00"), "steps")]
    }

    #[test]
    fn new_note_is_created_and_selected() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(plan()));
        let (mut app, _temp) = start(api.clone())?;
        assert_eq!(app.state().len(), 1);

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Groceries");
        ctrl(&mut app, 's');
        assert!(app.state().overlay().is_none());
        settle(&mut app);

        assert_eq!(app.state().len(), 2);
        let selected = app.state().selected_note().expect("selection");
        assert_eq!(selected.title(), "Groceries");
        assert_eq!(api.created_bodies.lock()[0].content.as_deref(), Some(""));
        Ok(())
    }

    #[test]
    fn unchanged_save_skips_backend() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(plan()));
        let (mut app, _temp) = start(api.clone())?;
        press(&mut app, KeyCode::Char('e'));
        assert!(app.state().editor_overlay().is_some());
        ctrl(&mut app, 's');
        settle(&mut app);
        assert!(!api
            .calls()
            .iter()
            .any(|call| call.starts_with("PUT /note/title-content")));
        assert_eq!(app.state().status_message.as_deref(), Some("No changes to save"));
        Ok(())
    }

    #[test]
    fn delete_waits_for_confirmation() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(plan()));
        let (mut app, _temp) = start(api.clone())?;
        press(&mut app, KeyCode::Char('d'));
        assert!(app.state().delete_confirm_overlay().is_some());
        assert!(!api.calls().iter().any(|call| call.starts_with("DELETE")));

        press(&mut app, KeyCode::Enter);
        settle(&mut app);
        assert!(app.state().is_empty());
        assert_eq!(app.state().store.deleted().len(), 1);
        Ok(())
    }

    #[test]
    fn snapshot_reopens_editor_once_notes_load() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        let store = SnapshotStore::new(&paths.state_dir);
        store.save(&EditorSnapshot {
            is_popup_open: true,
            current_note_id: Some(1),
            note_title: "Plan v2".into(),
            note_content: "steps".into(),
            is_todo: false,
            todo_items: Vec::new(),
            selected_color: "blue".into(),
        })?;

        let api = Arc::new(FakeApi::with_notes(plan()));
        let mut app = App::new(Arc::new(AppConfig::default()), api, &paths, 1)?;
        settle(&mut app);

        let editor = &app.state().editor_overlay().expect("editor reopened").editor;
        assert_eq!(editor.note_id(), Some(1));
        assert_eq!(editor.title.text(), "Plan v2");
        assert_eq!(editor.color(), "blue");
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn past_reminder_is_rejected_locally() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(plan()));
        let (mut app, _temp) = start(api.clone())?;
        press(&mut app, KeyCode::Char('e'));
        ctrl(&mut app, 'r');
        if let Some(draft) = app
            .state
            .editor_overlay_mut()
            .and_then(|overlay| overlay.reminder.draft_mut())
        {
            draft.when = "2000-01-01 08:00".into();
        }
        press(&mut app, KeyCode::Enter);
        settle(&mut app);

        assert!(!api.calls().iter().any(|call| call.contains("reminder")));
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("Reminder time cannot be in the past.")
        );
        let overlay = app.state().editor_overlay().expect("editor");
        assert!(overlay.reminder.is_open());
        Ok(())
    }

    #[test]
    fn checking_a_saved_item_is_sent_immediately() -> anyhow::Result<()> {
        let mut list = note(1, "Errands", "2024-01-01 00:00:00");
        list.is_todo = true;
        list.todo_items = vec![TodoItem {
            id: TodoId::Persisted(40),
            content: "post office".into(),
            is_done: false,
        }];
        let api = Arc::new(FakeApi::with_notes(vec![list]));
        let (mut app, _temp) = start(api.clone())?;

        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Tab);
        ctrl(&mut app, 'd');
        settle(&mut app);

        assert!(api
            .calls()
            .contains(&"PUT /note/1/todo/40/status true".to_string()));
        let stored = app.state().store.note(1).expect("note");
        assert!(stored.todo_items[0].is_done);
        Ok(())
    }

    #[test]
    fn search_keys_apply_after_quiet_period() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(vec![
            with_body(note(1, "Buy milk", "2024-02-01 00:00:00"), ""),
            with_body(note(2, "Ideas", "2024-01-01 00:00:00"), ""),
        ]));
        let (mut app, _temp) = start(api)?;
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "milk");
        assert_eq!(app.state().len(), 2);
        assert!(app.state.poll_search(Instant::now() + Duration::from_secs(1)));
        assert_eq!(app.state().len(), 1);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state().len(), 2);
        Ok(())
    }

    #[test]
    fn enter_applies_query_without_waiting() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::with_notes(vec![
            with_body(note(1, "Buy milk", "2024-02-01 00:00:00"), ""),
            with_body(note(2, "Ideas", "2024-01-01 00:00:00"), ""),
        ]));
        let (mut app, _temp) = start(api)?;
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "idea");
        press(&mut app, KeyCode::Enter);
        assert!(!app.state().is_search_active());
        assert_eq!(app.state().len(), 1);
        assert_eq!(app.state().selected_note_id(), Some(2));
        Ok(())
    }
}
