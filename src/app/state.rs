use std::time::{Duration, Instant};

use crate::app::editor::NoteEditor;
use crate::app::reminder::ReminderEditor;
use crate::app::worker::{Completion, Effect, JobOutcome};
use crate::calendar::EventWindow;
use crate::config::palette::NotePalette;
use crate::model::Note;
use crate::search::{filter_notes, Debouncer, StatusFilter};
use crate::session::snapshot::EditorSnapshot;
use crate::store::{NoteStore, StoreAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    List,
    Reader,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    /// What has been typed so far.
    pub input: String,
    /// The query the displayed list was last computed with.
    pub applied: String,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowField {
    #[default]
    Start,
    End,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarForm {
    pub window: EventWindow,
    pub field: WindowField,
}

impl CalendarForm {
    fn active_mut(&mut self) -> &mut String {
        match self.field {
            WindowField::Start => &mut self.window.start,
            WindowField::End => &mut self.window.end,
        }
    }

    pub fn push_char(&mut self, ch: char) {
        self.active_mut().push(ch);
    }

    pub fn pop_char(&mut self) {
        self.active_mut().pop();
    }

    pub fn cycle_field(&mut self) {
        self.field = match self.field {
            WindowField::Start => WindowField::End,
            WindowField::End => WindowField::Start,
        };
    }
}

#[derive(Debug, Clone)]
pub struct EditorOverlay {
    pub editor: NoteEditor,
    pub reminder: ReminderEditor,
    pub calendar: Option<CalendarForm>,
}

#[derive(Debug, Clone)]
pub struct DeleteConfirmOverlay {
    pub note_id: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInputKind {
    Create,
    Rename { tag_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagManagerMode {
    #[default]
    Browse,
    Input(TagInputKind),
    ConfirmDelete { tag_id: u64 },
}

/// Tag list for one note. Rows are read from the store on every frame so
/// completed tag calls show up without reopening.
#[derive(Debug, Clone, Default)]
pub struct TagManagerOverlay {
    pub note_id: u64,
    pub selected_index: usize,
    pub mode: TagManagerMode,
    pub input: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShareOverlay {
    pub note_id: u64,
    pub input: String,
    pub selected_index: usize,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Editor(Box<EditorOverlay>),
    DeleteConfirm(DeleteConfirmOverlay),
    TagManager(TagManagerOverlay),
    Share(ShareOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: NoteStore,
    pub focus: FocusPane,
    pub show_trash: bool,
    pub selected: usize,
    pub search: SearchState,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub palette: NotePalette,
    pub default_color: String,
    pub user_id: u64,
    /// Set once the first workspace load has been applied.
    pub loaded: bool,
    /// Backend calls submitted but not yet answered.
    pub pending_jobs: usize,
    visible: Vec<u64>,
    debouncer: Debouncer<String>,
}

impl AppState {
    pub fn new(user_id: u64, debounce: Duration, palette: NotePalette, default_color: &str) -> Self {
        Self {
            store: NoteStore::new(),
            focus: FocusPane::List,
            show_trash: false,
            selected: 0,
            search: SearchState::default(),
            status_message: None,
            overlay: None,
            palette,
            default_color: default_color.to_string(),
            user_id,
            loaded: false,
            pending_jobs: 0,
            visible: Vec::new(),
            debouncer: Debouncer::new(debounce),
        }
    }

    fn source(&self) -> &[Note] {
        if self.show_trash {
            self.store.deleted()
        } else {
            self.store.notes()
        }
    }

    fn lookup(&self, note_id: u64) -> Option<&Note> {
        if self.show_trash {
            self.store.deleted_note(note_id)
        } else {
            self.store.note(note_id)
        }
    }

    /// Notes currently displayed, in display order.
    pub fn visible_notes(&self) -> Vec<&Note> {
        self.visible
            .iter()
            .filter_map(|note_id| self.lookup(*note_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.visible
            .get(self.selected)
            .and_then(|note_id| self.lookup(*note_id))
    }

    pub fn selected_note_id(&self) -> Option<u64> {
        self.visible.get(self.selected).copied()
    }

    /// Recomputes the displayed subset: status filter first, then the applied
    /// text query. Keeps the selection on the same note when it survives.
    pub fn refresh_view(&mut self) {
        let keep = self.selected_note_id();
        self.visible = filter_notes(self.source(), self.search.status, &self.search.applied)
            .into_iter()
            .map(|note| note.note_id)
            .collect();
        match keep {
            Some(note_id) => self.select_note_by_id(note_id),
            None => self.normalize_selection(),
        }
    }

    pub fn select_note_by_id(&mut self, note_id: u64) {
        if let Some(idx) = self.visible.iter().position(|id| *id == note_id) {
            self.selected = idx;
        } else {
            self.normalize_selection();
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn normalize_selection(&mut self) {
        if self.visible.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.visible.len() {
            self.selected = self.visible.len() - 1;
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::List => FocusPane::Reader,
            FocusPane::Reader => FocusPane::List,
        };
    }

    pub fn set_trash_view(&mut self, enabled: bool) {
        if self.show_trash == enabled {
            return;
        }
        self.show_trash = enabled;
        self.selected = 0;
        self.refresh_view();
    }

    pub fn apply_actions(&mut self, actions: Vec<StoreAction>) {
        for action in actions {
            if matches!(action, StoreAction::ReplaceNotes(_)) {
                self.loaded = true;
            }
            self.store.apply(action);
        }
        self.refresh_view();
    }

    /// Applies a finished backend job. Failures leave the store untouched.
    pub fn apply_outcome(&mut self, outcome: JobOutcome) {
        let JobOutcome { label, result } = outcome;
        match result {
            Ok(Completion {
                actions,
                message,
                effect,
            }) => {
                self.apply_actions(actions);
                match effect {
                    Some(Effect::Select(note_id)) => self.select_note_by_id(note_id),
                    Some(Effect::ReminderSaved(note_id)) => self.close_reminder_for(note_id),
                    None => {}
                }
                if let Some(message) = message {
                    self.set_status_message(Some(message));
                }
            }
            Err(err) => {
                tracing::error!(?err, label, "backend call failed");
                self.set_status_message(Some(format!(
                    "Failed to {label}: {}",
                    err.user_message()
                )));
            }
        }
    }

    fn close_reminder_for(&mut self, note_id: u64) {
        if let Some(overlay) = self.editor_overlay_mut() {
            if overlay.reminder.note_id() == Some(note_id) {
                overlay.reminder.close();
            }
        }
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
        self.focus = FocusPane::List;
    }

    /// Leaves search input, applying a still-pending query right away.
    pub fn finish_search(&mut self) {
        self.search.active = false;
        if let Some(query) = self.debouncer.flush() {
            self.search.applied = query;
            self.selected = 0;
            self.refresh_view();
        }
    }

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn push_search_char(&mut self, ch: char, now: Instant) {
        self.search.input.push(ch);
        self.debouncer.push(self.search.input.clone(), now);
    }

    pub fn pop_search_char(&mut self, now: Instant) {
        if self.search.input.pop().is_some() {
            self.debouncer.push(self.search.input.clone(), now);
        }
    }

    /// Clears the query immediately, dropping any pending recomputation.
    pub fn cancel_search(&mut self) {
        self.search.active = false;
        self.search.input.clear();
        self.debouncer.cancel();
        if !self.search.applied.is_empty() {
            self.search.applied.clear();
            self.refresh_view();
        }
    }

    /// Applies the pending query once its quiet period has passed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        let Some(query) = self.debouncer.poll(now) else {
            return false;
        };
        self.search.applied = query;
        self.selected = 0;
        self.refresh_view();
        true
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn cycle_status_filter(&mut self) -> StatusFilter {
        self.search.status = self.search.status.cycle();
        self.refresh_view();
        self.search.status
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    fn open_editor_overlay(&mut self, editor: NoteEditor) {
        self.overlay = Some(OverlayState::Editor(Box::new(EditorOverlay {
            editor,
            reminder: ReminderEditor::Closed,
            calendar: None,
        })));
    }

    pub fn open_new_note(&mut self) {
        let editor = NoteEditor::create(&self.default_color);
        self.open_editor_overlay(editor);
    }

    pub fn open_selected_note(&mut self) -> bool {
        let Some(editor) = self.selected_note().map(NoteEditor::open) else {
            return false;
        };
        self.open_editor_overlay(editor);
        true
    }

    pub fn restore_editor(&mut self, snapshot: EditorSnapshot) {
        let stored = snapshot
            .current_note_id
            .and_then(|note_id| self.store.note(note_id));
        let editor = NoteEditor::from_snapshot(snapshot, stored);
        self.open_editor_overlay(editor);
    }

    pub fn editor_overlay(&self) -> Option<&EditorOverlay> {
        match self.overlay() {
            Some(OverlayState::Editor(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn editor_overlay_mut(&mut self) -> Option<&mut EditorOverlay> {
        match self.overlay_mut() {
            Some(OverlayState::Editor(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn open_delete_confirm(&mut self) -> bool {
        let Some(note) = self.selected_note() else {
            return false;
        };
        self.overlay = Some(OverlayState::DeleteConfirm(DeleteConfirmOverlay {
            note_id: note.note_id,
            title: note.title().to_string(),
        }));
        true
    }

    pub fn delete_confirm_overlay(&self) -> Option<&DeleteConfirmOverlay> {
        match self.overlay() {
            Some(OverlayState::DeleteConfirm(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn open_tag_manager(&mut self) -> bool {
        let Some(note_id) = self.selected_note_id() else {
            return false;
        };
        self.overlay = Some(OverlayState::TagManager(TagManagerOverlay {
            note_id,
            ..TagManagerOverlay::default()
        }));
        true
    }

    pub fn tag_manager_overlay(&self) -> Option<&TagManagerOverlay> {
        match self.overlay() {
            Some(OverlayState::TagManager(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn tag_manager_overlay_mut(&mut self) -> Option<&mut TagManagerOverlay> {
        match self.overlay_mut() {
            Some(OverlayState::TagManager(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    /// Tag under the tag manager cursor.
    pub fn tag_manager_selection(&self) -> Option<u64> {
        let overlay = self.tag_manager_overlay()?;
        self.store
            .tags()
            .nth(overlay.selected_index)
            .map(|tag| tag.tag_id)
    }

    pub fn tag_manager_move_selection(&mut self, delta: isize) {
        let count = self.store.tag_count();
        if let Some(overlay) = self.tag_manager_overlay_mut() {
            if count == 0 {
                overlay.selected_index = 0;
                return;
            }
            overlay.selected_index = overlay
                .selected_index
                .saturating_add_signed(delta)
                .min(count - 1);
        }
    }

    pub fn open_share(&mut self) -> bool {
        let Some(note_id) = self.selected_note_id() else {
            return false;
        };
        self.overlay = Some(OverlayState::Share(ShareOverlay {
            note_id,
            ..ShareOverlay::default()
        }));
        true
    }

    pub fn share_overlay(&self) -> Option<&ShareOverlay> {
        match self.overlay() {
            Some(OverlayState::Share(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn share_overlay_mut(&mut self) -> Option<&mut ShareOverlay> {
        match self.overlay_mut() {
            Some(OverlayState::Share(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    /// Collaborator email under the share dialog cursor, owners excluded.
    pub fn share_selection(&self) -> Option<String> {
        let overlay = self.share_overlay()?;
        self.store
            .note(overlay.note_id)?
            .collaborators()
            .nth(overlay.selected_index)
            .map(|entry| entry.email.clone())
    }

    pub fn share_move_selection(&mut self, delta: isize) {
        let count = self
            .share_overlay()
            .and_then(|overlay| self.store.note(overlay.note_id))
            .map(|note| note.collaborators().count())
            .unwrap_or(0);
        if let Some(overlay) = self.share_overlay_mut() {
            overlay.selected_index = if count == 0 {
                0
            } else {
                overlay.selected_index.saturating_add_signed(delta).min(count - 1)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::model::{Reminder, Tag};
    use crate::store::testing::{note, with_body, with_todos};
    use crate::store::NotePatch;

    fn state_with(notes: Vec<Note>) -> AppState {
        let mut state = AppState::new(1, Duration::from_millis(200), NotePalette::default(), "white");
        state.apply_actions(vec![StoreAction::ReplaceNotes(notes)]);
        state
    }

    fn titles(state: &AppState) -> Vec<String> {
        state
            .visible_notes()
            .into_iter()
            .map(|note| note.title().to_string())
            .collect()
    }

    fn sample() -> Vec<Note> {
        let mut shopping = with_todos(note(1, "Shopping", "2024-03-01 00:00:00"), &[("eggs", true)]);
        shopping.is_all_done = true;
        vec![
            shopping,
            with_body(note(2, "Buy milk", "2024-02-01 00:00:00"), "2 litres"),
            with_body(note(3, "Ideas", "2024-01-01 00:00:00"), "none yet"),
        ]
    }

    #[test]
    fn status_filter_then_query() {
        let mut state = state_with(sample());
        assert_eq!(state.cycle_status_filter(), StatusFilter::Completed);
        assert_eq!(titles(&state), vec!["Shopping"]);

        state.search.status = StatusFilter::All;
        let start = Instant::now();
        for ch in "milk".chars() {
            state.push_search_char(ch, start);
        }
        assert!(state.poll_search(start + Duration::from_millis(200)));
        assert_eq!(titles(&state), vec!["Buy milk"]);
    }

    #[test]
    fn keystroke_burst_recomputes_once_with_final_query() {
        let mut state = state_with(sample());
        let t0 = Instant::now();
        state.push_search_char('m', t0);
        state.push_search_char('i', t0 + Duration::from_millis(50));
        state.push_search_char('l', t0 + Duration::from_millis(100));

        assert!(!state.poll_search(t0 + Duration::from_millis(250)));
        assert_eq!(state.len(), 3);
        assert!(state.poll_search(t0 + Duration::from_millis(300)));
        assert_eq!(state.search.applied, "mil");
        assert!(!state.poll_search(t0 + Duration::from_millis(600)));
        assert_eq!(titles(&state), vec!["Buy milk"]);
    }

    #[test]
    fn finishing_search_applies_pending_query_at_once() {
        let mut state = state_with(sample());
        let t0 = Instant::now();
        for ch in "ideas".chars() {
            state.push_search_char(ch, t0);
        }
        assert_eq!(state.len(), 3);

        state.finish_search();
        assert!(!state.is_search_active());
        assert_eq!(titles(&state), vec!["Ideas"]);
        assert!(state.search_deadline().is_none());
        assert!(!state.poll_search(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn cancel_search_restores_full_list() {
        let mut state = state_with(sample());
        let t0 = Instant::now();
        state.push_search_char('x', t0);
        state.poll_search(t0 + Duration::from_secs(1));
        assert!(state.is_empty());
        state.cancel_search();
        assert_eq!(state.len(), 3);
        assert!(state.search_deadline().is_none());
    }

    #[test]
    fn selection_follows_note_across_resort() {
        let mut state = state_with(sample());
        state.select_note_by_id(3);
        state.apply_actions(vec![StoreAction::Patch {
            note_id: 3,
            patch: NotePatch::Priority(1),
        }]);
        assert_eq!(state.selected, 0);
        assert_eq!(state.selected_note_id(), Some(3));
    }

    #[test]
    fn failed_job_only_sets_status() {
        let mut state = state_with(sample());
        state.apply_outcome(JobOutcome {
            label: "delete note",
            result: Err(ClientError::Server {
                status: 500,
                message: "Failed to delete note".into(),
            }),
        });
        assert_eq!(state.len(), 3);
        assert_eq!(
            state.status_message.as_deref(),
            Some("Failed to delete note: Failed to delete note")
        );
    }

    #[test]
    fn saved_reminder_closes_sub_editor_and_shows_stored_value() {
        let mut state = state_with(sample());
        state.select_note_by_id(2);
        assert!(state.open_selected_note());
        let stored = state.store.note(2).cloned().expect("note");
        if let Some(overlay) = state.editor_overlay_mut() {
            overlay.reminder = ReminderEditor::open(&stored, crate::app::reminder::local_now());
        }
        let reminder = Reminder {
            reminder_id: Some(7),
            note_id: 2,
            reminder_time: "2030-01-01 09:00:00".into(),
            recurring: false,
            frequency: None,
        };
        state.apply_outcome(JobOutcome {
            label: "save reminder",
            result: Ok(Completion {
                actions: vec![StoreAction::Patch {
                    note_id: 2,
                    patch: NotePatch::Reminder(Some(reminder.clone())),
                }],
                message: Some("Reminder saved".into()),
                effect: Some(Effect::ReminderSaved(2)),
            }),
        });
        let overlay = state.editor_overlay().expect("editor still open");
        assert_eq!(overlay.reminder, ReminderEditor::Closed);
        assert_eq!(state.store.note(2).and_then(Note::active_reminder), Some(&reminder));
    }

    #[test]
    fn tag_manager_reads_rows_from_store() {
        let mut state = state_with(sample());
        state.apply_actions(vec![StoreAction::ReplaceTags(vec![
            Tag {
                tag_id: 5,
                tag_name: "Work".into(),
                user_id: 1,
                notes: Vec::new(),
            },
            Tag {
                tag_id: 6,
                tag_name: "Home".into(),
                user_id: 1,
                notes: Vec::new(),
            },
        ])]);
        assert!(state.open_tag_manager());
        state.tag_manager_move_selection(5);
        assert_eq!(state.tag_manager_selection(), Some(6));
    }

    #[test]
    fn trash_view_lists_deleted_notes() {
        let mut state = state_with(sample());
        state.apply_actions(vec![StoreAction::Remove(3)]);
        state.set_trash_view(true);
        assert_eq!(titles(&state), vec!["Ideas"]);
        state.apply_actions(vec![StoreAction::Restore(3)]);
        assert!(state.is_empty());
    }
}
