use strum::IntoEnumIterator;
use time::macros::format_description;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{ClientError, ClientResult};
use crate::model::{Frequency, Note, Reminder};

fn parse_draft(raw: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]")).ok()
}

fn format_draft(at: PrimitiveDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

/// Wall-clock "now" in the machine's offset, UTC when the offset is unknown.
pub fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time())
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    When,
    Recurring,
    Frequency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    /// `YYYY-MM-DD HH:MM` in local time.
    pub when: String,
    pub recurring: bool,
    pub frequency: Frequency,
    pub field: DraftField,
}

impl ReminderDraft {
    fn new(when: String, recurring: bool, frequency: Frequency) -> Self {
        Self {
            when,
            recurring,
            frequency,
            field: DraftField::When,
        }
    }

    pub fn cycle_field(&mut self) {
        self.field = match self.field {
            DraftField::When => DraftField::Recurring,
            DraftField::Recurring if self.recurring => DraftField::Frequency,
            DraftField::Recurring | DraftField::Frequency => DraftField::When,
        };
    }

    pub fn toggle_recurring(&mut self) {
        self.recurring = !self.recurring;
    }

    pub fn cycle_frequency(&mut self) {
        let all: Vec<Frequency> = Frequency::iter().collect();
        let idx = all.iter().position(|f| *f == self.frequency).unwrap_or(0);
        self.frequency = all[(idx + 1) % all.len()];
    }
}

/// What a save sends: POST when `reminder_id` is `None`, PUT otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub note_id: u64,
    pub reminder_id: Option<u64>,
    pub reminder: Reminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReminderEditor {
    #[default]
    Closed,
    Creating {
        note_id: u64,
        draft: ReminderDraft,
    },
    Editing {
        note_id: u64,
        reminder_id: u64,
        draft: ReminderDraft,
    },
}

impl ReminderEditor {
    /// Starts from the note's reminder when it has one, otherwise from `now`.
    pub fn open(note: &Note, now: PrimitiveDateTime) -> Self {
        let fallback = || format_draft(now);
        match note.active_reminder() {
            Some(existing) => {
                let draft = ReminderDraft::new(
                    draft_time(&existing.reminder_time, local_offset()).unwrap_or_else(fallback),
                    existing.recurring,
                    existing.frequency.unwrap_or_default(),
                );
                match existing.reminder_id {
                    Some(reminder_id) => ReminderEditor::Editing {
                        note_id: note.note_id,
                        reminder_id,
                        draft,
                    },
                    None => ReminderEditor::Creating {
                        note_id: note.note_id,
                        draft,
                    },
                }
            }
            None => ReminderEditor::Creating {
                note_id: note.note_id,
                draft: ReminderDraft::new(fallback(), false, Frequency::Daily),
            },
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ReminderEditor::Closed)
    }

    pub fn note_id(&self) -> Option<u64> {
        match self {
            ReminderEditor::Closed => None,
            ReminderEditor::Creating { note_id, .. } | ReminderEditor::Editing { note_id, .. } => {
                Some(*note_id)
            }
        }
    }

    pub fn reminder_id(&self) -> Option<u64> {
        match self {
            ReminderEditor::Editing { reminder_id, .. } => Some(*reminder_id),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&ReminderDraft> {
        match self {
            ReminderEditor::Closed => None,
            ReminderEditor::Creating { draft, .. } | ReminderEditor::Editing { draft, .. } => {
                Some(draft)
            }
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut ReminderDraft> {
        match self {
            ReminderEditor::Closed => None,
            ReminderEditor::Creating { draft, .. } | ReminderEditor::Editing { draft, .. } => {
                Some(draft)
            }
        }
    }

    pub fn close(&mut self) {
        *self = ReminderEditor::Closed;
    }

    /// Validates the draft against `now` and builds the request. A time earlier
    /// than `now`, seconds included, is rejected. Leaves the editor untouched
    /// either way.
    pub fn request(&self, now: PrimitiveDateTime) -> ClientResult<ReminderRequest> {
        let (note_id, draft) = match self {
            ReminderEditor::Closed => {
                return Err(ClientError::validation("No reminder is being edited."))
            }
            ReminderEditor::Creating { note_id, draft }
            | ReminderEditor::Editing { note_id, draft, .. } => (*note_id, draft),
        };
        let when = parse_draft(draft.when.trim()).ok_or_else(|| {
            ClientError::validation("Reminder time must look like YYYY-MM-DD HH:MM.")
        })?;
        if when < now {
            return Err(ClientError::validation("Reminder time cannot be in the past."));
        }
        let reminder_id = self.reminder_id();
        Ok(ReminderRequest {
            note_id,
            reminder_id,
            reminder: Reminder {
                reminder_id,
                note_id,
                reminder_time: format!("{}:00", draft.when.trim()),
                recurring: draft.recurring,
                frequency: draft.recurring.then_some(draft.frequency),
            },
        })
    }
}

/// Backend times come back as local `YYYY-MM-DD HH:MM:SS` or as RFC 3339.
/// RFC 3339 values are shifted into `offset` before being shown.
fn draft_time(raw: &str, offset: UtcOffset) -> Option<String> {
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        let local = at.to_offset(offset);
        return Some(format_draft(PrimitiveDateTime::new(local.date(), local.time())));
    }
    let head = raw.get(..16)?.replacen('T', " ", 1);
    parse_draft(&head).map(|_| head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::app::actions::ActionDispatcher;
    use crate::store::testing::note;
    use assert_matches::assert_matches;
    use time::macros::{datetime, offset};

    const NOW: PrimitiveDateTime = datetime!(2025-01-03 10:30:45);

    #[test]
    fn new_reminder_defaults_to_now() {
        let editor = ReminderEditor::open(&note(1, "x", ""), NOW);
        let draft = editor.draft().expect("open");
        assert_eq!(draft.when, "2025-01-03 10:30");
        assert!(!draft.recurring);
        assert_eq!(draft.frequency, Frequency::Daily);
        assert_eq!(editor.reminder_id(), None);
    }

    #[test]
    fn existing_reminder_is_edited_in_place() {
        let mut stored = note(1, "x", "");
        stored.reminder.push(Reminder {
            reminder_id: Some(12),
            note_id: 1,
            reminder_time: "2025-02-01 09:15:00".into(),
            recurring: true,
            frequency: Some(Frequency::Weekly),
        });
        let editor = ReminderEditor::open(&stored, NOW);
        assert_matches!(&editor, ReminderEditor::Editing { reminder_id: 12, draft, .. }
            if draft.when == "2025-02-01 09:15" && draft.frequency == Frequency::Weekly);
    }

    #[test]
    fn rfc3339_times_open_in_local_wall_clock() {
        assert_eq!(
            draft_time("2025-02-01T02:15:00Z", offset!(+7)).as_deref(),
            Some("2025-02-01 09:15")
        );
        assert_eq!(
            draft_time("2025-02-01 09:15:00", offset!(+7)).as_deref(),
            Some("2025-02-01 09:15")
        );
        assert_eq!(draft_time("soon", offset!(+7)), None);
    }

    #[test]
    fn current_minute_already_begun_is_rejected_before_any_call() {
        let api = FakeApi::default();
        let editor = ReminderEditor::open(&note(4, "x", ""), NOW);
        assert_eq!(editor.draft().map(|draft| draft.when.as_str()), Some("2025-01-03 10:30"));

        let result = editor
            .request(NOW)
            .and_then(|request| ActionDispatcher::new(&api).save_reminder(&request));
        assert_matches!(result, Err(ClientError::Validation(_)));
        assert!(api.calls().is_empty());
        assert!(api.reminders.lock().is_empty());
    }

    #[test]
    fn past_time_is_rejected_without_state_change() {
        let mut editor = ReminderEditor::open(&note(1, "x", ""), NOW);
        if let Some(draft) = editor.draft_mut() {
            draft.when = "2025-01-03 10:29".into();
        }
        let before = editor.clone();
        assert_matches!(
            editor.request(NOW),
            Err(ClientError::Validation(msg)) if msg == "Reminder time cannot be in the past."
        );
        assert_eq!(editor, before);
    }

    #[test]
    fn request_formats_time_and_omits_frequency_unless_recurring() -> anyhow::Result<()> {
        let mut editor = ReminderEditor::open(&note(5, "x", ""), NOW);
        if let Some(draft) = editor.draft_mut() {
            draft.when = "2025-01-03 10:31".into();
        }
        let request = editor.request(NOW)?;
        assert_eq!(request.reminder.reminder_time, "2025-01-03 10:31:00");
        assert_eq!(request.reminder.frequency, None);
        let body = serde_json::to_value(&request.reminder)?;
        assert!(body.get("frequency").is_none());
        assert!(body.get("reminder_id").is_none());

        if let Some(draft) = editor.draft_mut() {
            draft.toggle_recurring();
            draft.cycle_frequency();
        }
        let request = editor.request(NOW)?;
        assert_eq!(request.reminder.frequency, Some(Frequency::Weekly));
        Ok(())
    }

    #[test]
    fn close_returns_to_closed() {
        let mut editor = ReminderEditor::open(&note(1, "x", ""), NOW);
        editor.close();
        assert_eq!(editor, ReminderEditor::Closed);
        assert!(editor.request(NOW).is_err());
    }
}
