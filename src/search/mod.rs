use std::time::{Duration, Instant};

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::model::Note;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl StatusFilter {
    pub fn matches(self, note: &Note) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Completed => note.is_all_done,
            StatusFilter::Incomplete => !note.is_all_done,
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::Incomplete,
            StatusFilter::Incomplete => StatusFilter::All,
        }
    }
}

/// Case-insensitive substring match over title, body and todo contents.
/// `needle` must already be lower-cased. Notes without a title never match a
/// non-empty needle.
pub fn matches_query(note: &Note, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let Some(title) = note.title.as_deref() else {
        return false;
    };
    title.to_lowercase().contains(needle)
        || note.body().to_lowercase().contains(needle)
        || note
            .todo_items
            .iter()
            .any(|item| item.content.to_lowercase().contains(needle))
}

/// Status filter first, then the text query. Order of `notes` is kept.
pub fn filter_notes<'a>(notes: &'a [Note], status: StatusFilter, query: &str) -> Vec<&'a Note> {
    let needle = query.trim().to_lowercase();
    notes
        .iter()
        .filter(|note| status.matches(note))
        .filter(|note| matches_query(note, &needle))
        .collect()
}

/// Holds back the latest value until `delay` has passed without a newer one.
/// Driven by the caller's clock so the event loop can poll it on each tick.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending value and restarts the wait.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.delay, value));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if now >= deadline => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Fires the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{note, with_body, with_todos};

    fn sample_notes() -> Vec<Note> {
        let mut shopping = with_todos(
            note(1, "Shopping", "2024-01-01 00:00:00"),
            &[("eggs", true), ("bread", true)],
        );
        shopping.is_all_done = true;
        vec![
            shopping,
            with_body(note(2, "Buy milk", "2024-01-02 00:00:00"), "before friday"),
            with_todos(note(3, "Chores", "2024-01-03 00:00:00"), &[("laundry", false)]),
        ]
    }

    fn titles(notes: &[&Note]) -> Vec<String> {
        notes.iter().map(|note| note.title().to_string()).collect()
    }

    #[test]
    fn completed_filter_keeps_only_finished_notes() {
        let notes = sample_notes();
        let shown = filter_notes(&notes, StatusFilter::Completed, "");
        assert_eq!(titles(&shown), vec!["Shopping"]);
        let shown = filter_notes(&notes, StatusFilter::Incomplete, "");
        assert_eq!(titles(&shown), vec!["Buy milk", "Chores"]);
    }

    #[test]
    fn query_matches_title_body_and_todos_case_insensitively() {
        let notes = sample_notes();
        assert_eq!(titles(&filter_notes(&notes, StatusFilter::All, "milk")), vec!["Buy milk"]);
        assert_eq!(titles(&filter_notes(&notes, StatusFilter::All, "FRIDAY")), vec!["Buy milk"]);
        assert_eq!(titles(&filter_notes(&notes, StatusFilter::All, "laund")), vec!["Chores"]);
        assert_eq!(filter_notes(&notes, StatusFilter::All, "").len(), 3);
        assert!(filter_notes(&notes, StatusFilter::Completed, "milk").is_empty());
    }

    #[test]
    fn untitled_notes_drop_out_of_active_queries() {
        let mut untitled = with_body(note(9, "", "2024-01-01 00:00:00"), "milk");
        untitled.title = None;
        let notes = vec![untitled];
        assert!(filter_notes(&notes, StatusFilter::All, "milk").is_empty());
        assert_eq!(filter_notes(&notes, StatusFilter::All, "  ").len(), 1);
    }

    #[test]
    fn status_filter_parses_and_cycles() {
        assert_eq!("completed".parse::<StatusFilter>().ok(), Some(StatusFilter::Completed));
        assert_eq!("Incomplete".parse::<StatusFilter>().ok(), Some(StatusFilter::Incomplete));
        assert_eq!(StatusFilter::Incomplete.cycle(), StatusFilter::All);
        assert_eq!(StatusFilter::All.to_string(), "all");
    }

    #[test]
    fn burst_of_keystrokes_fires_once_with_final_query() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let mut fired = Vec::new();

        for (offset, query) in [(0, "m"), (60, "mi"), (120, "mil")] {
            let now = start + Duration::from_millis(offset);
            if let Some(value) = debouncer.poll(now) {
                fired.push(value);
            }
            debouncer.push(query.to_string(), now);
        }
        assert!(debouncer.poll(start + Duration::from_millis(250)).is_none());
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(320)));
        for tick in [320, 400, 600] {
            if let Some(value) = debouncer.poll(start + Duration::from_millis(tick)) {
                fired.push(value);
            }
        }
        assert_eq!(fired, vec!["mil".to_string()]);
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn cancel_drops_pending_value() {
        let now = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.push("x", now);
        debouncer.cancel();
        assert!(debouncer.poll(now + Duration::from_secs(1)).is_none());
        debouncer.push("y", now);
        assert_eq!(debouncer.flush(), Some("y"));
    }
}
