use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::api::{CalendarEvent, NotesApi};
use crate::config::CalendarConfig;
use crate::error::{ClientError, ClientResult};
use crate::model::TodoItem;

/// Start and end as entered, `YYYY-MM-DDTHH:MM` in the configured offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventWindow {
    pub start: String,
    pub end: String,
}

/// The note fields an event is built from.
#[derive(Debug, Clone, Copy)]
pub struct EventSource<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub todo_items: &'a [TodoItem],
}

pub fn build_event(
    source: EventSource<'_>,
    window: &EventWindow,
    config: &CalendarConfig,
) -> ClientResult<CalendarEvent> {
    let start = window.start.trim();
    let end = window.end.trim();
    if start.is_empty() || end.is_empty() {
        return Err(ClientError::validation("Start and end times are required."));
    }
    let parsed_start = parse_local_minute(start)?;
    let parsed_end = parse_local_minute(end)?;
    if parsed_end < parsed_start {
        return Err(ClientError::validation("End time must not be before start time."));
    }

    Ok(CalendarEvent {
        summary: source.title.to_string(),
        location: config.location.clone(),
        description: describe(source),
        start: format!("{start}:00{}", config.utc_offset),
        end: format!("{end}:00{}", config.utc_offset),
    })
}

pub fn create_event<A: NotesApi + ?Sized>(
    api: &A,
    source: EventSource<'_>,
    window: &EventWindow,
    config: &CalendarConfig,
) -> ClientResult<CalendarEvent> {
    let event = build_event(source, window, config)?;
    api.create_event(&event)?;
    Ok(event)
}

/// Note body, or the todo list as `- item` lines when the body is empty.
fn describe(source: EventSource<'_>) -> String {
    if !source.body.is_empty() {
        return source.body.to_string();
    }
    source
        .todo_items
        .iter()
        .map(|item| format!("- {}", item.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_local_minute(raw: &str) -> ClientResult<PrimitiveDateTime> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    PrimitiveDateTime::parse(raw, format).map_err(|_| {
        ClientError::validation(format!("Invalid time {raw:?}, expected YYYY-MM-DDTHH:MM."))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use assert_matches::assert_matches;

    fn window(start: &str, end: &str) -> EventWindow {
        EventWindow {
            start: start.into(),
            end: end.into(),
        }
    }

    #[test]
    fn event_times_carry_configured_offset() -> anyhow::Result<()> {
        let source = EventSource {
            title: "Standup",
            body: "daily sync",
            todo_items: &[],
        };
        let event = build_event(
            source,
            &window("2025-01-03T10:00", "2025-01-03T11:00"),
            &CalendarConfig::default(),
        )?;
        assert_eq!(event.start, "2025-01-03T10:00:00+07:00");
        assert_eq!(event.end, "2025-01-03T11:00:00+07:00");
        assert_eq!(event.location, "Thailand");
        assert_eq!(event.description, "daily sync");
        Ok(())
    }

    #[test]
    fn description_falls_back_to_todo_lines() -> anyhow::Result<()> {
        let items = vec![TodoItem::local("passport"), TodoItem::local("tickets")];
        let source = EventSource {
            title: "Trip",
            body: "",
            todo_items: &items,
        };
        let event = build_event(
            source,
            &window("2025-02-01T08:00", "2025-02-01T08:00"),
            &CalendarConfig::default(),
        )?;
        assert_eq!(event.description, "- passport\n- tickets");
        Ok(())
    }

    #[test]
    fn invalid_windows_never_reach_the_backend() {
        let api = FakeApi::default();
        let source = EventSource {
            title: "x",
            body: "",
            todo_items: &[],
        };
        let config = CalendarConfig::default();
        assert_matches!(
            create_event(&api, source, &window("", "2025-01-01T10:00"), &config),
            Err(ClientError::Validation(_))
        );
        assert_matches!(
            create_event(&api, source, &window("2025-01-01T10:00", "2025-01-01T09:59"), &config),
            Err(ClientError::Validation(msg)) if msg.contains("before start")
        );
        assert_matches!(
            create_event(&api, source, &window("tomorrow", "2025-01-01T10:00"), &config),
            Err(ClientError::Validation(_))
        );
        assert!(api.calls().is_empty());

        create_event(&api, source, &window("2025-01-01T10:00", "2025-01-01T11:00"), &config)
            .expect("event");
        assert_eq!(api.events.lock().len(), 1);
    }
}
