use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use regex::Regex;

use crate::app::buffer::TextBuffer;
use crate::app::editor::{EditorField, NoteEditor};
use crate::app::reminder::{DraftField, ReminderEditor};
use crate::app::state::{
    AppState, CalendarForm, EditorOverlay, FocusPane, OverlayState, ShareOverlay,
    TagInputKind, TagManagerMode, TagManagerOverlay, WindowField,
};
use crate::config::palette::NotePalette;
use crate::highlight::build_highlight_regex;
use crate::model::{Note, TagRef, TodoItem, UNTITLED};

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(vertical[0]);

    let list_block_style = if matches!(state.focus, FocusPane::List) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let highlight_regex = build_highlight_regex(&state.search.applied);
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let notes = state.visible_notes();
    let mut items = Vec::with_capacity(notes.len());
    for note in &notes {
        let mut title_spans = note_badges(note, &state.palette);
        title_spans.extend(title_spans_for(note, highlight_regex.as_ref(), highlight_style));

        let meta_line = if state.show_trash {
            let label = note
                .deleted_at
                .as_deref()
                .map(|at| format!("Deleted {at}"))
                .unwrap_or_else(|| "Deleted".to_string());
            Line::from(Span::styled(label, Style::default().fg(Color::Gray)))
        } else {
            let mut spans = vec![Span::styled(
                format!("Updated {}", note.updated_at),
                Style::default().fg(Color::Gray),
            )];
            if let Some(reminder) = note.active_reminder() {
                spans.push(Span::raw(" • "));
                spans.push(Span::styled(
                    format!("⏰ {}", reminder.reminder_time),
                    Style::default().fg(Color::Magenta),
                ));
            }
            Line::from(spans)
        };

        let mut lines = vec![Line::from(title_spans), meta_line];
        if let Some(tag_line) =
            render_tag_line(&note.tags, highlight_regex.as_ref(), highlight_style)
        {
            lines.push(tag_line);
        }
        lines.push(Line::from(highlight_line(
            &preview_line(note),
            highlight_regex.as_ref(),
            highlight_style,
            Style::default().fg(Color::DarkGray),
        )));
        items.push(ListItem::new(lines));
    }
    if items.is_empty() {
        let empty = if state.show_trash {
            "Trash is empty."
        } else if !state.loaded {
            "Loading notes…"
        } else if !state.search.applied.is_empty() {
            "No notes match the search."
        } else {
            "No notes yet. Press `a` to create one."
        };
        items.push(ListItem::new(empty));
    }

    let list_title = if state.show_trash {
        "Trash".to_string()
    } else {
        format!("Notes ({})", state.search.status)
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(list_title)
                .borders(Borders::ALL)
                .border_style(list_block_style),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, columns[0], list_state);

    let detail_block_style = if matches!(state.focus, FocusPane::Reader) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let reader_text = state
        .selected_note()
        .map(|note| reader_lines(note, &state.palette, highlight_regex.as_ref(), highlight_style))
        .unwrap_or_else(|| Text::from("Select a note to see its contents."));
    let detail = Paragraph::new(reader_text)
        .block(
            Block::default()
                .title("Reader")
                .borders(Borders::ALL)
                .border_style(detail_block_style),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, columns[1]);
    frame.render_widget(detail, columns[1]);

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);

    render_overlay(frame, state);
}

fn note_badges(note: &Note, palette: &NotePalette) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    if note.is_priority() {
        spans.push(Span::styled(
            "★ ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::styled(
        "■ ",
        Style::default().fg(palette.color(&note.color)),
    ));
    if note.is_todo {
        let (marker, style) = if note.is_all_done {
            ("[✓] ", Style::default().fg(Color::Green))
        } else {
            ("[ ] ", Style::default().fg(Color::Gray))
        };
        spans.push(Span::styled(marker, style));
    }
    spans
}

fn title_spans_for(
    note: &Note,
    regex: Option<&Regex>,
    highlight_style: Style,
) -> Vec<Span<'static>> {
    let title = note.title();
    if title.trim().is_empty() {
        return vec![Span::styled(
            UNTITLED,
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )];
    }
    highlight_line(
        title,
        regex,
        highlight_style,
        Style::default().add_modifier(Modifier::BOLD),
    )
}

/// One-line summary under the title: first body line, or todo progress.
fn preview_line(note: &Note) -> String {
    if note.is_todo {
        let done = note.todo_items.iter().filter(|item| item.is_done).count();
        let first = note
            .todo_items
            .iter()
            .find(|item| !item.is_done)
            .map(|item| format!(" • next: {}", item.content))
            .unwrap_or_default();
        return format!("{done}/{} done{first}", note.todo_items.len());
    }
    note.body().lines().next().unwrap_or("").to_string()
}

fn reader_lines(
    note: &Note,
    palette: &NotePalette,
    regex: Option<&Regex>,
    highlight_style: Style,
) -> Text<'static> {
    let mut lines = Vec::new();
    let mut header = note_badges(note, palette);
    header.extend(title_spans_for(note, regex, highlight_style));
    lines.push(Line::from(header));
    lines.push(Line::from(Span::styled(
        format!("Created {} • Updated {}", note.created_at, note.updated_at),
        Style::default().fg(Color::Gray),
    )));
    if let Some(tag_line) = render_tag_line(&note.tags, regex, highlight_style) {
        lines.push(tag_line);
    }
    let collaborators: Vec<&str> = note
        .collaborators()
        .map(|entry| entry.email.as_str())
        .collect();
    if !collaborators.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Shared with {}", collaborators.join(", ")),
            Style::default().fg(Color::Cyan),
        )));
    }
    if let Some(reminder) = note.active_reminder() {
        let repeat = match (reminder.recurring, reminder.frequency) {
            (true, Some(frequency)) => format!(" (repeats {frequency})"),
            _ => String::new(),
        };
        lines.push(Line::from(Span::styled(
            format!("Reminder {}{repeat}", reminder.reminder_time),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines.push(Line::from(""));
    if note.is_todo {
        lines.extend(todo_lines(&note.todo_items, None, regex, highlight_style));
    } else {
        lines.extend(highlight_body(note.body(), regex, highlight_style));
    }
    Text::from(lines)
}

fn todo_lines(
    items: &[TodoItem],
    cursor: Option<usize>,
    regex: Option<&Regex>,
    highlight_style: Style,
) -> Vec<Line<'static>> {
    if items.is_empty() {
        return vec![Line::from(Span::styled(
            "No items",
            Style::default().fg(Color::DarkGray),
        ))];
    }
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let selected = cursor == Some(idx);
            let marker = if item.is_done { "[x] " } else { "[ ] " };
            let base = match (item.is_done, selected) {
                (_, true) => Style::default().fg(Color::Black).bg(Color::Cyan),
                (true, false) => Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::CROSSED_OUT),
                (false, false) => Style::default(),
            };
            let mut spans = vec![Span::styled(marker, base)];
            spans.extend(highlight_line(&item.content, regex, highlight_style, base));
            Line::from(spans)
        })
        .collect()
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let total = state.len();
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };

    let mut spans = vec![
        Span::raw(format!("Notes: {total} ")),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | Filter: "),
        Span::styled(
            state.search.status.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];

    if state.show_trash {
        spans.push(Span::raw(" | View: "));
        spans.push(Span::styled(
            "Trash",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ));
    }

    if state.is_search_active() || !state.search.input.is_empty() {
        let label_style = if state.is_search_active() {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" | Search "));
        spans.push(Span::styled("/", label_style));
        if state.search.input.is_empty() {
            spans.push(Span::styled(
                "(type to search)",
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            spans.push(Span::styled(
                state.search.input.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        if state.is_search_active() {
            spans.push(Span::styled(" ▌", Style::default().fg(Color::Cyan)));
        }
    }

    if state.pending_jobs > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("syncing ({})", state.pending_jobs),
            Style::default().fg(Color::Yellow),
        ));
    }

    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = if state.show_trash {
        "j/k move • u restore • T notes • Ctrl-r refresh • q quit"
    } else {
        "j/k move • a add • e edit • d delete • p star • c color • x done • t tags • s share • f filter • / search • T trash • q quit"
    };
    Text::from(vec![
        Line::from(spans),
        Line::from(vec![
            Span::styled(
                "Keys: ",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(keys, Style::default().fg(Color::DarkGray)),
        ]),
    ])
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    if let Some(re) = regex {
        let mut spans = Vec::new();
        let mut last = 0;
        for mat in re.find_iter(text) {
            if mat.start() > last {
                spans.push(Span::styled(
                    text[last..mat.start()].to_string(),
                    base_style,
                ));
            }
            spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
            last = mat.end();
        }
        if last < text.len() {
            spans.push(Span::styled(text[last..].to_string(), base_style));
        }
        if spans.is_empty() {
            spans.push(Span::styled(text.to_string(), base_style));
        }
        spans
    } else {
        vec![Span::styled(text.to_string(), base_style)]
    }
}

fn highlight_body(body: &str, regex: Option<&Regex>, highlight_style: Style) -> Vec<Line<'static>> {
    if body.is_empty() {
        return vec![Line::from("")];
    }
    body.lines()
        .map(|line| {
            Line::from(highlight_line(
                line,
                regex,
                highlight_style,
                Style::default(),
            ))
        })
        .collect()
}

fn render_tag_line(
    tags: &[TagRef],
    regex: Option<&Regex>,
    highlight_style: Style,
) -> Option<Line<'static>> {
    if tags.is_empty() {
        return None;
    }
    let base_style = Style::default().fg(Color::Green);
    let mut spans = Vec::new();
    for (idx, tag) in tags.iter().enumerate() {
        let token = format!("#{}", tag.tag_name);
        spans.extend(highlight_line(&token, regex, highlight_style, base_style));
        if idx + 1 < tags.len() {
            spans.push(Span::raw(" "));
        }
    }
    Some(Line::from(spans))
}

/// Screen position of a buffer's cursor inside a bordered, wrapping block.
fn buffer_cursor_position(buffer: &TextBuffer, area: Rect) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }

    let width_limit = inner_width as usize;
    let mut row = 0u16;
    let mut col = 0usize;
    let text = buffer.text();
    let cursor = buffer.cursor().min(text.len());

    for grapheme in text[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if glyph_width > 0 && col + glyph_width > width_limit {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }

    let row = row.min(inner_height - 1);
    let col = col.min(width_limit.max(1) - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn field_block(title: &str, active: bool) -> Block<'static> {
    let style = if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(style)
}

fn render_editor(frame: &mut Frame, state: &AppState, overlay: &EditorOverlay) {
    let editor = &overlay.editor;
    let area = centered_rect(80, 80, frame.size());
    frame.render_widget(Clear, area);

    let heading = match editor.note_id() {
        Some(note_id) => format!("Edit Note #{note_id}"),
        None => "New Note".to_string(),
    };
    let outer = Block::default()
        .title(heading)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.palette.color(editor.color())));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(inner);

    let title_active = editor.field() == EditorField::Title;
    let title = Paragraph::new(editor.title.text().to_string())
        .block(field_block("Title", title_active));
    frame.render_widget(title, layout[0]);

    let content_active = editor.field() != EditorField::Title;
    if editor.is_todo() {
        let cursor = content_active.then(|| editor.todo_cursor());
        let list = Paragraph::new(todo_lines(editor.todos(), cursor, None, Style::default()))
            .block(field_block("Todo items", content_active))
            .wrap(Wrap { trim: false });
        frame.render_widget(list, layout[1]);
    } else {
        let body = Paragraph::new(editor.body.text().to_string())
            .block(field_block("Content", content_active))
            .wrap(Wrap { trim: false });
        frame.render_widget(body, layout[1]);
    }

    frame.render_widget(Paragraph::new(editor_footer(state, editor)), layout[2]);

    if overlay.reminder.is_open() {
        render_reminder(frame, &overlay.reminder);
    } else if let Some(form) = &overlay.calendar {
        render_calendar(frame, form);
    } else {
        let cursor = match editor.field() {
            EditorField::Title => buffer_cursor_position(&editor.title, layout[0]),
            EditorField::Body => buffer_cursor_position(&editor.body, layout[1]),
            EditorField::Todos => None,
        };
        if let Some((x, y)) = cursor {
            frame.set_cursor(x, y);
        }
    }
}

fn editor_footer(state: &AppState, editor: &NoteEditor) -> Vec<Line<'static>> {
    let mut spans = vec![
        Span::raw("Color: "),
        Span::styled(
            format!("■ {}", editor.color()),
            Style::default().fg(state.palette.color(editor.color())),
        ),
        Span::raw(" | Todo: "),
        Span::styled(
            if editor.is_todo() { "on" } else { "off" },
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    let reminder = editor
        .note_id()
        .and_then(|note_id| state.store.note(note_id))
        .and_then(Note::active_reminder);
    if let Some(reminder) = reminder {
        spans.push(Span::raw(" | Reminder: "));
        spans.push(Span::styled(
            reminder.reminder_time.clone(),
            Style::default().fg(Color::Magenta),
        ));
    }
    if !editor.changes().is_empty() {
        spans.push(Span::styled(
            " | modified",
            Style::default().fg(Color::Yellow),
        ));
    }
    vec![
        Line::from(spans),
        Line::from(Span::styled(
            "Tab field • Ctrl-s save • Ctrl-t todo • Ctrl-o color • Ctrl-r reminder • Ctrl-e calendar • Ctrl-a connect calendar • Esc close",
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

fn render_reminder(frame: &mut Frame, reminder: &ReminderEditor) {
    let Some(draft) = reminder.draft() else {
        return;
    };
    let area = centered_rect(50, 40, frame.size());
    frame.render_widget(Clear, area);

    let row = |label: &str, value: String, field: DraftField| {
        let active = draft.field == field;
        let style = if active {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let marker = if active { "▸ " } else { "  " };
        Line::from(vec![
            Span::styled(format!("{marker}{label}: "), style),
            Span::raw(value),
        ])
    };

    let mut when = draft.when.clone();
    if draft.field == DraftField::When {
        when.push('▌');
    }
    let mut lines = vec![
        row("When (YYYY-MM-DD HH:MM)", when, DraftField::When),
        row(
            "Repeat",
            if draft.recurring { "yes" } else { "no" }.to_string(),
            DraftField::Recurring,
        ),
    ];
    if draft.recurring {
        lines.push(row(
            "Frequency",
            draft.frequency.to_string(),
            DraftField::Frequency,
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab field • space toggle • Enter save • Ctrl-d remove • Esc back",
        Style::default().fg(Color::Gray),
    )));

    let title = match reminder {
        ReminderEditor::Editing { .. } => "Edit Reminder",
        _ => "New Reminder",
    };
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_calendar(frame: &mut Frame, form: &CalendarForm) {
    let area = centered_rect(50, 35, frame.size());
    frame.render_widget(Clear, area);
    let row = |label: &str, value: &str, field: WindowField| {
        let active = form.field == field;
        let mut display = value.to_string();
        if active {
            display.push('▌');
        }
        let style = if active {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(vec![Span::styled(format!("{label}: "), style), Span::raw(display)])
    };
    let lines = vec![
        Line::from(Span::styled(
            "Add to Google Calendar",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        row("Start", &form.window.start, WindowField::Start),
        row("End  ", &form.window.end, WindowField::End),
        Line::from(""),
        Line::from(Span::styled(
            "YYYY-MM-DDTHH:MM • Tab switch • Enter send • Esc back",
            Style::default().fg(Color::Gray),
        )),
    ];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Calendar")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );
    frame.render_widget(paragraph, area);
}

fn render_tag_manager(frame: &mut Frame, state: &AppState, overlay: &TagManagerOverlay) {
    let area = centered_rect(60, 65, frame.size());
    frame.render_widget(Clear, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(area);

    let instructions = match &overlay.mode {
        TagManagerMode::Browse => {
            "Space attach/detach • a add • r rename • d delete • j/k move • Esc close"
        }
        TagManagerMode::Input(TagInputKind::Create) => "Type tag name • Enter create • Esc cancel",
        TagManagerMode::Input(TagInputKind::Rename { .. }) => {
            "Rename tag • Enter apply • Esc cancel"
        }
        TagManagerMode::ConfirmDelete { .. } => "Delete tag • y confirm • n / Esc cancel",
    };
    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "Tags",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(instructions, Style::default().fg(Color::Gray))),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, layout[0]);

    let note = state.store.note(overlay.note_id);
    let items: Vec<ListItem> = state
        .store
        .tags()
        .map(|tag| {
            let attached = note.map(|note| note.has_tag(tag.tag_id)).unwrap_or(false);
            let (mark, style) = if attached {
                ("[x]", Style::default().fg(Color::Green))
            } else {
                ("[ ]", Style::default())
            };
            ListItem::new(Line::from(vec![
                Span::styled(mark, style.add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::styled(tag.tag_name.clone(), style),
            ]))
        })
        .collect();

    let mut list_state = ListState::default();
    if state.store.tag_count() > 0 {
        list_state.select(Some(overlay.selected_index));
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, layout[1], &mut list_state);

    let tag_name = |tag_id: u64| {
        state
            .store
            .tag(tag_id)
            .map(|tag| tag.tag_name.clone())
            .unwrap_or_else(|| format!("#{tag_id}"))
    };
    let footer = match &overlay.mode {
        TagManagerMode::Input(kind) => {
            let label = match kind {
                TagInputKind::Create => "New tag".to_string(),
                TagInputKind::Rename { tag_id } => format!("Renaming '{}'", tag_name(*tag_id)),
            };
            let mut display = overlay.input.clone();
            display.push('▌');
            vec![
                Line::from(Span::styled(label, Style::default().fg(Color::Cyan))),
                Line::from(display),
            ]
        }
        TagManagerMode::ConfirmDelete { tag_id } => vec![
            Line::from(Span::styled(
                format!("Delete tag '{}' from every note?", tag_name(*tag_id)),
                Style::default().fg(Color::Red),
            )),
            Line::from("Press y to confirm or n / Esc to cancel"),
        ],
        TagManagerMode::Browse => vec![Line::from(Span::styled(
            format!(
                "Tags for '{}'",
                note.map(|note| note.title().to_string()).unwrap_or_default()
            ),
            Style::default().fg(Color::Cyan),
        ))],
    };
    let footer = Paragraph::new(footer).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(footer, layout[2]);
}

fn render_share(frame: &mut Frame, state: &AppState, overlay: &ShareOverlay) {
    let area = centered_rect(60, 55, frame.size());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Share note",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Type an email + Enter to invite • ↑/↓ select • Del remove • Esc close",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];
    let entries = state
        .store
        .note(overlay.note_id)
        .map(|note| note.shared_with.as_slice())
        .unwrap_or(&[]);
    if entries.is_empty() {
        lines.push(Line::from(Span::styled(
            "Not shared with anyone yet.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let mut collaborator_idx = 0usize;
    for entry in entries {
        if entry.is_removable() {
            let selected = collaborator_idx == overlay.selected_index;
            collaborator_idx += 1;
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("  {}", entry.email),
                style,
            )));
        } else {
            lines.push(Line::from(Span::styled(
                format!("  {} (owner)", entry.email),
                Style::default().fg(Color::Gray),
            )));
        }
    }
    lines.push(Line::from(""));
    let mut input = overlay.input.clone();
    input.push('▌');
    lines.push(Line::from(vec![
        Span::styled("Email: ", Style::default().fg(Color::Cyan)),
        Span::raw(input),
    ]));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Collaborators")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::Editor(overlay)) => render_editor(frame, state, overlay),
        Some(OverlayState::DeleteConfirm(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let title = if draft.title.trim().is_empty() {
                UNTITLED
            } else {
                draft.title.as_str()
            };
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete Note",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!("Move '{title}' to the trash?")),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter or y to confirm • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title(format!("Confirm Delete (#{})", draft.note_id))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::TagManager(overlay)) => render_tag_manager(frame, state, overlay),
        Some(OverlayState::Share(overlay)) => render_share(frame, state, overlay),
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
