use unicode_segmentation::UnicodeSegmentation;

const MAX_HISTORY: usize = 200;

/// Editable text with a byte cursor on grapheme boundaries and a bounded
/// undo history.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
    preferred_column: Option<usize>,
    history: Vec<String>,
    history_index: usize,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        let mut history = Vec::with_capacity(32);
        history.push(text.clone());
        Self {
            text,
            cursor,
            preferred_column: None,
            history,
            history_index: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replaces the contents and starts a fresh history.
    pub fn set_text(&mut self, text: impl Into<String>) {
        *self = Self::new(text);
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.text.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        self.text.insert(self.cursor, '\n');
        self.cursor += 1;
        self.preferred_column = Some(0);
        self.after_edit();
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.text, self.cursor);
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.text, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.text.drain(self.cursor..next);
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.text, self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_right(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.text, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        self.preferred_column = None;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let start = line_start(&self.text, self.cursor);
        if self.cursor == start {
            return false;
        }
        self.cursor = start;
        self.preferred_column = Some(0);
        true
    }

    pub fn move_end(&mut self) -> bool {
        let end = line_end(&self.text, self.cursor);
        if self.cursor == end {
            return false;
        }
        self.cursor = end;
        self.preferred_column = Some(column_at(
            &self.text,
            line_start(&self.text, self.cursor),
            self.cursor,
        ));
        true
    }

    pub fn move_up(&mut self) -> bool {
        let current_start = line_start(&self.text, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.text, current_start, self.cursor));
        if current_start == 0 {
            if self.cursor == 0 {
                return false;
            }
            self.cursor = 0;
            self.preferred_column = Some(column);
            return true;
        }
        let prev_start = line_start(&self.text, current_start - 1);
        let target = position_for_column(&self.text, prev_start, column);
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }

    pub fn move_down(&mut self) -> bool {
        let current_start = line_start(&self.text, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.text, current_start, self.cursor));
        let current_end = line_end(&self.text, self.cursor);
        if current_end == self.text.len() {
            if self.cursor == self.text.len() {
                return false;
            }
            self.cursor = self.text.len();
            self.preferred_column = Some(column);
            return true;
        }
        let target = position_for_column(&self.text, current_end + 1, column);
        if self.cursor == target {
            return false;
        }
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }

    pub fn move_word_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let mut idx = self.skip_back(self.cursor, true);
        idx = self.skip_back(idx, false);
        self.cursor = idx;
        self.preferred_column = None;
        true
    }

    pub fn move_word_right(&mut self) -> bool {
        let mut idx = self.skip_forward(self.cursor, true);
        idx = self.skip_forward(idx, false);
        idx = self.skip_forward(idx, true);
        if idx == self.cursor {
            return false;
        }
        self.cursor = idx;
        self.preferred_column = None;
        true
    }

    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.restore_history_snapshot();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.restore_history_snapshot();
        true
    }

    fn skip_back(&self, mut idx: usize, whitespace: bool) -> usize {
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.text, idx);
            if self.text[prev..idx].trim().is_empty() != whitespace {
                break;
            }
            idx = prev;
        }
        idx
    }

    fn skip_forward(&self, mut idx: usize, whitespace: bool) -> usize {
        while idx < self.text.len() {
            let next = next_grapheme_boundary(&self.text, idx);
            if self.text[idx..next].trim().is_empty() != whitespace {
                break;
            }
            idx = next;
        }
        idx
    }

    fn after_edit(&mut self) {
        self.record_history();
    }

    fn record_history(&mut self) {
        if let Some(current) = self.history.get(self.history_index) {
            if current.as_str() == self.text {
                return;
            }
        }
        self.history.truncate(self.history_index + 1);
        self.history.push(self.text.clone());
        if self.history.len() > MAX_HISTORY {
            let overflow = self.history.len() - MAX_HISTORY;
            self.history.drain(0..overflow);
        }
        self.history_index = self.history.len() - 1;
    }

    fn restore_history_snapshot(&mut self) {
        if let Some(snapshot) = self.history.get(self.history_index).cloned() {
            self.text = snapshot;
            self.cursor = self.cursor.min(self.text.len());
            while !self.text.is_char_boundary(self.cursor) {
                self.cursor -= 1;
            }
            self.preferred_column = None;
        }
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let end = line_end(text, line_start);
    let mut position = line_start;
    for (count, grapheme) in text[line_start..end].graphemes(true).enumerate() {
        if count >= column {
            return position;
        }
        position += grapheme.len();
    }
    end
}
