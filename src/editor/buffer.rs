use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Revision {
    text: String,
    cursor: usize,
}

/// Editable text with a grapheme-aligned byte cursor and undo/redo stacks.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
    multiline: bool,
    /// Cursor movement only; every edit is refused.
    read_only: bool,
    goal_column: Option<usize>,
    undo: Vec<Revision>,
    redo: Vec<Revision>,
}

impl TextBuffer {
    pub fn single_line(text: &str) -> Self {
        Self::new(text.replace(['\r', '\n'], " "), false)
    }

    pub fn multi_line(text: &str) -> Self {
        Self::new(text.to_string(), true)
    }

    fn new(text: String, multiline: bool) -> Self {
        Self {
            cursor: text.len(),
            text,
            multiline,
            read_only: false,
            goal_column: None,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Replaces the contents and forgets the history. The buffer becomes editable.
    pub fn reset(&mut self, text: &str) {
        *self = if self.multiline {
            Self::multi_line(text)
        } else {
            Self::single_line(text)
        };
    }

    /// Zero-based line index and display column of the cursor.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let line = before.matches('\n').count();
        let start = line_start(&self.text, self.cursor);
        (line, self.text[start..self.cursor].width())
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch == '\n' {
            return self.insert_newline();
        }
        let mut scratch = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut scratch))
    }

    pub fn insert_str(&mut self, raw: &str) -> bool {
        let text = if self.multiline {
            raw.replace("\r\n", "\n")
        } else {
            raw.replace(['\r', '\n'], " ")
        };
        if text.is_empty() || self.read_only {
            return false;
        }
        self.checkpoint();
        self.text.insert_str(self.cursor, &text);
        self.cursor += text.len();
        self.goal_column = None;
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        if !self.multiline || self.read_only {
            return false;
        }
        self.checkpoint();
        self.text.insert(self.cursor, '\n');
        self.cursor += 1;
        self.goal_column = Some(0);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 || self.read_only {
            return false;
        }
        let start = previous_boundary(&self.text, self.cursor);
        self.checkpoint();
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.goal_column = None;
        true
    }

    pub fn delete(&mut self) -> bool {
        let end = next_boundary(&self.text, self.cursor);
        if end == self.cursor || self.read_only {
            return false;
        }
        self.checkpoint();
        self.text.replace_range(self.cursor..end, "");
        self.goal_column = None;
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.jump(previous_boundary(&self.text, self.cursor))
    }

    pub fn move_right(&mut self) -> bool {
        self.jump(next_boundary(&self.text, self.cursor))
    }

    pub fn move_home(&mut self) -> bool {
        self.jump(line_start(&self.text, self.cursor))
    }

    pub fn move_end(&mut self) -> bool {
        self.jump(line_end(&self.text, self.cursor))
    }

    pub fn move_up(&mut self) -> bool {
        let start = line_start(&self.text, self.cursor);
        let column = self.goal_column(start);
        let target = if start == 0 {
            0
        } else {
            let above = line_start(&self.text, start - 1);
            offset_for_column(&self.text, above, column)
        };
        self.jump_vertical(target, column)
    }

    pub fn move_down(&mut self) -> bool {
        let start = line_start(&self.text, self.cursor);
        let column = self.goal_column(start);
        let end = line_end(&self.text, self.cursor);
        let target = if end == self.text.len() {
            end
        } else {
            offset_for_column(&self.text, end + 1, column)
        };
        self.jump_vertical(target, column)
    }

    /// Start of the word before the cursor.
    pub fn move_word_left(&mut self) -> bool {
        let target = self.text[..self.cursor]
            .split_word_bound_indices()
            .rev()
            .find(|(_, segment)| !is_blank(segment))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        self.jump(target)
    }

    /// Start of the next word after the cursor.
    pub fn move_word_right(&mut self) -> bool {
        let target = self.text[self.cursor..]
            .split_word_bound_indices()
            .find(|(idx, segment)| *idx > 0 && !is_blank(segment))
            .map(|(idx, _)| self.cursor + idx)
            .unwrap_or(self.text.len());
        self.jump(target)
    }

    pub fn undo(&mut self) -> bool {
        if self.read_only {
            return false;
        }
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        let current = self.revision();
        self.redo.push(current);
        self.restore(previous);
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.read_only {
            return false;
        }
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let current = self.revision();
        self.undo.push(current);
        self.restore(next);
        true
    }

    fn revision(&self) -> Revision {
        Revision {
            text: self.text.clone(),
            cursor: self.cursor,
        }
    }

    fn restore(&mut self, revision: Revision) {
        self.text = revision.text;
        self.cursor = revision.cursor.min(self.text.len());
        self.goal_column = None;
    }

    fn checkpoint(&mut self) {
        self.redo.clear();
        self.undo.push(self.revision());
        if self.undo.len() > HISTORY_LIMIT {
            let overflow = self.undo.len() - HISTORY_LIMIT;
            self.undo.drain(..overflow);
        }
    }

    fn jump(&mut self, target: usize) -> bool {
        self.goal_column = None;
        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        true
    }

    fn jump_vertical(&mut self, target: usize, column: usize) -> bool {
        self.goal_column = Some(column);
        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        true
    }

    fn goal_column(&self, line_start: usize) -> usize {
        self.goal_column
            .unwrap_or_else(|| self.text[line_start..self.cursor].graphemes(true).count())
    }
}

fn is_blank(segment: &str) -> bool {
    segment.chars().all(char::is_whitespace)
}

fn previous_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_boundary(text: &str, cursor: usize) -> usize {
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

fn offset_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let end = line_end(text, line_start);
    text[line_start..end]
        .grapheme_indices(true)
        .nth(column)
        .map(|(idx, _)| line_start + idx)
        .unwrap_or(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_and_redo_walk_the_history() {
        let mut buffer = TextBuffer::multi_line("hello");
        assert!(buffer.insert_char('!'));
        assert!(buffer.insert_char('?'));
        assert!(buffer.undo());
        assert_eq!(buffer.text(), "hello!");
        assert!(buffer.undo());
        assert_eq!(buffer.text(), "hello");
        assert!(!buffer.undo());
        assert!(buffer.redo());
        assert_eq!(buffer.text(), "hello!");

        buffer.insert_char('.');
        assert!(!buffer.redo());
    }

    #[test]
    fn word_navigation_skips_whitespace() {
        let mut buffer = TextBuffer::multi_line("alpha  beta");
        assert!(buffer.move_word_left());
        assert_eq!(buffer.cursor(), 7);
        assert!(buffer.move_word_left());
        assert_eq!(buffer.cursor(), 0);
        assert!(!buffer.move_word_left());
        assert!(buffer.move_word_right());
        assert_eq!(buffer.cursor(), 7);
        assert!(buffer.move_word_right());
        assert_eq!(buffer.cursor(), 11);
    }

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut buffer = TextBuffer::single_line("ok 👍🏽");
        assert!(buffer.backspace());
        assert_eq!(buffer.text(), "ok ");
        assert!(buffer.move_left());
        assert!(buffer.delete());
        assert_eq!(buffer.text(), "ok");
    }

    #[test]
    fn vertical_moves_keep_the_goal_column() {
        let mut buffer = TextBuffer::multi_line("long line\nab\nanother");
        buffer.move_up();
        buffer.move_up();
        buffer.move_home();
        for _ in 0..6 {
            buffer.move_right();
        }
        assert!(buffer.move_down());
        assert_eq!(buffer.cursor_position(), (1, 2));
        assert!(buffer.move_down());
        assert_eq!(buffer.cursor_position(), (2, 6));
    }

    #[test]
    fn single_line_rejects_newlines() {
        let mut title = TextBuffer::single_line("a\nb");
        assert_eq!(title.text(), "a b");
        assert!(!title.insert_newline());
        title.insert_str("c\nd");
        assert_eq!(title.text(), "a bc d");
    }

    #[test]
    fn history_is_bounded() {
        let mut buffer = TextBuffer::single_line("");
        for _ in 0..(HISTORY_LIMIT + 50) {
            buffer.insert_char('x');
        }
        let mut undone = 0;
        while buffer.undo() {
            undone += 1;
        }
        assert_eq!(undone, HISTORY_LIMIT);
    }

    #[test]
    fn read_only_buffer_moves_but_never_edits() {
        let mut buffer = TextBuffer::multi_line("ab\ncd");
        buffer.set_read_only(true);
        assert!(!buffer.insert_char('x'));
        assert!(!buffer.insert_newline());
        assert!(!buffer.backspace());
        assert!(buffer.move_up());
        assert!(!buffer.delete());
        assert!(!buffer.undo());
        assert_eq!(buffer.text(), "ab\ncd");

        buffer.reset("ef");
        assert!(!buffer.is_read_only());
        assert!(buffer.insert_char('g'));
    }
}
