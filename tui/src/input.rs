/// Single-line filter editor. Cursor positions are character indices, not
/// byte offsets, so word motions and deletions stay valid on multibyte
/// input.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilterInput {
    chars: Vec<char>,
    cursor: usize,
}

impl FilterInput {
    pub(crate) fn new(initial: &str) -> Self {
        let chars: Vec<char> = initial.chars().collect();
        let cursor = chars.len();
        Self { chars, cursor }
    }

    pub(crate) fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub(crate) fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub(crate) fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    pub(crate) fn delete(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.chars.remove(self.cursor);
        true
    }

    pub(crate) fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub(crate) fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub(crate) fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub(crate) fn move_prev_word(&mut self) {
        self.cursor = prev_word_start(&self.chars, self.cursor);
    }

    pub(crate) fn move_next_word(&mut self) {
        self.cursor = next_word_start(&self.chars, self.cursor);
    }

    /// Delete from the previous word boundary to the cursor. Returns false
    /// when there was nothing to delete.
    pub(crate) fn delete_prev_word(&mut self) -> bool {
        let start = prev_word_start(&self.chars, self.cursor);
        if start == self.cursor {
            return false;
        }
        self.chars.drain(start..self.cursor);
        self.cursor = start;
        true
    }

    /// Delete from the cursor to the end of the next word run. Returns false
    /// when there was nothing to delete.
    pub(crate) fn delete_next_word(&mut self) -> bool {
        let end = next_word_delete_end(&self.chars, self.cursor);
        if end == self.cursor {
            return false;
        }
        self.chars.drain(self.cursor..end);
        true
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn prev_word_start(chars: &[char], pos: usize) -> usize {
    let mut i = pos.min(chars.len());
    while i > 0 && !is_word_char(chars[i - 1]) {
        i -= 1;
    }
    while i > 0 && is_word_char(chars[i - 1]) {
        i -= 1;
    }
    i
}

fn next_word_start(chars: &[char], pos: usize) -> usize {
    let mut i = pos.min(chars.len());
    while i < chars.len() && is_word_char(chars[i]) {
        i += 1;
    }
    while i < chars.len() && !is_word_char(chars[i]) {
        i += 1;
    }
    i
}

/// End position for a forward word deletion: a cursor inside a word deletes
/// to the word's end; a cursor on separators deletes through them and the
/// following word.
fn next_word_delete_end(chars: &[char], pos: usize) -> usize {
    let mut i = pos.min(chars.len());
    if i < chars.len() && is_word_char(chars[i]) {
        while i < chars.len() && is_word_char(chars[i]) {
            i += 1;
        }
        return i;
    }
    while i < chars.len() && !is_word_char(chars[i]) {
        i += 1;
    }
    while i < chars.len() && is_word_char(chars[i]) {
        i += 1;
    }
    i
}
