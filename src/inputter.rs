use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Outcome of feeding one key to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    /// Text changed; carries the full text.
    Edited(String),
    /// Cursor moved, text unchanged.
    Moved,
    Submitted(String),
    Cancelled,
}

/// Single line text input used for the search term.
#[derive(Debug, Default)]
pub struct Inputter {
    text: String,
    cursor: usize, // in chars
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> PromptEvent {
        let event = match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => PromptEvent::Submitted(self.text.clone()),
            (KeyCode::Esc, _) => {
                self.clear();
                PromptEvent::Cancelled
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.move_to(self.cursor.saturating_sub(1)),
            (KeyCode::Right, _) => self.move_to(self.cursor + 1),
            (KeyCode::Home, _) => self.move_to(0),
            (KeyCode::End, _) => self.move_to(usize::MAX),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.clear();
                PromptEvent::Edited(String::new())
            }
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => self.insert(chr),
            _ => PromptEvent::Moved,
        };
        trace!("Prompt {:?} -> {:?}", key.code, event);
        event
    }

    /// Starts editing from `text` with the cursor at its end.
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn insert(&mut self, chr: char) -> PromptEvent {
        let at = self.byte_pos(self.cursor);
        self.text.insert(at, chr);
        self.cursor += 1;
        PromptEvent::Edited(self.text.clone())
    }

    fn backspace(&mut self) -> PromptEvent {
        if self.cursor == 0 {
            return PromptEvent::Moved;
        }
        self.cursor -= 1;
        let at = self.byte_pos(self.cursor);
        self.text.remove(at);
        PromptEvent::Edited(self.text.clone())
    }

    fn delete(&mut self) -> PromptEvent {
        if self.cursor >= self.text.chars().count() {
            return PromptEvent::Moved;
        }
        let at = self.byte_pos(self.cursor);
        self.text.remove(at);
        PromptEvent::Edited(self.text.clone())
    }

    fn move_to(&mut self, cursor: usize) -> PromptEvent {
        self.cursor = cursor.min(self.text.chars().count());
        PromptEvent::Moved
    }

    fn byte_pos(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(input: &mut Inputter, text: &str) {
        for c in text.chars() {
            input.read(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn edits_report_full_text() {
        let mut input = Inputter::default();
        assert_eq!(
            input.read(key(KeyCode::Char('c'))),
            PromptEvent::Edited("c".into())
        );
        type_text(&mut input, "ancer");
        assert_eq!(input.text(), "cancer");
        assert_eq!(
            input.read(key(KeyCode::Backspace)),
            PromptEvent::Edited("cance".into())
        );
        assert_eq!(
            input.read(key(KeyCode::Enter)),
            PromptEvent::Submitted("cance".into())
        );
    }

    #[test]
    fn cursor_moves_over_multibyte_chars() {
        let mut input = Inputter::default();
        input.set("zoë");
        assert_eq!(input.cursor(), 3);
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Char('x')));
        assert_eq!(input.text(), "zoxë");
        input.read(key(KeyCode::Home));
        input.read(key(KeyCode::Delete));
        assert_eq!(input.text(), "oxë");
        input.read(key(KeyCode::End));
        assert_eq!(input.read(key(KeyCode::Right)), PromptEvent::Moved);
        assert_eq!(input.cursor(), 3);
    }

    #[test]
    fn escape_clears() {
        let mut input = Inputter::default();
        type_text(&mut input, "lung");
        assert_eq!(input.read(key(KeyCode::Esc)), PromptEvent::Cancelled);
        assert_eq!(input.text(), "");
        assert_eq!(input.cursor(), 0);
    }
}
